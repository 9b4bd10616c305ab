use crate::embeddings::EmbeddingMode;
use crate::error::{Result, VectorStoreError};
use crate::paths::DEFAULT_PERSIST_DIR;
use docrag_text_chunker::ChunkerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_STORE_DIR: &str = "DOCRAG_STORE_DIR";
pub const ENV_EMBEDDING_MODE: &str = "DOCRAG_EMBEDDING_MODE";
pub const ENV_EMBEDDING_MODEL: &str = "DOCRAG_EMBEDDING_MODEL";
pub const ENV_MODEL_DIR: &str = "DOCRAG_MODEL_DIR";

/// Engine configuration; every field has a default so partial files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub persist_dir: PathBuf,
    pub dimension: usize,
    pub embedding: EmbeddingConfig,
    pub chunker: ChunkerConfig,
    pub search: SearchDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            persist_dir: PathBuf::from(DEFAULT_PERSIST_DIR),
            dimension: 384,
            embedding: EmbeddingConfig::default(),
            chunker: ChunkerConfig::default(),
            search: SearchDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,
    pub model_id: String,
    pub model_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::default(),
            model_id: "all-minilm-l6-v2".to_string(),
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchDefaults {
    pub k: usize,
    pub threshold: f32,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            k: 5,
            threshold: 0.5,
        }
    }
}

impl EngineConfig {
    /// Read a JSON or TOML config file (JSON is tried first).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|err| VectorStoreError::persistence("read config", path, err))?;
        let config = Self::parse(&bytes).map_err(|message| {
            VectorStoreError::InvalidConfig(format!("{}: {message}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn parse(bytes: &[u8]) -> std::result::Result<Self, String> {
        match serde_json::from_slice(bytes) {
            Ok(config) => Ok(config),
            Err(json_err) => {
                let utf8 =
                    std::str::from_utf8(bytes).map_err(|err| format!("{json_err}; {err}"))?;
                toml::from_str(utf8).map_err(|toml_err| {
                    format!("not valid JSON ({json_err}); TOML parse error: {toml_err}")
                })
            }
        }
    }

    /// Apply `DOCRAG_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var(ENV_STORE_DIR) {
            self.persist_dir = PathBuf::from(dir);
        }
        if let Ok(mode) = std::env::var(ENV_EMBEDDING_MODE) {
            self.embedding.mode = mode.parse()?;
        }
        if let Ok(model) = std::env::var(ENV_EMBEDDING_MODEL) {
            self.embedding.model_id = model;
        }
        if let Ok(dir) = std::env::var(ENV_MODEL_DIR) {
            self.embedding.model_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "dimension must be > 0".to_string(),
            ));
        }
        if self.search.threshold.is_nan() || self.search.threshold < 0.0 {
            return Err(VectorStoreError::InvalidConfig(format!(
                "search.threshold must be a non-negative number, got {}",
                self.search.threshold
            )));
        }
        self.chunker.validate()?;
        Ok(())
    }
}
