use crate::config::EmbeddingConfig;
use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Maps text to fixed-dimension vectors.
///
/// Output order matches input order and every vector has length [`dimension`](Self::dimension).
/// Identical input under the same model yields identical output.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.encode(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| VectorStoreError::EmbeddingError("Empty embedding result".to_string()))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    #[default]
    Onnx,
    Stub,
}

impl EmbeddingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
            Self::Stub => "stub",
        }
    }
}

impl FromStr for EmbeddingMode {
    type Err = VectorStoreError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "stub" => Ok(Self::Stub),
            other => Err(VectorStoreError::InvalidConfig(format!(
                "Unsupported embedding mode '{other}' (expected 'onnx' or 'stub')"
            ))),
        }
    }
}

impl Display for EmbeddingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static facts about a supported sentence-embedding model
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub id: String,
    pub dimension: usize,
    pub max_length: usize,
    pub max_batch: usize,
}

impl ModelSpec {
    pub fn resolve(model_id: &str) -> Result<Self> {
        let id = normalize_model_id(model_id);
        let (dimension, max_length) = match id.as_str() {
            "all-minilm-l6-v2" => (384, 256),
            "bge-small" => (384, 512),
            "bge-base" => (768, 512),
            other => {
                return Err(VectorStoreError::InvalidConfig(format!(
                    "Unknown embedding model id '{other}'. Available: all-minilm-l6-v2, bge-small, bge-base"
                )))
            }
        };
        Ok(Self {
            id,
            dimension,
            max_length,
            max_batch: 32,
        })
    }
}

fn normalize_model_id(raw: &str) -> String {
    let model_name = raw.trim().to_ascii_lowercase();
    let model_name = model_name
        .strip_prefix("sentence-transformers/")
        .or_else(|| model_name.strip_prefix("baai/"))
        .unwrap_or(model_name.as_str());
    match model_name {
        "all-minilm-l6-v2" | "minilm" => "all-minilm-l6-v2".to_string(),
        "bge-small-en-v1.5" => "bge-small".to_string(),
        "bge-base-en-v1.5" => "bge-base".to_string(),
        other => other.to_string(),
    }
}

/// Default location of `<model_id>/{model.onnx,tokenizer.json}` directories
#[must_use]
pub fn default_model_dir() -> PathBuf {
    if let Ok(path) = std::env::var("XDG_CACHE_HOME") {
        return PathBuf::from(path).join("docrag").join("models");
    }
    std::env::var("HOME")
        .map_or_else(|_| PathBuf::from("."), PathBuf::from)
        .join(".cache")
        .join("docrag")
        .join("models")
}

/// Construct the backend selected by `config`.
pub fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let spec = ModelSpec::resolve(&config.model_id)?;
    match config.mode {
        EmbeddingMode::Stub => {
            log::info!(
                "Using stub embeddings for '{}' (dim {})",
                spec.id,
                spec.dimension
            );
            Ok(Arc::new(StubEmbedder::new(spec.id, spec.dimension)))
        }
        #[cfg(feature = "onnx")]
        EmbeddingMode::Onnx => {
            let model_dir = config.model_dir.clone().unwrap_or_else(default_model_dir);
            let embedder = crate::onnx::OnnxEmbedder::load(&spec, &model_dir)?;
            Ok(Arc::new(embedder))
        }
        #[cfg(not(feature = "onnx"))]
        EmbeddingMode::Onnx => Err(VectorStoreError::InvalidConfig(
            "ONNX embeddings require the `onnx` feature; rebuild with it or use mode 'stub'"
                .to_string(),
        )),
    }
}

/// Deterministic hash-seeded embeddings for tests and offline runs.
///
/// Vectors are unit length; unrelated texts land far apart, identical texts coincide.
#[derive(Clone, Debug)]
pub struct StubEmbedder {
    model_id: String,
    dimension: usize,
}

impl StubEmbedder {
    pub fn new(model_id: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| stub_embed(text, self.dimension))
            .collect())
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

pub(crate) fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}
