use crate::loader::{is_supported, loader_for_path};
use anyhow::{bail, Context, Result};
use docrag_vector_store::{Metadata, RetrievalEngine, DOCUMENT_ID_KEY};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: usize,
}

/// Content-derived document identity: lowercase hex SHA-256 of the raw text.
pub fn document_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Parse repeated `key=value` flags. Values that parse as JSON keep their type.
pub fn parse_meta(pairs: &[String]) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid --meta '{pair}': expected key=value");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid --meta '{pair}': empty key");
        }
        let value = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        metadata.insert(key.to_string(), value);
    }
    Ok(metadata)
}

/// Expand directories (recursively, sorted) into supported files; explicit files pass through.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if is_supported(entry.path()) {
                files.push(entry.into_path());
            } else {
                log::debug!("Skipping unsupported file {}", entry.path().display());
            }
        }
    }
    Ok(files)
}

/// Load and add one file. Returns the number of stored chunks.
pub async fn ingest_file(engine: &RetrievalEngine, path: &Path, extra: &Metadata) -> Result<usize> {
    let document = loader_for_path(path)?.load(path)?;

    let mut metadata = document.metadata;
    metadata.extend(extra.clone());
    metadata.insert(
        DOCUMENT_ID_KEY.to_string(),
        Value::from(document_id(&document.text)),
    );
    metadata.insert(
        "source".to_string(),
        Value::from(path.display().to_string()),
    );

    let records = engine
        .add_document(&document.text, metadata)
        .await
        .with_context(|| format!("Failed to add {}", path.display()))?;
    Ok(records.len())
}

pub async fn ingest_paths(
    engine: &RetrievalEngine,
    paths: &[PathBuf],
    extra: &Metadata,
) -> Result<IngestReport> {
    let files = collect_files(paths)?;
    if files.is_empty() {
        bail!("No supported documents found (expected .txt, .md or .eml)");
    }

    let mut report = IngestReport::default();
    for file in &files {
        let chunks = ingest_file(engine, file, extra).await?;
        if chunks == 0 {
            log::warn!("{} has no indexable text", file.display());
            report.skipped += 1;
            continue;
        }
        log::info!("Ingested {} ({chunks} chunks)", file.display());
        report.documents += 1;
        report.chunks += chunks;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_document_id_is_sha256_hex() {
        assert_eq!(
            document_id(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(document_id("same"), document_id("same"));
        assert_ne!(document_id("same"), document_id("other"));
    }

    #[test]
    fn test_parse_meta() {
        let meta = parse_meta(&[
            "category=policy".to_string(),
            "year=2024".to_string(),
            "note=a=b".to_string(),
        ])
        .unwrap();
        assert_eq!(meta["category"], json!("policy"));
        assert_eq!(meta["year"], json!(2024));
        assert_eq!(meta["note"], json!("a=b"));

        assert!(parse_meta(&["novalue".to_string()]).is_err());
        assert!(parse_meta(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_collect_files_walks_directories() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("docs").join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join("docs/b.txt"), "b").unwrap();
        std::fs::write(temp.path().join("docs/a.md"), "a").unwrap();
        std::fs::write(nested.join("c.eml"), "Subject: c\n\nc").unwrap();
        std::fs::write(nested.join("scan.pdf"), "%PDF").unwrap();

        let files = collect_files(&[temp.path().join("docs")]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt", "c.eml"]);
    }
}
