use crate::error::{Result, VectorStoreError};
use crate::paths::{read_file, write_atomic};
use crate::types::ChunkRecord;
use std::path::Path;

/// Chunk records kept position-aligned with the vector index.
///
/// Alignment is maintained by the caller: a record appended here must be appended to the
/// index in the same critical section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    records: Vec<ChunkRecord>,
}

impl MetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: ChunkRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ChunkRecord>) {
        self.records.extend(records);
    }

    /// Record at `position`, or `None` when out of range
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&ChunkRecord> {
        self.records.get(position)
    }

    pub fn try_get(&self, position: usize) -> Result<&ChunkRecord> {
        self.get(position)
            .ok_or(VectorStoreError::NotFound(position))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.records.iter()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.records)?;
        write_atomic(path, &bytes, "save metadata").await?;
        log::debug!("Wrote {} chunk records to {}", self.len(), path.display());
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = read_file(path, "load metadata").await?;
        let records: Vec<ChunkRecord> = serde_json::from_slice(&bytes)
            .map_err(|err| VectorStoreError::corrupt(path, err.to_string()))?;
        Ok(Self { records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_text_chunker::Metadata;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(text: &str, embedding: Vec<f32>) -> ChunkRecord {
        let mut metadata = Metadata::new();
        metadata.insert("title".to_string(), json!("Policy"));
        metadata.insert("pages".to_string(), json!(12));
        metadata.insert("score".to_string(), json!(0.75));
        metadata.insert("draft".to_string(), json!(false));
        metadata.insert("author".to_string(), json!(null));
        metadata.insert("tags".to_string(), json!(["health", {"tier": 2}]));
        ChunkRecord {
            text: text.to_string(),
            metadata,
            embedding,
        }
    }

    #[test]
    fn test_append_and_get() {
        let mut store = MetadataStore::new();
        store.append(record("first", vec![0.1, 0.2]));
        store.append(record("second", vec![0.3, 0.4]));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).map(|r| r.text.as_str()), Some("second"));
        assert!(store.get(2).is_none());
        assert!(matches!(store.try_get(7), Err(VectorStoreError::NotFound(7))));
    }

    #[tokio::test]
    async fn test_json_round_trip_preserves_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metadata.json");

        let mut store = MetadataStore::new();
        store.append(record("first", vec![0.1, -1.0e-7, 123.456, f32::MAX]));
        store.append(record("second", vec![1.0 / 3.0, 0.0, -0.5, 7.0]));
        store.save(&path).await.unwrap();

        let loaded = MetadataStore::load(&path).await.unwrap();
        assert_eq!(loaded, store);
        for (a, b) in store.iter().zip(loaded.iter()) {
            for (x, y) in a.embedding.iter().zip(&b.embedding) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }

    #[tokio::test]
    async fn test_file_is_an_ordered_json_array() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metadata.json");

        let mut store = MetadataStore::new();
        store.append(record("a", vec![1.0]));
        store.append(record("b", vec![2.0]));
        store.save(&path).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let items = raw.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["text"], json!("a"));
        assert_eq!(items[1]["embedding"], json!([2.0]));
    }

    #[tokio::test]
    async fn test_malformed_json_is_corrupt_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metadata.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = MetadataStore::load(&path).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::CorruptStore { .. }));
    }
}
