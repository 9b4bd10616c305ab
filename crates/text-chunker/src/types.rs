use serde::{Deserialize, Serialize};
use serde_json::Value;

/// String-keyed metadata whose values are JSON values (string, number, bool, null,
/// nested object or array).
pub type Metadata = serde_json::Map<String, Value>;

pub const CHUNK_START_KEY: &str = "chunk_start";
pub const CHUNK_END_KEY: &str = "chunk_end";
pub const CHUNK_ID_KEY: &str = "chunk_id";

/// A slice of a document's cleaned text, before embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextChunk {
    /// Trimmed window content
    pub text: String,

    /// Window start (character offset into the cleaned text, inclusive)
    pub start: usize,

    /// Window end (character offset into the cleaned text, exclusive)
    pub end: usize,

    /// Index among the accepted chunks of the document
    pub chunk_id: usize,

    /// Document metadata plus `chunk_start`, `chunk_end` and `chunk_id`
    pub metadata: Metadata,
}

impl TextChunk {
    /// Build a chunk, copying the document metadata and stamping the positional keys.
    #[must_use]
    pub fn new(text: String, start: usize, end: usize, chunk_id: usize, base: &Metadata) -> Self {
        let mut metadata = base.clone();
        metadata.insert(CHUNK_START_KEY.to_string(), Value::from(start));
        metadata.insert(CHUNK_END_KEY.to_string(), Value::from(end));
        metadata.insert(CHUNK_ID_KEY.to_string(), Value::from(chunk_id));
        Self {
            text,
            start,
            end,
            chunk_id,
            metadata,
        }
    }

    /// Width of the (untrimmed) window in characters
    #[must_use]
    pub const fn span_len(&self) -> usize {
        self.end - self.start
    }

    /// Number of characters in the trimmed text
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positional_keys_added_to_copy() {
        let mut base = Metadata::new();
        base.insert("title".to_string(), json!("T"));

        let chunk = TextChunk::new("abc".to_string(), 3, 9, 1, &base);

        assert_eq!(base.len(), 1);
        assert_eq!(chunk.metadata["title"], json!("T"));
        assert_eq!(chunk.metadata[CHUNK_START_KEY], json!(3));
        assert_eq!(chunk.metadata[CHUNK_END_KEY], json!(9));
        assert_eq!(chunk.metadata[CHUNK_ID_KEY], json!(1));
        assert_eq!(chunk.span_len(), 6);
    }

    #[test]
    fn test_positional_keys_override_document_keys() {
        let mut base = Metadata::new();
        base.insert(CHUNK_ID_KEY.to_string(), json!("stale"));

        let chunk = TextChunk::new("abc".to_string(), 0, 3, 0, &base);
        assert_eq!(chunk.metadata[CHUNK_ID_KEY], json!(0));
    }
}
