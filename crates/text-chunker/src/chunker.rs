use crate::clean::clean_text;
use crate::config::ChunkerConfig;
use crate::error::Result;
use crate::types::{Metadata, TextChunk};

const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Splits cleaned text into overlapping, sentence-aware windows
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Clean raw text, then chunk it.
    ///
    /// Returns the cleaned text alongside the chunks; chunk offsets index into it.
    #[must_use]
    pub fn chunk_document(&self, raw: &str, metadata: &Metadata) -> (String, Vec<TextChunk>) {
        let cleaned = clean_text(raw);
        let chunks = self.chunk_text(&cleaned, metadata);
        (cleaned, chunks)
    }

    /// Split text into overlapping chunks.
    ///
    /// Offsets are character offsets. A window that does not reach the end of the text is
    /// cut just after its last `.`, `!` or `?` when that terminator lies past the middle of
    /// the window. Windows that are empty after trimming are dropped, and `chunk_id` counts
    /// accepted chunks only.
    #[must_use]
    pub fn chunk_text(&self, text: &str, metadata: &Metadata) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let text_length = chars.len();
        let chunk_size = self.config.chunk_size;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < text_length {
            let mut end = start.saturating_add(chunk_size).min(text_length);

            if end < text_length {
                if let Some(boundary) = last_sentence_end(&chars[start..end]) {
                    if boundary > self.config.min_snap_offset() {
                        end = start + boundary + 1;
                    }
                }
            }

            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                let chunk_id = chunks.len();
                chunks.push(TextChunk::new(
                    trimmed.to_string(),
                    start,
                    end,
                    chunk_id,
                    metadata,
                ));
            }

            let next = end.saturating_sub(self.config.overlap);
            start = if next > start { next } else { end };
        }

        log::debug!(
            "Chunked {} characters into {} chunks (size {}, overlap {})",
            text_length,
            chunks.len(),
            chunk_size,
            self.config.overlap
        );

        chunks
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Get statistics about chunking
    #[must_use]
    pub fn get_stats(chunks: &[TextChunk]) -> ChunkingStats {
        let total_chars: usize = chunks.iter().map(TextChunk::char_count).sum();
        ChunkingStats {
            total_chunks: chunks.len(),
            total_chars,
            avg_chars_per_chunk: if chunks.is_empty() {
                0
            } else {
                total_chars / chunks.len()
            },
            min_chars: chunks.iter().map(TextChunk::char_count).min().unwrap_or(0),
            max_chars: chunks.iter().map(TextChunk::char_count).max().unwrap_or(0),
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }
}

/// Offset of the last sentence terminator in the window, if any
fn last_sentence_end(window: &[char]) -> Option<usize> {
    window
        .iter()
        .rposition(|c| SENTENCE_TERMINATORS.contains(c))
}

/// Statistics about chunking results
#[derive(Debug, Clone)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_chars: usize,
    pub avg_chars_per_chunk: usize,
    pub min_chars: usize,
    pub max_chars: usize,
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Chars: {} | Avg: {} | Range: {}-{}",
            self.total_chunks,
            self.total_chars,
            self.avg_chars_per_chunk,
            self.min_chars,
            self.max_chars
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn small_chunker(chunk_size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig::new(chunk_size, overlap)).unwrap()
    }

    #[test]
    fn test_short_document_is_single_chunk() {
        let text = "Sentence one. Sentence two. Sentence three.";
        let mut metadata = Metadata::new();
        metadata.insert("title".to_string(), json!("T"));

        let chunks = Chunker::default().chunk_text(text, &metadata);

        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.text, text);
        assert_eq!(chunk.start, 0);
        assert_eq!(chunk.end, text.len());

        let mut expected = Metadata::new();
        expected.insert("title".to_string(), json!("T"));
        expected.insert("chunk_start".to_string(), json!(0));
        expected.insert("chunk_end".to_string(), json!(text.len()));
        expected.insert("chunk_id".to_string(), json!(0));
        assert_eq!(chunk.metadata, expected);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(Chunker::default().chunk_text("", &Metadata::new()).is_empty());
    }

    #[test]
    fn test_snaps_to_sentence_end_past_half_window() {
        // Terminator at offset 7 of a 10-char window (> 5): cut after it.
        let chunker = small_chunker(10, 0);
        let chunks = chunker.chunk_text("abcdefg. hijklmnop", &Metadata::new());

        assert_eq!(chunks[0].text, "abcdefg.");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 8));
        assert_eq!(chunks[1].start, 8);
    }

    #[test]
    fn test_ignores_sentence_end_in_first_half() {
        // Terminator at offset 2 (<= 5): keep the full window.
        let chunker = small_chunker(10, 0);
        let chunks = chunker.chunk_text("ab. cdefghijklmnop", &Metadata::new());

        assert_eq!((chunks[0].start, chunks[0].end), (0, 10));
        assert_eq!(chunks[0].text, "ab. cdefgh");
    }

    #[test]
    fn test_terminator_exactly_at_half_does_not_snap() {
        let chunker = small_chunker(10, 0);
        let chunks = chunker.chunk_text("abcde!ghijklmnop", &Metadata::new());
        assert_eq!(chunks[0].end, 10);
    }

    #[test]
    fn test_overlap_moves_start_back() {
        let chunker = small_chunker(10, 3);
        let chunks = chunker.chunk_text("abcdefghijklmnopqrst", &Metadata::new());

        let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(spans, vec![(0, 10), (7, 17), (14, 20), (17, 20)]);
    }

    #[test]
    fn test_overlap_not_smaller_than_window_still_terminates() {
        let chunker = small_chunker(5, 50);
        let chunks = chunker.chunk_text("abcdefghijkl", &Metadata::new());

        let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(spans, vec![(0, 5), (5, 10), (10, 12)]);
    }

    #[test]
    fn test_whitespace_windows_are_dropped_and_ids_stay_dense() {
        let chunker = small_chunker(3, 0);
        let chunks = chunker.chunk_text("abc   def", &Metadata::new());

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abc", "def"]);
        assert_eq!(chunks[1].chunk_id, 1);
        assert_eq!(chunks[1].metadata["chunk_id"], json!(1));
        assert_eq!(chunks[1].start, 6);
    }

    #[test]
    fn test_offsets_are_character_based() {
        let chunker = small_chunker(4, 0);
        let chunks = chunker.chunk_text("éééééé", &Metadata::new());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "éééé");
        assert_eq!((chunks[1].start, chunks[1].end), (4, 6));
    }

    #[test]
    fn test_chunk_document_cleans_first() {
        let (cleaned, chunks) =
            Chunker::default().chunk_document("  Hello,\n\n world!  ", &Metadata::new());

        assert_eq!(cleaned, "Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end, cleaned.len());
    }

    #[test]
    fn test_chunking_stats() {
        let chunker = small_chunker(10, 0);
        let chunks = chunker.chunk_text("abcdefghijklmno", &Metadata::new());
        let stats = Chunker::get_stats(&chunks);

        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.total_chars, 15);
        assert_eq!(stats.avg_chars_per_chunk, 7);
        assert_eq!(stats.min_chars, 5);
        assert_eq!(stats.max_chars, 10);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Chunker::new(ChunkerConfig::new(0, 0)).is_err());
    }
}
