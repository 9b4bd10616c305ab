//! # Docrag Text Chunker
//!
//! Normalisation and overlapping, sentence-aware chunking of free-text documents.
//!
//! ## Pipeline
//!
//! ```text
//! Raw text
//!     │
//!     ├──> clean_text
//!     │    ├─> Collapse whitespace runs
//!     │    ├─> Drop non-ASCII characters
//!     │    └─> Replace disallowed symbols, trim
//!     │
//!     └──> Chunker::chunk_text
//!          ├─> Fixed-size window (chunk_size characters)
//!          ├─> Snap to the last sentence end in the second half of the window
//!          ├─> Attach chunk_start / chunk_end / chunk_id metadata
//!          └─> Advance by chunk_size - overlap
//! ```
//!
//! ## Example
//!
//! ```rust
//! use docrag_text_chunker::{clean_text, Chunker, ChunkerConfig, Metadata};
//!
//! let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
//! let text = clean_text("Sentence one.   Sentence two.\n\nSentence three.");
//!
//! let chunks = chunker.chunk_text(&text, &Metadata::new());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_id, 0);
//! ```

mod chunker;
mod clean;
mod config;
mod error;
mod types;

pub use chunker::{Chunker, ChunkingStats};
pub use clean::clean_text;
pub use config::ChunkerConfig;
pub use error::{ChunkerError, Result};
pub use types::{Metadata, TextChunk, CHUNK_END_KEY, CHUNK_ID_KEY, CHUNK_START_KEY};
