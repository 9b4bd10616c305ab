//! # Docrag Vector Store
//!
//! Exact similarity search over embedded document chunks.
//!
//! ## Features
//!
//! - **Exact k-NN search** over a flat index (squared Euclidean distance)
//! - **Pluggable embeddings** via [`EmbeddingProvider`] (ONNX Runtime or deterministic stub)
//! - **Position-aligned metadata** stored next to every vector
//! - **Atomic persistence** to a binary index file plus a JSON metadata file
//!
//! ## Architecture
//!
//! ```text
//! raw text + metadata
//!     │
//!     ├──> Chunker (docrag-text-chunker)
//!     │      └─> TextChunk[]
//!     │
//!     ├──> EmbeddingProvider
//!     │      └─> Vector[dimension]
//!     │
//!     ├──> FlatIndex ────────┐  position i
//!     │                      │
//!     └──> MetadataStore ────┘  record i
//!            │
//!            └─> index.flat + metadata.json
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use docrag_vector_store::{EngineConfig, Metadata, RetrievalEngine, StubEmbedder};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::default();
//!     let embedder = Arc::new(StubEmbedder::new("all-minilm-l6-v2", config.dimension));
//!     let engine = RetrievalEngine::open(&config, embedder).await?;
//!
//!     engine
//!         .add_document("Rust guarantees memory safety.", Metadata::new())
//!         .await?;
//!
//!     for result in engine.search("memory safety", 5, 0.0).await? {
//!         println!("{:.3} {}", result.score, result.text);
//!     }
//!
//!     engine.save(None).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod embeddings;
mod engine;
mod error;
mod flat_index;
mod metadata_store;
#[cfg(feature = "onnx")]
mod onnx;
mod paths;
mod types;

pub use config::{
    EmbeddingConfig, EngineConfig, SearchDefaults, ENV_EMBEDDING_MODE, ENV_EMBEDDING_MODEL,
    ENV_MODEL_DIR, ENV_STORE_DIR,
};
pub use embeddings::{
    build_provider, default_model_dir, EmbeddingMode, EmbeddingProvider, ModelSpec, StubEmbedder,
};
pub use engine::{RetrievalEngine, DOCUMENT_ID_KEY};
pub use error::{Result, VectorStoreError};
pub use flat_index::{squared_l2, validate_vector, FlatIndex};
pub use metadata_store::MetadataStore;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;
pub use paths::{StoreLayout, DEFAULT_PERSIST_DIR, INDEX_FILE_NAME, METADATA_FILE_NAME};
pub use types::{distance_to_score, ChunkRecord, Neighbor, SearchResult, StoreStats};

// Re-export chunker types for convenience
pub use docrag_text_chunker::{ChunkerConfig, Metadata, TextChunk};
