use docrag_text_chunker::{Metadata, TextChunk};
use serde::{Deserialize, Serialize};

/// A chunk together with its embedding, as stored in the metadata file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

impl ChunkRecord {
    #[must_use]
    pub fn from_chunk(chunk: TextChunk, embedding: Vec<f32>) -> Self {
        Self {
            text: chunk.text,
            metadata: chunk.metadata,
            embedding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Index hit: insertion position and squared Euclidean distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Map a squared L2 distance to a similarity in `(0, 1]`.
#[must_use]
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub chunks: usize,
    pub documents: usize,
    pub dimension: usize,
}
