use crate::config::EngineConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, VectorStoreError};
use crate::flat_index::{validate_vector, FlatIndex};
use crate::metadata_store::MetadataStore;
use crate::paths::StoreLayout;
use crate::types::{distance_to_score, ChunkRecord, SearchResult, StoreStats};
use docrag_text_chunker::{Chunker, Metadata};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DOCUMENT_ID_KEY: &str = "document_id";

/// Index and metadata guarded together so positions stay aligned.
#[derive(Debug)]
struct StoreState {
    index: FlatIndex,
    metadata: MetadataStore,
}

impl StoreState {
    fn empty(dimension: usize) -> Self {
        Self {
            index: FlatIndex::new(dimension),
            metadata: MetadataStore::new(),
        }
    }
}

/// Ingests documents and answers similarity queries over their chunks.
///
/// Mutations take the write lock across both the index append and the metadata append;
/// searches take the read lock across index search and metadata lookup. Embedding calls run
/// outside the lock.
pub struct RetrievalEngine {
    layout: StoreLayout,
    dimension: usize,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    state: RwLock<StoreState>,
}

impl RetrievalEngine {
    /// Create an empty engine. The provider's dimension must match `config.dimension`.
    pub fn new(config: &EngineConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        if embedder.dimension() != config.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: config.dimension,
                actual: embedder.dimension(),
            });
        }

        log::info!(
            "Initializing RetrievalEngine at {:?} (model '{}', dim {})",
            config.persist_dir,
            embedder.model_id(),
            config.dimension
        );

        Ok(Self {
            layout: StoreLayout::new(&config.persist_dir),
            dimension: config.dimension,
            chunker: Chunker::new(config.chunker)?,
            embedder,
            state: RwLock::new(StoreState::empty(config.dimension)),
        })
    }

    /// Create an engine and load the persisted store from `config.persist_dir` if present.
    ///
    /// A directory holding only one of the two store files is reported as corrupt.
    pub async fn open(config: &EngineConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let engine = Self::new(config, embedder)?;
        let index_path = engine.layout.index_path();
        let metadata_path = engine.layout.metadata_path();
        match (index_path.is_file(), metadata_path.is_file()) {
            (true, true) => engine.load(None).await?,
            (false, false) => log::info!(
                "No persisted store in {}; starting empty",
                engine.layout.dir().display()
            ),
            (true, false) => {
                return Err(VectorStoreError::corrupt(
                    &metadata_path,
                    format!("missing, but {} exists", index_path.display()),
                ))
            }
            (false, true) => {
                return Err(VectorStoreError::corrupt(
                    &index_path,
                    format!("missing, but {} exists", metadata_path.display()),
                ))
            }
        }
        Ok(engine)
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn persist_dir(&self) -> &Path {
        self.layout.dir()
    }

    #[must_use]
    pub const fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Clean, chunk, embed and store a document.
    ///
    /// All chunks are added or none: a provider failure or a malformed embedding leaves the
    /// store untouched. Returns the stored records.
    pub async fn add_document(&self, text: &str, metadata: Metadata) -> Result<Vec<ChunkRecord>> {
        let (_, chunks) = self.chunker.chunk_document(text, &metadata);
        if chunks.is_empty() {
            log::debug!("Document produced no chunks; nothing to add");
            return Ok(Vec::new());
        }
        log::debug!("Chunked document: {}", Chunker::get_stats(&chunks));

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.encode(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }
        for vector in &vectors {
            validate_vector(vector, self.dimension)?;
        }

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| ChunkRecord::from_chunk(chunk, vector))
            .collect();

        let total = {
            let mut state = self.state.write().await;
            let embeddings: Vec<Vec<f32>> =
                records.iter().map(|record| record.embedding.clone()).collect();
            state.index.add(&embeddings)?;
            state.metadata.extend(records.iter().cloned());
            state.metadata.len()
        };

        log::info!("Added {} chunks. Total: {}", records.len(), total);
        Ok(records)
    }

    /// Up to `k` chunks nearest to `query` with `score >= threshold`, best first.
    ///
    /// `score = 1 / (1 + squared L2 distance)`. Equal scores keep index order. Positions with
    /// no metadata record are skipped.
    pub async fn search(&self, query: &str, k: usize, threshold: f32) -> Result<Vec<SearchResult>> {
        log::debug!("Searching for: '{query}' (k: {k}, threshold: {threshold})");
        if k == 0 || self.size().await == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.encode_one(query).await?;
        validate_vector(&query_vector, self.dimension)?;

        let state = self.state.read().await;
        let neighbors = state.index.search(&query_vector, k)?;
        let candidates = neighbors.len();

        let mut results = Vec::with_capacity(candidates);
        for neighbor in neighbors {
            let Some(record) = state.metadata.get(neighbor.position) else {
                log::warn!(
                    "Skipping index position {} with no metadata record",
                    neighbor.position
                );
                continue;
            };
            let score = distance_to_score(neighbor.distance);
            if score >= threshold {
                results.push(SearchResult {
                    text: record.text.clone(),
                    metadata: record.metadata.clone(),
                    score,
                });
            }
        }
        drop(state);

        results.sort_by(|a, b| b.score.total_cmp(&a.score));

        log::debug!(
            "Found {} results ({} candidates)",
            results.len(),
            candidates
        );
        Ok(results)
    }

    /// Persist index and metadata to `path` (default: the configured directory).
    pub async fn save(&self, path: Option<&Path>) -> Result<()> {
        let layout = path.map_or_else(|| self.layout.clone(), StoreLayout::new);
        log::info!("Saving store to {}", layout.dir().display());
        layout.create_dir().await?;

        let state = self.state.read().await;
        state.index.save(&layout.index_path()).await?;
        state.metadata.save(&layout.metadata_path()).await?;

        log::info!("Saved {} chunks", state.metadata.len());
        Ok(())
    }

    /// Replace the in-memory store with the one persisted at `path` (default: the configured
    /// directory). The current state is kept if the files are missing or inconsistent.
    pub async fn load(&self, path: Option<&Path>) -> Result<()> {
        let layout = path.map_or_else(|| self.layout.clone(), StoreLayout::new);
        log::info!("Loading store from {}", layout.dir().display());

        let index = FlatIndex::load(&layout.index_path()).await?;
        if index.dimension() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: index.dimension(),
            });
        }

        let metadata_path = layout.metadata_path();
        let metadata = MetadataStore::load(&metadata_path).await?;
        if metadata.len() != index.len() {
            return Err(VectorStoreError::corrupt(
                &metadata_path,
                format!(
                    "{} records but the index holds {} vectors",
                    metadata.len(),
                    index.len()
                ),
            ));
        }
        if let Some((position, record)) = metadata
            .iter()
            .enumerate()
            .find(|(_, record)| record.embedding.len() != self.dimension)
        {
            return Err(VectorStoreError::corrupt(
                &metadata_path,
                format!(
                    "record {position} has a {}-dimensional embedding, expected {}",
                    record.embedding.len(),
                    self.dimension
                ),
            ));
        }

        let count = metadata.len();
        *self.state.write().await = StoreState { index, metadata };
        log::info!("Loaded {count} chunks");
        Ok(())
    }

    /// Drop every chunk. The dimension is unchanged.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.index.clear();
        state.metadata.clear();
        log::info!("Cleared store");
    }

    /// Number of stored chunks
    pub async fn size(&self) -> usize {
        self.state.read().await.metadata.len()
    }

    /// Verify that index and metadata hold the same number of entries.
    pub async fn check_invariants(&self) -> Result<()> {
        let state = self.state.read().await;
        if state.index.len() != state.metadata.len() {
            return Err(VectorStoreError::InvalidInput(format!(
                "index holds {} vectors but metadata holds {} records",
                state.index.len(),
                state.metadata.len()
            )));
        }
        Ok(())
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        let documents: HashSet<String> = state
            .metadata
            .iter()
            .filter_map(|record| record.metadata.get(DOCUMENT_ID_KEY))
            .map(ToString::to_string)
            .collect();
        StoreStats {
            chunks: state.metadata.len(),
            documents: documents.len(),
            dimension: self.dimension,
        }
    }
}
