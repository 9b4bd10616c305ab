use crate::embeddings::{normalize, EmbeddingProvider, ModelSpec};
use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use ndarray::{Array2, ArrayView3, Ix3};
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputs};
use ort::value::{DynTensor, Tensor};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tokio::task::spawn_blocking;

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";

fn onnx_error(context: &str, err: impl std::fmt::Display) -> VectorStoreError {
    VectorStoreError::EmbeddingError(format!("{context}: {err}"))
}

/// Sentence-transformer embeddings through ONNX Runtime (CPU).
///
/// Expects `<model_dir>/<model_id>/model.onnx` and `tokenizer.json`. The model's
/// `last_hidden_state` is mean-pooled over the attention mask and L2-normalised.
pub struct OnnxEmbedder {
    model_id: String,
    dimension: usize,
    model: Arc<SentenceModel>,
}

struct SentenceModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    max_batch: usize,
    dimension: usize,
}

/// Token-level model inputs for one batch, padded to the longest encoding
struct TokenBatch {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
    token_type_ids: Array2<i64>,
}

impl OnnxEmbedder {
    pub fn load(spec: &ModelSpec, model_dir: &Path) -> Result<Self> {
        let model = SentenceModel::open(spec, &model_dir.join(&spec.id))?;
        Ok(Self {
            model_id: spec.id.clone(),
            dimension: spec.dimension,
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let texts = texts.to_vec();
        let model = Arc::clone(&self.model);
        spawn_blocking(move || model.embed(&texts))
            .await
            .map_err(|e| onnx_error("Embedding task failed", e))?
    }
}

impl SentenceModel {
    fn open(spec: &ModelSpec, dir: &Path) -> Result<Self> {
        let model_path = dir.join(MODEL_FILE);
        let tokenizer_path = dir.join(TOKENIZER_FILE);
        for required in [&model_path, &tokenizer_path] {
            if !required.is_file() {
                return Err(VectorStoreError::EmbeddingError(format!(
                    "Model '{}' is missing {} (set DOCRAG_MODEL_DIR to point at the model directory)",
                    spec.id,
                    required.display()
                )));
            }
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| onnx_error("Tokenizer load failed", e))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..PaddingParams::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: spec.max_length,
                ..TruncationParams::default()
            }))
            .map_err(|e| onnx_error("Tokenizer truncation setup failed", e))?;

        let threads = std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(1);
        let session = Session::builder()
            .map_err(|e| onnx_error("Session builder failed", e))?
            .with_intra_threads(threads)
            .map_err(|e| onnx_error("Failed to set intra-op threads", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| onnx_error("Failed to set optimization level", e))?
            .commit_from_file(&model_path)
            .map_err(|e| onnx_error("Failed to load ONNX model", e))?;

        log::info!(
            "Loaded ONNX model '{}' from {} (dim {}, {} threads)",
            spec.id,
            dir.display(),
            spec.dimension,
            threads
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            max_batch: spec.max_batch.max(1),
            dimension: spec.dimension,
        })
    }

    /// Blocking; call from `spawn_blocking`.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for slice in texts.chunks(self.max_batch) {
            let encodings = self
                .tokenizer
                .encode_batch(slice.to_vec(), true)
                .map_err(|e| onnx_error("Tokenization failed", e))?;
            let batch = TokenBatch::from_encodings(&encodings);
            let hidden = self.run(&batch)?;
            vectors.extend(pool_and_normalize(
                hidden.view(),
                &batch.attention_mask,
                self.dimension,
            )?);
        }
        Ok(vectors)
    }

    /// Runs one forward pass and returns `last_hidden_state` as `[batch, tokens, hidden]`.
    fn run(&self, batch: &TokenBatch) -> Result<ndarray::Array3<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| VectorStoreError::EmbeddingError("ONNX session lock poisoned".into()))?;

        let mut feed: HashMap<String, DynTensor> = HashMap::new();
        for input in &session.inputs {
            let tensor = to_tensor(batch.input(&input.name)?)?;
            feed.insert(input.name.clone(), tensor);
        }

        let outputs = session
            .run(SessionInputs::from(feed))
            .map_err(|e| onnx_error("ONNX forward pass failed", e))?;
        if outputs.len() == 0 {
            return Err(VectorStoreError::EmbeddingError(
                "ONNX model produced no outputs".into(),
            ));
        }
        let hidden = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| onnx_error("Failed to read model output", e))?
            .to_owned()
            .into_dimensionality::<Ix3>()
            .map_err(|e| onnx_error("Expected [batch, tokens, hidden] output", e))?;

        drop(outputs);
        drop(session);
        Ok(hidden)
    }
}

impl TokenBatch {
    fn from_encodings(encodings: &[Encoding]) -> Self {
        let rows = encodings.len();
        let cols = encodings.iter().map(Encoding::len).max().unwrap_or(0);
        let field = |values: fn(&Encoding) -> &[u32]| {
            Array2::from_shape_fn((rows, cols), |(row, col)| {
                values(&encodings[row])
                    .get(col)
                    .map_or(0, |&value| i64::from(value))
            })
        };
        Self {
            input_ids: field(Encoding::get_ids),
            attention_mask: field(Encoding::get_attention_mask),
            token_type_ids: field(Encoding::get_type_ids),
        }
    }

    fn input(&self, name: &str) -> Result<&Array2<i64>> {
        match name {
            "input_ids" => Ok(&self.input_ids),
            "attention_mask" => Ok(&self.attention_mask),
            "token_type_ids" => Ok(&self.token_type_ids),
            other => Err(VectorStoreError::EmbeddingError(format!(
                "Model expects unsupported input '{other}'"
            ))),
        }
    }
}

fn to_tensor(array: &Array2<i64>) -> Result<DynTensor> {
    Tensor::from_array(array.clone().into_dyn())
        .map(|tensor| tensor.upcast())
        .map_err(|e| onnx_error("Failed to build input tensor", e))
}

/// Attention-masked mean over tokens, then L2 normalisation, one vector per batch row.
fn pool_and_normalize(
    hidden: ArrayView3<'_, f32>,
    attention_mask: &Array2<i64>,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let (rows, tokens, width) = hidden.dim();
    if width != dimension {
        return Err(VectorStoreError::DimensionMismatch {
            expected: dimension,
            actual: width,
        });
    }
    if attention_mask.dim() != (rows, tokens) {
        return Err(VectorStoreError::EmbeddingError(format!(
            "Attention mask shape {:?} does not match output shape {:?}",
            attention_mask.dim(),
            hidden.dim()
        )));
    }

    let weights = attention_mask.mapv(|flag| flag as f32);
    let vectors = hidden
        .outer_iter()
        .zip(weights.outer_iter())
        .map(|(sample, weight)| {
            let kept = weight.sum().max(1.0);
            let mut pooled = (weight.dot(&sample) / kept).to_vec();
            normalize(&mut pooled);
            pooled
        })
        .collect();
    Ok(vectors)
}
