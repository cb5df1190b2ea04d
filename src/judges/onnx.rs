// Local ONNX sentence encoder behind the embedding judge.
//
// Model: sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2 (ONNX export).
// Multilingual matters here: most input is Japanese. Output is the mean-pooled
// last hidden state, one 384-dim vector per text.
//
// The session and tokenizer sit behind Arc so inference can move onto
// spawn_blocking without blocking the async runtime.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::debug;

use super::traits::TextEncoder;

/// Hidden size of paraphrase-multilingual-MiniLM-L12-v2.
pub const EMBEDDING_DIM: usize = 384;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct SentenceEncoder {
    // ort::Session::run takes &mut self, hence the Mutex
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    pad_id: i64,
}

impl SentenceEncoder {
    /// Load the encoder from a directory holding `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILE);
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);

        if !model_path.exists() {
            anyhow::bail!(
                "Embedding model not found: {}\nRun `tonecheck download-model` to download it.",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Embedding tokenizer not found: {}\nRun `tonecheck download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!("Failed to load embedding model from {}", model_path.display())
            })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;

        // XLM-R vocab pads with <pad> = 1; fall back to BERT's 0
        let pad_id = tokenizer.token_to_id("<pad>").unwrap_or(0) as i64;

        debug!(pad_id, "Loaded sentence encoder from {}", model_dir.display());

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            pad_id,
        })
    }
}

#[async_trait]
impl TextEncoder for SentenceEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let pad_id = self.pad_id;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || encode_sync(&session, &tokenizer, pad_id, &texts))
            .await
            .context("spawn_blocking panicked")?
    }
}

/// Tokenize, run the model, and mean-pool. Runs on a blocking thread.
fn encode_sync(
    session: &Mutex<Session>,
    tokenizer: &Tokenizer,
    pad_id: i64,
    texts: &[String],
) -> Result<Vec<Vec<f64>>> {
    let encodings = texts
        .iter()
        .map(|t| {
            tokenizer
                .encode(t.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;

    let batch_size = encodings.len();
    let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
    if max_len == 0 {
        return Ok(vec![vec![0.0; EMBEDDING_DIM]; batch_size]);
    }

    // Right-pad every row to max_len. Shape: [batch_size, max_len]
    let mut input_ids = Vec::with_capacity(batch_size * max_len);
    let mut attention_mask = Vec::with_capacity(batch_size * max_len);
    for enc in &encodings {
        let pad_len = max_len - enc.get_ids().len();
        input_ids.extend(enc.get_ids().iter().map(|&id| id as i64));
        input_ids.extend(std::iter::repeat_n(pad_id, pad_len));
        attention_mask.extend(enc.get_attention_mask().iter().map(|&m| m as i64));
        attention_mask.extend(std::iter::repeat_n(0i64, pad_len));
    }
    let token_type_ids = vec![0i64; batch_size * max_len];

    let shape = [batch_size as i64, max_len as i64];
    let input_ids_tensor =
        Tensor::from_array((shape, input_ids)).context("Failed to create input_ids tensor")?;
    let attention_mask_tensor = Tensor::from_array((shape, attention_mask.clone()))
        .context("Failed to create attention_mask tensor")?;
    let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
        .context("Failed to create token_type_ids tensor")?;

    // last_hidden_state: [batch, max_len, EMBEDDING_DIM]
    let hidden = {
        let mut session = session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;
        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor
            })
            .context("Embedding inference failed")?;
        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract embedding output tensor")?;
        data.to_vec()
    };

    let expected = batch_size * max_len * EMBEDDING_DIM;
    if hidden.len() != expected {
        anyhow::bail!(
            "Unexpected embedding output size {} (expected {})",
            hidden.len(),
            expected
        );
    }

    Ok((0..batch_size)
        .map(|row| mean_pool(&hidden, &attention_mask, row, max_len))
        .collect())
}

/// Average the token vectors of one row, counting only unmasked tokens.
fn mean_pool(hidden: &[f32], mask: &[i64], row: usize, max_len: usize) -> Vec<f64> {
    let mut sum = vec![0.0_f64; EMBEDDING_DIM];
    let mut tokens = 0.0_f64;

    for pos in 0..max_len {
        if mask[row * max_len + pos] == 0 {
            continue;
        }
        tokens += 1.0;
        let offset = (row * max_len + pos) * EMBEDDING_DIM;
        for (acc, &value) in sum.iter_mut().zip(&hidden[offset..offset + EMBEDDING_DIM]) {
            *acc += value as f64;
        }
    }

    if tokens > 0.0 {
        for value in &mut sum {
            *value /= tokens;
        }
    }
    sum
}

/// Cosine similarity clamped to [0, 1].
///
/// Mismatched dimensions, empty input, and zero vectors all yield 0.0, so a
/// degenerate embedding can never look similar to anything.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    let denom = norm_a * norm_b;
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(0.0, 1.0)
    }
}
