use anyhow::{anyhow, Result};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tokenizers::Tokenizer;

use tutorrag_core::traits::{CrossEncoder, Embedder};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{encodings_to_tensors, load_tokenizer, pad_id};

/// Sentence embedder over a BERT encoder (e.g. all-MiniLM-L6-v2) with mean pooling.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl BertEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading sentence embedder");
        let tokenizer = load_tokenizer(model_dir, max_len)?;
        let config = read_config(model_dir)?;
        let vb = load_weights(model_dir, &device)?;
        let model = BertModel::load(vb, &config)?;
        let pad_id = pad_id(&tokenizer);
        tracing::info!(dim = config.hidden_size, "sentence embedder loaded");
        Ok(Self { model, tokenizer, device, dim: config.hidden_size, max_len, pad_id })
    }
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(vec![]); }
        let start = Instant::now();
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self.tokenizer.encode_batch(inputs, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let batch = encodings_to_tensors(&encodings, self.max_len, self.pad_id, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        tracing::debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(vectors)
    }
}

/// BERT sequence classifier with a single relevance logit
/// (e.g. cross-encoder/ms-marco-MiniLM-L-6-v2). Scores are sigmoid probabilities.
pub struct BertCrossEncoder {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    pad_id: u32,
}

impl BertCrossEncoder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading cross-encoder");
        let tokenizer = load_tokenizer(model_dir, max_len)?;
        let config = read_config(model_dir)?;
        let vb = load_weights(model_dir, &device)?;
        let hidden = config.hidden_size;
        let bert = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))?;
        let classifier = candle_nn::linear(hidden, 1, vb.pp("classifier"))?;
        let pad_id = pad_id(&tokenizer);
        Ok(Self { bert, pooler, classifier, tokenizer, device, max_len, pad_id })
    }

    fn logits(&self, query: &str, texts: &[&str]) -> Result<Tensor> {
        let pairs: Vec<(&str, &str)> = texts.iter().map(|t| (query, *t)).collect();
        let encodings = self.tokenizer.encode_batch(pairs, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let batch = encodings_to_tensors(&encodings, self.max_len, self.pad_id, &self.device)?;
        let hidden = self.bert.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        Ok(self.classifier.forward(&pooled)?.squeeze(1)?)
    }
}

impl CrossEncoder for BertCrossEncoder {
    fn score_pairs(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        if texts.is_empty() { return Ok(vec![]); }
        relevance(&self.logits(query, texts)?)
    }
}

/// Single-logit relevance mapped through a sigmoid onto `[0, 1]`.
pub(crate) fn relevance(logits: &Tensor) -> Result<Vec<f32>> {
    let probs = candle_nn::ops::sigmoid(&logits.to_dtype(DType::F32)?)?;
    Ok(probs.to_device(&Device::Cpu)?.to_vec1()?)
}

fn read_config(model_dir: &Path) -> Result<BertConfig> {
    let config_path = model_dir.join("config.json");
    let raw = std::fs::read_to_string(&config_path)
        .map_err(|e| anyhow!("Failed to read {}: {}", config_path.display(), e))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Prefers `model.safetensors`, falls back to `pytorch_model.bin`.
fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let weights: HashMap<String, Tensor> = if safetensors.exists() {
        candle_core::safetensors::load(&safetensors, device)?
    } else {
        let pickle = model_dir.join("pytorch_model.bin");
        if !pickle.exists() {
            return Err(anyhow!("No model weights found in {}", model_dir.display()));
        }
        candle_core::pickle::read_all(&pickle)?.into_iter().collect()
    };
    Ok(VarBuilder::from_tensors(weights, DType::F32, device))
}
