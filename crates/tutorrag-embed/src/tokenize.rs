use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use std::path::Path;
use tokenizers::{Encoding, Tokenizer, TruncationParams};

/// Model inputs for one padded batch, each shaped `[B, T]`.
pub struct BatchInputs {
    pub input_ids: Tensor,
    pub token_type_ids: Tensor,
    pub attention_mask: Tensor,
}

pub fn load_tokenizer(model_dir: &Path, max_len: usize) -> Result<Tokenizer> {
    let tokenizer_path = model_dir.join("tokenizer.json");
    let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
    tokenizer
        .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
        .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
    Ok(tokenizer)
}

pub fn pad_id(tokenizer: &Tokenizer) -> u32 {
    tokenizer.get_padding().map(|p| p.pad_id).unwrap_or(0)
}

/// Pads every encoding to the longest one in the batch (capped at `max_len`).
pub fn encodings_to_tensors(encodings: &[Encoding], max_len: usize, pad_id: u32, device: &Device) -> Result<BatchInputs> {
    let batch = encodings.len();
    let seq_len = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);
    let mut ids = Vec::with_capacity(batch * seq_len);
    let mut type_ids = Vec::with_capacity(batch * seq_len);
    let mut mask = Vec::with_capacity(batch * seq_len);
    for enc in encodings {
        let n = enc.get_ids().len().min(max_len);
        let pad = seq_len - n;
        ids.extend_from_slice(&enc.get_ids()[..n]);
        ids.extend(std::iter::repeat(pad_id).take(pad));
        type_ids.extend_from_slice(&enc.get_type_ids()[..n]);
        type_ids.extend(std::iter::repeat(0).take(pad));
        mask.extend_from_slice(&enc.get_attention_mask()[..n]);
        mask.extend(std::iter::repeat(0).take(pad));
    }
    Ok(BatchInputs {
        input_ids: Tensor::from_vec(ids, (batch, seq_len), device)?,
        token_type_ids: Tensor::from_vec(type_ids, (batch, seq_len), device)?,
        attention_mask: Tensor::from_vec(mask, (batch, seq_len), device)?,
    })
}
