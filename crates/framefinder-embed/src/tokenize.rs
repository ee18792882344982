use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Encode one prompt into a `[1, T]` id tensor, truncated to `max_len`.
/// The closing special token survives truncation so end-token pooling still works.
pub fn encode_on_device(tokenizer: &Tokenizer, text: &str, max_len: usize, device: &Device) -> Result<Tensor> {
    let enc = tokenizer.encode(text, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let mut ids = enc.get_ids().to_vec();
    if ids.len() > max_len && max_len > 0 {
        let last = ids[ids.len() - 1];
        ids.truncate(max_len - 1);
        ids.push(last);
    }
    if ids.is_empty() { return Err(anyhow!("Tokenization produced no ids for {:?}", text)); }
    let len = ids.len();
    Ok(Tensor::from_vec(ids, (1, len), device)?)
}
