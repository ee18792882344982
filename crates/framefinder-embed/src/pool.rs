use anyhow::{Result, ensure};
use candle_core::{DType, Tensor};

/// L2-normalize pooled features row-wise. `features` is `[B, H]`.
pub fn l2_normalize(features: &Tensor) -> Result<Tensor> {
    ensure!(features.rank() == 2, "pooled features must be [B,H], got {:?}", features.dims());
    let eps_val = match features.dtype() { DType::F16 | DType::BF16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], features.device())?.to_dtype(features.dtype())?.unsqueeze(0)?;
    let norm = features.sqr()?.sum_keepdim(1)?.sqrt()?;
    let norm = norm.broadcast_add(&eps)?;
    Ok(features.broadcast_div(&norm)?)
}

/// In-place L2 normalization for host vectors. Zero vectors stay zero.
pub fn l2_normalize_vec(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 { for x in v.iter_mut() { *x /= norm; } }
}
