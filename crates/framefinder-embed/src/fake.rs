use anyhow::Result;
use image::RgbImage;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use framefinder_core::{CaptionSettings, Engine};

use crate::pool::l2_normalize_vec;

const PALETTE: &[(&str, [f32; 3])] = &[
    ("red", [200.0, 30.0, 30.0]),
    ("green", [30.0, 170.0, 40.0]),
    ("blue", [30.0, 50.0, 200.0]),
    ("yellow", [230.0, 220.0, 40.0]),
    ("orange", [240.0, 140.0, 20.0]),
    ("purple", [130.0, 40.0, 160.0]),
    ("white", [245.0, 245.0, 245.0]),
    ("black", [10.0, 10.0, 10.0]),
    ("gray", [128.0, 128.0, 128.0]),
];

/// Deterministic stand-in for the real models.
///
/// Captions name the image's dominant colour; text embeddings hash word
/// tokens into buckets; image embeddings are the embedding of the caption,
/// so both live in one space. Selected with `APP_USE_FAKE_ENGINE=1`.
pub struct FakeEngine { dim: usize }

impl FakeEngine {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn describe(image: &RgbImage) -> String {
        let n = (u64::from(image.width()) * u64::from(image.height())).max(1) as f32;
        let mut sum = [0f32; 3];
        for p in image.pixels() { for c in 0..3 { sum[c] += f32::from(p.0[c]); } }
        let mean = sum.map(|s| s / n);
        let name = PALETTE
            .iter()
            .min_by(|a, b| dist(&a.1, &mean).partial_cmp(&dist(&b.1, &mean)).unwrap_or(std::cmp::Ordering::Equal))
            .map_or("plain", |(name, _)| *name);
        format!("a {name} image")
    }
}

fn dist(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl Engine for FakeEngine {
    fn dim(&self) -> usize { self.dim }

    fn caption(&self, image: &RgbImage, _settings: &CaptionSettings) -> Result<String> {
        Ok(Self::describe(image))
    }

    fn embed_image(&self, image: &RgbImage) -> Result<Vec<f32>> {
        self.embed_text(&Self::describe(image))
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.to_lowercase().split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        if v.iter().all(|x| *x == 0.0) { v[0] = 1.0; }
        l2_normalize_vec(&mut v);
        Ok(v)
    }
}
