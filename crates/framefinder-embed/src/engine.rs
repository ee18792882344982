use anyhow::Result;
use candle_core::Device;
use image::RgbImage;
use std::time::Instant;
use tracing::info;

use framefinder_core::config::ModelsConfig;
use framefinder_core::{CaptionSettings, Engine};

use crate::blip::BlipCaptioner;
use crate::clip::ClipRetriever;
use crate::hub::load_pretrained;

const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// BLIP captions plus CLIP embeddings, both resident on one device.
pub struct CandleEngine {
    captioner: BlipCaptioner,
    retriever: ClipRetriever,
}

impl CandleEngine {
    pub fn load(models: &ModelsConfig, device: &Device) -> Result<Self> {
        let start = Instant::now();
        let cache = models.cache_path();
        info!(repo = %models.caption_repo, "Loading caption model");
        let caption_files = load_pretrained(&models.caption_repo, &models.caption_revision, cache.as_deref(), models.offline, &[TOKENIZER_FILE, WEIGHTS_FILE])?;
        let captioner = BlipCaptioner::load(&caption_files[0], &caption_files[1], device)?;
        info!(repo = %models.retrieval_repo, "Loading retrieval model");
        let retrieval_files = load_pretrained(&models.retrieval_repo, &models.retrieval_revision, cache.as_deref(), models.offline, &[TOKENIZER_FILE, WEIGHTS_FILE])?;
        let retriever = ClipRetriever::load(&retrieval_files[0], &retrieval_files[1], device)?;
        info!(elapsed_ms = start.elapsed().as_millis() as u64, dim = retriever.dim(), "Engines ready");
        Ok(Self { captioner, retriever })
    }
}

impl Engine for CandleEngine {
    fn dim(&self) -> usize { self.retriever.dim() }
    fn caption(&self, image: &RgbImage, settings: &CaptionSettings) -> Result<String> { self.captioner.caption(image, settings) }
    fn embed_image(&self, image: &RgbImage) -> Result<Vec<f32>> { self.retriever.embed_image(image) }
    fn embed_text(&self, text: &str) -> Result<Vec<f32>> { self.retriever.embed_text(text) }
}

/// Download tokenizer and weights for both models into the cache without building them.
pub fn prefetch(models: &ModelsConfig) -> Result<()> {
    let cache = models.cache_path();
    for (repo, revision) in [
        (&models.caption_repo, &models.caption_revision),
        (&models.retrieval_repo, &models.retrieval_revision),
    ] {
        let files = load_pretrained(repo, revision, cache.as_deref(), false, &[TOKENIZER_FILE, WEIGHTS_FILE])?;
        for f in files { info!(repo = %repo, path = %f.display(), "cached"); }
    }
    Ok(())
}
