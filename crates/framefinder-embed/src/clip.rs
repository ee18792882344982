use anyhow::{Result, anyhow};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::clip;
use image::RgbImage;
use std::path::Path;
use tokenizers::Tokenizer;

use crate::pool::l2_normalize;
use crate::preprocess::clip_pixels;
use crate::tokenize::encode_on_device;

const CLIP_MAX_TOKENS: usize = 77;

/// Projects images and text into CLIP's shared embedding space.
pub struct ClipRetriever {
    model: clip::ClipModel,
    tokenizer: Tokenizer,
    device: Device,
    image_size: usize,
    dim: usize,
}

impl ClipRetriever {
    pub fn load(tokenizer_path: &Path, weights_path: &Path, device: &Device) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config = clip::ClipConfig::vit_base_patch32();
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };
        let model = clip::ClipModel::new(vb, &config)?;
        Ok(Self {
            model,
            tokenizer,
            device: device.clone(),
            image_size: config.image_size,
            dim: config.text_config.projection_dim,
        })
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn embed_image(&self, image: &RgbImage) -> Result<Vec<f32>> {
        let pixels = clip_pixels(image, self.image_size, &self.device)?;
        let features = self.model.get_image_features(&pixels)?;
        self.finish(&features)
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let ids = encode_on_device(&self.tokenizer, text, CLIP_MAX_TOKENS, &self.device)?;
        let features = self.model.get_text_features(&ids)?;
        self.finish(&features)
    }

    fn finish(&self, features: &candle_core::Tensor) -> Result<Vec<f32>> {
        let v = l2_normalize(features)?.to_dtype(DType::F32)?.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1::<f32>()?;
        if v.len() != self.dim { return Err(anyhow!("embedding dim {} != expected {}", v.len(), self.dim)); }
        Ok(v)
    }
}
