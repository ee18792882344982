use anyhow::{Result, anyhow};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::blip;
use image::RgbImage;
use std::path::Path;
use std::sync::Mutex;
use tokenizers::Tokenizer;
use tracing::debug;

use framefinder_core::CaptionSettings;

use crate::beam::{BeamConfig, beam_search};
use crate::preprocess::blip_pixels;

/// `[DEC]` token that opens every caption.
const DECODER_BOS: u32 = 30522;
/// `[SEP]` closes a caption.
const DECODER_EOS: u32 = 102;
const MIN_MAX_NEW_TOKENS: usize = 30;

pub struct BlipCaptioner {
    // The text decoder keeps a KV cache, so decoding is serialized.
    model: Mutex<blip::BlipForConditionalGeneration>,
    tokenizer: Tokenizer,
    device: Device,
}

impl BlipCaptioner {
    pub fn load(tokenizer_path: &Path, weights_path: &Path, device: &Device) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config = blip::Config::image_captioning_large();
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };
        let model = blip::BlipForConditionalGeneration::new(&config, vb)?;
        Ok(Self { model: Mutex::new(model), tokenizer, device: device.clone() })
    }

    pub fn caption(&self, image: &RgbImage, settings: &CaptionSettings) -> Result<String> {
        let pixels = blip_pixels(image, &self.device)?;
        let mut model = self.model.lock().map_err(|_| anyhow!("caption model lock poisoned"))?;
        let image_embeds = model.vision_model().forward(&pixels)?;

        let cfg = BeamConfig {
            beam_width: settings.beam_width,
            min_new_tokens: settings.min_tokens,
            max_new_tokens: MIN_MAX_NEW_TOKENS.max(settings.min_tokens + 10),
            length_penalty: settings.length_penalty,
            repetition_penalty: settings.repetition_penalty,
            prompt: vec![DECODER_BOS],
            eos_token: DECODER_EOS,
        };
        let device = &self.device;
        let tokens = beam_search(&cfg, |seqs: &[Vec<u32>]| -> Result<Vec<Vec<f32>>> {
            // Full recompute per step: each beam would otherwise need its own cache.
            model.reset_kv_cache();
            let (batch, len) = (seqs.len(), seqs[0].len());
            let ids = Tensor::from_vec(seqs.concat(), (batch, len), device)?;
            let embeds = image_embeds.repeat((batch, 1, 1))?;
            let logits = model.text_decoder().forward(&ids, &embeds)?;
            let last = logits.narrow(1, len - 1, 1)?.squeeze(1)?.to_dtype(DType::F32)?.to_device(&Device::Cpu)?;
            Ok(last.to_vec2::<f32>()?)
        });
        model.reset_kv_cache();
        let tokens = tokens?;
        debug!(tokens = tokens.len(), "caption decoded");
        let text = self.tokenizer.decode(&tokens, true).map_err(|e| anyhow!("Detokenization failed: {}", e))?;
        Ok(text.trim().to_string())
    }
}
