use image::RgbImage;
use std::path::Path;

use crate::error::DecodeError;
use crate::types::CaptionSettings;

/// Captioning plus a shared image/text embedding space.
///
/// Implementations must return L2-normalized vectors of `dim()` length from
/// both `embed_image` and `embed_text`, and must be callable from several
/// worker threads at once.
pub trait Engine: Send + Sync {
    fn dim(&self) -> usize;
    fn caption(&self, image: &RgbImage, settings: &CaptionSettings) -> anyhow::Result<String>;
    fn embed_image(&self, image: &RgbImage) -> anyhow::Result<Vec<f32>>;
    fn embed_text(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Opens video files for forward decoding.
pub trait VideoDecoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodedVideo>, DecodeError>;
}

/// An open decoder handle. Dropping it releases the underlying resource.
pub trait DecodedVideo: Send {
    /// Frames per second; `<= 0.0` when the container does not report it.
    fn fps(&self) -> f64;
    /// Total frame count, when known.
    fn frame_count(&self) -> Option<u64>;
    /// Position the decoder so the next read returns `frame_index`.
    fn seek(&mut self, frame_index: u64) -> Result<(), DecodeError>;
    /// Next frame in RGB order, or `None` at end of stream.
    fn read_next_frame(&mut self) -> Result<Option<RgbImage>, DecodeError>;
}
