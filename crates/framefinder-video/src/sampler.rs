use image::RgbImage;
use std::path::Path;
use tracing::debug;

use framefinder_core::{DecodeError, DecodedVideo, VideoDecoder};

/// Sampling interval used while scanning.
pub const SCAN_INTERVAL_SECS: f64 = 2.0;
/// Sampling interval used for single-shot previews.
pub const PREVIEW_INTERVAL_SECS: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub image: RgbImage,
    pub frame_index: u64,
    pub timestamp: String,
}

/// Frames between two samples: `max(1, round(fps * interval))`.
pub fn frame_stride(fps: f64, interval_secs: f64) -> u64 {
    let stride = (fps * interval_secs).round();
    if stride.is_finite() && stride >= 1.0 { stride as u64 } else { 1 }
}

/// `M:SS` from whole seconds elapsed at `frame_index`.
pub fn format_timestamp(frame_index: u64, fps: f64) -> String {
    let seconds = if fps > 0.0 { (frame_index as f64 / fps).floor() as u64 } else { 0 };
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Forward-only, time-spaced frame iterator over one video.
///
/// Owns the decoder handle; it is released when the sampler is dropped,
/// whether exhausted, abandoned, or stopped by a read failure.
pub struct FrameSampler {
    video: Option<Box<dyn DecodedVideo>>,
    fps: f64,
    stride: u64,
    total: Option<u64>,
    next_index: u64,
    position: u64,
}

impl FrameSampler {
    pub fn open(decoder: &dyn VideoDecoder, path: &Path, interval_secs: f64) -> Result<Self, DecodeError> {
        let video = decoder.open(path)?;
        Ok(Self::new(video, interval_secs))
    }

    pub fn new(video: Box<dyn DecodedVideo>, interval_secs: f64) -> Self {
        let fps = video.fps();
        let total = video.frame_count();
        let stride = frame_stride(fps, interval_secs);
        let video = if fps > 0.0 && fps.is_finite() { Some(video) } else { None };
        Self { video, fps, stride, total, next_index: 0, position: 0 }
    }

    pub fn fps(&self) -> f64 { self.fps }

    pub fn stride(&self) -> u64 { self.stride }

    fn finish(&mut self) -> Option<SampledFrame> {
        self.video = None;
        None
    }
}

impl Iterator for FrameSampler {
    type Item = SampledFrame;

    fn next(&mut self) -> Option<SampledFrame> {
        let target = self.next_index;
        if self.total.is_some_and(|total| target >= total) {
            return self.finish();
        }
        let video = self.video.as_mut()?;
        if self.position != target {
            if let Err(e) = video.seek(target) {
                debug!(error = %e, frame = target, "seek failed, ending sample");
                return self.finish();
            }
            self.position = target;
        }
        match video.read_next_frame() {
            Ok(Some(image)) => {
                self.position = target + 1;
                self.next_index = target + self.stride;
                Some(SampledFrame { image, frame_index: target, timestamp: format_timestamp(target, self.fps) })
            }
            Ok(None) => self.finish(),
            Err(e) => {
                debug!(error = %e, frame = target, "read failed, ending sample");
                self.finish()
            }
        }
    }
}

/// Open `path` and sample one frame every `interval_secs`.
pub fn sample(decoder: &dyn VideoDecoder, path: &Path, interval_secs: f64) -> Result<FrameSampler, DecodeError> {
    FrameSampler::open(decoder, path, interval_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_rounds_and_clamps() {
        assert_eq!(frame_stride(30.0, 2.0), 60);
        assert_eq!(frame_stride(29.97, 1.0), 30);
        assert_eq!(frame_stride(0.4, 1.0), 1);
        assert_eq!(frame_stride(0.0, 2.0), 1);
        assert_eq!(frame_stride(f64::NAN, 2.0), 1);
    }

    #[test]
    fn timestamps_are_minutes_and_padded_seconds() {
        assert_eq!(format_timestamp(0, 30.0), "0:00");
        assert_eq!(format_timestamp(150, 30.0), "0:05");
        assert_eq!(format_timestamp(30 * 75, 30.0), "1:15");
        assert_eq!(format_timestamp(59, 30.0), "0:01");
    }
}
