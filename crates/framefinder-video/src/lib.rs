pub mod ffmpeg;
pub mod sampler;

pub use ffmpeg::FfmpegDecoder;
pub use sampler::{
    format_timestamp, frame_stride, sample, FrameSampler, SampledFrame, PREVIEW_INTERVAL_SECS,
    SCAN_INTERVAL_SECS,
};
