pub mod config;
pub mod error;
pub mod media;
pub mod traits;
pub mod types;

pub use error::{DecodeError, Error, Result};
pub use media::enumerate;
pub use traits::{DecodedVideo, Engine, VideoDecoder};
pub use types::{
    CaptionSettings, MediaKind, Query, ScanMode, ScanResult, ScanSettings, TargetItem,
};
