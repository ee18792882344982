use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Setting `{name}` out of range: {value} (expected {range})")]
    SettingOutOfRange {
        name: &'static str,
        value: String,
        range: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a video decoder backend.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("cannot probe stream: {0}")]
    Probe(String),

    #[error("frame read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("seek to frame {0} failed")]
    Seek(u64),
}
