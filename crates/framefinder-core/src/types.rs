//! Domain types shared by the engine, sampler and scan orchestrator.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov"];

/// Results scoring above this are highlighted as strong matches.
pub const STRONG_MATCH_THRESHOLD: f32 = 0.60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a path by its extension (case-insensitive).
    /// Returns `None` for unsupported or missing extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }
}

/// A media file queued for scanning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetItem {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl TargetItem {
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self { path: path.into(), kind }
    }

    /// Build a target from a path, classifying it by extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let kind = MediaKind::from_path(&path)?;
        Some(Self { path, kind })
    }

    /// File name used as the progress label.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// What the user is searching for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Text { raw_text: String },
    Image { image_path: PathBuf },
    /// Image present; the text may hold an AI-suggested caption the user kept or edited.
    Combined { image_path: PathBuf, raw_text: String },
}

impl Query {
    /// Build a query from the two optional inputs a shell collects.
    pub fn from_parts(text: Option<String>, image_path: Option<PathBuf>) -> Option<Self> {
        let text = text.filter(|t| !t.trim().is_empty());
        match (text, image_path) {
            (Some(raw_text), Some(image_path)) => Some(Self::Combined { image_path, raw_text }),
            (None, Some(image_path)) => Some(Self::Image { image_path }),
            (Some(raw_text), None) => Some(Self::Text { raw_text }),
            (None, None) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { raw_text } | Self::Combined { raw_text, .. } => {
                let t = raw_text.trim();
                (!t.is_empty()).then_some(t)
            }
            Self::Image { .. } => None,
        }
    }

    pub fn image_path(&self) -> Option<&Path> {
        match self {
            Self::Image { image_path } | Self::Combined { image_path, .. } => Some(image_path),
            Self::Text { .. } => None,
        }
    }
}

/// Scoring mode, selected once per scan.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    #[default]
    Keyword,
    Vector,
}

impl std::str::FromStr for ScanMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "vector" => Ok(Self::Vector),
            other => Err(Error::InvalidConfig(format!("unknown scan mode '{other}'"))),
        }
    }
}

/// Beam-search decoding knobs passed to the captioner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptionSettings {
    pub beam_width: usize,
    pub min_tokens: usize,
    pub length_penalty: f32,
    pub repetition_penalty: f32,
}

/// Per-scan settings. Read-only for the duration of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub mode: ScanMode,
    pub beam_width: usize,
    pub min_caption_tokens: usize,
    pub length_penalty: f32,
    pub repetition_penalty: f32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            mode: ScanMode::Keyword,
            beam_width: 5,
            min_caption_tokens: 20,
            length_penalty: 3.0,
            repetition_penalty: 1.2,
        }
    }
}

impl ScanSettings {
    /// Preset used when a query image is dropped and only its caption is wanted.
    pub fn instant_caption() -> Self {
        Self {
            mode: ScanMode::Vector,
            beam_width: 5,
            min_caption_tokens: 20,
            length_penalty: 2.0,
            repetition_penalty: 1.2,
        }
    }

    pub fn caption_settings(&self) -> CaptionSettings {
        CaptionSettings {
            beam_width: self.beam_width,
            min_tokens: self.min_caption_tokens,
            length_penalty: self.length_penalty,
            repetition_penalty: self.repetition_penalty,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=10).contains(&self.beam_width) {
            return Err(Error::SettingOutOfRange {
                name: "beam_width",
                value: self.beam_width.to_string(),
                range: "1..=10",
            });
        }
        if !(5..=100).contains(&self.min_caption_tokens) {
            return Err(Error::SettingOutOfRange {
                name: "min_caption_tokens",
                value: self.min_caption_tokens.to_string(),
                range: "5..=100",
            });
        }
        if !(1.0..=5.0).contains(&self.length_penalty) {
            return Err(Error::SettingOutOfRange {
                name: "length_penalty",
                value: self.length_penalty.to_string(),
                range: "1.0..=5.0",
            });
        }
        if !(1.0..=2.0).contains(&self.repetition_penalty) {
            return Err(Error::SettingOutOfRange {
                name: "repetition_penalty",
                value: self.repetition_penalty.to_string(),
                range: "1.0..=2.0",
            });
        }
        Ok(())
    }
}

/// One scored target. Video results carry the best frame's timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub path: PathBuf,
    pub score: f32,
    pub caption: String,
    pub timestamp: Option<String>,
}

impl ScanResult {
    pub fn is_strong_match(&self) -> bool {
        self.score > STRONG_MATCH_THRESHOLD
    }
}
