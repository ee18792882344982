//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`APP_MODELS__CACHE_DIR` maps to `models.cache_dir`). Typed sections fall
//! back to their defaults for absent keys.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::types::ScanSettings;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract `key`, layering it over `T::default()` so absent keys keep defaults.
    pub fn section<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Serialize + Default,
    {
        Figment::from(Serialized::defaults(T::default()))
            .merge(self.figment.focus(key))
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read section '{}': {}", key, e))
    }

    pub fn models(&self) -> anyhow::Result<ModelsConfig> {
        self.section("models")
    }

    pub fn video(&self) -> anyhow::Result<VideoConfig> {
        self.section("video")
    }

    pub fn scan(&self) -> anyhow::Result<ScanSettings> {
        let settings: ScanSettings = self.section("scan")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.scan()?;
        let video = self.video()?;
        if video.scan_interval_secs <= 0.0 {
            anyhow::bail!("video.scan_interval_secs must be positive");
        }
        Ok(())
    }
}

/// Where the captioning and retrieval weights come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub caption_repo: String,
    pub caption_revision: String,
    pub retrieval_repo: String,
    pub retrieval_revision: String,
    /// hf-hub cache directory; `~` and `$VAR` are expanded.
    pub cache_dir: Option<String>,
    /// Never fall back to a network fetch on a cache miss.
    pub offline: bool,
    /// `auto`, `cpu`, `cuda` or `metal`.
    pub device: String,
    /// Use the deterministic hashing engine instead of real weights.
    pub use_fake_engine: bool,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            caption_repo: "Salesforce/blip-image-captioning-large".to_string(),
            caption_revision: "refs/pr/18".to_string(),
            retrieval_repo: "openai/clip-vit-base-patch32".to_string(),
            retrieval_revision: "refs/pr/15".to_string(),
            cache_dir: None,
            offline: false,
            device: "auto".to_string(),
            use_fake_engine: false,
        }
    }
}

impl ModelsConfig {
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.cache_dir.as_deref().map(expand_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub scan_interval_secs: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            scan_interval_secs: 2.0,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
