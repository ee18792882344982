use anyhow::{anyhow, Context};
use image::RgbImage;
use std::path::Path;
use tracing::{debug, info};

use framefinder_core::{Engine, Query, ScanMode, ScanSettings};

use crate::keywords::clean_words;
use crate::orchestrator::{ScanError, ScanSink};
use crate::scoring::ScoringPolicy;

pub(crate) fn load_rgb(path: &Path) -> Result<RgbImage, image::ImageError> {
    Ok(image::open(path)?.to_rgb8())
}

fn caption_query_image(
    engine: &dyn Engine,
    path: &Path,
    settings: &ScanSettings,
    sink: &mut dyn ScanSink,
) -> Result<(RgbImage, String), ScanError> {
    let image = load_rgb(path)
        .with_context(|| format!("reading query image {}", path.display()))
        .map_err(ScanError::Query)?;
    let caption = engine
        .caption(&image, &settings.caption_settings())
        .context("captioning query image")
        .map_err(ScanError::Query)?;
    info!(caption = %caption, "query image captioned");
    sink.progress(100, &caption);
    Ok((image, caption))
}

/// Caption the query image, if any, without computing embeddings.
pub fn describe_query(
    engine: &dyn Engine,
    query: &Query,
    settings: &ScanSettings,
    sink: &mut dyn ScanSink,
) -> Result<Option<String>, ScanError> {
    match query.image_path() {
        Some(path) => Ok(Some(caption_query_image(engine, path, settings, sink)?.1)),
        None => Ok(None),
    }
}

/// Turn the user's query into the scoring policy for this scan.
///
/// A query image is captioned first and the caption is reported through
/// `sink` as a `(100, caption)` progress event. The prompt is the user's text
/// when present, otherwise that caption.
pub fn resolve_query(
    engine: &dyn Engine,
    query: &Query,
    settings: &ScanSettings,
    sink: &mut dyn ScanSink,
) -> Result<ScoringPolicy, ScanError> {
    let mut visual = None;
    let mut generated = None;

    if let Some(path) = query.image_path() {
        let (image, caption) = caption_query_image(engine, path, settings, sink)?;
        if settings.mode == ScanMode::Vector {
            visual = Some(engine.embed_image(&image).context("embedding query image").map_err(ScanError::Query)?);
        }
        generated = Some(caption);
    }

    let prompt = query.text().map(str::to_string).or(generated).unwrap_or_default();
    debug!(prompt = %prompt, mode = ?settings.mode, "query resolved");

    match settings.mode {
        ScanMode::Keyword => Ok(ScoringPolicy::Keyword { query_words: clean_words(&prompt) }),
        ScanMode::Vector => {
            let text = if prompt.trim().is_empty() {
                None
            } else {
                Some(engine.embed_text(&prompt).context("embedding query text").map_err(ScanError::Query)?)
            };
            if text.is_none() && visual.is_none() {
                return Err(ScanError::Query(anyhow!("vector query has neither text nor image")));
            }
            Ok(ScoringPolicy::Vector { text, visual })
        }
    }
}
