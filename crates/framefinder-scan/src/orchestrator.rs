//! Scan orchestration: resolve the query, walk the targets, score, report.

use image::RgbImage;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use framefinder_core::{
    CaptionSettings, DecodeError, Engine, MediaKind, Query, ScanResult, ScanSettings, TargetItem, VideoDecoder,
};
use framefinder_embed::EngineCell;
use framefinder_video::{sample, SCAN_INTERVAL_SECS};

use crate::query::{describe_query, load_rgb, resolve_query};
use crate::scoring::{Candidate, ScoringPolicy};

/// Receives scan events. `completed` is called exactly once, last.
pub trait ScanSink {
    fn progress(&mut self, percent: u8, label: &str);
    fn result(&mut self, result: ScanResult);
    fn completed(&mut self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanPhase {
    #[default]
    Idle,
    ResolvingQuery,
    Scanning,
    Completed,
    Failed,
}

/// Errors that stop a whole scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("engine failed to load: {0:#}")]
    Engine(anyhow::Error),

    #[error("query could not be resolved: {0:#}")]
    Query(anyhow::Error),
}

/// Why a single target produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("cannot open: {0}")]
    Open(String),

    #[error("cannot decode: {0}")]
    Decode(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("no decodable frames")]
    NoFrames,
}

impl From<DecodeError> for SkipReason {
    fn from(e: DecodeError) -> Self {
        match &e {
            DecodeError::Open { .. } => Self::Open(e.to_string()),
            _ => Self::Decode(e.to_string()),
        }
    }
}

impl From<image::ImageError> for SkipReason {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => Self::Open(io.to_string()),
            other => Self::Decode(other.to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScanSummary {
    pub phase: ScanPhase,
    pub emitted: usize,
    pub skipped: usize,
    pub error: Option<ScanError>,
}

impl ScanSummary {
    pub fn is_completed(&self) -> bool { self.phase == ScanPhase::Completed }
}

/// Calls `completed()` when dropped, including while unwinding.
struct CompletionGuard<'a> {
    sink: &'a mut dyn ScanSink,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) { self.sink.completed(); }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// `index * 100 / total`, computed before the target at `index` starts.
fn progress_percent(index: usize, total: usize) -> u8 {
    if total == 0 { return 100; }
    (index.saturating_mul(100) / total).min(100) as u8
}

pub struct Orchestrator {
    engine: Arc<EngineCell>,
    decoder: Arc<dyn VideoDecoder>,
    interval_secs: f64,
}

impl Orchestrator {
    pub fn new(engine: Arc<EngineCell>, decoder: Arc<dyn VideoDecoder>) -> Self {
        Self { engine, decoder, interval_secs: SCAN_INTERVAL_SECS }
    }

    /// Override the video sampling interval.
    pub fn with_interval(mut self, interval_secs: f64) -> Self {
        if interval_secs > 0.0 { self.interval_secs = interval_secs; }
        self
    }

    /// Run one scan to completion. `sink.completed()` fires on every path.
    pub fn run(&self, query: &Query, targets: &[TargetItem], settings: &ScanSettings, sink: &mut dyn ScanSink) -> ScanSummary {
        info!(targets = targets.len(), mode = ?settings.mode, "scan started");
        let mut summary = ScanSummary::default();
        let mut guard = CompletionGuard { sink };
        match self.drive(query, targets, settings, &mut *guard.sink, &mut summary) {
            Ok(()) => summary.phase = ScanPhase::Completed,
            Err(e) => {
                error!(error = %e, "scan failed");
                summary.phase = ScanPhase::Failed;
                summary.error = Some(e);
            }
        }
        drop(guard);
        info!(emitted = summary.emitted, skipped = summary.skipped, phase = ?summary.phase, "scan finished");
        summary
    }

    fn drive(
        &self,
        query: &Query,
        targets: &[TargetItem],
        settings: &ScanSettings,
        sink: &mut dyn ScanSink,
        summary: &mut ScanSummary,
    ) -> Result<(), ScanError> {
        summary.phase = ScanPhase::ResolvingQuery;
        let engine = self.engine.ensure_loaded().map_err(ScanError::Engine)?;
        if targets.is_empty() {
            describe_query(engine.as_ref(), query, settings, sink)?;
            return Ok(());
        }
        let policy = resolve_query(engine.as_ref(), query, settings, sink)?;

        summary.phase = ScanPhase::Scanning;
        let caption_settings = settings.caption_settings();
        let total = targets.len();
        for (index, target) in targets.iter().enumerate() {
            sink.progress(progress_percent(index, total), &target.file_name());
            let outcome = catch_unwind(AssertUnwindSafe(|| match target.kind {
                MediaKind::Image => self.scan_image(engine.as_ref(), &policy, &caption_settings, target),
                MediaKind::Video => self.scan_video(engine.as_ref(), &policy, &caption_settings, target),
            }))
            .unwrap_or_else(|payload| Err(SkipReason::Inference(format!("panicked: {}", panic_message(payload.as_ref())))));
            match outcome {
                Ok(result) => {
                    debug!(path = %target.path.display(), score = result.score, "target scored");
                    sink.result(result);
                    summary.emitted += 1;
                }
                Err(reason) => {
                    warn!(path = %target.path.display(), %reason, "skipping target");
                    summary.skipped += 1;
                }
            }
        }
        Ok(())
    }

    pub fn scan_image(
        &self,
        engine: &dyn Engine,
        policy: &ScoringPolicy,
        caption_settings: &CaptionSettings,
        target: &TargetItem,
    ) -> Result<ScanResult, SkipReason> {
        let image = load_rgb(&target.path)?;
        let (score, caption) = evaluate(engine, policy, caption_settings, &image)?;
        Ok(ScanResult { path: target.path.clone(), score, caption, timestamp: None })
    }

    /// Score sampled frames and keep the first frame with the highest score.
    pub fn scan_video(
        &self,
        engine: &dyn Engine,
        policy: &ScoringPolicy,
        caption_settings: &CaptionSettings,
        target: &TargetItem,
    ) -> Result<ScanResult, SkipReason> {
        let frames = sample(self.decoder.as_ref(), &target.path, self.interval_secs)?;
        let mut best: Option<(f32, String, String)> = None;
        for frame in frames {
            let (score, caption) = evaluate(engine, policy, caption_settings, &frame.image)?;
            let better = match &best {
                Some((top, _, _)) => score > *top,
                None => true,
            };
            if better {
                best = Some((score, caption, frame.timestamp));
            }
        }
        let (score, caption, timestamp) = best.ok_or(SkipReason::NoFrames)?;
        Ok(ScanResult { path: target.path.clone(), score, caption, timestamp: Some(timestamp) })
    }
}

fn evaluate(
    engine: &dyn Engine,
    policy: &ScoringPolicy,
    caption_settings: &CaptionSettings,
    image: &RgbImage,
) -> Result<(f32, String), SkipReason> {
    let inference = |e: anyhow::Error| SkipReason::Inference(format!("{e:#}"));
    let mut candidate = Candidate { caption: engine.caption(image, caption_settings).map_err(inference)?, ..Default::default() };
    if policy.needs_embeddings() {
        candidate.visual_embedding = Some(engine.embed_image(image).map_err(inference)?);
    }
    if policy.needs_caption_embedding() {
        candidate.text_embedding = Some(engine.embed_text(&candidate.caption).map_err(inference)?);
    }
    let score = policy.score(&candidate);
    Ok((score, candidate.caption))
}
