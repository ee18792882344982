//! Background scan workers reporting over a channel.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

use framefinder_core::{Query, ScanMode, ScanResult, ScanSettings, TargetItem, VideoDecoder};
use framefinder_embed::EngineCell;

use crate::orchestrator::{Orchestrator, ScanSink, ScanSummary};

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Progress { percent: u8, label: String },
    Result(ScanResult),
    Completed,
}

/// Forwards sink calls into an unbounded channel. Sends after the receiver
/// is dropped are ignored.
pub struct ChannelSink {
    tx: UnboundedSender<ScanEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<ScanEvent>) -> Self { Self { tx } }
}

impl ScanSink for ChannelSink {
    fn progress(&mut self, percent: u8, label: &str) {
        let _ = self.tx.send(ScanEvent::Progress { percent, label: label.to_string() });
    }

    fn result(&mut self, result: ScanResult) {
        let _ = self.tx.send(ScanEvent::Result(result));
    }

    fn completed(&mut self) {
        let _ = self.tx.send(ScanEvent::Completed);
    }
}

/// Rejected before any worker starts.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("keyword mode needs query text")]
    EmptyKeywordQuery,

    #[error("vector mode needs query text or a query image")]
    EmptyVectorQuery,

    #[error("no target files selected")]
    NoTargets,

    #[error(transparent)]
    Setting(#[from] framefinder_core::Error),
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub query: Query,
    pub targets: Vec<TargetItem>,
    pub settings: ScanSettings,
}

impl ScanRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.settings.validate()?;
        match self.settings.mode {
            ScanMode::Keyword if self.query.text().is_none() => return Err(ValidationError::EmptyKeywordQuery),
            ScanMode::Vector if self.query.text().is_none() && self.query.image_path().is_none() => {
                return Err(ValidationError::EmptyVectorQuery)
            }
            _ => {}
        }
        if self.targets.is_empty() {
            return Err(ValidationError::NoTargets);
        }
        Ok(())
    }
}

/// A running scan: its event stream and the worker's summary.
pub struct ScanHandle {
    events: UnboundedReceiver<ScanEvent>,
    join: JoinHandle<ScanSummary>,
}

impl ScanHandle {
    pub async fn recv(&mut self) -> Option<ScanEvent> { self.events.recv().await }

    /// Drop the event stream and wait for the worker to finish.
    pub async fn finish(self) -> anyhow::Result<ScanSummary> {
        drop(self.events);
        Ok(self.join.await?)
    }

    /// Drain every event, then return them with the summary.
    pub async fn collect(mut self) -> anyhow::Result<(Vec<ScanEvent>, ScanSummary)> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let summary = self.join.await?;
        Ok((events, summary))
    }
}

/// Runs each request on its own blocking worker. Cloning shares the engine.
#[derive(Clone)]
pub struct ScanService {
    orchestrator: Arc<Orchestrator>,
}

impl ScanService {
    pub fn new(engine: Arc<EngineCell>, decoder: Arc<dyn VideoDecoder>) -> Self {
        Self { orchestrator: Arc::new(Orchestrator::new(engine, decoder)) }
    }

    pub fn from_orchestrator(orchestrator: Orchestrator) -> Self {
        Self { orchestrator: Arc::new(orchestrator) }
    }

    /// Validate and start a scan. Must be called inside a tokio runtime.
    pub fn submit(&self, request: ScanRequest) -> Result<ScanHandle, ValidationError> {
        request.validate()?;
        debug!(targets = request.targets.len(), "submitting scan");
        Ok(self.spawn(request.query, request.targets, request.settings))
    }

    /// Caption one image with the instant-caption preset.
    ///
    /// Emits `Progress(100, caption)` then `Completed`; an unreadable image
    /// yields only `Completed`.
    pub fn caption_only(&self, image_path: impl Into<PathBuf>) -> ScanHandle {
        let query = Query::Image { image_path: image_path.into() };
        self.spawn(query, Vec::new(), ScanSettings::instant_caption())
    }

    fn spawn(&self, query: Query, targets: Vec<TargetItem>, settings: ScanSettings) -> ScanHandle {
        let (tx, events) = unbounded_channel();
        let orchestrator = Arc::clone(&self.orchestrator);
        let join = tokio::task::spawn_blocking(move || {
            let mut sink = ChannelSink::new(tx);
            orchestrator.run(&query, &targets, &settings, &mut sink)
        });
        ScanHandle { events, join }
    }
}
