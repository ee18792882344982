#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use framefinder_core::{CaptionSettings, DecodeError, DecodedVideo, Engine, ScanResult, VideoDecoder};
use framefinder_embed::FakeEngine;
use framefinder_scan::{ScanEvent, ScanSink};

pub const RED: [u8; 3] = [200, 30, 30];
pub const BLUE: [u8; 3] = [30, 50, 200];
pub const GREEN: [u8; 3] = [30, 170, 40];

pub fn write_png(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(8, 8, Rgb(color)).save(&path).unwrap();
    path
}

/// Records every sink call as a `ScanEvent`.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<ScanEvent>,
}

impl RecordingSink {
    pub fn results(&self) -> Vec<&ScanResult> {
        self.events.iter().filter_map(|e| match e { ScanEvent::Result(r) => Some(r), _ => None }).collect()
    }

    pub fn progress_labels(&self) -> Vec<(u8, String)> {
        self.events
            .iter()
            .filter_map(|e| match e { ScanEvent::Progress { percent, label } => Some((*percent, label.clone())), _ => None })
            .collect()
    }

    pub fn completions(&self) -> usize { self.events.iter().filter(|e| **e == ScanEvent::Completed).count() }
}

impl ScanSink for RecordingSink {
    fn progress(&mut self, percent: u8, label: &str) {
        self.events.push(ScanEvent::Progress { percent, label: label.to_string() });
    }
    fn result(&mut self, result: ScanResult) { self.events.push(ScanEvent::Result(result)); }
    fn completed(&mut self) { self.events.push(ScanEvent::Completed); }
}

/// FakeEngine wrapper that counts calls.
pub struct CountingEngine {
    inner: FakeEngine,
    pub captions: AtomicUsize,
    pub embeds: AtomicUsize,
}

impl CountingEngine {
    pub fn new() -> Self { Self { inner: FakeEngine::new(64), captions: AtomicUsize::new(0), embeds: AtomicUsize::new(0) } }
}

impl Engine for CountingEngine {
    fn dim(&self) -> usize { self.inner.dim() }
    fn caption(&self, image: &RgbImage, settings: &CaptionSettings) -> anyhow::Result<String> {
        self.captions.fetch_add(1, Ordering::SeqCst);
        self.inner.caption(image, settings)
    }
    fn embed_image(&self, image: &RgbImage) -> anyhow::Result<Vec<f32>> {
        self.embeds.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_image(image)
    }
    fn embed_text(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embeds.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_text(text)
    }
}

/// A clip served by `ScriptedDecoder`: one solid colour per frame.
#[derive(Clone)]
pub struct Clip {
    pub fps: f64,
    pub frames: Vec<[u8; 3]>,
    /// Reads at or past this index fail.
    pub fail_from: Option<usize>,
}

struct ScriptedVideo {
    clip: Clip,
    position: usize,
    open: Arc<AtomicUsize>,
}

impl DecodedVideo for ScriptedVideo {
    fn fps(&self) -> f64 { self.clip.fps }
    fn frame_count(&self) -> Option<u64> { Some(self.clip.frames.len() as u64) }
    fn seek(&mut self, frame_index: u64) -> Result<(), DecodeError> {
        self.position = frame_index as usize;
        Ok(())
    }
    fn read_next_frame(&mut self) -> Result<Option<RgbImage>, DecodeError> {
        if self.clip.fail_from.is_some_and(|f| self.position >= f) {
            return Err(DecodeError::Read(std::io::Error::other("corrupt frame")));
        }
        let Some(color) = self.clip.frames.get(self.position) else { return Ok(None) };
        self.position += 1;
        Ok(Some(RgbImage::from_pixel(4, 4, Rgb(*color))))
    }
}

impl Drop for ScriptedVideo {
    fn drop(&mut self) { self.open.fetch_sub(1, Ordering::SeqCst); }
}

/// Serves clips by file name; unknown names fail to open.
#[derive(Default)]
pub struct ScriptedDecoder {
    clips: HashMap<String, Clip>,
    /// Handles currently open.
    pub open: Arc<AtomicUsize>,
}

impl ScriptedDecoder {
    pub fn with(mut self, name: &str, clip: Clip) -> Self {
        self.clips.insert(name.to_string(), clip);
        self
    }
}

impl VideoDecoder for ScriptedDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodedVideo>, DecodeError> {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let clip = self.clips.get(&name).cloned().ok_or_else(|| DecodeError::Open {
            path: path.display().to_string(),
            reason: "not scripted".into(),
        })?;
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedVideo { clip, position: 0, open: Arc::clone(&self.open) }))
    }
}

/// FakeEngine that panics whenever it is asked to caption a red image.
pub struct RedPanicEngine {
    inner: FakeEngine,
}

impl RedPanicEngine {
    pub fn new() -> Self { Self { inner: FakeEngine::new(64) } }
}

impl Engine for RedPanicEngine {
    fn dim(&self) -> usize { self.inner.dim() }
    fn caption(&self, image: &RgbImage, settings: &CaptionSettings) -> anyhow::Result<String> {
        let caption = self.inner.caption(image, settings)?;
        if caption == "a red image" {
            panic!("caption kernel crashed");
        }
        Ok(caption)
    }
    fn embed_image(&self, image: &RgbImage) -> anyhow::Result<Vec<f32>> { self.inner.embed_image(image) }
    fn embed_text(&self, text: &str) -> anyhow::Result<Vec<f32>> { self.inner.embed_text(text) }
}
