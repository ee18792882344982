//! Video decoding through the `ffprobe`/`ffmpeg` command-line tools.
//!
//! `ffprobe` reports geometry, frame rate and frame count as JSON; `ffmpeg`
//! streams raw `rgb24` frames over a pipe. Short forward seeks read and
//! discard frames, anything else restarts the pipe at the target timestamp.

use image::RgbImage;
use serde::Deserialize;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::debug;

use framefinder_core::config::VideoConfig;
use framefinder_core::{DecodeError, DecodedVideo, VideoDecoder};

/// Forward gaps up to this many frames are skipped by reading.
const MAX_READ_AHEAD: u64 = 240;

#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl Default for FfmpegDecoder {
    fn default() -> Self { Self::from_config(&VideoConfig::default()) }
}

impl FfmpegDecoder {
    pub fn from_config(cfg: &VideoConfig) -> Self {
        Self { ffmpeg_bin: cfg.ffmpeg_bin.clone(), ffprobe_bin: cfg.ffprobe_bin.clone() }
    }

    fn probe(&self, path: &Path) -> Result<StreamInfo, DecodeError> {
        let output = Command::new(&self.ffprobe_bin)
            .args(["-v", "error", "-select_streams", "v:0", "-show_entries"])
            .arg("stream=width,height,avg_frame_rate,r_frame_rate,nb_frames,duration")
            .args(["-of", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| DecodeError::Open { path: path.display().to_string(), reason: e.to_string() })?;
        if !output.status.success() {
            return Err(DecodeError::Open {
                path: path.display().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_probe(&output.stdout)
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodedVideo>, DecodeError> {
        let info = self.probe(path)?;
        debug!(path = %path.display(), fps = info.fps, frames = ?info.frame_count, "probed video");
        let mut video = FfmpegVideo {
            ffmpeg_bin: self.ffmpeg_bin.clone(),
            path: path.to_path_buf(),
            info,
            pipe: None,
            position: 0,
        };
        video.spawn_at(0)?;
        Ok(Box::new(video))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: Option<u64>,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/').unwrap_or((rate, "1"));
    let (num, den): (f64, f64) = (num.trim().parse().ok()?, den.trim().parse().ok()?);
    (den != 0.0).then(|| num / den).filter(|r| r.is_finite() && *r > 0.0)
}

/// Parse `ffprobe -of json` output for the first video stream.
pub fn parse_probe(json: &[u8]) -> Result<StreamInfo, DecodeError> {
    let out: ProbeOutput = serde_json::from_slice(json).map_err(|e| DecodeError::Probe(e.to_string()))?;
    let stream = out.streams.into_iter().next().ok_or_else(|| DecodeError::Probe("no video stream".into()))?;
    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(DecodeError::Probe("missing frame size".into())),
    };
    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(0.0);
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| {
            let secs: f64 = stream.duration.as_deref()?.parse().ok()?;
            (fps > 0.0 && secs > 0.0).then(|| (secs * fps).round() as u64)
        });
    Ok(StreamInfo { width, height, fps, frame_count })
}

struct Pipe {
    child: Child,
    stdout: ChildStdout,
}

impl Drop for Pipe {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

struct FfmpegVideo {
    ffmpeg_bin: String,
    path: PathBuf,
    info: StreamInfo,
    pipe: Option<Pipe>,
    position: u64,
}

impl FfmpegVideo {
    fn frame_bytes(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }

    fn spawn_at(&mut self, frame_index: u64) -> Result<(), DecodeError> {
        self.pipe = None;
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.args(["-v", "error", "-nostdin"]);
        if frame_index > 0 && self.info.fps > 0.0 {
            cmd.arg("-ss").arg(format!("{:.6}", frame_index as f64 / self.info.fps));
        }
        cmd.arg("-i")
            .arg(&self.path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = cmd.spawn().map_err(|e| DecodeError::Open {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DecodeError::Open { path: self.path.display().to_string(), reason: "no stdout pipe".into() });
        };
        self.pipe = Some(Pipe { child, stdout });
        self.position = frame_index;
        Ok(())
    }

    fn read_raw(&mut self) -> Result<Option<Vec<u8>>, DecodeError> {
        let size = self.frame_bytes();
        let Some(pipe) = self.pipe.as_mut() else { return Ok(None) };
        let mut buf = vec![0u8; size];
        match pipe.stdout.read_exact(&mut buf) {
            Ok(()) => {
                self.position += 1;
                Ok(Some(buf))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.pipe = None;
                Ok(None)
            }
            Err(e) => Err(DecodeError::Read(e)),
        }
    }
}

impl DecodedVideo for FfmpegVideo {
    fn fps(&self) -> f64 { self.info.fps }

    fn frame_count(&self) -> Option<u64> { self.info.frame_count }

    fn seek(&mut self, frame_index: u64) -> Result<(), DecodeError> {
        if frame_index >= self.position && frame_index - self.position <= MAX_READ_AHEAD && self.pipe.is_some() {
            while self.position < frame_index {
                if self.read_raw()?.is_none() { return Err(DecodeError::Seek(frame_index)); }
            }
            return Ok(());
        }
        self.spawn_at(frame_index)
    }

    fn read_next_frame(&mut self) -> Result<Option<RgbImage>, DecodeError> {
        let (w, h) = (self.info.width, self.info.height);
        Ok(self.read_raw()?.and_then(|buf| RgbImage::from_raw(w, h, buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_probe_json_with_frame_count() {
        let json = br#"{"streams":[{"width":640,"height":360,"avg_frame_rate":"30000/1001","r_frame_rate":"30000/1001","nb_frames":"300","duration":"10.01"}]}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!((info.width, info.height), (640, 360));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.frame_count, Some(300));
    }

    #[test]
    fn falls_back_to_duration_and_r_frame_rate() {
        let json = br#"{"streams":[{"width":2,"height":2,"avg_frame_rate":"0/0","r_frame_rate":"25/1","duration":"4.0"}]}"#;
        let info = parse_probe(json).unwrap();
        assert!((info.fps - 25.0).abs() < f64::EPSILON);
        assert_eq!(info.frame_count, Some(100));
    }

    #[test]
    fn unknown_rate_yields_zero_fps() {
        let json = br#"{"streams":[{"width":2,"height":2,"avg_frame_rate":"0/0"}]}"#;
        let info = parse_probe(json).unwrap();
        assert!(info.fps <= 0.0);
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn rejects_output_without_video_stream() {
        assert!(matches!(parse_probe(br#"{"streams":[]}"#), Err(DecodeError::Probe(_))));
        assert!(matches!(parse_probe(b"not json"), Err(DecodeError::Probe(_))));
    }
}
