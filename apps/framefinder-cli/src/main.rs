use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use framefinder_core::config::Config;
use framefinder_core::{enumerate, Query, ScanMode, ScanResult, ScanSettings};
use framefinder_embed::{prefetch, EngineCell};
use framefinder_scan::{Orchestrator, ScanEvent, ScanRequest, ScanService};
use framefinder_video::FfmpegDecoder;

#[derive(Parser)]
#[command(name = "framefinder")]
#[command(about = "Search images and videos by text prompt or reference image", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan files and folders for matches
    Scan {
        /// Text prompt
        #[arg(short, long)]
        prompt: Option<String>,

        /// Reference image
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Scoring mode: keyword or vector (default from config)
        #[arg(short, long)]
        mode: Option<ScanMode>,

        /// Beam width for captioning (1-10)
        #[arg(long)]
        beams: Option<usize>,

        /// Minimum caption length in tokens (5-100)
        #[arg(long)]
        min_tokens: Option<usize>,

        /// Length penalty (1.0-5.0)
        #[arg(long)]
        length_penalty: Option<f32>,

        /// Repetition penalty (1.0-2.0)
        #[arg(long)]
        repetition_penalty: Option<f32>,

        /// Files or directories to search
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the caption the model suggests for an image
    Caption {
        image: PathBuf,
    },

    /// Download caption and retrieval weights into the cache
    FetchModels,
}

fn build_service(config: &Config) -> anyhow::Result<ScanService> {
    let models = config.models()?;
    let video = config.video()?;
    let engine = Arc::new(EngineCell::new(models));
    let decoder = Arc::new(FfmpegDecoder::from_config(&video));
    Ok(ScanService::from_orchestrator(Orchestrator::new(engine, decoder).with_interval(video.scan_interval_secs)))
}

fn print_results(results: &mut [ScanResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    println!("\n🔍 {} results", results.len());
    for (i, r) in results.iter().enumerate() {
        let mark = if r.is_strong_match() { "★" } else { " " };
        let at = r.timestamp.as_deref().map(|t| format!(" @ {t}")).unwrap_or_default();
        println!("{mark} {:>2}. {:>5.1}%  {}{}", i + 1, r.score * 100.0, r.path.display(), at);
        println!("        📝 {}", r.caption);
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_scan(
    config: &Config,
    prompt: Option<String>,
    image: Option<PathBuf>,
    mode: Option<ScanMode>,
    beams: Option<usize>,
    min_tokens: Option<usize>,
    length_penalty: Option<f32>,
    repetition_penalty: Option<f32>,
    paths: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let mut settings: ScanSettings = config.scan()?;
    if let Some(m) = mode { settings.mode = m; }
    if let Some(b) = beams { settings.beam_width = b; }
    if let Some(t) = min_tokens { settings.min_caption_tokens = t; }
    if let Some(lp) = length_penalty { settings.length_penalty = lp; }
    if let Some(rp) = repetition_penalty { settings.repetition_penalty = rp; }

    let query = Query::from_parts(prompt, image).ok_or_else(|| anyhow!("give --prompt, --image, or both"))?;
    let targets = enumerate(&paths);
    println!("Found {} media files", targets.len());

    let service = build_service(config)?;
    let mut handle = service.submit(ScanRequest { query, targets, settings })?;

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("#>-"),
    );
    let mut results = Vec::new();
    while let Some(event) = handle.recv().await {
        match event {
            // Scan progress stays below 100; a 100 is the query image's caption.
            ScanEvent::Progress { percent: 100, label } => {
                pb.println(format!("🖼️  Query caption: {label}"));
            }
            ScanEvent::Progress { percent, label } => {
                pb.set_position(u64::from(percent));
                pb.set_message(label);
            }
            ScanEvent::Result(r) => {
                if r.is_strong_match() { pb.println(format!("★ {:.1}%  {}", r.score * 100.0, r.path.display())); }
                results.push(r);
            }
            ScanEvent::Completed => pb.set_position(100),
        }
    }
    let summary = handle.finish().await?;
    pb.finish_with_message("done");

    if let Some(err) = summary.error {
        bail!("scan failed: {err}");
    }
    print_results(&mut results);
    println!("📊 {} scored, {} skipped", summary.emitted, summary.skipped);
    Ok(())
}

async fn run_caption(config: &Config, image: PathBuf) -> anyhow::Result<()> {
    let service = build_service(config)?;
    let (events, summary) = service.caption_only(image.clone()).collect().await?;
    if let Some(err) = summary.error {
        bail!("could not caption {}: {err}", image.display());
    }
    let caption = events
        .into_iter()
        .find_map(|e| match e { ScanEvent::Progress { label, .. } => Some(label), _ => None })
        .context("no caption produced")?;
    println!("{caption}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "framefinder=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;

    match cli.command {
        Commands::Scan { prompt, image, mode, beams, min_tokens, length_penalty, repetition_penalty, paths } => {
            run_scan(&config, prompt, image, mode, beams, min_tokens, length_penalty, repetition_penalty, paths).await
        }
        Commands::Caption { image } => run_caption(&config, image).await,
        Commands::FetchModels => {
            let models = config.models()?;
            info!(caption = %models.caption_repo, retrieval = %models.retrieval_repo, "fetching models");
            tokio::task::spawn_blocking(move || prefetch(&models)).await??;
            println!("✅ Models cached");
            Ok(())
        }
    }
}
