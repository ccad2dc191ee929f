//! Offline replay of an image sequence through the guidance pipeline.
//!
//! Usage: `gcap-replay <input-dir> <output-dir> [--fps N]`

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use gcap_pipeline::metrics::init_metrics;
use gcap_pipeline::{GuidancePipeline, PipelineConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

struct Args {
    input: PathBuf,
    output: PathBuf,
    fps: f64,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut fps = 30.0;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--fps" {
            let value = args.next().context("--fps needs a value")?;
            fps = value.parse().with_context(|| format!("invalid --fps value: {value}"))?;
        } else {
            positional.push(PathBuf::from(arg));
        }
    }
    if positional.len() != 2 {
        bail!("usage: gcap-replay <input-dir> <output-dir> [--fps N]");
    }
    if !(fps > 0.0) {
        bail!("--fps must be positive");
    }
    let output = positional.pop().context("missing output dir")?;
    let input = positional.pop().context("missing input dir")?;
    Ok(Args { input, output, fps })
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gcap=info"));

    // Stdout carries the JSON guidance stream; logs go to stderr.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();
    Ok(frames)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = parse_args()?;

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Failed to install metrics recorder: {}", e);
            None
        }
    };

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let frames = list_frames(&args.input)?;
    if frames.is_empty() {
        bail!("no images found in {}", args.input.display());
    }
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let pipeline = GuidancePipeline::new(config)?;
    let captures = Arc::new(AtomicU64::new(0));

    pipeline.on_guidance_updated(|result| {
        let Some(result) = result else { return };
        match serde_json::to_string(&result) {
            Ok(line) => println!("{line}"),
            Err(e) => error!("Failed to serialize guidance: {}", e),
        }
    });

    {
        let source = pipeline.frame_source();
        let output = args.output.clone();
        let captures = Arc::clone(&captures);
        pipeline.on_capture_triggered(move |event| {
            let Some(frame) = source.latest_shared() else {
                warn!(sequence = event.sequence, "Capture triggered without a frame");
                return;
            };
            let path = output.join(format!("capture_{:04}.png", event.sequence));
            match frame.save(&path) {
                Ok(()) => {
                    captures.fetch_add(1, Ordering::Relaxed);
                    info!(path = %path.display(), "Saved capture");
                }
                Err(e) => error!(path = %path.display(), "Failed to save capture: {}", e),
            }
        });
    }

    pipeline.start()?;
    pipeline.set_processing_active(true);

    let interval = Duration::from_secs_f64(1.0 / args.fps);
    info!(frames = frames.len(), fps = args.fps, "Replaying");
    for path in &frames {
        match image::open(path) {
            Ok(image) => pipeline.process_frame(&image.to_rgb8()),
            Err(e) => warn!(path = %path.display(), "Skipping unreadable frame: {}", e),
        }
        std::thread::sleep(interval);
    }

    // Let the workers drain the last frame before shutting down.
    std::thread::sleep(interval * 3);
    pipeline.stop();

    info!(
        frames = frames.len(),
        captures = captures.load(Ordering::Relaxed),
        "Replay finished"
    );
    if let Some(handle) = metrics {
        info!("Metrics snapshot:\n{}", handle.render());
    }
    Ok(())
}
