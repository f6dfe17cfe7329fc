//! Compose a video from audio files and still images.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_media::{check_ffmpeg, check_ffprobe};
use reel_models::{CompositionOptions, JobStage, JobStatus, Resolution};
use reel_worker::{CompositionPipeline, CompositionRequest, JobController, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "reel-compose", version, about)]
struct Args {
    /// Audio file, in playback order (repeatable)
    #[arg(short, long = "audio", required = true)]
    audio: Vec<PathBuf>,

    /// Image file, in display order (repeatable)
    #[arg(short, long = "image", required = true)]
    image: Vec<PathBuf>,

    /// Where the finished video is written (overrides WORKER_OUTPUT_DIR)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[arg(long, default_value = "1920x1080")]
    resolution: Resolution,

    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Cross-fade length in seconds; 0 for hard cuts
    #[arg(long, default_value_t = 1.0)]
    transition: f64,

    #[arg(long)]
    ken_burns: bool,

    #[arg(long)]
    audio_visualization: bool,

    /// Tag used in the output file name
    #[arg(long)]
    label: Option<String>,
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("reel=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;
    let args = Args::parse();

    check_ffmpeg().context("ffmpeg is required")?;
    check_ffprobe().context("ffprobe is required")?;

    let mut config = WorkerConfig::from_env();
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    info!("Worker config: {:?}", config);

    let options = CompositionOptions {
        resolution: args.resolution,
        fps: args.fps,
        transition_duration_seconds: args.transition,
        ken_burns: args.ken_burns,
        audio_visualization: args.audio_visualization,
        ..CompositionOptions::default()
    };
    let mut request = CompositionRequest::new(args.audio, args.image).with_options(options);
    request.label = args.label;

    let pipeline = CompositionPipeline::new(config.clone());
    let controller = JobController::new(config, Arc::new(pipeline));
    let job_id = controller.submit(request).await?;

    let log_update = |status: &JobStatus| {
        if let Some(step) = status.step {
            info!(step = step.as_str(), percent = status.percent, "{}", status.message);
        }
    };
    let follow = controller.follow(&job_id, log_update);
    tokio::pin!(follow);
    let status = tokio::select! {
        status = &mut follow => status?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling job");
            controller.cancel(&job_id).await;
            follow.await?
        }
    };
    controller.shutdown();

    println!("{}", serde_json::to_string_pretty(&status)?);
    match status.stage {
        JobStage::Succeeded => Ok(()),
        stage => match status.error {
            Some(error) => bail!("job {}: {}", stage, error),
            None => bail!("job {}", stage),
        },
    }
}
