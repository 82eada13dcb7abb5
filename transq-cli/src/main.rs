//! Batch media transcoder
//!
//! Transcodes every input file into the output directory using the
//! transq-lib pipeline, with at most `-j` jobs running at once.

mod config;
mod config_file;
mod error;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transq_lib::media::MediaBackend;
use transq_lib::{
    AudioCodec, ContainerFormat, FfmpegBackend, JobRequest, Scheduler, TranscodeRunner,
    VideoCodec,
};

use crate::config::{AppConfig, LogFormat};
use crate::config_file::ConfigFile;
use crate::error::{CliError, Result};
use crate::report::Reporter;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "transq";

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_PATH: &str = "transq.toml";

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "transq", version, about = "Batch media transcoder")]
struct Args {
    /// Media files to transcode
    #[arg(required_unless_present = "generate_config")]
    inputs: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory the outputs are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Maximum number of jobs running at once
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Output file name template
    #[arg(long)]
    name_template: Option<String>,

    /// Output container (mp4, mov, mkv, avi, webm)
    #[arg(long)]
    container: Option<ContainerFormat>,

    /// Video codec (h264, h265, vp8, vp9, mjpeg, png, prores)
    #[arg(long)]
    video_codec: Option<VideoCodec>,

    /// Audio codec (aac, opus, mp3, flac, pcm_s16le, pcm_s32le)
    #[arg(long)]
    audio_codec: Option<AudioCodec>,

    /// Drop the video track
    #[arg(long)]
    no_video: bool,

    /// Drop the audio track
    #[arg(long)]
    no_audio: bool,

    /// Print job events as JSON lines
    #[arg(long)]
    json: bool,

    /// Write a default configuration file to PATH and exit
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(path) = &args.generate_config {
        return match config_file::generate_default_config(path) {
            Ok(()) => {
                println!("Wrote default configuration to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", APP_NAME, e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config);

    match run(args, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Config file first, then command-line overrides.
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigFile::from_file(path)?.into_app_config()?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            match ConfigFile::from_file(DEFAULT_CONFIG_PATH).and_then(ConfigFile::into_app_config) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!(
                        "Failed to load config file {}: {}. Using defaults.",
                        DEFAULT_CONFIG_PATH, e
                    );
                    AppConfig::default()
                }
            }
        }
        None => AppConfig::default(),
    };

    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(jobs) = args.jobs {
        config.concurrent_jobs = jobs;
    }
    if let Some(template) = &args.name_template {
        config.name_template = template.clone();
    }
    if let Some(container) = args.container {
        config.params.container = container;
    }
    if let Some(codec) = args.video_codec {
        config.params.video.codec = codec;
    }
    if let Some(codec) = args.audio_codec {
        config.params.audio.codec = codec;
    }
    if args.no_video {
        config.params.video.enabled = false;
    }
    if args.no_audio {
        config.params.audio.enabled = false;
    }
    if args.json {
        config.log_format = LogFormat::Json;
    }

    if config.concurrent_jobs == 0 {
        return Err(CliError::Config("at least one concurrent job is required".into()));
    }
    config.params.validate()?;
    Ok(config)
}

/// Initialize logging with tracing
fn init_logging(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter().into());
    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run(args: Args, config: AppConfig) -> Result<ExitCode> {
    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::info!("FFmpeg version: {}", transq_lib::ffmpeg_version_info());

    transq_lib::init()?;
    transq_lib::install_log_filter();

    std::fs::create_dir_all(&config.output_dir)?;
    tracing::debug!("Configuration loaded: {:?}", config);

    let backend: Arc<dyn MediaBackend> = Arc::new(FfmpegBackend::new());
    let runner = Arc::new(TranscodeRunner::new(backend.clone(), config.options.clone()));
    let scheduler = Scheduler::new(runner, config.concurrent_jobs);
    let mut events = scheduler.subscribe();
    let mut reporter = Reporter::new(args.json);

    let mut rejected = 0;
    for input in &args.inputs {
        let submitted = transq_lib::resolve_output_path(
            backend.as_ref(),
            &config.output_dir,
            &config.name_template,
            input,
            &config.params,
        )
        .and_then(|output| {
            scheduler.submit(JobRequest::new(input.clone(), output, config.params.clone()))
        });
        match submitted {
            Ok(id) => reporter.track(id, input),
            Err(e) => {
                rejected += 1;
                tracing::warn!(input = %input.display(), error = %e, "input rejected");
                reporter.rejected(input, &e);
            }
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    while !scheduler.summary().is_idle() {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => reporter.event(&event),
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                tracing::warn!("interrupted, cancelling all jobs");
                scheduler.cancel_all();
            }
            _ = tick.tick() => {}
        }
    }

    // Events published between the last recv and the idle check
    while let Ok(event) = events.try_recv() {
        reporter.event(&event);
    }

    let summary = scheduler.summary();
    tokio::task::spawn_blocking(move || scheduler.shutdown())
        .await
        .map_err(|e| CliError::Config(format!("scheduler shutdown: {}", e)))?;

    reporter.summary(&summary, rejected);
    tracing::info!(%summary, rejected, "batch finished");

    Ok(if interrupted {
        ExitCode::from(EXIT_INTERRUPTED)
    } else if summary.failed > 0 || rejected > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
