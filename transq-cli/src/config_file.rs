//! Configuration file support
//!
//! Loads batch settings from TOML files. Every key is optional; missing keys
//! keep the built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use transq_lib::media::{ChannelLayout, PixelFormat};
use transq_lib::{AudioCodec, ContainerFormat, VideoCodec};

use crate::config::{AppConfig, LogFormat};
use crate::error::{CliError, Result};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Output location and naming
    pub output: OutputSettings,
    /// Video track settings
    pub video: VideoSettings,
    /// Audio track settings
    pub audio: AudioSettings,
    /// Concurrency and threading
    pub performance: PerformanceSettings,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory outputs are written to
    pub directory: Option<PathBuf>,
    /// File name template
    pub name_template: Option<String>,
    /// Container (mp4, mov, mkv, avi, webm)
    pub container: Option<String>,
    /// Keep the partial file of a cancelled or failed job
    pub keep_partial: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub enabled: Option<bool>,
    /// h264, h265, vp8, vp9, mjpeg, png, prores
    pub codec: Option<String>,
    /// Output pixel format, `source` keeps the input format
    pub pixel_format: Option<String>,
    /// 0 keeps the source width
    pub width: Option<u32>,
    /// 0 keeps the source height
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub crf: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub enabled: Option<bool>,
    /// aac, opus, mp3, flac, pcm_s16le, pcm_s32le
    pub codec: Option<String>,
    /// mono, stereo, 5.1, ... or `source`
    pub channel_layout: Option<String>,
    /// Hz; 0 keeps the source rate
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSettings {
    /// Jobs transcoded at once
    pub concurrent_jobs: Option<usize>,
    pub decode_threads: Option<usize>,
    pub encode_threads: Option<usize>,
    /// Seconds of output produced per interleaving round
    pub round_quantum_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

const SOURCE: &str = "source";

fn parse<T>(value: &str, what: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| CliError::Config(format!("{}: {}", what, e)))
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let app = AppConfig::default();
        let params = &app.params;
        Self {
            output: OutputSettings {
                directory: Some(app.output_dir.clone()),
                name_template: Some(app.name_template.clone()),
                container: Some(params.container.extension().to_string()),
                keep_partial: Some(app.options.keep_partial_output),
            },
            video: VideoSettings {
                enabled: Some(params.video.enabled),
                codec: Some(params.video.codec.display_name().to_ascii_lowercase()),
                pixel_format: Some(
                    params
                        .video
                        .pixel_format
                        .map(|p| p.name().to_string())
                        .unwrap_or_else(|| SOURCE.to_string()),
                ),
                width: Some(params.video.width),
                height: Some(params.video.height),
                fps: Some(params.video.fps),
                crf: Some(params.video.crf),
            },
            audio: AudioSettings {
                enabled: Some(params.audio.enabled),
                codec: Some(params.audio.codec.display_name().to_ascii_lowercase()),
                channel_layout: Some(SOURCE.to_string()),
                sample_rate: Some(0),
            },
            performance: PerformanceSettings {
                concurrent_jobs: Some(app.concurrent_jobs),
                decode_threads: Some(params.threads.decode),
                encode_threads: Some(params.threads.encode),
                round_quantum_secs: Some(app.options.round_quantum_secs),
            },
            logging: Some(LoggingSettings {
                level: app.log_level.clone(),
                format: Some("pretty".to_string()),
            }),
        }
    }

    /// Apply the file on top of the defaults.
    pub fn into_app_config(self) -> Result<AppConfig> {
        let mut app = AppConfig::default();

        if let Some(dir) = self.output.directory {
            app.output_dir = dir;
        }
        if let Some(template) = self.output.name_template {
            app.name_template = template;
        }
        if let Some(container) = self.output.container {
            app.params.container = parse::<ContainerFormat>(&container, "output.container")?;
        }
        if let Some(keep) = self.output.keep_partial {
            app.options.keep_partial_output = keep;
        }

        let video = &mut app.params.video;
        if let Some(enabled) = self.video.enabled {
            video.enabled = enabled;
        }
        if let Some(codec) = self.video.codec {
            video.codec = parse::<VideoCodec>(&codec, "video.codec")?;
        }
        if let Some(pf) = self.video.pixel_format {
            video.pixel_format = if pf.eq_ignore_ascii_case(SOURCE) {
                None
            } else {
                Some(parse::<PixelFormat>(&pf, "video.pixel_format")?)
            };
        }
        video.width = self.video.width.unwrap_or(video.width);
        video.height = self.video.height.unwrap_or(video.height);
        video.fps = self.video.fps.unwrap_or(video.fps);
        video.crf = self.video.crf.unwrap_or(video.crf);

        let audio = &mut app.params.audio;
        if let Some(enabled) = self.audio.enabled {
            audio.enabled = enabled;
        }
        if let Some(codec) = self.audio.codec {
            audio.codec = parse::<AudioCodec>(&codec, "audio.codec")?;
        }
        if let Some(layout) = self.audio.channel_layout {
            audio.channel_layout = if layout.eq_ignore_ascii_case(SOURCE) {
                None
            } else {
                Some(parse::<ChannelLayout>(&layout, "audio.channel_layout")?)
            };
        }
        if let Some(rate) = self.audio.sample_rate {
            audio.sample_rate = (rate > 0).then_some(rate);
        }

        let perf = self.performance;
        app.concurrent_jobs = perf.concurrent_jobs.unwrap_or(app.concurrent_jobs);
        app.params.threads.decode = perf.decode_threads.unwrap_or(app.params.threads.decode);
        app.params.threads.encode = perf.encode_threads.unwrap_or(app.params.threads.encode);
        if let Some(quantum) = perf.round_quantum_secs {
            if !(quantum.is_finite() && quantum > 0.0) {
                return Err(CliError::Config(format!(
                    "performance.round_quantum_secs must be positive, got {}",
                    quantum
                )));
            }
            app.options.round_quantum_secs = quantum;
        }

        if let Some(logging) = self.logging {
            app.log_level = logging.level;
            if let Some(format) = logging.format {
                app.log_format = parse::<LogFormat>(&format, "logging.format")?;
            }
        }

        Ok(app)
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
