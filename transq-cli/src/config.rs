//! Resolved CLI configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use transq_lib::{TranscodeOptions, TranscodeParams, DEFAULT_NAME_TEMPLATE};

/// Jobs run at once unless configured otherwise
pub const DEFAULT_CONCURRENT_JOBS: usize = 2;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format '{}'", s)),
        }
    }
}

/// Everything the batch run needs, after merging file and command line
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory the outputs are written to
    pub output_dir: PathBuf,

    /// Output file name template
    pub name_template: String,

    /// Concurrency cap for the scheduler
    pub concurrent_jobs: usize,

    /// Per-job transcode settings
    pub params: TranscodeParams,

    /// Orchestrator tuning
    pub options: TranscodeOptions,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            name_template: DEFAULT_NAME_TEMPLATE.to_string(),
            concurrent_jobs: DEFAULT_CONCURRENT_JOBS,
            params: TranscodeParams::default(),
            options: TranscodeOptions::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Default `EnvFilter` directive for the configured level
    pub fn log_filter(&self) -> String {
        format!("transq={0},transq_lib={0}", self.log_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.concurrent_jobs, 2);
        assert_eq!(config.name_template, DEFAULT_NAME_TEMPLATE);
        assert_eq!(config.log_filter(), "transq=info,transq_lib=info");
        assert!(config.params.validate().is_ok());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
