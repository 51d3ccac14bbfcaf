//! Transcoder configuration
//!
//! Every field has a default, so an absent or empty config file yields the
//! fixed conversion policy: 128 kbps AAC in an `mp4` container, encoder
//! sample format chosen by the encoder, sample rate and channel layout
//! copied from the source.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TranscodeError};

/// Default AAC target bit rate in bps
pub const DEFAULT_BIT_RATE: usize = 128_000;

/// Default destination container short name
pub const DEFAULT_CONTAINER: &str = "mp4";

/// Muxers that produce an MP4-family file
pub const MP4_FAMILY_CONTAINERS: &[&str] = &["mp4", "ipod", "mov"];

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter used when `RUST_LOG` is not set
    pub level: String,

    /// Output format (pretty, json)
    pub format: String,

    /// libav log level (quiet, error, warning, info)
    pub ffmpeg_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            ffmpeg_level: "error".to_string(),
        }
    }
}

/// Transcoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// AAC bit rate in bps
    pub bit_rate: usize,

    /// Output container short name
    pub container: String,

    /// Delete the destination file if the conversion fails before the
    /// trailer is written
    pub discard_incomplete_output: bool,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            bit_rate: DEFAULT_BIT_RATE,
            container: DEFAULT_CONTAINER.to_string(),
            discard_incomplete_output: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl TranscodeConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: TranscodeConfig = toml::from_str(&content).map_err(|e| {
            TranscodeError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| TranscodeError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.bit_rate == 0 {
            return Err(TranscodeError::Config("bit_rate must be non-zero".into()));
        }
        if !MP4_FAMILY_CONTAINERS.contains(&self.container.as_str()) {
            return Err(TranscodeError::Config(format!(
                "container '{}' is not an MP4-family format (expected one of {:?})",
                self.container, MP4_FAMILY_CONTAINERS
            )));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(TranscodeError::Config(format!(
                "unknown logging format '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }
}
