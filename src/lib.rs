pub mod api;
pub mod config;
pub mod error;
pub mod ffmpeg_utils;
pub mod transcode;

#[cfg(test)]
pub(crate) mod tests;

pub use api::*;
pub use config::{LoggingConfig, TranscodeConfig};
pub use error::{Result, TranscodeError};
pub use ffmpeg_utils::version_info as ffmpeg_version_info;
pub use ffmpeg_utils::{init, install_log_filter};
