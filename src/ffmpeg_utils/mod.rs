//! FFmpeg module - provides wrappers and utilities for FFmpeg library access
//!
//! This module handles:
//! - FFmpeg initialization
//! - Routing libav log output through `tracing`
//! - Raw field access the safe bindings do not expose (`helpers`)
//! - Timebase conversion and other utilities

pub mod helpers;
pub mod utils;

pub use ffmpeg_next as ffmpeg;
#[allow(unused_imports)]
pub use utils::*;

use crate::error::TranscodeError;

/// Initialize the FFmpeg library.
///
/// Safe to call more than once; `convert` calls it on every invocation.
pub fn init() -> Result<(), TranscodeError> {
    ffmpeg::init()
        .map_err(|e| TranscodeError::Init(format!("ffmpeg::init() failed: {}", e)))?;

    tracing::debug!("FFmpeg initialized");

    Ok(())
}

/// Map a config level name to the libav log level constant.
pub fn ffmpeg_log_level(name: &str) -> Option<i32> {
    let level = match name {
        "quiet" => ffmpeg::ffi::AV_LOG_QUIET as i32,
        "error" => ffmpeg::ffi::AV_LOG_ERROR as i32,
        "warning" => ffmpeg::ffi::AV_LOG_WARNING as i32,
        "info" => ffmpeg::ffi::AV_LOG_INFO as i32,
        "debug" => ffmpeg::ffi::AV_LOG_DEBUG as i32,
        _ => return None,
    };
    Some(level)
}

/// Install a libav log callback that forwards messages to `tracing` and
/// drops known-benign noise.
///
/// Must be called after `init()` and before any conversion starts, because
/// the log callback and level are process-global.
pub fn install_log_filter(level: &str) {
    let av_level = ffmpeg_log_level(level).unwrap_or_else(|| {
        tracing::warn!(level, "unknown ffmpeg log level, using 'error'");
        ffmpeg::ffi::AV_LOG_ERROR as i32
    });

    // SAFETY: both functions modify global FFmpeg state and are safe to call
    // after `ffmpeg::init()`. They are called once at startup, before any
    // conversion runs.
    unsafe {
        ffmpeg::ffi::av_log_set_level(av_level);
        ffmpeg::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

/// Messages that are expected when transcoding whole files and should be suppressed.
const SUPPRESSED_MESSAGES: &[&str] = &[
    "Could not update timestamps for skipped samples",
    "Could not update timestamps for discarded samples",
    "Estimating duration from bitrate, this may be inaccurate",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > unsafe { ffmpeg::ffi::av_log_get_level() } {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();
    if msg.is_empty() {
        return;
    }

    for suppressed in SUPPRESSED_MESSAGES {
        if msg.contains(suppressed) {
            return;
        }
    }

    if level <= ffmpeg::ffi::AV_LOG_ERROR as std::ffi::c_int {
        tracing::error!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg::ffi::AV_LOG_WARNING as std::ffi::c_int {
        tracing::warn!(target: "ffmpeg", "{}", msg);
    } else {
        tracing::debug!(target: "ffmpeg", "{}", msg);
    }
}

/// Version of the linked libavcodec, as `major.minor.micro`.
pub fn version_info() -> String {
    let v = ffmpeg::codec::version();
    format!("libavcodec {}.{}.{}", v >> 16, (v >> 8) & 0xff, v & 0xff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_names() {
        assert_eq!(
            ffmpeg_log_level("error"),
            Some(ffmpeg::ffi::AV_LOG_ERROR as i32)
        );
        assert_eq!(
            ffmpeg_log_level("warning"),
            Some(ffmpeg::ffi::AV_LOG_WARNING as i32)
        );
        assert_eq!(ffmpeg_log_level("verbose-ish"), None);
    }

    #[test]
    fn test_version_info() {
        assert!(version_info().starts_with("libavcodec "));
    }
}
