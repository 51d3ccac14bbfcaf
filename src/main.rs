//! m4a-transcode
//!
//! Converts the first audio stream of any FFmpeg-readable file to AAC in
//! an MP4/M4A container, keeping the source sample rate and channel layout.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m4a_transcode::{convert_with_config, LoggingConfig, TranscodeConfig, TranscodeError};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "m4a-transcode";

/// Exit status for bad command lines
const EXIT_USAGE: u8 = 2;

/// Conversion failures exit with this plus the magnitude of the error code
const EXIT_FAILURE_BASE: u8 = 10;

struct Args {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    json: bool,
}

fn usage() -> String {
    format!(
        "usage: {} <input> <output> [--config <file.toml>] [--json]",
        APP_NAME
    )
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut json = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config needs a file argument")?;
                config = Some(PathBuf::from(path));
            }
            "--json" => json = true,
            "--help" | "-h" => return Err(usage()),
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let mut positional = positional.into_iter();
    match (positional.next(), positional.next(), positional.next()) {
        (Some(input), Some(output), None) => Ok(Args {
            input,
            output,
            config,
            json,
        }),
        _ => Err(usage()),
    }
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let config = match &args.config {
        Some(path) => match TranscodeConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                return ExitCode::from(EXIT_USAGE);
            }
        },
        None => TranscodeConfig::default(),
    };

    init_logging(&config.logging);
    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::info!("FFmpeg version: {}", m4a_transcode::ffmpeg_version_info());

    if let Err(e) = m4a_transcode::init() {
        tracing::error!("{}", e);
        return failure_exit(&e);
    }
    m4a_transcode::install_log_filter(&config.logging.ffmpeg_level);

    match convert_with_config(&args.input, &args.output, &config) {
        Ok(summary) => {
            if args.json {
                match serde_json::to_string(&summary) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::warn!("cannot serialize summary: {}", e),
                }
            } else {
                println!(
                    "{} -> {}: {} {} Hz {} ch, {} frames, {} packets",
                    args.input.display(),
                    args.output.display(),
                    summary.input_codec,
                    summary.sample_rate,
                    summary.channels,
                    summary.output_frames,
                    summary.packets_written
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => failure_exit(&e),
    }
}

fn failure_exit(e: &TranscodeError) -> ExitCode {
    ExitCode::from(EXIT_FAILURE_BASE + e.code().unsigned_abs().min(100) as u8)
}

/// Initialize logging with tracing
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.clone().into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
