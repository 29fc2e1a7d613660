//! Tracing subscriber setup for the command-line tool

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter for `level`, letting `RUST_LOG` override it when set.
///
/// Unknown levels fall back to `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.trim().to_ascii_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Resolve the configured log file setting. Empty or blank means no file.
pub fn log_file_path(setting: &str) -> Option<&Path> {
    if setting.trim().is_empty() {
        None
    } else {
        Some(Path::new(setting))
    }
}

/// Install the global subscriber: stderr output plus an optional append-mode
/// log file.
///
/// A log file that cannot be opened is reported and skipped; console logging
/// still works.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut file_error = None;
    let file_layer = match log_file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            ),
            Err(e) => {
                file_error = Some((path.to_path_buf(), e));
                None
            }
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    if let Some((path, e)) = file_error {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Could not open log file; logging to console only"
        );
    }

    Ok(())
}
