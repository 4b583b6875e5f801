//! Logging initialization

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialize logging based on debug flag
///
/// With `debug`, everything at debug level goes to a temporary log file whose
/// path is returned. Otherwise warnings and errors go to stderr. `RUST_LOG`
/// overrides the level in both cases.
pub fn init_logging(debug: bool) -> Result<Option<PathBuf>> {
    if !debug {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter("warn"))
            .with_target(false)
            .init();
        return Ok(None);
    }

    let (file, path) = tempfile::Builder::new()
        .prefix("meshcfg-")
        .suffix(".log")
        .tempfile()
        .context("Failed to create log file")?
        .keep()
        .context("Failed to persist log file")?;

    // stdout carries the JSON output, so the log file gets no ANSI codes
    tracing_subscriber::fmt()
        .with_writer(file)
        .with_env_filter(env_filter("debug"))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    Ok(Some(path))
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}
