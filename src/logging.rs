//! Diagnostic log setup.
//!
//! Every send/receive event of a session is recorded through `tracing`.
//! [`init`] installs the global subscriber once per process: a console layer
//! on stderr plus an append-only file layer with millisecond timestamps. The
//! file is truncated when it is opened here and never again. Calling `init` a
//! second time is a no-op that returns an empty guard.

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::constants::DEFAULT_LOG_FILE;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// File receiving the diagnostic log. `None` logs to the console only.
    pub file: Option<PathBuf>,
    /// Mirror events to stderr.
    pub console: bool,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            console: true,
            default_filter: "info,robogo=debug".to_string(),
        }
    }
}

/// Keeps the background log writer alive. Dropping it flushes the file.
#[must_use = "dropping the guard stops the file writer"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

pub fn init(options: &LogOptions) -> Result<LogGuard> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(LogGuard { _file: None });
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_filter));

    let mut guard = None;
    let file_layer = match &options.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            let (writer, worker) = tracing_appender::non_blocking(file);
            guard = Some(worker);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string())),
            )
        }
        None => None,
    };

    let console_layer = options.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(LogGuard { _file: guard })
}
