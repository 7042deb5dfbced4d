//! Engine launch configuration.
//!
//! The engine is always invoked as
//! `<engine> gtp -model <model> -config <config>`. All three paths come from
//! the caller, the environment, or built-in defaults, and all three must
//! exist before a process is spawned.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    COMMAND_TIMEOUT, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, DEFAULT_ENGINE_PATH, DEFAULT_MODEL_PATH,
    ENGINE_BINARY_NAME, ENGINE_PATH_ENV, GENMOVE_TIMEOUT, MODEL_PATH_ENV, POLL_INTERVAL, QUIESCENCE,
    QUIT_GRACE, SETTLE_INTERVAL, STARTUP_WINDOW, TERMINATE_GRACE,
};
use crate::error::{Error, Result};

/// Every deadline and grace period a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Deadline for ordinary commands.
    pub command: Duration,
    /// Deadline for move generation.
    pub genmove: Duration,
    /// Slice of a blocked wait before the deadline and liveness are re-checked.
    pub poll_interval: Duration,
    /// Wait for continuation lines after a marker line.
    pub settle: Duration,
    /// Upper bound on observing startup chatter.
    pub startup_window: Duration,
    /// Silence that counts as "initialized".
    pub quiescence: Duration,
    pub quit_grace: Duration,
    pub terminate_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: COMMAND_TIMEOUT,
            genmove: GENMOVE_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            settle: SETTLE_INTERVAL,
            startup_window: STARTUP_WINDOW,
            quiescence: QUIESCENCE,
            quit_grace: QUIT_GRACE,
            terminate_grace: TERMINATE_GRACE,
        }
    }
}

/// Paths and timing for one engine session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub engine_path: PathBuf,
    pub model_path: PathBuf,
    pub config_path: PathBuf,
    pub timeouts: Timeouts,
    /// Command sent after startup to confirm the engine really answers.
    /// Must produce a success response for `start` to succeed.
    pub ready_check: Option<String>,
}

impl EngineConfig {
    pub fn new(
        engine_path: impl Into<PathBuf>,
        model_path: impl Into<PathBuf>,
        config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine_path: engine_path.into(),
            model_path: model_path.into(),
            config_path: config_path.into(),
            timeouts: Timeouts::default(),
            ready_check: None,
        }
    }

    /// Resolve paths from `KATAGO_PATH`, `KATAGO_MODEL_PATH` and
    /// `KATAGO_CONFIG_PATH`, falling back to defaults.
    pub fn from_env() -> Self {
        let engine = env::var_os(ENGINE_PATH_ENV)
            .map(PathBuf::from)
            .or_else(|| find_on_path(ENGINE_BINARY_NAME))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENGINE_PATH));
        let model = env::var_os(MODEL_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));
        let config = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::new(engine, model, config)
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_ready_check(mut self, command: impl Into<String>) -> Self {
        self.ready_check = Some(command.into());
        self
    }

    /// Check that the engine, model and config all exist.
    pub fn validate(&self) -> Result<()> {
        for (kind, path) in [
            ("engine executable", &self.engine_path),
            ("model file", &self.model_path),
            ("config file", &self.config_path),
        ] {
            if !path.exists() {
                return Err(Error::MissingArtifact {
                    kind,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Arguments passed to the engine binary.
    pub fn argv(&self) -> Vec<OsString> {
        vec![
            "gtp".into(),
            "-model".into(),
            self.model_path.clone().into_os_string(),
            "-config".into(),
            self.config_path.clone().into_os_string(),
        ]
    }

    /// The full invocation as one printable line, for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.engine_path.display().to_string();
        for arg in self.argv() {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

fn find_on_path(binary: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_file(candidate))
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}
