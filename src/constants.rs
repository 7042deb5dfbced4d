//! Constants for board geometry, protocol framing, and engine timing.
//!
//! Every timing value here is only a default; [`crate::config::Timeouts`]
//! carries the values actually used by a session so tests and callers can
//! shorten them.

use std::time::Duration;

// =============================================================================
// Board Geometry
// =============================================================================

/// Board size (NxN). The robot rig and the engine both play on 19x19.
pub const N: usize = 19;

/// GTP column letters, left to right. `I` is skipped by convention.
pub const COLUMNS: &[u8; N] = b"ABCDEFGHJKLMNOPQRST";

/// Column letter that GTP never uses.
pub const SKIPPED_COLUMN: u8 = b'I';

/// Komi sent at the start of every game.
pub const DEFAULT_KOMI: f32 = 6.5;

// =============================================================================
// GTP Framing
// =============================================================================

/// First character of a successful response line.
pub const SUCCESS_MARKER: char = '=';

/// First character of a failed response line.
pub const ERROR_MARKER: char = '?';

/// Command used to ask the engine to exit.
pub const QUIT_COMMAND: &str = "quit";

/// Commands whose latency is bounded by search time rather than I/O.
pub const MOVE_GENERATION_COMMANDS: &[&str] = &["genmove", "reg_genmove", "kgs-genmove_cleanup"];

/// Content reported by the parser when there was no response at all.
pub const NO_RESPONSE: &str = "no response";

// =============================================================================
// Deadlines
// =============================================================================

/// Deadline for ordinary commands.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for move generation (engine thinking budget).
pub const GENMOVE_TIMEOUT: Duration = Duration::from_secs(120);

/// How long a blocked wait on the output queue lasts before re-checking
/// the deadline and process liveness.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Extra wait for continuation lines after a marker line when the engine
/// has not yet sent the blank framing line.
pub const SETTLE_INTERVAL: Duration = Duration::from_millis(50);

// =============================================================================
// Startup and Shutdown
// =============================================================================

/// Upper bound on how long startup chatter is observed.
pub const STARTUP_WINDOW: Duration = Duration::from_secs(30);

/// Silence needed before the engine is presumed initialized.
pub const QUIESCENCE: Duration = Duration::from_secs(5);

/// Wait for a voluntary exit after `quit`.
pub const QUIT_GRACE: Duration = Duration::from_secs(5);

/// Wait for exit after a terminate signal, before killing outright.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(1);

// =============================================================================
// Engine Artifacts
// =============================================================================

/// Environment variable naming the engine binary.
pub const ENGINE_PATH_ENV: &str = "KATAGO_PATH";

/// Environment variable naming the network weights file.
pub const MODEL_PATH_ENV: &str = "KATAGO_MODEL_PATH";

/// Environment variable naming the engine's GTP configuration file.
pub const CONFIG_PATH_ENV: &str = "KATAGO_CONFIG_PATH";

/// Engine binary used when neither the environment nor `PATH` provide one.
pub const DEFAULT_ENGINE_PATH: &str = "/opt/homebrew/bin/katago";

pub const DEFAULT_MODEL_PATH: &str = "/opt/homebrew/Cellar/katago/1.16.3/share/katago/kata1-b28c512nbt-s9584861952-d4960414494.bin.gz";

pub const DEFAULT_CONFIG_PATH: &str =
    "/opt/homebrew/Cellar/katago/1.16.3/share/katago/configs/gtp_example.cfg";

/// Name of the engine binary looked up on `PATH`.
pub const ENGINE_BINARY_NAME: &str = "katago";

/// Diagnostic log written next to the working directory by default.
pub const DEFAULT_LOG_FILE: &str = "katago_debug_log.txt";
