//! Startup readiness detection.
//!
//! Engines do not reliably announce that they are ready, so readiness is
//! inferred from silence: once neither output stream has produced a line for
//! the quiescence period, initialization is presumed finished. This is a
//! heuristic. A slow engine that goes quiet while still loading looks ready,
//! and a chatty engine that is ready may never look quiet. Callers that need
//! certainty should configure a readiness check (see
//! [`EngineConfig::ready_check`](crate::config::EngineConfig::ready_check)),
//! which the session runs as a real command after this detector finishes.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::reader::{OutputQueue, Pop};

/// Outcome of watching startup chatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quiescence {
    /// Output went silent for the required period.
    Quiet { elapsed: Duration, lines: usize },
    /// The startup window ran out while output kept arriving.
    WindowElapsed { elapsed: Duration, lines: usize },
    /// The process exited during startup.
    Exited { lines: usize },
}

/// How `start` concluded the engine was usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Silence was observed. Not a protocol guarantee.
    Quiescent { elapsed: Duration },
    /// No silence within the window. The engine may or may not be ready;
    /// the caller decides whether to continue.
    Unconfirmed { elapsed: Duration },
    /// The readiness check answered with success.
    Verified { command: String, content: String },
}

impl Readiness {
    /// True unless the startup window elapsed without any evidence.
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, Readiness::Unconfirmed { .. })
    }
}

/// Watch both queues until output stops for `quiet`, `window` runs out, or
/// the process dies. Observed lines are logged and discarded.
pub fn wait_for_quiescence(
    stdout: &OutputQueue,
    stderr: &OutputQueue,
    mut is_alive: impl FnMut() -> bool,
    window: Duration,
    quiet: Duration,
    poll: Duration,
) -> Quiescence {
    let start = Instant::now();
    let mut last_activity = start;
    let mut lines = 0;

    loop {
        let mut seen = 0;
        match stdout.pop_timeout(poll) {
            Pop::Line(line) => {
                debug!(stream = stdout.name(), line = %line, "startup output");
                seen += 1;
            }
            Pop::Empty => {}
            Pop::Closed => {
                if !is_alive() {
                    return Quiescence::Exited { lines };
                }
                thread::sleep(poll);
            }
        }
        for line in stdout.drain().into_iter().chain(stderr.drain()) {
            debug!(line = %line, "startup output");
            seen += 1;
        }

        let now = Instant::now();
        if seen > 0 {
            lines += seen;
            last_activity = now;
        }

        if !is_alive() {
            return Quiescence::Exited { lines };
        }
        if now.duration_since(last_activity) >= quiet {
            return Quiescence::Quiet {
                elapsed: now.duration_since(start),
                lines,
            };
        }
        if now.duration_since(start) >= window {
            return Quiescence::WindowElapsed {
                elapsed: now.duration_since(start),
                lines,
            };
        }
    }
}
