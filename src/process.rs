//! Engine process supervision.
//!
//! [`EngineProcess`] is the only owner of the child process and its pipes.
//! It validates the artifacts, spawns the engine with its stdout and stderr
//! handed straight to a [`StreamReader`], writes command lines, and shuts the
//! engine down with escalating force: `quit`, then a terminate signal, then
//! an unconditional kill.

use std::io::{self, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, Timeouts};
use crate::constants::QUIT_COMMAND;
use crate::error::{Error, Result};
use crate::reader::{OutputQueue, StreamReader};

/// How far shutdown had to escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStage {
    /// The process was already gone.
    AlreadyExited,
    /// It exited on its own after `quit`.
    Graceful,
    /// It exited after a terminate signal.
    Terminated,
    /// It had to be killed.
    Killed,
}

#[derive(Debug)]
pub struct ShutdownReport {
    pub stage: ShutdownStage,
    pub status: Option<ExitStatus>,
}

/// Mutable access to the child's exit status, split off from the queues so
/// both can be borrowed at once.
pub struct Liveness<'a>(&'a mut Child);

impl Liveness<'_> {
    pub fn check(&mut self) -> bool {
        matches!(self.0.try_wait(), Ok(None))
    }
}

pub struct EngineProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: Option<StreamReader>,
    stdout: OutputQueue,
    stderr: OutputQueue,
}

impl EngineProcess {
    /// Validate the artifacts and launch the engine. Nothing is spawned if
    /// any path is missing.
    pub fn spawn(config: &EngineConfig) -> Result<Self> {
        config.validate().inspect_err(|e| error!(error = %e, "engine configuration invalid"))?;

        let command_line = config.command_line();
        info!(command = %command_line, "launching engine");

        let mut child = Command::new(&config.engine_path)
            .args(config.argv())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                error!(command = %command_line, error = %source, "engine launch failed");
                Error::Launch {
                    command: command_line.clone(),
                    source,
                }
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Launch {
                command: command_line,
                source: io::Error::other("engine pipes were not captured"),
            });
        };

        let (reader, stdout, stderr) = match StreamReader::spawn(stdout, stderr) {
            Ok(parts) => parts,
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Launch {
                    command: command_line,
                    source,
                });
            }
        };

        info!(pid = child.id(), "engine launched");
        Ok(Self {
            child,
            stdin: Some(stdin),
            reader: Some(reader),
            stdout,
            stderr,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Whether the child has not exited yet.
    pub fn is_alive(&mut self) -> bool {
        Liveness(&mut self.child).check()
    }

    pub fn stdout(&self) -> &OutputQueue {
        &self.stdout
    }

    pub fn stderr(&self) -> &OutputQueue {
        &self.stderr
    }

    /// Borrow both queues together with a liveness check.
    pub fn split(&mut self) -> (&OutputQueue, &OutputQueue, Liveness<'_>) {
        (&self.stdout, &self.stderr, Liveness(&mut self.child))
    }

    /// Write `line` plus a newline and flush.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(Error::NotRunning)?;
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    /// Stop the engine and the reader threads.
    pub fn shutdown(mut self, timeouts: &Timeouts) -> ShutdownReport {
        if let Some(reader) = &self.reader {
            reader.signal_stop();
        }

        let stage = self.escalate(timeouts);
        let status = self.child.try_wait().ok().flatten();

        if let Some(reader) = self.reader.take() {
            reader.join();
        }
        info!(?stage, ?status, "engine stopped");
        ShutdownReport { stage, status }
    }

    fn escalate(&mut self, timeouts: &Timeouts) -> ShutdownStage {
        if !self.is_alive() {
            self.stdin = None;
            return ShutdownStage::AlreadyExited;
        }

        debug!("asking engine to quit");
        if let Err(e) = self.write_line(QUIT_COMMAND) {
            warn!(error = %e, "failed to send quit");
        }
        // Closing stdin lets engines that ignore `quit` see end of input.
        self.stdin = None;
        if self.wait_for_exit(timeouts.quit_grace, timeouts.poll_interval) {
            return ShutdownStage::Graceful;
        }

        warn!(grace = ?timeouts.quit_grace, "engine ignored quit, terminating");
        if let Err(e) = self.terminate() {
            warn!(error = %e, "terminate signal failed");
        }
        if self.wait_for_exit(timeouts.terminate_grace, timeouts.poll_interval) {
            return ShutdownStage::Terminated;
        }

        warn!(grace = ?timeouts.terminate_grace, "engine survived terminate, killing");
        if let Err(e) = self.child.kill() {
            error!(error = %e, "kill failed");
        }
        let _ = self.child.wait();
        ShutdownStage::Killed
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.child.id() as i32), Signal::SIGTERM).map_err(|e| Error::Signal {
            signal: "SIGTERM",
            reason: e.to_string(),
        })
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> Result<()> {
        self.child.kill().map_err(Error::from)
    }

    fn wait_for_exit(&mut self, grace: Duration, poll: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            if !self.is_alive() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(poll.min(deadline - now));
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        reader.signal_stop();
        if self.is_alive() {
            warn!(pid = self.child.id(), "engine dropped while running, killing");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
        self.stdin = None;
        reader.join();
    }
}
