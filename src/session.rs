//! The engine session: one command in flight, one response out.
//!
//! [`EngineSession`] owns the supervised process behind a mutex, so callers
//! on different threads are served strictly one after another. Each cycle
//! discards stale output, writes the command, and waits on the stdout queue
//! against a deadline (long for move generation, short for everything else)
//! while watching stderr for a move that the engine may have reported there
//! instead.
//!
//! A cycle ends in one of four ways:
//!
//! - a line starting with `=` or `?` arrives on stdout ([`Reply::Complete`]);
//! - move generation got no marker but stderr named a well-formed vertex
//!   ([`Reply::Fallback`], best effort, the stderr format is not a contract);
//! - unmarked stdout text was collected before the deadline or process
//!   death ([`Reply::Partial`]);
//! - nothing usable arrived ([`Error::Timeout`] or [`Error::ProcessExited`]).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, Timeouts};
use crate::constants::{ERROR_MARKER, MOVE_GENERATION_COMMANDS, SUCCESS_MARKER};
use crate::coord::{Move, Vertex};
use crate::error::{Error, Result};
use crate::process::{EngineProcess, ShutdownReport};
use crate::readiness::{Quiescence, Readiness, wait_for_quiescence};
use crate::reader::{OutputQueue, Pop};
use crate::response::{self, Response, Status};

/// `= <vertex>` anywhere in a diagnostic line.
static MOVE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\s*([A-Za-z][0-9]+)\b").expect("valid move pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Starting,
    Ready,
    /// A command is in flight.
    Busy,
    Terminated,
}

/// Raw text produced by one command cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Stdout produced a marker line. Includes any continuation lines and
    /// the blank framing line.
    Complete(String),
    /// Synthesized `= <vertex>` from a move seen on stderr.
    Fallback(String),
    /// Unmarked stdout text collected before the cycle was cut short.
    Partial(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Complete(t) | Reply::Fallback(t) | Reply::Partial(t) => t,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Reply::Complete(t) | Reply::Fallback(t) | Reply::Partial(t) => t,
        }
    }
}

/// Whether `command` asks the engine to search for a move. A leading
/// numeric command id is ignored.
pub fn is_move_generation(command: &str) -> bool {
    let mut words = command.split_whitespace();
    let mut name = words.next();
    if name.is_some_and(|w| w.bytes().all(|b| b.is_ascii_digit())) {
        name = words.next();
    }
    name.is_some_and(|n| {
        MOVE_GENERATION_COMMANDS
            .iter()
            .any(|m| n.eq_ignore_ascii_case(m))
    })
}

pub fn deadline_for(command: &str, timeouts: &Timeouts) -> Duration {
    if is_move_generation(command) {
        timeouts.genmove
    } else {
        timeouts.command
    }
}

/// The last well-formed vertex announced as `= <vertex>` in `line`.
/// Malformed tokens are skipped silently.
pub fn move_candidate(line: &str) -> Option<Vertex> {
    MOVE_PATTERN
        .captures_iter(line)
        .filter_map(|caps| Vertex::parse(&caps[1]))
        .last()
}

fn is_marker(line: &str) -> bool {
    line.starts_with(SUCCESS_MARKER) || line.starts_with(ERROR_MARKER)
}

/// State gathered while one command is in flight.
struct Cycle<'a> {
    command: &'a str,
    move_generation: bool,
    started: Instant,
    stdout_lines: Vec<String>,
    stderr_lines: Vec<String>,
    candidate: Option<Vertex>,
}

enum Cutoff {
    Deadline,
    ProcessDied,
}

impl<'a> Cycle<'a> {
    fn new(command: &'a str) -> Self {
        Self {
            command,
            move_generation: is_move_generation(command),
            started: Instant::now(),
            stdout_lines: Vec::new(),
            stderr_lines: Vec::new(),
            candidate: None,
        }
    }

    /// Record a stdout line. Returns true when it completes the response.
    fn take_stdout(&mut self, line: String) -> bool {
        if is_marker(&line) {
            debug!(command = self.command, line = %line, "<- stdout");
            self.stdout_lines.push(line);
            return true;
        }
        // Blank lines before a marker are leftover framing.
        if !line.trim().is_empty() {
            debug!(command = self.command, line = %line, "<- stdout (unmarked)");
            self.stdout_lines.push(line);
        }
        false
    }

    fn take_stderr(&mut self, stderr: &OutputQueue) {
        for line in stderr.drain() {
            if self.move_generation {
                if let Some(vertex) = move_candidate(&line) {
                    debug!(command = self.command, %vertex, "move candidate on stderr");
                    self.candidate = Some(vertex);
                }
            }
            self.stderr_lines.push(line);
        }
    }

    /// After a marker line, pick up continuation lines until the blank
    /// framing line. Engines that never send it cost one settle interval.
    /// Never waits past `deadline`.
    fn settle(&mut self, stdout: &OutputQueue, settle: Duration, deadline: Duration) {
        loop {
            let elapsed = self.started.elapsed();
            if elapsed >= deadline {
                warn!(
                    command = self.command,
                    elapsed_ms = elapsed.as_millis() as u64,
                    lines = self.stdout_lines.len(),
                    "deadline reached while reading continuation lines"
                );
                return;
            }
            match stdout.pop_timeout(settle.min(deadline - elapsed)) {
                Pop::Line(line) if !line.trim().is_empty() => self.stdout_lines.push(line),
                _ => return,
            }
        }
    }

    fn complete(mut self, stderr: &OutputQueue) -> Reply {
        self.take_stderr(stderr);
        self.check_divergence();
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        let mut text = self.stdout_lines.join("\n");
        text.push_str("\n\n");
        info!(command = self.command, elapsed_ms, reply = %text.trim_end(), "response complete");
        Reply::Complete(text)
    }

    /// Stdout wins, but a different move on stderr means the two channels
    /// disagree about what the engine decided.
    fn check_divergence(&self) {
        let Some(candidate) = self.candidate else {
            return;
        };
        let parsed = response::parse(Some(&self.stdout_lines.join("\n")));
        if parsed.status != Status::Success {
            return;
        }
        if Move::parse(&parsed.content) != Some(Move::Play(candidate)) {
            warn!(
                command = self.command,
                stdout_move = %parsed.content,
                stderr_move = %candidate,
                stderr = ?self.stderr_lines,
                "engine reported conflicting moves on stdout and stderr, using stdout"
            );
        }
    }

    fn cut_short(self, cutoff: Cutoff) -> Result<Reply> {
        let elapsed = self.started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        let reason = match cutoff {
            Cutoff::Deadline => "deadline elapsed",
            Cutoff::ProcessDied => "engine exited",
        };

        if let Some(vertex) = self.candidate {
            warn!(
                command = self.command,
                elapsed_ms,
                reason,
                %vertex,
                stdout = ?self.stdout_lines,
                stderr = ?self.stderr_lines,
                "no answer on stdout, using move reported on stderr"
            );
            return Ok(Reply::Fallback(format!("{SUCCESS_MARKER} {vertex}\n\n")));
        }

        if !self.stdout_lines.is_empty() {
            warn!(
                command = self.command,
                elapsed_ms,
                reason,
                stdout = ?self.stdout_lines,
                stderr = ?self.stderr_lines,
                "returning partial response"
            );
            return Ok(Reply::Partial(self.stdout_lines.join("\n")));
        }

        match cutoff {
            Cutoff::Deadline => {
                warn!(
                    command = self.command,
                    elapsed_ms,
                    stderr = ?self.stderr_lines,
                    "engine response timed out"
                );
                Err(Error::Timeout {
                    command: self.command.to_string(),
                    elapsed,
                })
            }
            Cutoff::ProcessDied => {
                error!(
                    command = self.command,
                    elapsed_ms,
                    stderr = ?self.stderr_lines,
                    "engine exited before answering"
                );
                Err(Error::ProcessExited {
                    command: self.command.to_string(),
                })
            }
        }
    }
}

/// Wait for the answer to `command`, which has already been written.
///
/// Polls until a marker line arrives on `stdout`, `deadline` elapses, or
/// `is_alive` reports the process gone.
pub fn collect_reply(
    command: &str,
    stdout: &OutputQueue,
    stderr: &OutputQueue,
    mut is_alive: impl FnMut() -> bool,
    deadline: Duration,
    timeouts: &Timeouts,
) -> Result<Reply> {
    let mut cycle = Cycle::new(command);

    loop {
        let elapsed = cycle.started.elapsed();
        if elapsed >= deadline {
            cycle.take_stderr(stderr);
            return cycle.cut_short(Cutoff::Deadline);
        }

        if !is_alive() {
            // The reader may still hold what the engine wrote before exiting.
            while let Pop::Line(line) = stdout.pop_timeout(timeouts.settle) {
                if cycle.take_stdout(line) {
                    cycle.settle(stdout, timeouts.settle, deadline);
                    return Ok(cycle.complete(stderr));
                }
            }
            cycle.take_stderr(stderr);
            return cycle.cut_short(Cutoff::ProcessDied);
        }

        let wait = timeouts.poll_interval.min(deadline - elapsed);
        match stdout.pop_timeout(wait) {
            Pop::Line(line) => {
                if cycle.take_stdout(line) {
                    cycle.settle(stdout, timeouts.settle, deadline);
                    return Ok(cycle.complete(stderr));
                }
            }
            Pop::Empty => {}
            // Stream gone; the liveness check decides what that means.
            Pop::Closed => thread::sleep(wait),
        }

        cycle.take_stderr(stderr);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A supervised engine plus the half-duplex command cycle.
pub struct EngineSession {
    config: EngineConfig,
    state: Mutex<SessionState>,
    process: Mutex<Option<EngineProcess>>,
    /// Last observed liveness, refreshed on every poll of a running cycle.
    /// Read by [`is_alive`](Self::is_alive) while the process lock is held.
    running: AtomicBool,
}

impl EngineSession {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SessionState::NotStarted),
            process: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    fn set_state(&self, state: SessionState) {
        let mut current = lock(&self.state);
        if *current != state {
            debug!(from = ?*current, to = ?state, "session state");
            *current = state;
        }
    }

    /// Process id of the current engine, if one was started.
    pub fn pid(&self) -> Option<u32> {
        lock(&self.process).as_ref().map(EngineProcess::pid)
    }

    /// Whether the engine process is running. Never waits for a command in
    /// flight: while one is, the liveness last seen by its poll loop is
    /// reported.
    pub fn is_alive(&self) -> bool {
        let mut slot = match self.process.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return self.running.load(Ordering::SeqCst),
        };
        let alive = slot.as_mut().is_some_and(|process| process.is_alive());
        self.note_alive(alive)
    }

    fn note_alive(&self, alive: bool) -> bool {
        self.running.store(alive, Ordering::SeqCst);
        alive
    }

    /// Launch the engine and wait for it to settle.
    ///
    /// Readiness is inferred from output going quiet, which is a heuristic;
    /// [`Readiness::Unconfirmed`] means the startup window ran out first and
    /// the engine is left running for the caller to judge. When a readiness
    /// check is configured it must answer with success, otherwise the engine
    /// is stopped and [`Error::ReadyCheckFailed`] returned.
    pub fn start(&self) -> Result<Readiness> {
        let mut slot = lock(&self.process);
        if slot.as_mut().is_some_and(|p| p.is_alive()) {
            return Err(Error::AlreadyRunning);
        }

        self.config
            .validate()
            .inspect_err(|e| error!(error = %e, "engine configuration invalid"))?;
        self.set_state(SessionState::Starting);

        let mut process = EngineProcess::spawn(&self.config).inspect_err(|_| {
            self.set_state(SessionState::Terminated);
        })?;

        let timeouts = self.config.timeouts;
        let quiescence = {
            let (stdout, stderr, mut liveness) = process.split();
            wait_for_quiescence(
                stdout,
                stderr,
                || self.note_alive(liveness.check()),
                timeouts.startup_window,
                timeouts.quiescence,
                timeouts.poll_interval,
            )
        };

        let readiness = match quiescence {
            Quiescence::Quiet { elapsed, lines } => {
                info!(elapsed_ms = elapsed.as_millis() as u64, lines, "engine output went quiet, presuming ready");
                Readiness::Quiescent { elapsed }
            }
            Quiescence::WindowElapsed { elapsed, lines } => {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    lines,
                    "engine never went quiet during startup, readiness unconfirmed"
                );
                Readiness::Unconfirmed { elapsed }
            }
            Quiescence::Exited { lines } => {
                error!(lines, "engine exited during startup");
                process.shutdown(&timeouts);
                self.note_alive(false);
                self.set_state(SessionState::Terminated);
                return Err(Error::ExitedDuringStartup);
            }
        };

        *slot = Some(process);
        self.set_state(SessionState::Ready);

        let Some(command) = self.config.ready_check.clone() else {
            return Ok(readiness);
        };

        let parsed = match self.exchange_locked(&mut slot, &command) {
            Ok(reply) => response::parse(Some(reply.text())),
            Err(_) => Response::no_response(),
        };
        if parsed.is_success() {
            info!(command = %command, content = %parsed.content, "readiness check succeeded");
            return Ok(Readiness::Verified {
                command,
                content: parsed.content,
            });
        }

        error!(command = %command, status = %parsed.status, content = %parsed.content, "readiness check failed");
        if let Some(process) = slot.take() {
            process.shutdown(&timeouts);
        }
        self.note_alive(false);
        self.set_state(SessionState::Terminated);
        Err(Error::ReadyCheckFailed {
            command,
            content: parsed.content,
        })
    }

    /// Run one command cycle and report how it ended.
    pub fn exchange(&self, command: &str) -> Result<Reply> {
        let mut slot = lock(&self.process);
        self.exchange_locked(&mut slot, command)
    }

    fn exchange_locked(&self, slot: &mut Option<EngineProcess>, command: &str) -> Result<Reply> {
        let command = command.trim();
        if !slot.as_mut().is_some_and(|p| p.is_alive()) {
            warn!(command, "engine is not running");
            if slot.is_some() {
                self.set_state(SessionState::Terminated);
            }
            return Err(Error::NotRunning);
        }
        let Some(process) = slot.as_mut() else {
            return Err(Error::NotRunning);
        };

        let stale_out = process.stdout().drain();
        let stale_err = process.stderr().drain();
        if !stale_out.is_empty() || !stale_err.is_empty() {
            debug!(stdout = ?stale_out, stderr = ?stale_err, "discarding stale output");
        }

        self.set_state(SessionState::Busy);
        info!(command, "-> engine");
        if let Err(e) = process.write_line(command) {
            error!(command, error = %e, "failed to write command");
            let alive = process.is_alive();
            self.set_state(if alive {
                SessionState::Ready
            } else {
                SessionState::Terminated
            });
            return Err(e);
        }

        let timeouts = self.config.timeouts;
        let deadline = deadline_for(command, &timeouts);
        let result = {
            let (stdout, stderr, mut liveness) = process.split();
            collect_reply(
                command,
                stdout,
                stderr,
                || self.note_alive(liveness.check()),
                deadline,
                &timeouts,
            )
        };

        let alive = process.is_alive();
        self.set_state(if self.note_alive(alive) {
            SessionState::Ready
        } else {
            SessionState::Terminated
        });
        result
    }

    /// Send a command and return the raw response text, or `None` when
    /// nothing usable came back. Failures are logged, never raised.
    pub fn send(&self, command: &str) -> Option<String> {
        self.exchange(command).ok().map(Reply::into_text)
    }

    /// [`send`](Self::send) followed by [`response::parse`].
    pub fn request(&self, command: &str) -> Response {
        response::parse(self.send(command).as_deref())
    }

    /// Stop the engine. Returns `None` if it was never started.
    pub fn stop(&self) -> Option<ShutdownReport> {
        let process = lock(&self.process).take();
        let Some(process) = process else {
            debug!("stop requested with no engine process");
            return None;
        };
        let report = process.shutdown(&self.config.timeouts);
        self.note_alive(false);
        self.set_state(SessionState::Terminated);
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Sender;

    fn timeouts() -> Timeouts {
        Timeouts {
            command: Duration::from_millis(300),
            genmove: Duration::from_millis(600),
            poll_interval: Duration::from_millis(10),
            settle: Duration::from_millis(20),
            ..Timeouts::default()
        }
    }

    fn queues() -> (Sender<String>, OutputQueue, Sender<String>, OutputQueue) {
        let (out_tx, out) = OutputQueue::channel("stdout");
        let (err_tx, err) = OutputQueue::channel("stderr");
        (out_tx, out, err_tx, err)
    }

    fn run(command: &str, out: &OutputQueue, err: &OutputQueue, alive: bool) -> Result<Reply> {
        let t = timeouts();
        collect_reply(command, out, err, || alive, deadline_for(command, &t), &t)
    }

    #[test]
    fn test_classification() {
        assert!(is_move_generation("genmove W"));
        assert!(is_move_generation("GENMOVE b"));
        assert!(is_move_generation("7 genmove B"));
        assert!(is_move_generation("reg_genmove W"));
        assert!(!is_move_generation("play W D4"));
        assert!(!is_move_generation("genmove_analyze W"));
        assert!(!is_move_generation(""));

        let t = Timeouts::default();
        assert_eq!(deadline_for("genmove W", &t), t.genmove);
        assert_eq!(deadline_for("komi 6.5", &t), t.command);
    }

    #[test]
    fn test_move_candidate() {
        assert_eq!(move_candidate("chosen move = Q16 visits 800"), Vertex::parse("Q16"));
        assert_eq!(move_candidate("=D4"), Vertex::parse("D4"));
        assert_eq!(move_candidate("= Z99"), None);
        assert_eq!(move_candidate("= I5"), None);
        assert_eq!(move_candidate("= D20"), None);
        assert_eq!(move_candidate("= D04"), None);
        assert_eq!(move_candidate("winrate 0.53 lead 2.1"), None);
    }

    #[test]
    fn test_marker_completes_and_consumes_framing() {
        let (out_tx, out, _err_tx, err) = queues();
        out_tx.send("= D4".into()).unwrap();
        out_tx.send("".into()).unwrap();
        let reply = run("genmove W", &out, &err, true).unwrap();
        assert_eq!(reply, Reply::Complete("= D4\n\n".into()));
        assert!(out.drain().is_empty());
    }

    #[test]
    fn test_missing_blank_line_is_tolerated() {
        let (out_tx, out, _err_tx, err) = queues();
        out_tx.send("? unknown command".into()).unwrap();
        let start = Instant::now();
        let reply = run("foo", &out, &err, true).unwrap();
        assert!(start.elapsed() < timeouts().command);
        assert_eq!(response::parse(Some(reply.text())).content, "unknown command");
    }

    #[test]
    fn test_multiline_reply() {
        let (out_tx, out, _err_tx, err) = queues();
        for line in ["= play", "genmove", "quit", ""] {
            out_tx.send(line.into()).unwrap();
        }
        let reply = run("list_commands", &out, &err, true).unwrap();
        assert_eq!(
            response::parse(Some(reply.text())).content,
            "play\ngenmove\nquit"
        );
    }

    #[test]
    fn test_endless_continuation_stops_at_deadline() {
        let (out_tx, out, _err_tx, err) = queues();
        out_tx.send("= ok".into()).unwrap();
        let feeder = thread::spawn(move || {
            for i in 0..100 {
                if out_tx.send(format!("chatter {i}")).is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(5));
            }
        });

        let start = Instant::now();
        let reply = run("name", &out, &err, true).unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed < timeouts().command + Duration::from_millis(100), "{elapsed:?}");
        assert!(matches!(reply, Reply::Complete(_)));
        assert_eq!(response::parse(Some(reply.text())).status, Status::Success);
        feeder.join().unwrap();
    }

    #[test]
    fn test_stale_blank_line_is_skipped() {
        let (out_tx, out, _err_tx, err) = queues();
        out_tx.send("".into()).unwrap();
        out_tx.send("= ".into()).unwrap();
        out_tx.send("".into()).unwrap();
        let reply = run("clear_board", &out, &err, true).unwrap();
        assert_eq!(reply, Reply::Complete("= \n\n".into()));
    }

    #[test]
    fn test_fallback_from_stderr() {
        let (_out_tx, out, err_tx, err) = queues();
        err_tx.send("search done: best = Q16 winrate 0.51".into()).unwrap();
        let reply = run("genmove W", &out, &err, true).unwrap();
        assert_eq!(reply, Reply::Fallback("= Q16\n\n".into()));
        assert_eq!(response::parse(Some(reply.text())).content, "Q16");
    }

    #[test]
    fn test_malformed_candidate_is_never_used() {
        let (_out_tx, out, err_tx, err) = queues();
        err_tx.send("garbage = Z99".into()).unwrap();
        let result = run("genmove W", &out, &err, true);
        assert!(matches!(result, Err(Error::Timeout { .. })), "got {result:?}");
    }

    #[test]
    fn test_no_fallback_for_other_commands() {
        let (_out_tx, out, err_tx, err) = queues();
        err_tx.send("best = Q16".into()).unwrap();
        let result = run("komi 6.5", &out, &err, true);
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[test]
    fn test_partial_on_timeout() {
        let (out_tx, out, _err_tx, err) = queues();
        out_tx.send("thinking".into()).unwrap();
        let reply = run("showboard", &out, &err, true).unwrap();
        assert_eq!(reply, Reply::Partial("thinking".into()));
        assert_eq!(response::parse(Some(reply.text())).status, Status::Info);
    }

    #[test]
    fn test_timeout_boundaries() {
        let t = timeouts();
        let (_out_tx, out, _err_tx, err) = queues();

        let start = Instant::now();
        let result = run("komi 6.5", &out, &err, true);
        let short = start.elapsed();
        assert!(matches!(result, Err(Error::Timeout { .. })));
        assert!(short >= t.command);
        assert!(short < t.genmove);

        let start = Instant::now();
        let result = run("genmove B", &out, &err, true);
        assert!(matches!(result, Err(Error::Timeout { .. })));
        assert!(start.elapsed() >= t.genmove);
    }

    #[test]
    fn test_late_genmove_answer_within_long_deadline() {
        let (out_tx, out, _err_tx, err) = queues();
        let t = timeouts();
        let delay = t.command + Duration::from_millis(100);
        let feeder = thread::spawn(move || {
            thread::sleep(delay);
            out_tx.send("= K10".into()).unwrap();
            out_tx.send("".into()).unwrap();
            out_tx
        });
        let reply = run("genmove W", &out, &err, true).unwrap();
        let _out_tx = feeder.join().unwrap();
        assert_eq!(reply, Reply::Complete("= K10\n\n".into()));
    }

    #[test]
    fn test_process_death_with_nothing() {
        let (out_tx, out, _err_tx, err) = queues();
        drop(out_tx);
        let result = run("genmove W", &out, &err, false);
        assert!(matches!(result, Err(Error::ProcessExited { .. })));
    }

    #[test]
    fn test_process_death_keeps_queued_answer() {
        let (out_tx, out, _err_tx, err) = queues();
        out_tx.send("= pass".into()).unwrap();
        drop(out_tx);
        let reply = run("genmove W", &out, &err, false).unwrap();
        assert_eq!(reply, Reply::Complete("= pass\n\n".into()));
    }

    #[test]
    fn test_process_death_uses_fallback() {
        let (out_tx, out, err_tx, err) = queues();
        drop(out_tx);
        err_tx.send("= C3".into()).unwrap();
        let reply = run("genmove B", &out, &err, false).unwrap();
        assert_eq!(reply, Reply::Fallback("= C3\n\n".into()));
    }

    #[test]
    fn test_stdout_wins_over_divergent_stderr() {
        let (out_tx, out, err_tx, err) = queues();
        err_tx.send("= Q16".into()).unwrap();
        out_tx.send("= D4".into()).unwrap();
        out_tx.send("".into()).unwrap();
        let reply = run("genmove W", &out, &err, true).unwrap();
        assert_eq!(reply, Reply::Complete("= D4\n\n".into()));
    }

    #[test]
    fn test_send_without_start() {
        let session = EngineSession::new(EngineConfig::new("/none", "/none", "/none"));
        assert_eq!(session.send("name"), None);
        assert!(matches!(session.exchange("name"), Err(Error::NotRunning)));
        assert!(session.request("name").is_no_response());
        assert_eq!(session.state(), SessionState::NotStarted);
        assert!(session.stop().is_none());
    }

    #[test]
    fn test_start_with_missing_artifacts_spawns_nothing() {
        let session = EngineSession::new(EngineConfig::new(
            "/definitely/missing/engine",
            "/definitely/missing/model",
            "/definitely/missing/cfg",
        ));
        assert!(matches!(session.start(), Err(Error::MissingArtifact { .. })));
        assert_eq!(session.state(), SessionState::NotStarted);
        assert!(!session.is_alive());
    }
}
