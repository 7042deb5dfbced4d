//! Integration tests for engine sessions.
//!
//! The crate's own binary stands in for the engine: `robogo gtp -model <m>
//! -config <c>` runs the simulated engine, and the config file scripts how it
//! misbehaves.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use robogo::config::{EngineConfig, Timeouts};
use robogo::error::Error;
use robogo::process::ShutdownStage;
use robogo::readiness::Readiness;
use robogo::response::Status;
use robogo::session::{EngineSession, Reply, SessionState};
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

const ENGINE: &str = env!("CARGO_BIN_EXE_robogo");

fn timeouts() -> Timeouts {
    Timeouts {
        command: Duration::from_secs(1),
        genmove: Duration::from_secs(3),
        poll_interval: Duration::from_millis(10),
        settle: Duration::from_millis(50),
        startup_window: Duration::from_secs(5),
        quiescence: Duration::from_millis(200),
        quit_grace: Duration::from_secs(2),
        terminate_grace: Duration::from_secs(1),
    }
}

/// A model file plus a simulator config holding `sim_config`.
struct Fixture {
    dir: TempDir,
    model: PathBuf,
    config: PathBuf,
}

impl Fixture {
    fn new(sim_config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.bin.gz");
        let config = dir.path().join("gtp.cfg");
        fs::write(&model, b"not really a network").unwrap();
        fs::write(&config, sim_config).unwrap();
        Self { dir, model, config }
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(ENGINE, &self.model, &self.config).with_timeouts(timeouts())
    }

    fn session(&self) -> EngineSession {
        EngineSession::new(self.engine_config())
    }

    fn started(&self) -> EngineSession {
        let session = self.session();
        let readiness = session.start().unwrap();
        assert!(
            matches!(readiness, Readiness::Quiescent { .. }),
            "unexpected readiness {readiness:?}"
        );
        assert_eq!(session.state(), SessionState::Ready);
        session
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_game_setup_and_genmove() {
    let fx = Fixture::new("moves = D4\n");
    let session = fx.started();

    for command in ["boardsize 19", "clear_board", "komi 6.5"] {
        let r = session.request(command);
        assert_eq!(r.status, Status::Success, "{command}: {r:?}");
    }

    let r = session.request("play B Q16");
    assert_eq!(r.status, Status::Success);

    let r = session.request("genmove W");
    assert_eq!(r.status, Status::Success);
    assert_eq!(r.content, "D4");

    // Legality is the engine's call; its `?` comes back as an ordinary error.
    let r = session.request("play B D4");
    assert_eq!(r.status, Status::Error);
    assert_eq!(r.content, "illegal move");

    let report = session.stop().unwrap();
    assert_eq!(report.stage, ShutdownStage::Graceful);
    assert_eq!(session.state(), SessionState::Terminated);
    assert!(session.send("name").is_none());
}

#[test]
fn test_command_ids_are_stripped() {
    let fx = Fixture::new("");
    let session = fx.started();
    let r = session.request("7 name");
    assert_eq!(r.status, Status::Success);
    assert_eq!(r.content, "robogo-sim");
    session.stop();
}

#[test]
fn test_multiline_response() {
    let fx = Fixture::new("");
    let session = fx.started();
    let r = session.request("list_commands");
    assert_eq!(r.status, Status::Success);
    assert!(r.content.lines().any(|l| l == "genmove"));
    assert!(r.content.lines().any(|l| l == "quit"));
    session.stop();
}

#[test]
fn test_missing_blank_line_still_completes() {
    let fx = Fixture::new("blank_line = false\nmoves = K10\n");
    let session = fx.started();
    assert_eq!(session.request("name").content, "robogo-sim");
    assert_eq!(session.request("genmove W").content, "K10");
    session.stop();
}

#[test]
fn test_start_twice() {
    let fx = Fixture::new("");
    let session = fx.started();
    assert!(matches!(session.start(), Err(Error::AlreadyRunning)));
    session.stop();
}

#[test]
fn test_missing_model_spawns_nothing() {
    let fx = Fixture::new("");
    let mut config = fx.engine_config();
    config.model_path = fx.dir.path().join("absent.bin.gz");
    let session = EngineSession::new(config);

    match session.start() {
        Err(Error::MissingArtifact { kind, path }) => {
            assert_eq!(kind, "model file");
            assert!(path.ends_with("absent.bin.gz"));
        }
        other => panic!("expected missing model, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::NotStarted);
    assert!(!session.is_alive());
    assert!(session.stop().is_none());
}

#[cfg(unix)]
#[test]
fn test_non_executable_engine_fails_to_launch() {
    let fx = Fixture::new("");
    let mut config = fx.engine_config();
    config.engine_path = fx.config.clone();
    let session = EngineSession::new(config);
    assert!(matches!(session.start(), Err(Error::Launch { .. })));
}

#[test]
fn test_send_before_start() {
    let fx = Fixture::new("");
    let session = fx.session();
    assert!(session.send("name").is_none());
    assert!(session.request("name").is_no_response());
    assert_eq!(session.state(), SessionState::NotStarted);
}

// =============================================================================
// Shutdown escalation
// =============================================================================

fn short_grace(fx: &Fixture) -> EngineSession {
    let mut config = fx.engine_config();
    config.timeouts.quit_grace = Duration::from_millis(300);
    config.timeouts.terminate_grace = Duration::from_millis(300);
    let session = EngineSession::new(config);
    session.start().unwrap();
    session
}

#[cfg(unix)]
#[test]
fn test_engine_ignoring_quit_is_terminated() {
    let fx = Fixture::new("ignore_quit = true\n");
    let session = short_grace(&fx);

    let start = Instant::now();
    let report = session.stop().unwrap();
    let elapsed = start.elapsed();
    assert_eq!(report.stage, ShutdownStage::Terminated);
    assert!(report.status.is_some());
    assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    assert!(!session.is_alive());
}

#[cfg(unix)]
#[test]
fn test_engine_ignoring_terminate_is_killed() {
    let fx = Fixture::new("ignore_quit = true\nignore_term = true\n");
    let session = short_grace(&fx);

    let start = Instant::now();
    let report = session.stop().unwrap();
    let elapsed = start.elapsed();
    assert_eq!(report.stage, ShutdownStage::Killed);
    assert!(elapsed >= Duration::from_millis(600), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    assert_eq!(session.state(), SessionState::Terminated);
}

#[cfg(unix)]
#[test]
fn test_dropping_session_reaps_engine() {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let fx = Fixture::new("");
    let session = fx.started();
    let pid = Pid::from_raw(session.pid().unwrap() as i32);
    assert_eq!(kill(pid, None), Ok(()));

    drop(session);
    assert_eq!(kill(pid, None), Err(Errno::ESRCH));
}

#[test]
fn test_restart_after_engine_died() {
    let fx = Fixture::new("exit_on = genmove\n");
    let session = fx.started();
    assert!(session.exchange("genmove W").is_err());
    assert_eq!(session.state(), SessionState::Terminated);

    // The dead process is replaced, and its reader threads are joined.
    assert!(matches!(session.start(), Ok(Readiness::Quiescent { .. })));
    assert_eq!(session.request("name").content, "robogo-sim");
    session.stop();
}

// =============================================================================
// Readiness check
// =============================================================================

#[test]
fn test_ready_check_verifies_readiness() {
    let fx = Fixture::new("");
    let session = EngineSession::new(fx.engine_config().with_ready_check("name"));
    match session.start().unwrap() {
        Readiness::Verified { command, content } => {
            assert_eq!(command, "name");
            assert_eq!(content, "robogo-sim");
        }
        other => panic!("expected verified readiness, got {other:?}"),
    }
    session.stop();
}

#[test]
fn test_failed_ready_check_stops_engine() {
    let fx = Fixture::new("");
    let session = EngineSession::new(fx.engine_config().with_ready_check("boardsize 9"));
    match session.start() {
        Err(Error::ReadyCheckFailed { command, content }) => {
            assert_eq!(command, "boardsize 9");
            assert_eq!(content, "unacceptable size");
        }
        other => panic!("expected readiness check failure, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Terminated);
    assert!(!session.is_alive());
}

// =============================================================================
// Deadlines and fallbacks
// =============================================================================

#[test]
fn test_silent_command_times_out_at_short_deadline() {
    let fx = Fixture::new("silent = showboard\ngenmove_delay_ms = 1500\nmoves = C3\n");
    let session = fx.started();

    let start = Instant::now();
    let result = session.exchange("showboard");
    let elapsed = start.elapsed();
    assert!(matches!(result, Err(Error::Timeout { .. })), "{result:?}");
    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    assert_eq!(session.state(), SessionState::Ready);

    // Move generation runs past the short deadline and still succeeds.
    let r = session.request("genmove W");
    assert_eq!(r.status, Status::Success);
    assert_eq!(r.content, "C3");
    session.stop();
}

#[test]
fn test_move_reported_only_on_stderr() {
    let fx = Fixture::new("reply_stream = stderr\nmoves = Q16\n");
    let session = fx.started();
    let reply = session.exchange("genmove W").unwrap();
    assert!(matches!(reply, Reply::Fallback(_)), "{reply:?}");

    let r = robogo::response::parse(Some(reply.text()));
    assert_eq!(r.status, Status::Success);
    assert_eq!(r.content, "Q16");
    session.stop();
}

#[test]
fn test_off_board_stderr_move_is_not_used() {
    let fx = Fixture::new("reply_stream = stderr\nmoves = Z99\n");
    let session = fx.started();
    assert!(matches!(
        session.exchange("genmove W"),
        Err(Error::Timeout { .. })
    ));
    session.stop();
}

#[test]
fn test_stdout_wins_over_stderr() {
    let fx = Fixture::new("moves = D4\nstderr_line = info: best = Q16\n");
    let session = fx.started();
    assert_eq!(session.request("genmove W").content, "D4");
    session.stop();
}

#[test]
fn test_engine_exit_mid_command() {
    let fx = Fixture::new("exit_on = genmove\n");
    let session = fx.started();
    let result = session.exchange("genmove W");
    assert!(matches!(result, Err(Error::ProcessExited { .. })), "{result:?}");
    assert_eq!(session.state(), SessionState::Terminated);
    assert!(!session.is_alive());
    assert!(matches!(session.exchange("name"), Err(Error::NotRunning)));

    let report = session.stop().unwrap();
    assert_eq!(report.stage, ShutdownStage::AlreadyExited);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_callers_are_serialized() {
    let fx = Fixture::new("");
    let session = Arc::new(fx.started());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let r = session.request(&format!("{} name", i + 1));
                (r.status, r.content)
            })
        })
        .collect();

    for handle in handles {
        let (status, content) = handle.join().unwrap();
        assert_eq!(status, Status::Success);
        assert_eq!(content, "robogo-sim");
    }
    session.stop();
}

#[test]
fn test_liveness_check_does_not_wait_for_command() {
    let fx = Fixture::new("genmove_delay_ms = 1500\nmoves = D4\n");
    let session = Arc::new(fx.started());

    let searching = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.request("genmove W"))
    };
    thread::sleep(Duration::from_millis(300));
    assert_eq!(session.state(), SessionState::Busy);

    let start = Instant::now();
    assert!(session.is_alive());
    assert!(start.elapsed() < Duration::from_millis(200), "{:?}", start.elapsed());

    assert_eq!(searching.join().unwrap().content, "D4");
    session.stop();
    assert!(!session.is_alive());
}
