//! A simulated GTP engine.
//!
//! It is launched exactly like the real engine (`robogo gtp -model <path>
//! -config <path>`) and speaks enough GTP version 2 for a game: `name`,
//! `version`, `protocol_version`, `list_commands`, `known_command`,
//! `boardsize`, `clear_board`, `komi`, `play`, `genmove`, `showboard` and
//! `quit`. The `-config` file scripts its quirks so sessions can be tested
//! against slow, chatty, silent, or crashing engines.
//!
//! ## Config keys
//!
//! One `key = value` per line, `#` starts a comment.
//!
//! - `startup_lines` - lines of chatter on stderr before the command loop (default 3)
//! - `startup_delay_ms` - pause after each chatter line
//! - `reply_stream` - `stdout` (default) or `stderr`: where `genmove` answers go
//! - `blank_line` - emit the blank framing line after each response (default true)
//! - `genmove_delay_ms` - simulated thinking time
//! - `moves` - comma separated answers for successive `genmove` calls
//! - `stderr_line` - extra diagnostic line written on every `genmove`
//! - `silent` - comma separated commands that are never answered
//! - `exit_on` - command that makes the engine exit without answering
//! - `ignore_quit` - answer `quit` but keep running, even after input closes
//! - `ignore_term` - ignore SIGTERM (unix only)

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::board::{Board, Color};
use crate::constants::{DEFAULT_KOMI, N};
use crate::coord::Move;

/// The list of known GTP commands.
const KNOWN_COMMANDS: &[&str] = &[
    "boardsize",
    "clear_board",
    "genmove",
    "known_command",
    "komi",
    "list_commands",
    "name",
    "play",
    "protocol_version",
    "quit",
    "showboard",
    "version",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimOptions {
    pub startup_lines: usize,
    pub startup_delay: Duration,
    pub reply_stream: ReplyStream,
    pub blank_line: bool,
    pub genmove_delay: Duration,
    pub moves: Vec<String>,
    pub stderr_line: Option<String>,
    pub silent: Vec<String>,
    pub exit_on: Option<String>,
    pub ignore_quit: bool,
    pub ignore_term: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            startup_lines: 3,
            startup_delay: Duration::ZERO,
            reply_stream: ReplyStream::Stdout,
            blank_line: true,
            genmove_delay: Duration::ZERO,
            moves: Vec::new(),
            stderr_line: None,
            silent: Vec::new(),
            exit_on: None,
            ignore_quit: false,
            ignore_term: false,
        }
    }
}

fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl SimOptions {
    pub fn parse(text: &str) -> Result<Self> {
        let mut options = Self::default();
        for (n, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                bail!("line {}: expected `key = value`", n + 1);
            };
            let (key, value) = (key.trim(), value.trim());
            let millis = || -> Result<Duration> {
                Ok(Duration::from_millis(value.parse().with_context(|| {
                    format!("line {}: `{key}` must be milliseconds", n + 1)
                })?))
            };
            match key {
                "startup_lines" => {
                    options.startup_lines = value
                        .parse()
                        .with_context(|| format!("line {}: bad startup_lines", n + 1))?
                }
                "startup_delay_ms" => options.startup_delay = millis()?,
                "genmove_delay_ms" => options.genmove_delay = millis()?,
                "reply_stream" => {
                    options.reply_stream = match value {
                        "stdout" => ReplyStream::Stdout,
                        "stderr" => ReplyStream::Stderr,
                        other => bail!("line {}: unknown reply_stream `{other}`", n + 1),
                    }
                }
                "blank_line" => {
                    options.blank_line = value
                        .parse()
                        .with_context(|| format!("line {}: blank_line must be a bool", n + 1))?
                }
                "moves" => options.moves = list(value),
                "stderr_line" => options.stderr_line = Some(value.to_string()),
                "silent" => options.silent = list(value),
                "exit_on" => options.exit_on = Some(value.to_string()),
                "ignore_quit" | "ignore_term" => {
                    let flag = value
                        .parse()
                        .with_context(|| format!("line {}: `{key}` must be a bool", n + 1))?;
                    if key == "ignore_quit" {
                        options.ignore_quit = flag;
                    } else {
                        options.ignore_term = flag;
                    }
                }
                // Real engine configs carry many keys this simulator ignores.
                _ => {}
            }
        }
        Ok(options)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text)
    }
}

/// Command line of the `gtp` subcommand, in the engine's single-dash style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimArgs {
    pub model: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl SimArgs {
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut parsed = Self {
            model: None,
            config: None,
        };
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let slot = match arg.as_str() {
                "-model" | "--model" => &mut parsed.model,
                "-config" | "--config" => &mut parsed.config,
                other => bail!("unexpected argument `{other}`"),
            };
            let value = iter
                .next()
                .with_context(|| format!("`{arg}` needs a value"))?;
            *slot = Some(PathBuf::from(value));
        }
        Ok(parsed)
    }
}

/// Make SIGTERM a no-op for this process, so only a kill stops it.
#[cfg(unix)]
pub fn ignore_terminate() -> Result<()> {
    use nix::sys::signal::{SigHandler, Signal, signal};

    // SAFETY: `SigIgn` installs no handler code.
    unsafe { signal(Signal::SIGTERM, SigHandler::SigIgn) }.context("failed to ignore SIGTERM")?;
    Ok(())
}

#[cfg(not(unix))]
pub fn ignore_terminate() -> Result<()> {
    Ok(())
}

enum Outcome {
    Answer(bool, String),
    Silent,
}

/// Simulated engine state.
pub struct SimEngine {
    board: Board,
    komi: f32,
    options: SimOptions,
    scripted: VecDeque<String>,
}

impl SimEngine {
    pub fn new(options: SimOptions) -> Self {
        Self {
            board: Board::new(N),
            komi: DEFAULT_KOMI,
            scripted: options.moves.iter().cloned().collect(),
            options,
        }
    }

    /// Run the GTP command loop until `quit`, end of input, or `exit_on`.
    pub fn run<R, W, E>(&mut self, input: R, mut out: W, mut err: E) -> io::Result<()>
    where
        R: BufRead,
        W: Write,
        E: Write,
    {
        let total = self.options.startup_lines;
        for i in 1..=total {
            if i == total {
                writeln!(err, "GTP ready, beginning main protocol loop")?;
            } else {
                writeln!(err, "sim: initializing ({i}/{total})")?;
            }
            err.flush()?;
            thread::sleep(self.options.startup_delay);
        }

        for line in input.lines() {
            let line = line?;

            // Skip empty lines and comments
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (id, command_line) = Self::parse_id(line);
            let parts: Vec<&str> = command_line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }

            let command = parts[0].to_lowercase();
            let args = &parts[1..];

            if self.options.exit_on.as_deref() == Some(command.as_str()) {
                writeln!(err, "sim: exiting on `{command}`")?;
                err.flush()?;
                return Ok(());
            }
            if self.options.silent.contains(&command) {
                continue;
            }

            match self.execute(&command, args, &mut err)? {
                Outcome::Answer(success, message) => {
                    let prefix = if success { '=' } else { '?' };
                    let id_str = id.map(|i| i.to_string()).unwrap_or_default();
                    let framing = if self.options.blank_line { "\n" } else { "" };
                    write!(out, "{prefix}{id_str} {message}\n{framing}")?;
                    out.flush()?;
                }
                Outcome::Silent => {}
            }

            if command == "quit" && !self.options.ignore_quit {
                break;
            }
        }

        if self.options.ignore_quit {
            writeln!(err, "sim: input closed, staying up")?;
            err.flush()?;
            loop {
                thread::sleep(Duration::from_secs(60));
            }
        }
        Ok(())
    }

    /// Parse an optional numeric command ID from the beginning of the line.
    fn parse_id(line: &str) -> (Option<u32>, &str) {
        let trimmed = line.trim();
        let end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        if end > 0 {
            if let Ok(id) = trimmed[..end].parse::<u32>() {
                return (Some(id), trimmed[end..].trim());
            }
        }
        (None, trimmed)
    }

    fn execute<E: Write>(&mut self, command: &str, args: &[&str], err: &mut E) -> io::Result<Outcome> {
        let answer =
            |ok: bool, msg: &str| -> io::Result<Outcome> { Ok(Outcome::Answer(ok, msg.to_string())) };
        match command {
            "name" => answer(true, "robogo-sim"),

            "version" => answer(true, env!("CARGO_PKG_VERSION")),

            "protocol_version" => answer(true, "2"),

            "list_commands" => answer(true, &KNOWN_COMMANDS.join("\n")),

            "known_command" => match args.first() {
                None => answer(false, "missing argument"),
                Some(name) => {
                    let known = KNOWN_COMMANDS.contains(&name.to_lowercase().as_str());
                    answer(true, if known { "true" } else { "false" })
                }
            },

            "quit" => answer(true, ""),

            "boardsize" => match args.first().map(|a| a.parse::<usize>()) {
                None => answer(false, "missing argument"),
                Some(Ok(size)) if size == N => answer(true, ""),
                Some(Ok(_)) => answer(false, "unacceptable size"),
                Some(Err(_)) => answer(false, "invalid size"),
            },

            "clear_board" => {
                self.board.clear();
                answer(true, "")
            }

            "komi" => match args.first().map(|a| a.parse::<f32>()) {
                None => answer(false, "missing argument"),
                Some(Ok(komi)) => {
                    self.komi = komi;
                    answer(true, "")
                }
                Some(Err(_)) => answer(false, "invalid komi"),
            },

            "showboard" => answer(true, &format!("\n{}\nkomi {}", self.board, self.komi)),

            "play" => {
                let (Some(color), Some(vertex)) = (args.first(), args.get(1)) else {
                    return answer(false, "missing arguments");
                };
                let Some(color) = Color::parse(color) else {
                    return answer(false, "invalid color");
                };
                match Move::parse(vertex) {
                    Some(Move::Pass) => answer(true, ""),
                    Some(Move::Play(v)) if self.board.play(v, color).legal => answer(true, ""),
                    Some(Move::Play(_)) => answer(false, "illegal move"),
                    Some(Move::Resign) | None => answer(false, "invalid coordinate"),
                }
            }

            "genmove" => {
                let Some(color) = args.first().and_then(|c| Color::parse(c)) else {
                    return answer(false, "invalid color");
                };
                thread::sleep(self.options.genmove_delay);
                let chosen = self.choose_move(color);

                if let Some(extra) = &self.options.stderr_line {
                    writeln!(err, "{extra}")?;
                }
                match self.options.reply_stream {
                    ReplyStream::Stdout => {
                        err.flush()?;
                        Ok(Outcome::Answer(true, chosen))
                    }
                    ReplyStream::Stderr => {
                        writeln!(err, "sim: search finished, chosen move = {chosen}")?;
                        err.flush()?;
                        Ok(Outcome::Silent)
                    }
                }
            }

            _ => answer(false, "unknown command"),
        }
    }

    /// Next scripted answer, or a random legal point, or `pass`.
    fn choose_move(&mut self, color: Color) -> String {
        if let Some(scripted) = self.scripted.pop_front() {
            if let Some(Move::Play(v)) = Move::parse(&scripted) {
                self.board.play(v, color);
            }
            return scripted;
        }

        let mut points = self.board.empty_points();
        fastrand::shuffle(&mut points);
        for v in points {
            if self.board.play(v, color).legal {
                return v.to_string();
            }
        }
        "pass".to_string()
    }
}
