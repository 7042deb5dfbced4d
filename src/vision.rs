//! Vision boundary.
//!
//! Stone recognition is not implemented; [`ConsoleVision`] stands in for the
//! camera by asking the operator to type the human's move. Coordinates are
//! passed on as typed: legality is the engine's call.

use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::{info, warn};

use crate::board::Color;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HumanAction {
    Play { color: Color, vertex: String },
    Pass,
    Quit,
    /// Input that could not be understood; ask again.
    Invalid(String),
}

impl HumanAction {
    /// Accepts `"<color> <vertex>"`, `"pass"` or `"quit"`.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.eq_ignore_ascii_case("quit") {
            return HumanAction::Quit;
        }
        if input.eq_ignore_ascii_case("pass") {
            return HumanAction::Pass;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();
        // Only single-letter colours are accepted from the operator.
        match parts.as_slice() {
            [color, vertex] if color.len() == 1 => match Color::parse(color) {
                Some(color) => HumanAction::Play {
                    color,
                    vertex: vertex.to_ascii_uppercase(),
                },
                None => HumanAction::Invalid(input.to_string()),
            },
            _ => HumanAction::Invalid(input.to_string()),
        }
    }
}

/// Where the game loop learns what the human did.
pub trait MoveSource {
    fn next_action(&mut self) -> Result<HumanAction>;
}

/// Reads moves typed by an operator.
pub struct ConsoleVision<R, W> {
    input: R,
    prompt: W,
}

impl<R: BufRead, W: Write> ConsoleVision<R, W> {
    pub fn new(input: R, prompt: W) -> Self {
        Self { input, prompt }
    }
}

impl<R: BufRead, W: Write> MoveSource for ConsoleVision<R, W> {
    fn next_action(&mut self) -> Result<HumanAction> {
        write!(self.prompt, "Human move (e.g. B D4, pass, quit): ")?;
        self.prompt.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            info!("operator input closed");
            return Ok(HumanAction::Quit);
        }

        let action = HumanAction::parse(&line);
        match &action {
            HumanAction::Invalid(raw) => warn!(input = %raw, "unrecognized human move"),
            other => info!(action = ?other, "human move detected"),
        }
        Ok(action)
    }
}
