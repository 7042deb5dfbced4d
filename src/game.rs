//! Human versus engine game loop.
//!
//! The human plays black through a [`MoveSource`]; the engine plays white
//! and its stones are placed by an [`Actuator`]. Every command goes through
//! [`Engine::request`], so the loop only ever sees classified responses.

use anyhow::Result;
use tracing::{error, info, warn};

use crate::board::Color;
use crate::constants::{DEFAULT_KOMI, N};
use crate::coord::Move;
use crate::response::{Response, Status};
use crate::robot::{Actuator, Calibration, to_robot_coords};
use crate::session::EngineSession;
use crate::vision::{HumanAction, MoveSource};

/// Anything that answers GTP commands with a classified response.
pub trait Engine {
    fn request(&self, command: &str) -> Response;
}

impl Engine for EngineSession {
    fn request(&self, command: &str) -> Response {
        EngineSession::request(self, command)
    }
}

/// Why a game ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOver {
    /// The operator asked to stop.
    Quit,
    /// Two passes in a row.
    TwoPasses,
    /// `color` resigned.
    Resigned(Color),
    /// The engine could not produce a usable answer.
    EngineFailure(String),
}

pub struct Game<'a, E, V, A> {
    engine: &'a E,
    vision: V,
    arm: A,
    calibration: Calibration,
    human: Color,
    to_move: Color,
    consecutive_passes: u32,
    moves_played: u32,
}

impl<'a, E: Engine, V: MoveSource, A: Actuator> Game<'a, E, V, A> {
    pub fn new(engine: &'a E, vision: V, arm: A, calibration: Calibration) -> Self {
        Self {
            engine,
            vision,
            arm,
            calibration,
            human: Color::Black,
            to_move: Color::Black,
            consecutive_passes: 0,
            moves_played: 0,
        }
    }

    pub fn moves_played(&self) -> u32 {
        self.moves_played
    }

    pub fn into_parts(self) -> (V, A) {
        (self.vision, self.arm)
    }

    /// Configure the engine for a fresh 19x19 game and clear the physical
    /// board. Returns `Some` if the engine refused.
    pub fn setup(&mut self) -> Result<Option<GameOver>> {
        self.arm.connect()?;
        for command in [
            format!("boardsize {N}"),
            "clear_board".to_string(),
            format!("komi {DEFAULT_KOMI}"),
        ] {
            let response = self.engine.request(&command);
            if !response.is_success() {
                error!(%command, content = %response.content, "engine rejected game setup");
                return Ok(Some(GameOver::EngineFailure(response.content)));
            }
        }
        self.arm.reset_board()?;
        self.to_move = Color::Black;
        self.consecutive_passes = 0;
        self.moves_played = 0;
        info!("game ready, human plays {}", self.human);
        Ok(None)
    }

    /// Set up and play until the game ends.
    pub fn run(&mut self) -> Result<GameOver> {
        if let Some(over) = self.setup()? {
            return Ok(over);
        }
        let over = loop {
            let turn = if self.to_move == self.human {
                self.human_turn()?
            } else {
                self.engine_turn()?
            };
            if let Some(over) = turn {
                break over;
            }
        };
        info!(?over, moves = self.moves_played, "game over");
        self.arm.disconnect()?;
        Ok(over)
    }

    fn human_turn(&mut self) -> Result<Option<GameOver>> {
        let (color, vertex) = match self.vision.next_action()? {
            HumanAction::Quit => return Ok(Some(GameOver::Quit)),
            HumanAction::Invalid(_) => return Ok(None),
            HumanAction::Pass => (self.human, "pass".to_string()),
            HumanAction::Play { color, vertex } if color == self.human => (color, vertex),
            HumanAction::Play { color, vertex } => {
                warn!(%color, %vertex, human = %self.human, "move for the engine's colour, asking again");
                return Ok(None);
            }
        };

        let response = self.engine.request(&format!("play {} {}", color.gtp(), vertex));
        match response.status {
            Status::Error => {
                warn!(%color, %vertex, content = %response.content, "engine rejected human move, asking again");
                Ok(None)
            }
            Status::Success | Status::Info => {
                self.record(color, vertex.eq_ignore_ascii_case("pass"));
                Ok(self.two_passes())
            }
        }
    }

    fn engine_turn(&mut self) -> Result<Option<GameOver>> {
        let color = self.to_move;
        let response = self.engine.request(&format!("genmove {}", color.gtp()));
        if !response.is_success() {
            error!(status = %response.status, content = %response.content, "engine failed to generate a move");
            return Ok(Some(GameOver::EngineFailure(response.content)));
        }

        // genmove already put the move on the engine's board.
        match Move::parse(&response.content) {
            Some(Move::Resign) => Ok(Some(GameOver::Resigned(color))),
            Some(Move::Pass) => {
                info!(%color, "engine passes");
                self.record(color, true);
                Ok(self.two_passes())
            }
            Some(Move::Play(vertex)) => {
                let Some((x, y)) = to_robot_coords(&vertex.to_string(), &self.calibration) else {
                    return Ok(Some(GameOver::EngineFailure(response.content)));
                };
                info!(%color, %vertex, "engine move");
                self.arm.pick_stone(color)?;
                self.arm.place_stone(x, y)?;
                self.record(color, false);
                Ok(None)
            }
            None => {
                error!(content = %response.content, "engine answered genmove with something that is not a move");
                Ok(Some(GameOver::EngineFailure(response.content)))
            }
        }
    }

    fn record(&mut self, color: Color, pass: bool) {
        self.moves_played += 1;
        self.consecutive_passes = if pass { self.consecutive_passes + 1 } else { 0 };
        self.to_move = color.opponent();
    }

    fn two_passes(&self) -> Option<GameOver> {
        (self.consecutive_passes >= 2).then_some(GameOver::TwoPasses)
    }
}
