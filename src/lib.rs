//! Robogo: drive a GTP Go engine from a robot that plays against a human.
//!
//! The heart of the crate is [`session::EngineSession`], which launches an
//! external engine (KataGo) as a child process and exchanges GTP commands
//! with it one at a time. It copes with engines that are slow to start,
//! answer on the wrong stream, forget the blank framing line, or die in the
//! middle of a command.
//!
//! ## Modules
//!
//! - [`config`] - Engine paths and timeouts
//! - [`session`] - Process lifecycle and the half-duplex command cycle
//! - [`response`] - Classification of raw responses
//! - [`process`] / [`reader`] / [`readiness`] - Child process plumbing
//! - [`game`] - Human versus engine turn loop
//! - [`robot`] / [`vision`] - Physical collaborators
//! - [`sim`] - A scriptable stand-in engine used by the tests
//!
//! ## Example
//!
//! ```no_run
//! use robogo::config::EngineConfig;
//! use robogo::session::EngineSession;
//!
//! let session = EngineSession::new(EngineConfig::from_env());
//! session.start()?;
//! let reply = session.request("genmove W");
//! println!("{}: {}", reply.status, reply.content);
//! session.stop();
//! # Ok::<(), robogo::error::Error>(())
//! ```

pub mod board;
pub mod config;
pub mod constants;
pub mod coord;
pub mod error;
pub mod game;
pub mod logging;
pub mod process;
pub mod reader;
pub mod readiness;
pub mod response;
pub mod robot;
pub mod session;
pub mod sim;
pub mod vision;
