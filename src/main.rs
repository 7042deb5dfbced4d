//! Robogo command line.
//!
//! ## Usage
//!
//! - `robogo console` - Type GTP commands at a supervised engine
//! - `robogo play` - Play a game against the engine, typing your moves
//! - `robogo gtp -model <path> -config <path>` - Run the simulated engine

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use robogo::config::EngineConfig;
use robogo::constants::{
    CONFIG_PATH_ENV, DEFAULT_LOG_FILE, ENGINE_PATH_ENV, MODEL_PATH_ENV, QUIT_COMMAND,
};
use robogo::game::Game;
use robogo::logging::{self, LogGuard, LogOptions};
use robogo::robot::{Calibration, SimulatedArm};
use robogo::session::EngineSession;
use robogo::sim::{self, SimArgs, SimEngine, SimOptions};
use robogo::vision::ConsoleVision;

/// Robogo: a robot Go player backed by a GTP engine
#[derive(Parser)]
#[command(name = "robogo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward typed GTP commands to the engine and print parsed responses
    Console(EngineArgs),
    /// Play black against the engine; the simulated arm places white
    Play(EngineArgs),
    /// Run the simulated engine on stdin/stdout
    Gtp {
        /// Engine-style arguments: `-model <path> -config <path>`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
        args: Vec<String>,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// Engine executable
    #[arg(long, env = ENGINE_PATH_ENV)]
    engine: Option<PathBuf>,
    /// Neural network model file
    #[arg(long, env = MODEL_PATH_ENV)]
    model: Option<PathBuf>,
    /// Engine configuration file
    #[arg(long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,
    /// Command that must succeed before the engine counts as ready
    #[arg(long)]
    ready_check: Option<String>,
    /// Diagnostic log file, truncated at startup
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
    /// Also log to the console
    #[arg(short, long)]
    verbose: bool,
}

impl EngineArgs {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::from_env();
        if let Some(engine) = &self.engine {
            config.engine_path = engine.clone();
        }
        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if let Some(path) = &self.config {
            config.config_path = path.clone();
        }
        if let Some(command) = &self.ready_check {
            config = config.with_ready_check(command.clone());
        }
        config
    }

    fn init_logging(&self) -> Result<LogGuard> {
        logging::init(&LogOptions {
            file: Some(self.log_file.clone()),
            console: self.verbose,
            ..LogOptions::default()
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Console(args) => {
            let _guard = args.init_logging()?;
            let session = start_session(&args)?;
            let result = run_console(&session);
            session.stop();
            result
        }
        Commands::Play(args) => {
            let _guard = args.init_logging()?;
            let session = start_session(&args)?;
            let calibration = Calibration::default();
            let stdin = io::stdin();
            let vision = ConsoleVision::new(stdin.lock(), io::stdout());
            let mut game = Game::new(&session, vision, SimulatedArm::new(calibration), calibration);
            let result = game.run();
            session.stop();
            let over = result?;
            println!("Game over: {over:?} after {} moves", game.moves_played());
            Ok(())
        }
        Commands::Gtp { args } => run_simulator(&args),
    }
}

fn start_session(args: &EngineArgs) -> Result<EngineSession> {
    let session = EngineSession::new(args.engine_config());
    let readiness = session
        .start()
        .with_context(|| format!("starting `{}`", session.config().command_line()))?;
    info!(?readiness, "engine session started");
    if !readiness.is_confirmed() {
        eprintln!("warning: engine readiness could not be confirmed, continuing anyway");
    }
    Ok(session)
}

fn run_console(session: &EngineSession) -> Result<()> {
    let mut stdout = io::stdout();
    for line in io::stdin().lock().lines() {
        let line = line.context("reading command")?;
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command == QUIT_COMMAND {
            break;
        }
        let response = session.request(command);
        writeln!(stdout, "[{}] {}", response.status, response.content)?;
        stdout.flush()?;
    }
    Ok(())
}

fn run_simulator(args: &[String]) -> Result<()> {
    let args = SimArgs::from_args(args)?;
    if let Some(model) = &args.model
        && !model.is_file()
    {
        bail!("model file not found: {}", model.display());
    }
    let options = match &args.config {
        Some(path) => SimOptions::load(path)?,
        None => SimOptions::default(),
    };
    if options.ignore_term {
        sim::ignore_terminate()?;
    }

    let mut engine = SimEngine::new(options);
    engine
        .run(io::stdin().lock(), io::stdout().lock(), io::stderr().lock())
        .context("simulated engine I/O failed")
}
