use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use quimera::cli::{Cli, Role};
use quimera::config::Config;
use quimera::coordination::CancellationSignal;
use quimera::domain::{Environment, Session};
use quimera::ipc::{LogSink, MessageSink, StdoutSink};
use quimera::runner::{preflight, run_worker};
use quimera::supervisor::{Signals, Supervisor};
use quimera::tui::{TuiRunner, init_terminal, restore_terminal};
use quimera::{QuimeraError, Result as QuimeraResult};

/// Exit code for invalid input or a missing external binary
const EXIT_FATAL_INPUT: u8 = 1;
/// Headless exit code when the session ended without an exploit
const EXIT_NO_EXPLOIT: u8 = 2;

fn setup_logging(role: Role, level: &str) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    if role == Role::Headless {
        builder.target(env_logger::Target::Stderr);
        builder.init();
        return Ok(());
    }

    // The monitor owns the screen and the worker's stdout is the message
    // channel, so both log to files
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quimera")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join(format!("quimera-{}.log", role.name()));

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn resolve_session(cli: &Cli) -> QuimeraResult<Session> {
    Session::resolve(&cli.session_args(), &Environment::from_env())
}

/// Report an input error the way the operator sees it
fn fatal_input(err: &QuimeraError) -> ExitCode {
    error!("{}", err);
    eprintln!("{} {}", "Error:".red().bold(), err);
    ExitCode::from(EXIT_FATAL_INPUT)
}

async fn run_supervisor(cli: &Cli, config: &Config) -> Result<ExitCode> {
    let session = match resolve_session(cli).and_then(|s| preflight(&s, config).map(|_| s)) {
        Ok(session) => session,
        Err(e) if e.is_fatal_input() => return Ok(fatal_input(&e)),
        Err(e) => return Err(e).context("Failed to prepare session"),
    };
    info!("Supervising session for {}", session.network_info());

    let cancel_path = session
        .working_dir
        .join(format!(".quimera-cancel-{}", std::process::id()));
    let cancel = CancellationSignal::create(&cancel_path).context("Failed to create cancellation signal")?;

    let program = std::env::current_exe().context("Failed to locate the quimera executable")?;
    let supervisor = Supervisor::start(&program, cli.worker_args(&cancel_path), cancel, &config.supervisor)
        .context("Failed to start worker")?;
    let signals = Signals::install().context("Failed to install signal handlers")?;

    let terminal = init_terminal().context("Failed to initialize terminal")?;
    let result = TuiRunner::new(terminal, supervisor, signals, &config.supervisor)
        .run()
        .await;
    restore_terminal().context("Failed to restore terminal")?;

    remove_marker(&cancel_path);
    let state = result?;
    for line in state.farewell() {
        println!("{}", line);
    }
    Ok(ExitCode::SUCCESS)
}

fn remove_marker(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Could not remove {}: {}", path.display(), e);
    }
}

async fn run_worker_process(cli: &Cli, config: &Config) -> Result<ExitCode> {
    let cancel_file = cli.cancel_file.clone().ok_or_else(|| eyre::eyre!("--worker needs --cancel-file"))?;
    let sink: Arc<dyn MessageSink> = Arc::new(StdoutSink);

    let session = match resolve_session(cli) {
        Ok(session) => session,
        Err(e) => {
            quimera::runner::report(&Err(e), sink.as_ref());
            return Ok(ExitCode::FAILURE);
        }
    };

    info!("Worker started for {}", session.network_info());
    match run_worker(session, config, sink, CancellationSignal::open(cancel_file)).await {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

async fn run_headless(cli: &Cli, config: &Config) -> Result<ExitCode> {
    let session = match resolve_session(cli).and_then(|s| preflight(&s, config).map(|_| s)) {
        Ok(session) => session,
        Err(e) if e.is_fatal_input() => return Ok(fatal_input(&e)),
        Err(e) => return Err(e).context("Failed to prepare session"),
    };

    let cancel = CancellationSignal::local();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling session");
            if let Err(e) = on_interrupt.cancel() {
                error!("Failed to cancel: {}", e);
            }
        }
    });

    match run_worker(session, config, Arc::new(LogSink), cancel).await {
        Ok(outcome) if outcome.exploit_found() => {
            println!("{}", outcome.to_string().green());
            Ok(ExitCode::SUCCESS)
        }
        Ok(outcome) => {
            println!("{}", outcome.to_string().yellow());
            Ok(ExitCode::from(EXIT_NO_EXPLOIT))
        }
        Err(e) if e.is_fatal_input() => Ok(fatal_input(&e)),
        Err(e) => Err(e).context("Session failed"),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let role = cli.role();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = if cli.is_verbose() {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    setup_logging(role, &level).context("Failed to setup logging")?;
    info!("Starting quimera as {}", role.name());

    match role {
        Role::Supervisor => run_supervisor(&cli, &config).await,
        Role::Worker => run_worker_process(&cli, &config).await,
        Role::Headless => run_headless(&cli, &config).await,
    }
}
