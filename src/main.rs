//! s6dash - live dashboard for an s6 supervision tree
//!
//! Shows every service under a scan directory with its up/down, wanted and
//! ready state, follows a service's log, and sends control commands.
//!
//! ## Usage
//!
//! ```bash
//! # Watch a scan directory
//! s6dash /run/service
//!
//! # With verbose logging
//! s6dash -v /run/service
//!
//! # With a custom config file and log directory
//! s6dash --config ./s6dash.yaml --log-dir /tmp/s6dash-logs /run/service
//! ```

use std::io::Write;
use std::panic;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser};
use s6dash_config::DashConfig;
use s6dash_core::{DashError, LogGuard, ServiceRegistry, Supervisor, init_logging};
use s6dash_tui::App;
use tracing::{error, info};

/// Live dashboard for an s6 supervision tree
#[derive(Parser, Debug)]
#[command(name = "s6dash")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.s6dash/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Configuration file (defaults to ~/.s6dash/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// s6 scan directory holding the service directories
    directory: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return handle_parse_error(e),
    };

    // Initialize logging
    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    // Install panic hook to ensure terminal cleanup
    install_panic_hook();

    info!(directory = %cli.directory.display(), "Starting s6dash");

    match run_app(&cli).await {
        Ok(()) => {
            info!("s6dash exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("s6dash error: {:#}", e);
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e.downcast_ref::<DashError>().and_then(DashError::guidance) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::from(1)
        }
    }
}

/// A missing or extra directory argument prints usage and exits cleanly.
/// Everything else is reported the way clap normally does.
fn handle_parse_error(e: clap::Error) -> ExitCode {
    match e.kind() {
        ErrorKind::MissingRequiredArgument => print_usage(),
        ErrorKind::UnknownArgument if is_extra_positional(&e) => print_usage(),
        _ => e.exit(),
    }
}

fn print_usage() -> ExitCode {
    println!("Usage: s6dash <directory>");
    println!();
    println!("{}", Cli::command().render_help());
    ExitCode::SUCCESS
}

/// Whether clap rejected a second positional rather than an unknown flag.
fn is_extra_positional(e: &clap::Error) -> bool {
    match e.get(ContextKind::InvalidArg) {
        Some(ContextValue::String(arg)) => !arg.starts_with('-'),
        _ => false,
    }
}

/// Install a panic hook that restores the terminal before printing the panic message.
fn install_panic_hook() {
    let original_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));
}

/// Restore terminal to its normal state.
fn restore_terminal() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();

    let _ = crossterm::terminal::disable_raw_mode();
    crossterm::execute!(
        stdout,
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture,
        crossterm::cursor::Show
    )?;
    stdout.flush()
}

/// Set up logging based on CLI arguments.
///
/// The dashboard owns the terminal, so logs only go to the file.
fn setup_logging(cli: &Cli) -> s6dash_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose > 0, false)
}

/// Discover services and run the dashboard.
async fn run_app(cli: &Cli) -> anyhow::Result<()> {
    let config = DashConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let registry = ServiceRegistry::scan(&cli.directory)
        .with_context(|| format!("Failed to list services in {}", cli.directory.display()))?;
    info!(services = registry.len(), "Services discovered");

    let supervisor: Arc<dyn Supervisor> = Arc::new(config.supervisor());
    let mut app = App::new(registry.services(), supervisor, &config);
    app.run().await.map_err(|e| anyhow::anyhow!("{e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_directory_and_flags() {
        let cli = Cli::try_parse_from(["s6dash", "-vv", "--config", "c.yaml", "/run/service"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("c.yaml")));
        assert_eq!(cli.directory, PathBuf::from("/run/service"));
    }

    #[test]
    fn test_wrong_argument_count_is_a_usage_error() {
        let missing = Cli::try_parse_from(["s6dash"]).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(handle_parse_error(missing), ExitCode::SUCCESS);

        let extra = Cli::try_parse_from(["s6dash", "/a", "/b"]).unwrap_err();
        assert_eq!(extra.kind(), ErrorKind::UnknownArgument);
        assert_eq!(handle_parse_error(extra), ExitCode::SUCCESS);
    }

    #[test]
    fn test_unknown_flag_is_not_a_usage_error() {
        let err = Cli::try_parse_from(["s6dash", "--bogus", "/run/service"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert!(!is_extra_positional(&err));

        let extra = Cli::try_parse_from(["s6dash", "/a", "/b"]).unwrap_err();
        assert!(is_extra_positional(&extra));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
