//! Campus CLI - Main entry point.
//!
//! - Sign in, sign out and session status
//! - Profile and password management
//! - Device registration and QR payloads
//! - Access recording from scanned codes and access history

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use campus_cli::cli::{Cli, ColorMode, LogLevel, dispatch_command};
use campus_cli::styled_output::print_error;
use campus_session::SessionError;

fn init_logging(cli: &Cli) {
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else if let Ok(env_level) = std::env::var("CAMPUS_LOG_LEVEL") {
        LogLevel::from_str_loose(&env_level).unwrap_or(cli.log_level)
    } else {
        cli.log_level
    };

    // RUST_LOG wins over flags when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = log_level.as_filter_str();
        EnvFilter::new(format!(
            "warn,campus_cli={level},campus_session={level},campus_common={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // SAFETY: Environment variable mutations happen early before threads spawn
    match cli.color {
        ColorMode::Never => unsafe { std::env::set_var("NO_COLOR", "1") },
        ColorMode::Always => unsafe { std::env::remove_var("NO_COLOR") },
        ColorMode::Auto => {}
    }

    init_logging(&cli);

    match dispatch_command(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<SessionError>() {
                Some(err) => print_error(&format!("{}: {}", err.kind(), err.message())),
                None => print_error(&format!("{e:#}")),
            }
            ExitCode::FAILURE
        }
    }
}
