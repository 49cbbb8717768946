pub mod chat; // End-to-end analysis and follow-ups
pub mod cli;
pub mod config;
pub mod inference; // Hosted vision-language client, retry, conversations
pub mod models;
pub mod pipeline;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub fn run() -> std::process::ExitCode {
    // stdout carries reports
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match cli::execute(&cli) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Analysis failed");
            eprintln!("error: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
