pub mod cli;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod reporting;
pub mod scoring;
pub mod seed;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Parse arguments, set up logging and run the selected command.
pub fn run() -> Result<(), cli::CliError> {
    let cli = cli::Cli::parse();

    let fallback = if cli.verbose {
        config::verbose_log_filter()
    } else {
        config::default_log_filter()
    };
    // Logs go to stderr so reports on stdout stay pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);
    cli::execute(cli)
}
