//! fwq binary entry point.

use clap::Parser;

use fwq::cli::args::{Cli, Commands, QuotaArgs};
use fwq::cli::{key, quota, watch};
use fwq::core::logging::{self, LogLevel};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .as_deref()
        .and_then(LogLevel::from_arg)
        .or_else(logging::parse_log_level_from_env)
        .unwrap_or_default();
    let format = logging::parse_log_format_from_env().unwrap_or_default();
    let log_file = logging::parse_log_file_from_env();
    logging::init(level, format, log_file, cli.verbose);

    let result = match &cli.command {
        Some(Commands::Quota(args)) => quota::run(args, cli.no_color).await,
        Some(Commands::Watch(args)) => watch::run(args, cli.no_color).await,
        Some(Commands::Key { command }) => key::run(command),
        // Bare `fwq` behaves like `fwq quota`.
        None => quota::run(&QuotaArgs::default(), cli.no_color).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(i32::from(e.exit_code()));
    }
}
