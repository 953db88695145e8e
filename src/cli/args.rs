//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::http::QUOTA_ENDPOINT;

/// Minimum allowed polling interval for watch mode.
pub const MIN_WATCH_INTERVAL_SECS: u64 = 5;

/// Firmware API quota watcher.
#[derive(Debug, Parser)]
#[command(name = "fwq", version, about = "Watch Firmware API quota usage")]
pub struct Cli {
    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Verbose logging (same as --log-level debug).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch and display the current quota once (default).
    Quota(QuotaArgs),
    /// Poll the quota endpoint and keep the display updated.
    Watch(WatchArgs),
    /// Manage the stored API key.
    Key {
        #[command(subcommand)]
        command: KeyCommand,
    },
}

#[derive(Debug, Args)]
pub struct QuotaArgs {
    /// API key (overrides FIRMWARE_API_KEY and the key file).
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Plain text output without progress bars.
    #[arg(long)]
    pub text: bool,

    /// Append the result to a CSV log at the given path (defaults to the
    /// data directory when the flag is given without a value).
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "",
        value_parser = clap::builder::TypedValueParser::map(clap::builder::OsStringValueParser::new(), PathBuf::from)
    )]
    pub log: Option<PathBuf>,

    /// Emit the quota as a JSON object instead of formatted text.
    #[arg(long)]
    pub json: bool,

    /// Quota endpoint override.
    #[arg(long, hide = true, default_value = QUOTA_ENDPOINT, value_name = "URL")]
    pub endpoint: String,
}

impl Default for QuotaArgs {
    fn default() -> Self {
        Self {
            api_key: None,
            text: false,
            log: None,
            json: false,
            endpoint: QUOTA_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub quota: QuotaArgs,

    /// Seconds between fetches.
    #[arg(short, long, default_value_t = 30, value_name = "SECS")]
    pub interval: u64,
}

impl WatchArgs {
    /// Effective fetch interval, clamped to the minimum.
    #[must_use]
    pub fn interval_secs(&self) -> u64 {
        if self.interval < MIN_WATCH_INTERVAL_SECS {
            tracing::warn!(
                requested = self.interval,
                minimum = MIN_WATCH_INTERVAL_SECS,
                "interval below minimum, clamping"
            );
            MIN_WATCH_INTERVAL_SECS
        } else {
            self.interval
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum KeyCommand {
    /// Store an API key in the key file.
    Set {
        /// The key to store (prompted for on stdin when omitted).
        key: Option<String>,
    },
    /// Delete the stored API key.
    Clear,
    /// Print the key file path.
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_bare_invocation() {
        let cli = Cli::try_parse_from(["fwq"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.no_color);
    }

    #[test]
    fn quota_flags() {
        let cli = Cli::try_parse_from(["fwq", "quota", "--text", "--api-key", "fw_api_x"]).unwrap();
        let Some(Commands::Quota(args)) = cli.command else {
            panic!("expected quota subcommand");
        };
        assert!(args.text);
        assert_eq!(args.api_key.as_deref(), Some("fw_api_x"));
        assert_eq!(args.endpoint, QUOTA_ENDPOINT);
    }

    #[test]
    fn log_flag_without_value_uses_empty_sentinel() {
        let cli = Cli::try_parse_from(["fwq", "quota", "--log"]).unwrap();
        let Some(Commands::Quota(args)) = cli.command else {
            panic!("expected quota subcommand");
        };
        assert_eq!(args.log.as_deref(), Some(std::path::Path::new("")));
    }

    #[test]
    fn watch_interval_clamps_to_minimum() {
        let cli = Cli::try_parse_from(["fwq", "watch", "--interval", "1"]).unwrap();
        let Some(Commands::Watch(args)) = cli.command else {
            panic!("expected watch subcommand");
        };
        assert_eq!(args.interval_secs(), MIN_WATCH_INTERVAL_SECS);
    }

    #[test]
    fn key_subcommands_parse() {
        let cli = Cli::try_parse_from(["fwq", "key", "set", "fw_api_abc"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Key {
                command: KeyCommand::Set { key: Some(_) }
            })
        ));

        let cli = Cli::try_parse_from(["fwq", "key", "clear"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Key {
                command: KeyCommand::Clear
            })
        ));
    }
}
