//! # CLI Interface
//!
//! Defines the command-line argument structure for `tally-node` using
//! `clap` derive. Supports three subcommands: `replay`, `check`, and
//! `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use tally_protocol::config::{LedgerConfig, Network};

use crate::logging::LogFormat;

/// Tally ledger replay node.
///
/// Feeds a stream of decoded protocol messages through the ledger core,
/// checks asset conservation at every block boundary, and reports the
/// running ledger hash.
#[derive(Parser, Debug)]
#[command(
    name = "tally-node",
    about = "Tally ledger replay node",
    version,
    propagate_version = true
)]
pub struct TallyNodeCli {
    #[command(flatten)]
    pub logging: LoggingArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a JSON-lines message stream to a ledger.
    Replay(ReplayArgs),
    /// Run the asset conservation check against an existing ledger.
    Check(CheckArgs),
    /// Print version information and exit.
    Version,
}

/// Logging flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct LoggingArgs {
    /// Log output format.
    #[arg(long, global = true, env = "TALLY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Extra `EnvFilter` directives, e.g. `tally_protocol::ledger=debug,sled=warn`.
    ///
    /// Applied on top of `RUST_LOG` (or the built-in default).
    #[arg(long, global = true, env = "TALLY_LOG_FILTER")]
    pub log_filter: Option<String>,
}

/// Ledger location and protocol parameters.
#[derive(Args, Debug)]
pub struct LedgerArgs {
    /// Directory of the on-disk ledger. Created on first use.
    #[arg(long, short = 'd', env = "TALLY_DATA_DIR", default_value = ".tally")]
    pub data_dir: PathBuf,

    /// Network whose protocol schedule applies: mainnet, testnet, or regtest.
    #[arg(long, short = 'n', env = "TALLY_NETWORK", default_value_t = Network::Mainnet)]
    pub network: Network,

    /// Protocol-change schedule to use instead of the embedded one.
    #[arg(long, env = "TALLY_SCHEDULE")]
    pub schedule: Option<PathBuf>,
}

/// Arguments for the `replay` subcommand.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub ledger: LedgerArgs,

    /// JSON-lines file of decoded messages. Reads stdin when omitted.
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Replay into memory instead of the data directory.
    #[arg(long)]
    pub in_memory: bool,

    /// Skip the conservation check at block boundaries.
    #[arg(long, env = "TALLY_NO_CONSERVATION_CHECK")]
    pub no_conservation_check: bool,

    /// Write the Prometheus text exposition here once the replay ends.
    #[arg(long, env = "TALLY_METRICS_OUT")]
    pub metrics_out: Option<PathBuf>,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Directory of an existing on-disk ledger.
    #[arg(long, short = 'd', env = "TALLY_DATA_DIR", default_value = ".tally")]
    pub data_dir: PathBuf,
}

impl LedgerArgs {
    pub fn ledger_config(&self, check_asset_conservation: bool) -> LedgerConfig {
        LedgerConfig {
            network: self.network,
            check_asset_conservation,
            schedule_path: self.schedule.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        TallyNodeCli::command().debug_assert();
    }

    #[test]
    fn replay_defaults() {
        let cli = TallyNodeCli::parse_from(["tally-node", "replay", "--in-memory"]);
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert!(args.in_memory);
        assert_eq!(args.ledger.network, Network::Mainnet);
        assert!(args.ledger.ledger_config(!args.no_conservation_check).check_asset_conservation);
        assert_eq!(cli.logging.log_format, LogFormat::Pretty);
    }

    #[test]
    fn network_and_log_format_parse() {
        let cli = TallyNodeCli::parse_from([
            "tally-node",
            "replay",
            "--network",
            "testnet",
            "--log-format",
            "json",
        ]);
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.ledger.network, Network::Testnet);
        assert_eq!(cli.logging.log_format, LogFormat::Json);
    }

    #[test]
    fn check_takes_only_a_data_dir() {
        let cli = TallyNodeCli::parse_from(["tally-node", "check", "-d", "/var/lib/tally"]);
        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.data_dir, PathBuf::from("/var/lib/tally"));
        assert!(TallyNodeCli::try_parse_from(["tally-node", "check", "--network", "testnet"]).is_err());
    }
}
