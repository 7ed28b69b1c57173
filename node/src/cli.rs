//! # CLI Interface
//!
//! Defines the command-line argument structure for `tessera-node` using
//! `clap` derive. Supports three subcommands: `run`, `keygen` and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Tessera credit ledger node.
///
/// Hosts one in-memory credit ledger seeded from a genesis file, serves the
/// REST API for queries and signed batches, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "tessera-node",
    about = "Tessera credit ledger node",
    version,
    propagate_version = true
)]
pub struct TesseraNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Generate an Ed25519 owner keypair for signing batches.
    Keygen(KeygenArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the genesis file (JSON).
    ///
    /// When omitted, the node boots the built-in devnet genesis.
    #[arg(long, short = 'g', env = "TESSERA_GENESIS")]
    pub genesis: Option<PathBuf>,

    /// Port for the REST API.
    #[arg(long, env = "TESSERA_API_PORT", default_value_t = 9841)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TESSERA_METRICS_PORT", default_value_t = 9842)]
    pub metrics_port: u16,

    /// Log output format.
    #[arg(long, env = "TESSERA_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Tracing filter directives, e.g. `tessera_protocol=debug`. Takes
    /// precedence over `RUST_LOG`.
    #[arg(long, env = "TESSERA_LOG")]
    pub log_filter: Option<String>,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Write the hex secret key to this file instead of printing it.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        TesseraNodeCli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = TesseraNodeCli::parse_from(["tessera-node", "run"]);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.genesis.is_none());
                assert_eq!(args.api_port, 9841);
                assert_eq!(args.log_format, LogFormat::Pretty);
                assert!(args.log_filter.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn log_flags_parse() {
        let cli = TesseraNodeCli::parse_from([
            "tessera-node",
            "run",
            "--log-format",
            "json",
            "--log-filter",
            "tessera_protocol=debug",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.log_format, LogFormat::Json);
                assert_eq!(args.log_filter.as_deref(), Some("tessera_protocol=debug"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let bad = TesseraNodeCli::try_parse_from(["tessera-node", "run", "--log-format", "xml"]);
        assert!(bad.is_err());
    }
}
