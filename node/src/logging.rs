//! # Structured Logging
//!
//! Sets up the `tracing` subscriber for the node. Output goes to stderr so
//! that `keygen` and `version` keep stdout to themselves.
//!
//! The active filter is picked in this order:
//!
//! 1. `--log-filter` / `TESSERA_LOG` on the command line;
//! 2. `RUST_LOG`;
//! 3. [`DEFAULT_DIRECTIVES`].
//!
//! A malformed filter is a startup error, not a silent fallback.

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither the CLI nor `RUST_LOG` names one. Ledger
/// commits and liquidations log at `info`; per-call detail is `debug`.
pub const DEFAULT_DIRECTIVES: &str = "tessera_node=info,tessera_protocol=info,tower_http=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines with file and line numbers.
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Resolves the effective filter from an explicit directive string and the
/// value of `RUST_LOG`, if any.
pub fn resolve_filter(explicit: Option<&str>, rust_log: Option<&str>) -> Result<EnvFilter> {
    let (directives, source) = match (explicit, rust_log) {
        (Some(d), _) => (d, "--log-filter"),
        (None, Some(d)) if !d.trim().is_empty() => (d, "RUST_LOG"),
        _ => (DEFAULT_DIRECTIVES, "default"),
    };
    EnvFilter::try_new(directives)
        .with_context(|| format!("invalid log filter from {source}: {directives:?}"))
}

/// Installs the global subscriber. Fails if the filter does not parse or a
/// subscriber is already set.
pub fn init_logging(format: LogFormat, explicit_filter: Option<&str>) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = resolve_filter(explicit_filter, rust_log.as_deref())?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init(),
    };
    installed.context("a tracing subscriber is already installed")?;

    tracing::debug!(?format, "logging ready");
    Ok(())
}
