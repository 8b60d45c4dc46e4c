//! # Structured Logging
//!
//! Initializes the `tracing` subscriber with configurable format (JSON or
//! pretty-printed) and environment-based filtering via `RUST_LOG`.
//!
//! All log output is written to stderr so that stdout remains available for
//! block summaries and check reports.

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "tally_node=info,tally_protocol=info,sled=warn";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, colored output. Suitable for local runs.
    Pretty,
    /// Machine-parseable JSON lines. Suitable for log aggregation.
    Json,
}

/// Builds the filter: `RUST_LOG` (or [`DEFAULT_FILTER`]) plus any extra
/// comma-separated directives.
pub fn build_filter(extra: Option<&str>) -> Result<EnvFilter> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    for directive in extra.into_iter().flat_map(|s| s.split(',')) {
        let directive = directive.trim();
        if directive.is_empty() {
            continue;
        }
        filter = filter.add_directive(
            directive
                .parse()
                .with_context(|| format!("invalid log filter directive: {directive}"))?,
        );
    }
    Ok(filter)
}

/// Initialize the global tracing subscriber.
///
/// Call this exactly once, early in `main()`.
///
/// # Environment
///
/// The `RUST_LOG` environment variable overrides the default filter when
/// set. Syntax follows the `tracing_subscriber::EnvFilter` directives, e.g.:
///
/// ```text
/// RUST_LOG=tally_node=debug,tally_protocol::ledger=debug,sled=warn
/// ```
pub fn init_logging(format: LogFormat, extra_filter: Option<&str>) -> Result<()> {
    let env_filter = build_filter(extra_filter)?;

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(true)
                        .with_line_number(true),
                )
                .try_init()
                .context("failed to install tracing subscriber")?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
                .try_init()
                .context("failed to install tracing subscriber")?;
        }
    }

    tracing::debug!("logging initialized (format={:?})", format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_directives_are_validated() {
        assert!(build_filter(Some("tally_protocol::ledger=debug, sled=warn")).is_ok());
        assert!(build_filter(Some("")).is_ok());
        assert!(build_filter(Some("tally_protocol=loud")).is_err());
    }
}
