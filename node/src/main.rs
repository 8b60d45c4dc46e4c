// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tally Replay Node
//!
//! Entry point for the `tally-node` binary. Parses CLI arguments, initializes
//! logging and metrics, and drives a decoded message stream through the
//! ledger core.
//!
//! The binary supports three subcommands:
//!
//! - `replay`: apply a JSON-lines message stream, one block summary per line on stdout
//! - `check`: run the asset conservation check on an existing ledger
//! - `version`: print build version information

mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;

use tally_protocol::messages::{Bindings, MessageLog, MessageRenderer};
use tally_protocol::replay::{DecodedMessage, ReplayError, Replayer};
use tally_protocol::storage::{Message, Store};
use tally_protocol::supply::{self, SupplyError};
use tally_protocol::{BlockSummary, Ledger, LedgerConfig, MemoryStore, ProtocolSchedule, SledStore};

use cli::{CheckArgs, Commands, ReplayArgs, TallyNodeCli};
use metrics::ReplayMetrics;

fn main() -> Result<()> {
    let cli = TallyNodeCli::parse();

    match cli.command {
        Commands::Replay(args) => {
            logging::init_logging(cli.logging.log_format, cli.logging.log_filter.as_deref())?;
            replay(args)
        }
        Commands::Check(args) => {
            logging::init_logging(cli.logging.log_format, cli.logging.log_filter.as_deref())?;
            check(args)
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Hands confirmed messages to the log at debug level, with their payload.
struct TracingRenderer;

impl MessageRenderer for TracingRenderer {
    fn render(&self, message: &Message, _bindings: &Bindings, tx_hash: Option<&str>) {
        tracing::debug!(
            target: "tally_node::messages",
            index = message.message_index,
            block = message.block_index,
            command = %message.command,
            category = %message.category,
            tx_hash = tx_hash.unwrap_or(""),
            bindings = %message.bindings,
            "message"
        );
    }
}

/// Applies a JSON-lines message stream to the ledger.
fn replay(args: ReplayArgs) -> Result<()> {
    let config = args.ledger.ledger_config(!args.no_conservation_check);
    let schedule = Arc::new(
        ProtocolSchedule::for_config(&config).context("failed to load protocol schedule")?,
    );
    let metrics = ReplayMetrics::new().context("failed to register metrics")?;

    let input: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    tracing::info!(
        network = %config.network,
        in_memory = args.in_memory,
        conservation_check = config.check_asset_conservation,
        data_dir = %args.ledger.data_dir.display(),
        "starting replay"
    );

    let result = if args.in_memory {
        run_replay(MemoryStore::new(), schedule, &config, input, &metrics)
    } else {
        let store = open_store(&args.ledger.data_dir)?;
        let result = run_replay(store.clone(), schedule, &config, input, &metrics);
        store.flush().context("failed to flush ledger")?;
        result
    };

    if let Some(path) = &args.metrics_out {
        let text = metrics.encode().context("failed to encode metrics")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    }
    result
}

fn run_replay<S: Store>(
    store: S,
    schedule: Arc<ProtocolSchedule>,
    config: &LedgerConfig,
    input: Box<dyn BufRead>,
    metrics: &ReplayMetrics,
) -> Result<()> {
    let log = MessageLog::with_renderer(Arc::new(TracingRenderer));
    let mut replayer = Replayer::new(Ledger::with_log(store, log), schedule, config);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for (number, line) in input.lines().enumerate() {
        let line = line.context("failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let message: DecodedMessage = serde_json::from_str(&line)
            .with_context(|| format!("line {}: malformed message", number + 1))?;

        let timer = metrics.message_apply_seconds.start_timer();
        let applied = replayer.apply(message);
        timer.observe_duration();

        let closed = track(applied, metrics).with_context(|| format!("line {}", number + 1))?;
        metrics.messages_applied_total.inc();
        if let Some(summary) = closed {
            report(&mut out, &summary)?;
        }
    }

    if let Some(summary) = track(replayer.finish(), metrics).context("closing last block")? {
        report(&mut out, &summary)?;
    }
    tracing::info!(
        hash = %replayer.ledger_hash(),
        messages = metrics.messages_applied_total.get(),
        blocks = metrics.blocks_closed_total.get(),
        "replay finished"
    );
    Ok(())
}

/// Feeds a block close into the metrics, counting conservation failures.
fn track(
    result: Result<Option<BlockSummary>, ReplayError>,
    metrics: &ReplayMetrics,
) -> Result<Option<BlockSummary>> {
    match result {
        Ok(summary) => {
            if let Some(summary) = &summary {
                metrics.observe_block(summary);
            }
            Ok(summary)
        }
        Err(e) => {
            if matches!(e, ReplayError::Supply(SupplyError::ConservationViolated(_))) {
                metrics.conservation_failures_total.inc();
            }
            Err(e.into())
        }
    }
}

fn report(out: &mut impl Write, summary: &BlockSummary) -> Result<()> {
    let line = serde_json::json!({
        "height": summary.height,
        "ledger_entries": summary.ledger_entries,
        "ledger_hash": summary.ledger_hash,
        "messages": summary.messages,
    });
    writeln!(out, "{line}").context("failed to write block summary")
}

/// Compares holdings with supply for every asset of an existing ledger.
fn check(args: CheckArgs) -> Result<()> {
    if !args.data_dir.is_dir() {
        anyhow::bail!("no ledger at {}", args.data_dir.display());
    }
    let store = open_store(&args.data_dir)?;
    let supplies = supply::supplies(&store).context("failed to compute supplies")?;
    let held = supply::held(&store).context("failed to compute holdings")?;

    println!("{:<24} {:>28} {:>28}", "asset", "supply", "held");
    for (asset, amount) in &supplies {
        let holding = held.get(asset).copied().unwrap_or(0);
        println!("{asset:<24} {amount:>28} {holding:>28}");
    }

    supply::check_conservation(&store)?;
    println!("{} assets conserved", supplies.len());
    Ok(())
}

fn open_store(data_dir: &std::path::Path) -> Result<SledStore> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
    let store = SledStore::open(data_dir)
        .with_context(|| format!("failed to open ledger at {}", data_dir.display()))?;
    tracing::info!(path = %data_dir.display(), "ledger opened");
    Ok(store)
}

/// Prints version information to stdout.
fn print_version() {
    println!("tally-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc      {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
