//! # Transaction Replayer
//!
//! Replays a JSONL journal of observed transactions through a freshly wired
//! processor and prints the resulting ledger state. Useful for smoke-testing
//! a captured transaction feed against the accounting core without any
//! transport in front of it.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin tx_replayer -- --journal feed.jsonl --pretty
//! ```
//!
//! Each journal line is a JSON object: `{"direction": "inbound", "tx": {...}}`
//! (`direction` defaults to inbound when omitted).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;

use amm_settlement_sdk::types::{Direction, Tx};
use amm_settlement_sdk::{metrics, Settings, TransactionProcessor};

#[derive(Parser, Debug)]
#[command(name = "tx_replayer", about = "Replay an observed-transaction journal")]
struct Args {
    /// Path to the JSONL journal of observed transactions
    #[arg(long)]
    journal: PathBuf,

    /// Also print all events starting at this id
    #[arg(long)]
    events_since: Option<u64>,

    /// Pretty-print the resulting state
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Deserialize)]
struct JournalEntry {
    #[serde(default)]
    direction: Direction,
    tx: Tx,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::new().context("failed to load settings")?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&settings.log.level),
    )
    .init();
    metrics::describe_metrics();

    let processor = TransactionProcessor::new(&settings)?;

    let raw = fs::read_to_string(&args.journal)
        .with_context(|| format!("failed to read journal {:?}", args.journal))?;

    let mut accepted = 0usize;
    let mut skipped = 0usize;
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: JournalEntry = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("line {}: unparseable journal entry: {err}", lineno + 1);
                skipped += 1;
                continue;
            }
        };
        match processor.submit(entry.tx, entry.direction).await {
            Ok(receipt) => {
                accepted += 1;
                info!(
                    "line {}: {} -> {} (duplicate: {})",
                    lineno + 1,
                    receipt.tx_id,
                    receipt.status.as_str(),
                    receipt.duplicate
                );
            }
            Err(err) => {
                warn!("line {}: submission failed: {err}", lineno + 1);
                skipped += 1;
            }
        }
    }

    let mut state = json!({
        "accepted": accepted,
        "skipped": skipped,
        "pools": processor.pool_list(),
        "chains": processor.chains(),
        "last_block": processor.last_block(),
        "pending_outbound": processor.pending_outbound(u64::MAX),
    });
    if let Some(since) = args.events_since {
        state["events"] = serde_json::to_value(processor.events_since(since))?;
    }

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&state)?
    } else {
        serde_json::to_string(&state)?
    };
    println!("{rendered}");
    Ok(())
}
