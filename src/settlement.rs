//! # Settlement Queue
//!
//! Pending outbound payment obligations, keyed by the inbound transaction
//! that triggered them. The external signer polls
//! [`SettlementQueue::list_pending`] to discover what must be paid out at or
//! before a ledger height; confirmed outbound transactions come back through
//! [`SettlementQueue::resolve`], which is idempotent per `(origin, out_tx)`
//! and closes out the triggering event once every expected output is
//! confirmed.
//!
//! Obligations have no timeout: an output that is never confirmed stays
//! pending and visible forever — outbound delivery is owned by the external
//! collaborator.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::errors::LedgerError;
use crate::event_log::EventLog;
use crate::metrics;
use crate::types::{Chain, Coin, Tx, TxId};

/// One outbound payment the external signer must execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundItem {
    pub to: String,
    pub coin: Coin,
    pub memo: String,
}

#[derive(Debug, Clone)]
struct ExpectedOutput {
    chain: Chain,
    to: String,
    coin: Coin,
    resolved_by: Option<TxId>,
}

/// Obligations created by one inbound transaction.
#[derive(Debug, Clone)]
struct PendingSettlement {
    event_id: u64,
    scheduled_height: u64,
    outputs: Vec<ExpectedOutput>,
}

/// Outcome of reporting one confirmed outbound transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// All expected outputs confirmed; the triggering event now carries the
    /// outbound hashes in order.
    Completed { event_id: u64, out_txs: Vec<TxId> },
    /// This output confirmed, others still pending.
    Partial { event_id: u64, out_tx: TxId },
    /// The same outbound hash was reported before; nothing changed.
    Duplicate,
    /// No pending obligation for that origin; nothing changed.
    UnknownOrigin,
}

pub struct SettlementQueue {
    pending: DashMap<TxId, PendingSettlement>,
    /// Ledger height -> origins scheduled at that height.
    by_height: DashMap<u64, Vec<TxId>>,
    events: Arc<EventLog>,
}

impl SettlementQueue {
    pub fn new(events: Arc<EventLog>) -> Self {
        SettlementQueue {
            pending: DashMap::new(),
            by_height: DashMap::new(),
            events,
        }
    }

    /// Standard memo carried by every outbound payment, echoing the origin.
    pub fn outbound_memo(origin: &TxId) -> String {
        format!("OUTBOUND:{origin}")
    }

    /// Registers the outbound obligations of `origin`, tied to `event_id`.
    /// Zero-amount outputs are dropped; returns false when nothing remains
    /// to pay out.
    pub fn enqueue(
        &self,
        origin: TxId,
        event_id: u64,
        scheduled_height: u64,
        outputs: Vec<(Chain, String, Coin)>,
    ) -> bool {
        let outputs: Vec<ExpectedOutput> = outputs
            .into_iter()
            .filter(|(_, _, coin)| coin.amount > 0)
            .map(|(chain, to, coin)| ExpectedOutput {
                chain,
                to,
                coin,
                resolved_by: None,
            })
            .collect();
        if outputs.is_empty() {
            return false;
        }
        debug!(
            "enqueue settlement origin={origin} event={event_id} height={scheduled_height} outputs={}",
            outputs.len()
        );
        self.by_height
            .entry(scheduled_height)
            .or_default()
            .push(origin.clone());
        self.pending.insert(
            origin,
            PendingSettlement {
                event_id,
                scheduled_height,
                outputs,
            },
        );
        true
    }

    /// Snapshot of everything still owed at or before `height`, grouped by
    /// chain. Each item carries the standard outbound memo so the signer's
    /// payment round-trips back to its origin.
    pub fn list_pending(&self, height: u64) -> BTreeMap<Chain, Vec<OutboundItem>> {
        let mut heights: Vec<u64> = self
            .by_height
            .iter()
            .map(|entry| *entry.key())
            .filter(|h| *h <= height)
            .collect();
        heights.sort_unstable();

        let mut grouped: BTreeMap<Chain, Vec<OutboundItem>> = BTreeMap::new();
        for h in heights {
            let origins = match self.by_height.get(&h) {
                Some(origins) => origins.clone(),
                None => continue,
            };
            for origin in origins {
                let Some(settlement) = self.pending.get(&origin) else {
                    continue;
                };
                let memo = Self::outbound_memo(&origin);
                for output in settlement.outputs.iter().filter(|o| o.resolved_by.is_none()) {
                    grouped.entry(output.chain.clone()).or_default().push(OutboundItem {
                        to: output.to.clone(),
                        coin: output.coin.clone(),
                        memo: memo.clone(),
                    });
                }
            }
        }
        grouped
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Reports one confirmed outbound transaction for `origin`.
    ///
    /// Matching prefers the expected output with the same destination and
    /// asset; if the confirmation doesn't line up exactly (amounts may
    /// differ by external-chain fees) it falls back to the first unresolved
    /// slot. Safe under concurrent resolution of different origins and
    /// idempotent for repeated reports of the same outbound hash.
    pub fn resolve(&self, origin: &TxId, out_tx: &Tx) -> ResolveOutcome {
        let (event_id, completed) = {
            let mut settlement = match self.pending.get_mut(origin) {
                Some(entry) => entry,
                None => {
                    debug!("outbound {} has no pending origin {origin}", out_tx.id);
                    return ResolveOutcome::UnknownOrigin;
                }
            };

            if settlement
                .outputs
                .iter()
                .any(|o| o.resolved_by.as_ref() == Some(&out_tx.id))
            {
                return ResolveOutcome::Duplicate;
            }

            let slot = settlement
                .outputs
                .iter()
                .position(|o| {
                    o.resolved_by.is_none()
                        && o.to == out_tx.to_address
                        && out_tx.coins.iter().any(|c| c.asset == o.coin.asset)
                })
                .or_else(|| settlement.outputs.iter().position(|o| o.resolved_by.is_none()));
            let Some(slot) = slot else {
                // Every slot already resolved by other hashes; treat the
                // extra report as a duplicate.
                return ResolveOutcome::Duplicate;
            };

            settlement.outputs[slot].resolved_by = Some(out_tx.id.clone());
            let completed: Option<Vec<TxId>> = settlement
                .outputs
                .iter()
                .map(|o| o.resolved_by.clone())
                .collect();
            (settlement.event_id, completed)
        };

        match completed {
            Some(out_txs) => {
                // Drop the entry before touching the event log so a
                // concurrent resolve of the same origin sees a clean miss.
                if let Some((_, settlement)) = self.pending.remove(origin) {
                    if let Some(mut origins) = self.by_height.get_mut(&settlement.scheduled_height)
                    {
                        origins.retain(|o| o != origin);
                    }
                }
                match self.events.complete_settlement(event_id, &out_txs) {
                    Ok(()) => {}
                    Err(LedgerError::AlreadyComplete { .. }) => {
                        warn!("event {event_id} already carried outbound hashes");
                    }
                    Err(err) => {
                        error!("failed to complete settlement for event {event_id}: {err}");
                    }
                }
                metrics::inc_settlements_completed();
                debug!("settlement complete origin={origin} event={event_id}");
                ResolveOutcome::Completed { event_id, out_txs }
            }
            None => ResolveOutcome::Partial {
                event_id,
                out_tx: out_tx.id.clone(),
            },
        }
    }
}
