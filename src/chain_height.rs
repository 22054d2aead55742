//! # Chain Height Tracker
//!
//! Per-external-chain record of the last observed inbound height and the
//! last signed outbound height, plus the ledger's own height counter.
//! Heights only move forward.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::Chain;

#[derive(Debug, Clone, Copy, Default)]
struct Heights {
    last_observed_in: u64,
    last_signed_out: u64,
}

/// Snapshot of one chain's heights alongside the ledger height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastBlock {
    pub chain: Chain,
    pub last_observed_in: u64,
    pub last_signed_out: u64,
    pub ledger: u64,
}

pub struct ChainHeightTracker {
    chains: DashMap<Chain, Heights>,
    order: Mutex<Vec<Chain>>,
    ledger: AtomicU64,
}

impl ChainHeightTracker {
    pub fn new(supported: impl IntoIterator<Item = Chain>) -> Self {
        let tracker = ChainHeightTracker {
            chains: DashMap::new(),
            order: Mutex::new(Vec::new()),
            ledger: AtomicU64::new(0),
        };
        for chain in supported {
            tracker.register(chain);
        }
        tracker
    }

    fn register(&self, chain: Chain) {
        if self.chains.contains_key(&chain) {
            return;
        }
        self.chains.insert(chain.clone(), Heights::default());
        self.order
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(chain);
    }

    /// Claims the next ledger height for a mutation.
    pub fn next_ledger_height(&self) -> u64 {
        self.ledger.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn ledger_height(&self) -> u64 {
        self.ledger.load(Ordering::SeqCst)
    }

    pub fn record_observed_in(&self, chain: &Chain, height: u64) {
        self.register(chain.clone());
        if let Some(mut entry) = self.chains.get_mut(chain) {
            entry.last_observed_in = entry.last_observed_in.max(height);
            trace!("observed in {chain} at {}", entry.last_observed_in);
        }
    }

    pub fn record_signed_out(&self, chain: &Chain, height: u64) {
        self.register(chain.clone());
        if let Some(mut entry) = self.chains.get_mut(chain) {
            entry.last_signed_out = entry.last_signed_out.max(height);
            trace!("signed out {chain} at {}", entry.last_signed_out);
        }
    }

    /// Chain codes in registration order.
    pub fn chains(&self) -> Vec<Chain> {
        self.order.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn get(&self, chain: &Chain) -> Option<LastBlock> {
        let heights = self.chains.get(chain)?;
        Some(LastBlock {
            chain: chain.clone(),
            last_observed_in: heights.last_observed_in,
            last_signed_out: heights.last_signed_out,
            ledger: self.ledger_height(),
        })
    }

    pub fn all(&self) -> Vec<LastBlock> {
        self.chains()
            .into_iter()
            .filter_map(|chain| self.get(&chain))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bnb() -> Chain {
        Chain::new("BNB").unwrap()
    }

    #[test]
    fn heights_are_monotonic() {
        let tracker = ChainHeightTracker::new([bnb()]);
        tracker.record_observed_in(&bnb(), 376);
        tracker.record_observed_in(&bnb(), 100);
        tracker.record_signed_out(&bnb(), 5);

        let last = tracker.get(&bnb()).unwrap();
        assert_eq!(last.last_observed_in, 376);
        assert_eq!(last.last_signed_out, 5);
    }

    #[test]
    fn ledger_height_counts_mutations() {
        let tracker = ChainHeightTracker::new([bnb()]);
        assert_eq!(tracker.next_ledger_height(), 1);
        assert_eq!(tracker.next_ledger_height(), 2);
        assert_eq!(tracker.ledger_height(), 2);
    }

    #[test]
    fn unseen_chains_register_on_first_observation() {
        let tracker = ChainHeightTracker::new([bnb()]);
        let btc = Chain::new("BTC").unwrap();
        tracker.record_observed_in(&btc, 9);
        assert_eq!(tracker.chains(), vec![bnb(), btc.clone()]);
        assert_eq!(tracker.get(&btc).unwrap().last_observed_in, 9);
    }
}
