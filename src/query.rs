//! # Query Surface
//!
//! Read-only views over the ledger, shaped for the external transport layer.
//! Every "not found" is an explicit empty/absent value, never an error: an
//! unknown transaction answers blank fields, an event id past the maximum
//! answers an empty list, an unknown pool answers `None`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::chain_height::LastBlock;
use crate::event_log::Event;
use crate::pool_ledger::{Pool, StakePosition};
use crate::processor::TransactionProcessor;
use crate::settlement::OutboundItem;
use crate::types::{Asset, Chain, Coin, TxId};

/// Liveness marker.
#[derive(Debug, Clone, Serialize)]
pub struct Ping {
    pub ping: &'static str,
}

/// Summary of a recorded transaction; blank for unknown ids.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TxSummary {
    pub memo: String,
    pub from_address: String,
    pub to_address: String,
    pub coins: Vec<Coin>,
}

/// Transaction lookup answer. Unknown ids produce empty fields rather than
/// an error so pollers can probe hashes freely.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TxStatusResponse {
    pub tx: TxSummary,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_hashes: Option<Vec<TxId>>,
}

/// Pending outbound work for one chain.
#[derive(Debug, Clone, Serialize)]
pub struct TxOutGroup {
    pub tx_array: Vec<OutboundItem>,
}

/// Everything the external signer must pay out at or before `height`.
#[derive(Debug, Clone, Serialize)]
pub struct KeysignResponse {
    pub height: u64,
    pub chains: BTreeMap<Chain, TxOutGroup>,
}

impl TransactionProcessor {
    pub fn ping(&self) -> Ping {
        Ping { ping: "pong" }
    }

    /// Memo, status and resolved outbound hashes of a transaction.
    pub fn tx_status(&self, id: &TxId) -> TxStatusResponse {
        match self.tx_record(id) {
            None => TxStatusResponse::default(),
            Some(record) => TxStatusResponse {
                tx: TxSummary {
                    memo: record.tx.memo.clone(),
                    from_address: record.tx.from_address.clone(),
                    to_address: record.tx.to_address.clone(),
                    coins: record.tx.coins.clone(),
                },
                status: record.status.as_str().to_string(),
                out_hashes: if record.out_hashes.is_empty() {
                    None
                } else {
                    Some(record.out_hashes.clone())
                },
            },
        }
    }

    pub fn event(&self, id: u64) -> Option<Event> {
        self.events().get(id)
    }

    /// Events from `id` onward; empty past the current maximum.
    pub fn events_since(&self, id: u64) -> Vec<Event> {
        self.events().list_since(id)
    }

    /// Pool summaries in creation order.
    pub fn pool_list(&self) -> Vec<Pool> {
        self.pools().list_pools()
    }

    pub fn pool(&self, asset: &Asset) -> Option<Pool> {
        self.pools().get_pool(asset)
    }

    /// Staker positions, or `None` when the pool has no stakers.
    pub fn stakers(&self, asset: &Asset) -> Option<Vec<StakePosition>> {
        self.pools().list_stakers(asset)
    }

    /// Supported chain codes, in registration order.
    pub fn chains(&self) -> Vec<Chain> {
        self.heights().chains()
    }

    /// Outbound payments still owed at or before `height`, grouped by chain.
    pub fn pending_outbound(&self, height: u64) -> KeysignResponse {
        let chains = self
            .settlement()
            .list_pending(height)
            .into_iter()
            .map(|(chain, tx_array)| (chain, TxOutGroup { tx_array }))
            .collect();
        KeysignResponse { height, chains }
    }

    /// Heights for every known chain.
    pub fn last_block(&self) -> Vec<LastBlock> {
        self.heights().all()
    }

    pub fn last_block_for(&self, chain: &Chain) -> Option<LastBlock> {
        self.heights().get(chain)
    }
}
