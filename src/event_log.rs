//! # Event Log
//!
//! Append-only audit trail of ledger mutations. Every mutation appends one
//! event (some append two: the unstake that empties a pool also records the
//! pool's status change). Ids are 1-based, strictly increasing with no gaps
//! and globally ordered across all event types; the log's single mutex is the
//! cross-pool serialization point for id assignment.
//!
//! The only permitted post-creation mutation is appending confirmed outbound
//! transaction ids to an event's `out_txs` once settlement completes.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::LedgerError;
use crate::metrics;
use crate::pool_ledger::PoolStatus;
use crate::types::{amount_string, Asset, Coin, TxId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Stake,
    Unstake,
    Swap,
    Pool,
    Add,
    Gas,
    Refund,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Stake => "stake",
            EventKind::Unstake => "unstake",
            EventKind::Swap => "swap",
            EventKind::Pool => "pool",
            EventKind::Add => "add",
            EventKind::Gas => "gas",
            EventKind::Refund => "refund",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEvent {
    pub pool: Asset,
    #[serde(with = "amount_string")]
    pub stake_units: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnstakeEvent {
    pub pool: Asset,
    #[serde(with = "amount_string")]
    pub stake_units: u128,
    pub basis_points: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub pool: Asset,
    #[serde(with = "amount_string")]
    pub price_target: u128,
    #[serde(with = "amount_string")]
    pub trade_slip: u128,
    #[serde(with = "amount_string")]
    pub liquidity_fee: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatusEvent {
    pub pool: Asset,
    pub status: PoolStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEvent {
    pub pool: Asset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasEvent {
    #[serde(default)]
    pub coins: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundEvent {
    pub code: u32,
    pub reason: String,
}

/// Type-specific payload, tagged externally by the event's `type` field.
///
/// Order matters for the untagged deserializer: variants with more required
/// fields come first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Swap(SwapEvent),
    Unstake(UnstakeEvent),
    Stake(StakeEvent),
    Pool(PoolStatusEvent),
    Refund(RefundEvent),
    Add(AddEvent),
    Gas(GasEvent),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Stake(_) => EventKind::Stake,
            EventPayload::Unstake(_) => EventKind::Unstake,
            EventPayload::Swap(_) => EventKind::Swap,
            EventPayload::Pool(_) => EventKind::Pool,
            EventPayload::Add(_) => EventKind::Add,
            EventPayload::Gas(_) => EventKind::Gas,
            EventPayload::Refund(_) => EventKind::Refund,
        }
    }
}

/// Immutable audit record of one ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    /// Ledger height at which the mutation was applied.
    pub height: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub in_tx: Option<TxId>,
    /// Confirmed outbound hashes; empty until settlement completes.
    pub out_txs: Vec<TxId>,
    pub event: EventPayload,
    pub created_at: DateTime<Utc>,
}

/// The append-only event store.
pub struct EventLog {
    entries: Mutex<Vec<Event>>,
}

impl Default for EventLog {
    fn default() -> Self {
        EventLog::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        EventLog {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Appends a new event and returns its id.
    pub fn append(&self, height: u64, in_tx: Option<TxId>, payload: EventPayload) -> u64 {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let id = entries.len() as u64 + 1;
        let kind = payload.kind();
        entries.push(Event {
            id,
            height,
            kind,
            in_tx,
            out_txs: Vec::new(),
            event: payload,
            created_at: Utc::now(),
        });
        debug!("appended event id={id} type={kind} height={height}");
        metrics::inc_events_appended();
        id
    }

    pub fn get(&self, id: u64) -> Option<Event> {
        if id == 0 {
            return None;
        }
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(id as usize - 1).cloned()
    }

    /// All events with id >= `id`, in id order. Empty past the current max.
    pub fn list_since(&self, id: u64) -> Vec<Event> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let start = id.max(1) as usize - 1;
        if start >= entries.len() {
            return Vec::new();
        }
        entries[start..].to_vec()
    }

    pub fn len(&self) -> u64 {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends confirmed outbound hashes to an existing event.
    ///
    /// Duplicate hashes answer `AlreadyComplete`; callers treat that as a
    /// benign no-op, distinct from `UnknownEvent` which is an invariant
    /// breach on the caller's side.
    pub fn complete_settlement(&self, id: u64, out_txs: &[TxId]) -> Result<(), LedgerError> {
        if id == 0 {
            return Err(LedgerError::UnknownEvent(id));
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let event = entries
            .get_mut(id as usize - 1)
            .ok_or(LedgerError::UnknownEvent(id))?;
        for out_tx in out_txs {
            if event.out_txs.contains(out_tx) {
                return Err(LedgerError::AlreadyComplete {
                    event_id: id,
                    out_tx: out_tx.clone(),
                });
            }
            event.out_txs.push(out_tx.clone());
        }
        debug!("event id={id} settlement complete, {} outbound hashes", event.out_txs.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stake_payload(units: u128) -> EventPayload {
        EventPayload::Stake(StakeEvent {
            pool: "BNB.TCAN-014".parse().unwrap(),
            stake_units: units,
        })
    }

    #[test]
    fn ids_are_dense_and_one_based() {
        let log = EventLog::new();
        assert_eq!(log.append(1, None, stake_payload(10)), 1);
        assert_eq!(log.append(1, None, stake_payload(20)), 2);
        assert_eq!(log.append(2, None, stake_payload(30)), 3);
        assert_eq!(log.len(), 3);
        assert_eq!(log.get(2).unwrap().id, 2);
        assert!(log.get(0).is_none());
        assert!(log.get(4).is_none());
    }

    #[test]
    fn list_since_is_empty_past_the_max() {
        let log = EventLog::new();
        log.append(1, None, stake_payload(10));
        assert_eq!(log.list_since(1).len(), 1);
        assert!(log.list_since(2).is_empty());
        assert!(log.list_since(100).is_empty());
    }

    #[test]
    fn complete_settlement_is_append_only_and_idempotent() {
        let log = EventLog::new();
        let id = log.append(1, None, stake_payload(10));
        let out: TxId = "AB".repeat(32).parse().unwrap();

        log.complete_settlement(id, std::slice::from_ref(&out)).unwrap();
        assert_eq!(log.get(id).unwrap().out_txs, vec![out.clone()]);

        let err = log
            .complete_settlement(id, std::slice::from_ref(&out))
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyComplete { .. }));
        assert_eq!(log.get(id).unwrap().out_txs.len(), 1);

        assert!(matches!(
            log.complete_settlement(99, std::slice::from_ref(&out)),
            Err(LedgerError::UnknownEvent(99))
        ));
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let log = EventLog::new();
        log.append(1, None, stake_payload(10));
        let json = serde_json::to_value(log.get(1).unwrap()).unwrap();
        assert_eq!(json["type"], "stake");
        assert_eq!(json["event"]["stake_units"], "10");
        assert_eq!(json["id"], 1);
    }
}
