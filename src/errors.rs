// src/errors.rs

use thiserror::Error;

use crate::pool_ledger::PoolStatus;
use crate::types::{Asset, TxId, TypeError};

/// Domain errors for ledger mutations.
///
/// Three families, handled differently by the processor:
/// - business rejections (`is_business_rejection()`): recorded as a refund
///   event, the inbound coins bounce back to the sender, the submission still
///   answers success;
/// - structural/validation errors: surfaced to the submitter;
/// - invariant violations: abort the whole commit for that transaction.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] TypeError),

    #[error("pool {0} doesn't exist")]
    PoolNotFound(Asset),

    #[error("pool {pool} is in {status} status, can't swap")]
    InvalidPoolStatus { pool: Asset, status: PoolStatus },

    #[error("stake ratio deviates {deviation_bps} bps from pool price (max {max_bps} bps)")]
    InvalidStakeRatio { deviation_bps: u64, max_bps: u64 },

    #[error("staker {staker} holds no units in pool {pool}")]
    NoSuchStaker { pool: Asset, staker: String },

    #[error("realized price {realized} is below price limit {limit}")]
    TradeTargetNotMet { realized: u128, limit: u128 },

    #[error("amount is invalid")]
    InvalidAmount,

    #[error("invalid balance")]
    InvalidBalance,

    #[error("pool holds {available}, can't emit {requested}")]
    NotEnoughBalance { available: u128, requested: u128 },

    #[error("zero emit asset")]
    ZeroEmitAsset,

    #[error("unsupported swap pair")]
    UnsupportedSwapPair,

    #[error("unknown event {0}")]
    UnknownEvent(u64),

    #[error("outbound {out_tx} already recorded for event {event_id}")]
    AlreadyComplete { event_id: u64, out_tx: TxId },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl LedgerError {
    /// True for errors that are a recorded business outcome, not a failure of
    /// the submission itself.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidPoolStatus { .. }
                | LedgerError::InvalidStakeRatio { .. }
                | LedgerError::NoSuchStaker { .. }
                | LedgerError::TradeTargetNotMet { .. }
                | LedgerError::InvalidAmount
                | LedgerError::InvalidBalance
                | LedgerError::NotEnoughBalance { .. }
                | LedgerError::ZeroEmitAsset
                | LedgerError::UnsupportedSwapPair
        )
    }

    /// Stable numeric code recorded in refund events.
    pub fn refund_code(&self) -> u32 {
        match self {
            LedgerError::InvalidPoolStatus { .. } => 101,
            LedgerError::InvalidStakeRatio { .. } => 102,
            LedgerError::NoSuchStaker { .. } => 103,
            LedgerError::TradeTargetNotMet { .. } => 104,
            LedgerError::InvalidAmount => 105,
            LedgerError::InvalidBalance => 106,
            LedgerError::NotEnoughBalance { .. } => 107,
            LedgerError::ZeroEmitAsset => 108,
            LedgerError::UnsupportedSwapPair => 109,
            _ => 100,
        }
    }
}
