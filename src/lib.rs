//! # AMM Settlement SDK
//!
//! A Rust library implementing the core of an automated-market-maker
//! settlement ledger: pool accounting, slippage-protected swap pricing, an
//! append-only audit log, and reconciliation of outbound payments against
//! the inbound transactions that triggered them.
//!
//! ## Overview
//!
//! The SDK is the accounting layer of a cross-chain ledger node. External
//! collaborators (chain observers, the outbound signer, the HTTP transport)
//! deliver already-validated transactions and consume settlement
//! instructions; everything between those boundaries lives here:
//!
//! - **Pool accounting**: per-asset liquidity pools with proportional staker
//!   units, created on first stake and destroyed on full withdrawal.
//! - **Swap settlement**: stateless slip-based pricing with caller-specified
//!   price protection and well-defined refund semantics on rejection.
//! - **Audit trail**: an append-only, gap-free, globally ordered event log;
//!   the only post-creation mutation is attaching confirmed outbound hashes.
//! - **Reconciliation**: pending outbound obligations indexed by height,
//!   idempotently resolved as the external chains confirm payments.
//!
//! ## Architecture
//!
//! Inbound transactions enter through [`TransactionProcessor::submit`],
//! which parses the instruction memo and dispatches to the pool ledger and
//! swap engine under a per-pool exclusive section. Mutations append events;
//! mutations that owe payments register with the settlement queue, which the
//! external signer drains via the pending-work query.

// Core Types
/// Chain, asset, coin and transaction value types
pub mod types;
/// Instruction memo grammar
pub mod memo;
/// Domain error taxonomy
pub mod errors;

// Ledger State
/// Append-only event log
pub mod event_log;
/// Pool and staker-unit accounting
pub mod pool_ledger;
/// Stateless AMM pricing
pub mod swap_engine;
/// Pending outbound obligations and resolution
pub mod settlement;
/// Per-chain height tracking
pub mod chain_height;

// Orchestration
/// Single entry point for observed transactions
pub mod processor;
/// Read-only query surface
pub mod query;

// Infrastructure
/// Configuration management
pub mod settings;
/// Metrics and observability (feature-gated)
pub mod metrics;

// Re-exports for convenience
pub use chain_height::ChainHeightTracker;
pub use event_log::EventLog;
pub use pool_ledger::PoolLedger;
pub use processor::TransactionProcessor;
pub use settings::Settings;
pub use settlement::SettlementQueue;
pub use types::{Asset, Chain, Coin, Direction, Tx, TxId};
