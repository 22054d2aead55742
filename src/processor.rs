//! # Transaction Processor
//!
//! Single entry point for observed transactions. A submission moves through
//! `Received -> Parsed -> Applied -> (SettlementPending -> Settled |
//! NoSettlementNeeded)`; any structurally valid transaction answers success
//! regardless of business outcome — inbound custody already happened on the
//! external chain, so nothing may be silently dropped.
//!
//! Mutations are serialized per pool (a keyed async mutex); the event log's
//! own lock is the brief cross-pool critical section that makes ids a strict
//! total order. A transaction id is applied at most once: replays answer
//! from the recorded outcome without touching state.

use std::sync::Arc;

use anyhow::Context;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::chain_height::ChainHeightTracker;
use crate::errors::LedgerError;
use crate::event_log::{EventLog, EventPayload, GasEvent, RefundEvent};
use crate::memo::Memo;
use crate::metrics;
use crate::pool_ledger::{PoolLedger, SwapApplied};
use crate::settlement::{ResolveOutcome, SettlementQueue};
use crate::settings::Settings;
use crate::types::{Amount, Asset, Chain, Coin, Direction, Tx, TxId};

/// Lifecycle of a recorded transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Accepted; application in flight. The id is reserved so a replay
    /// can't double-apply.
    Received,
    /// Applied with no outbound obligation.
    Applied,
    /// Applied; outbound payment awaiting confirmation.
    Pending,
    /// All outbound payments confirmed.
    Settled,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Received => "received",
            TxStatus::Applied => "applied",
            TxStatus::Pending => "pending",
            TxStatus::Settled => "settled",
        }
    }
}

/// Everything the ledger remembers about one submitted transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TxRecord {
    pub tx: Tx,
    pub direction: Direction,
    pub status: TxStatus,
    /// Confirmed outbound hashes attributable to this transaction.
    pub out_hashes: Vec<TxId>,
    /// Events this transaction appended.
    pub event_ids: Vec<u64>,
}

/// Answer to a submission. Business rejections still land here, not in an
/// error.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    pub tx_id: TxId,
    pub status: TxStatus,
    /// True when the id was seen before and nothing was re-applied.
    pub duplicate: bool,
}

pub struct TransactionProcessor {
    pools: Arc<PoolLedger>,
    events: Arc<EventLog>,
    settlement: Arc<SettlementQueue>,
    heights: Arc<ChainHeightTracker>,
    tx_records: DashMap<TxId, TxRecord>,
    submit_locks: DashMap<Asset, Arc<Mutex<()>>>,
    base_asset: Asset,
    default_chain: Chain,
    network_fee: Amount,
}

impl TransactionProcessor {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let base_asset = settings
            .ledger
            .parsed_base_asset()
            .context("ledger.base_asset")?;
        let default_chain = settings
            .ledger
            .parsed_default_chain()
            .context("ledger.default_chain")?;
        let supported = settings
            .ledger
            .parsed_supported_chains()
            .context("ledger.supported_chains")?;

        let events = Arc::new(EventLog::new());
        let pools = Arc::new(PoolLedger::new(
            events.clone(),
            base_asset.clone(),
            settings.ledger.max_stake_ratio_deviation_bps,
        ));
        let settlement = Arc::new(SettlementQueue::new(events.clone()));
        let heights = Arc::new(ChainHeightTracker::new(supported));

        Ok(TransactionProcessor {
            pools,
            events,
            settlement,
            heights,
            tx_records: DashMap::new(),
            submit_locks: DashMap::new(),
            base_asset,
            default_chain,
            network_fee: settings.ledger.network_fee as Amount,
        })
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn pools(&self) -> &PoolLedger {
        &self.pools
    }

    pub fn settlement(&self) -> &SettlementQueue {
        &self.settlement
    }

    pub fn heights(&self) -> &ChainHeightTracker {
        &self.heights
    }

    pub fn default_chain(&self) -> &Chain {
        &self.default_chain
    }

    pub fn base_asset(&self) -> &Asset {
        &self.base_asset
    }

    pub fn tx_record(&self, id: &TxId) -> Option<TxRecord> {
        self.tx_records.get(id).map(|r| r.clone())
    }

    /// Submits one observed transaction.
    ///
    /// Errors only on structural invalidity or an internal invariant breach;
    /// every business outcome answers `Ok`.
    pub async fn submit(&self, tx: Tx, direction: Direction) -> Result<SubmitReceipt, LedgerError> {
        tx.validate()?;

        // Reserve the id before touching any state: a concurrent replay of
        // the same hash must answer from the record, never re-apply.
        match self.tx_records.entry(tx.id.clone()) {
            Entry::Occupied(existing) => {
                debug!("duplicate submission {}", tx.id);
                return Ok(SubmitReceipt {
                    tx_id: tx.id.clone(),
                    status: existing.get().status,
                    duplicate: true,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(TxRecord {
                    tx: tx.clone(),
                    direction,
                    status: TxStatus::Received,
                    out_hashes: Vec::new(),
                    event_ids: Vec::new(),
                });
            }
        }

        metrics::inc_transactions();
        let tx_id = tx.id.clone();
        let result = match direction {
            Direction::Inbound => {
                self.heights.record_observed_in(&tx.chain, tx.height);
                self.process_inbound(tx).await
            }
            Direction::Outbound => {
                self.heights.record_signed_out(&tx.chain, tx.height);
                self.process_outbound(tx)
            }
        };
        if result.is_err() {
            // Nothing was applied; release the reservation so a corrected
            // resubmission isn't answered as a duplicate.
            self.tx_records.remove(&tx_id);
        }
        result
    }

    async fn process_inbound(&self, tx: Tx) -> Result<SubmitReceipt, LedgerError> {
        let height = self.heights.next_ledger_height();
        let memo = match Memo::parse(&tx.memo, &self.default_chain) {
            Ok(memo) => memo,
            Err(err) => {
                debug!("absorbing tx {} with unparseable memo: {err}", tx.id);
                return Ok(self.absorb_as_gas(tx, height, Direction::Inbound));
            }
        };

        match memo {
            Memo::Gas => Ok(self.absorb_as_gas(tx, height, Direction::Inbound)),
            Memo::Outbound { origin } => self.apply_outbound_confirmation(tx, origin, height),
            Memo::Stake { asset } => {
                if self.is_base(&asset) {
                    // The base asset has no pool of its own.
                    return Ok(self.absorb_as_gas(tx, height, Direction::Inbound));
                }
                let _guard = self.lock_pool(&asset).await;
                match self
                    .pools
                    .stake(&asset, &tx.from_address, &tx.coins, &tx.id, height)
                {
                    Ok((event_id, _units)) => {
                        Ok(self.record(tx, Direction::Inbound, TxStatus::Applied, vec![event_id]))
                    }
                    Err(err) if err.is_business_rejection() => Ok(self.refund(tx, height, &err)),
                    Err(err) => Err(err),
                }
            }
            Memo::Withdraw {
                asset,
                basis_points,
            } => {
                let _guard = self.lock_pool(&asset).await;
                match self
                    .pools
                    .unstake(&asset, &tx.from_address, basis_points, &tx.id, height)
                {
                    Ok(outcome) => {
                        let outputs = vec![
                            (
                                self.base_asset.chain().clone(),
                                tx.from_address.clone(),
                                Coin::new(self.base_asset.clone(), outcome.base_out),
                            ),
                            (
                                asset.chain().clone(),
                                tx.from_address.clone(),
                                Coin::new(asset.clone(), outcome.asset_out),
                            ),
                        ];
                        let pending = self.settlement.enqueue(
                            tx.id.clone(),
                            outcome.event_id,
                            height,
                            outputs,
                        );
                        let status = if pending {
                            TxStatus::Pending
                        } else {
                            TxStatus::Applied
                        };
                        Ok(self.record(tx, Direction::Inbound, status, vec![outcome.event_id]))
                    }
                    Err(err) if err.is_business_rejection() => Ok(self.refund(tx, height, &err)),
                    Err(err) => Err(err),
                }
            }
            Memo::Swap {
                target,
                destination,
                price_limit,
            } => {
                let Some(source) = tx.coins.iter().find(|c| c.amount > 0).cloned() else {
                    return Ok(self.absorb_as_gas(tx, height, Direction::Inbound));
                };
                let source_is_base = self.is_base(&source.asset);
                let target_is_base = self.is_base(&target);
                if source_is_base == target_is_base {
                    // Base-to-base, or a cross-pool trade this ledger does
                    // not route.
                    return Ok(self.refund(tx, height, &LedgerError::UnsupportedSwapPair));
                }
                let pool_asset = if source_is_base {
                    target.clone()
                } else {
                    source.asset.clone()
                };
                if self.pools.get_pool(&pool_asset).is_none() {
                    return Ok(self.absorb_as_gas(tx, height, Direction::Inbound));
                }

                let _guard = self.lock_pool(&pool_asset).await;
                match self.pools.swap(
                    &pool_asset,
                    &source,
                    &target,
                    price_limit,
                    self.network_fee,
                    &tx.id,
                    height,
                ) {
                    Ok(SwapApplied::Executed { event_id, output }) => {
                        let chain = output.asset.chain().clone();
                        let pending = self.settlement.enqueue(
                            tx.id.clone(),
                            event_id,
                            height,
                            vec![(chain, destination, output)],
                        );
                        let status = if pending {
                            TxStatus::Pending
                        } else {
                            TxStatus::Applied
                        };
                        Ok(self.record(tx, Direction::Inbound, status, vec![event_id]))
                    }
                    Ok(SwapApplied::Rejected {
                        event_id, refund, ..
                    }) => {
                        metrics::inc_swap_rejections();
                        let chain = refund.asset.chain().clone();
                        let pending = self.settlement.enqueue(
                            tx.id.clone(),
                            event_id,
                            height,
                            vec![(chain, tx.from_address.clone(), refund)],
                        );
                        let status = if pending {
                            TxStatus::Pending
                        } else {
                            TxStatus::Applied
                        };
                        Ok(self.record(tx, Direction::Inbound, status, vec![event_id]))
                    }
                    Err(err) => Err(err),
                }
            }
            Memo::Add { asset } => {
                let _guard = self.lock_pool(&asset).await;
                match self.pools.add_liquidity(&asset, &tx.coins, &tx.id, height) {
                    Ok(event_id) => {
                        Ok(self.record(tx, Direction::Inbound, TxStatus::Applied, vec![event_id]))
                    }
                    Err(err) if err.is_business_rejection() => Ok(self.refund(tx, height, &err)),
                    Err(err) => Err(err),
                }
            }
        }
    }

    fn process_outbound(&self, tx: Tx) -> Result<SubmitReceipt, LedgerError> {
        let height = self.heights.next_ledger_height();
        match Memo::parse(&tx.memo, &self.default_chain) {
            Ok(Memo::Outbound { origin }) => self.apply_outbound_confirmation(tx, origin, height),
            _ => {
                debug!("outbound tx {} without OUTBOUND memo, absorbing", tx.id);
                Ok(self.absorb_as_gas(tx, height, Direction::Outbound))
            }
        }
    }

    /// Matches a confirmed outbound payment back to its origin and, once the
    /// origin's whole obligation is confirmed, finalizes its event.
    fn apply_outbound_confirmation(
        &self,
        tx: Tx,
        origin: TxId,
        _height: u64,
    ) -> Result<SubmitReceipt, LedgerError> {
        let outcome = self.settlement.resolve(&origin, &tx);
        let event_ids = match &outcome {
            ResolveOutcome::Completed { event_id, out_txs } => {
                if let Some(mut record) = self.tx_records.get_mut(&origin) {
                    record.out_hashes = out_txs.clone();
                    record.status = TxStatus::Settled;
                }
                info!("origin {origin} settled by {}", tx.id);
                vec![*event_id]
            }
            ResolveOutcome::Partial { event_id, out_tx } => {
                if let Some(mut record) = self.tx_records.get_mut(&origin) {
                    if !record.out_hashes.contains(out_tx) {
                        record.out_hashes.push(out_tx.clone());
                    }
                }
                debug!("origin {origin} partially settled by {}", tx.id);
                vec![*event_id]
            }
            ResolveOutcome::Duplicate => {
                debug!("outbound {} already resolved for {origin}", tx.id);
                Vec::new()
            }
            ResolveOutcome::UnknownOrigin => {
                warn!("outbound {} names unknown origin {origin}", tx.id);
                Vec::new()
            }
        };
        Ok(self.record(tx, Direction::Outbound, TxStatus::Applied, event_ids))
    }

    fn absorb_as_gas(&self, tx: Tx, height: u64, direction: Direction) -> SubmitReceipt {
        let event_id = self.events.append(
            height,
            Some(tx.id.clone()),
            EventPayload::Gas(GasEvent {
                coins: tx.coins.clone(),
            }),
        );
        self.record(tx, direction, TxStatus::Applied, vec![event_id])
    }

    /// Records a business rejection: a refund event plus, when coins were
    /// custodied, a same-asset refund obligation back to the sender.
    fn refund(&self, tx: Tx, height: u64, err: &LedgerError) -> SubmitReceipt {
        let event_id = self.events.append(
            height,
            Some(tx.id.clone()),
            EventPayload::Refund(RefundEvent {
                code: err.refund_code(),
                reason: err.to_string(),
            }),
        );
        let outputs: Vec<(Chain, String, Coin)> = tx
            .coins
            .iter()
            .filter(|coin| coin.amount > 0)
            .map(|coin| {
                (
                    coin.asset.chain().clone(),
                    tx.from_address.clone(),
                    coin.clone(),
                )
            })
            .collect();
        let pending = self
            .settlement
            .enqueue(tx.id.clone(), event_id, height, outputs);
        info!("refunding tx {}: {err}", tx.id);
        let status = if pending {
            TxStatus::Pending
        } else {
            TxStatus::Applied
        };
        self.record(tx, Direction::Inbound, status, vec![event_id])
    }

    fn record(
        &self,
        tx: Tx,
        direction: Direction,
        status: TxStatus,
        event_ids: Vec<u64>,
    ) -> SubmitReceipt {
        let receipt = SubmitReceipt {
            tx_id: tx.id.clone(),
            status,
            duplicate: false,
        };
        self.tx_records.insert(
            tx.id.clone(),
            TxRecord {
                tx,
                direction,
                status,
                out_hashes: Vec::new(),
                event_ids,
            },
        );
        receipt
    }

    fn is_base(&self, asset: &Asset) -> bool {
        asset.ticker() == self.base_asset.ticker()
    }

    async fn lock_pool(&self, asset: &Asset) -> OwnedMutexGuard<()> {
        let lock = self
            .submit_locks
            .entry(asset.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        lock.lock_owned().await
    }
}
