//! # Pool Ledger
//!
//! Owns all pool and staker-unit state. Pools are created on the first stake
//! of a new asset and destroyed when the last staker fully unstakes and the
//! depths return to zero; their events remain in the log. Listings preserve
//! insertion order.
//!
//! Callers (the transaction processor) serialize mutations per pool; the
//! ledger itself only guarantees that each operation is internally
//! consistent and that every applied mutation appends its event before the
//! operation returns. All fallible checks run before any state is written,
//! so a rejected operation leaves no trace besides its refund event.

use std::fmt;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use ethnum::U256;
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::LedgerError;
use crate::event_log::{
    AddEvent, EventLog, EventPayload, PoolStatusEvent, RefundEvent, StakeEvent, SwapEvent,
    UnstakeEvent,
};
use crate::memo::MAX_WITHDRAW_BASIS_POINTS;
use crate::swap_engine;
use crate::types::{amount_string, Amount, Asset, Coin, TxId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    Bootstrap,
    Enabled,
    Suspended,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoolStatus::Bootstrap => "Bootstrap",
            PoolStatus::Enabled => "Enabled",
            PoolStatus::Suspended => "Suspended",
        };
        f.write_str(s)
    }
}

/// A two-asset liquidity reserve: the ledger's base asset paired with one
/// external asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub asset: Asset,
    #[serde(with = "amount_string")]
    pub balance_base: Amount,
    #[serde(with = "amount_string")]
    pub balance_asset: Amount,
    #[serde(with = "amount_string")]
    pub pool_units: Amount,
    pub status: PoolStatus,
}

impl Pool {
    fn new(asset: Asset) -> Self {
        Pool {
            asset,
            balance_base: 0,
            balance_asset: 0,
            pool_units: 0,
            status: PoolStatus::Bootstrap,
        }
    }
}

/// One staker's proportional claim on a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    pub staker: String,
    #[serde(with = "amount_string")]
    pub units: Amount,
}

/// Result of applying an unstake.
#[derive(Debug, Clone)]
pub struct UnstakeOutcome {
    pub event_id: u64,
    pub units_burned: Amount,
    pub base_out: Amount,
    pub asset_out: Amount,
    pub pool_destroyed: bool,
}

/// Result of applying a swap.
#[derive(Debug, Clone)]
pub enum SwapApplied {
    Executed {
        event_id: u64,
        output: Coin,
    },
    /// Price protection or pool state rejected the trade: the pool's base
    /// balance paid the fixed network fee and the full input bounces back.
    Rejected {
        event_id: u64,
        refund: Coin,
        reason: String,
    },
}

pub struct PoolLedger {
    pools: DashMap<Asset, Pool>,
    stakers: DashMap<Asset, IndexMap<String, Amount>>,
    /// Pool listing order; pruned when a pool is destroyed.
    order: Mutex<Vec<Asset>>,
    events: Arc<EventLog>,
    base_asset: Asset,
    max_ratio_deviation_bps: u64,
}

impl PoolLedger {
    pub fn new(events: Arc<EventLog>, base_asset: Asset, max_ratio_deviation_bps: u64) -> Self {
        PoolLedger {
            pools: DashMap::new(),
            stakers: DashMap::new(),
            order: Mutex::new(Vec::new()),
            events,
            base_asset,
            max_ratio_deviation_bps,
        }
    }

    pub fn base_asset(&self) -> &Asset {
        &self.base_asset
    }

    fn is_base(&self, asset: &Asset) -> bool {
        asset.ticker() == self.base_asset.ticker()
    }

    /// Splits contributed coins into (base, paired-asset) amounts for `pool`.
    fn split_contribution(&self, pool: &Asset, coins: &[Coin]) -> (Amount, Amount) {
        let mut base = 0u128;
        let mut paired = 0u128;
        for coin in coins {
            if self.is_base(&coin.asset) {
                base = base.saturating_add(coin.amount);
            } else if coin.asset == *pool {
                paired = paired.saturating_add(coin.amount);
            }
        }
        (base, paired)
    }

    /// Deposits liquidity and issues proportional units.
    ///
    /// The first stake establishes the pool price and is issued units equal
    /// to the contributed base amount; later stakes must land inside the
    /// ratio tolerance band around the current price.
    pub fn stake(
        &self,
        pool_asset: &Asset,
        staker: &str,
        coins: &[Coin],
        in_tx: &TxId,
        height: u64,
    ) -> Result<(u64, Amount), LedgerError> {
        let (r, t) = self.split_contribution(pool_asset, coins);
        if r == 0 && t == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let existing = self.pools.get(pool_asset).map(|p| p.clone());
        let units = match &existing {
            None => {
                // First stake: the contributed base amount both sets the
                // price and denominates the bootstrap units.
                if r == 0 {
                    return Err(LedgerError::InvalidStakeRatio {
                        deviation_bps: MAX_WITHDRAW_BASIS_POINTS,
                        max_bps: self.max_ratio_deviation_bps,
                    });
                }
                r
            }
            Some(pool) if pool.pool_units == 0 => {
                if r == 0 {
                    return Err(LedgerError::InvalidStakeRatio {
                        deviation_bps: MAX_WITHDRAW_BASIS_POINTS,
                        max_bps: self.max_ratio_deviation_bps,
                    });
                }
                r
            }
            Some(pool) => {
                let deviation = ratio_deviation_bps(pool.balance_base, pool.balance_asset, r, t);
                if deviation > self.max_ratio_deviation_bps {
                    return Err(LedgerError::InvalidStakeRatio {
                        deviation_bps: deviation,
                        max_bps: self.max_ratio_deviation_bps,
                    });
                }
                calc_stake_units(pool.pool_units, pool.balance_base, pool.balance_asset, r, t)
            }
        };
        if units == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        // All checks passed; apply.
        let mut pool = self
            .pools
            .entry(pool_asset.clone())
            .or_insert_with(|| {
                self.order
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(pool_asset.clone());
                info!("created pool {pool_asset}");
                Pool::new(pool_asset.clone())
            });
        pool.balance_base += r;
        pool.balance_asset += t;
        pool.pool_units += units;
        if pool.status == PoolStatus::Bootstrap && pool.balance_base > 0 && pool.balance_asset > 0 {
            pool.status = PoolStatus::Enabled;
            info!("pool {pool_asset} enabled");
        }
        drop(pool);

        let mut positions = self.stakers.entry(pool_asset.clone()).or_default();
        *positions.entry(staker.to_string()).or_insert(0) += units;
        drop(positions);

        let event_id = self.events.append(
            height,
            Some(in_tx.clone()),
            EventPayload::Stake(StakeEvent {
                pool: pool_asset.clone(),
                stake_units: units,
            }),
        );
        debug!("stake {staker} -> {pool_asset}: {units} units (event {event_id})");
        Ok((event_id, units))
    }

    /// Burns a fraction of the staker's units and releases the proportional
    /// depths. Emptying the pool flips it back to `Bootstrap` (with a `pool`
    /// event) and destroys it once both depths are zero.
    pub fn unstake(
        &self,
        pool_asset: &Asset,
        staker: &str,
        basis_points: u64,
        in_tx: &TxId,
        height: u64,
    ) -> Result<UnstakeOutcome, LedgerError> {
        let staker_units = self
            .stakers
            .get(pool_asset)
            .and_then(|positions| positions.get(staker).copied())
            .filter(|units| *units > 0)
            .ok_or_else(|| LedgerError::NoSuchStaker {
                pool: pool_asset.clone(),
                staker: staker.to_string(),
            })?;

        let mut pool = self
            .pools
            .get_mut(pool_asset)
            .ok_or_else(|| LedgerError::PoolNotFound(pool_asset.clone()))?;
        let burn = mul_div(staker_units, basis_points as u128, MAX_WITHDRAW_BASIS_POINTS as u128);
        if burn == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let base_out = mul_div(pool.balance_base, burn, pool.pool_units);
        let asset_out = mul_div(pool.balance_asset, burn, pool.pool_units);

        // Compute every new value before assigning any: an underflow must
        // abort with nothing applied.
        let new_base = pool
            .balance_base
            .checked_sub(base_out)
            .ok_or_else(|| LedgerError::InvariantViolation("negative base balance".into()))?;
        let new_asset = pool
            .balance_asset
            .checked_sub(asset_out)
            .ok_or_else(|| LedgerError::InvariantViolation("negative asset balance".into()))?;
        let new_units = pool
            .pool_units
            .checked_sub(burn)
            .ok_or_else(|| LedgerError::InvariantViolation("negative pool units".into()))?;
        pool.balance_base = new_base;
        pool.balance_asset = new_asset;
        pool.pool_units = new_units;

        let emptied = pool.pool_units == 0;
        if emptied {
            pool.status = PoolStatus::Bootstrap;
        }
        let destroyed = emptied && pool.balance_base == 0 && pool.balance_asset == 0;
        drop(pool);

        if let Some(mut positions) = self.stakers.get_mut(pool_asset) {
            let remaining = staker_units - burn;
            if remaining == 0 {
                positions.shift_remove(staker);
            } else {
                positions.insert(staker.to_string(), remaining);
            }
            let empty = positions.is_empty();
            drop(positions);
            if empty {
                self.stakers.remove(pool_asset);
            }
        }

        let event_id = self.events.append(
            height,
            Some(in_tx.clone()),
            EventPayload::Unstake(UnstakeEvent {
                pool: pool_asset.clone(),
                stake_units: burn,
                basis_points,
            }),
        );
        if emptied {
            self.events.append(
                height,
                Some(in_tx.clone()),
                EventPayload::Pool(PoolStatusEvent {
                    pool: pool_asset.clone(),
                    status: PoolStatus::Bootstrap,
                }),
            );
            info!("pool {pool_asset} fully unstaked, back to Bootstrap");
        }
        if destroyed {
            self.pools.remove(pool_asset);
            self.order
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|a| a != pool_asset);
            debug!("pool {pool_asset} destroyed");
        }

        Ok(UnstakeOutcome {
            event_id,
            units_burned: burn,
            base_out,
            asset_out,
            pool_destroyed: destroyed,
        })
    }

    /// Donates depth to a pool without issuing units.
    pub fn add_liquidity(
        &self,
        pool_asset: &Asset,
        coins: &[Coin],
        in_tx: &TxId,
        height: u64,
    ) -> Result<u64, LedgerError> {
        let (r, t) = self.split_contribution(pool_asset, coins);
        if r == 0 && t == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let mut pool = self
            .pools
            .entry(pool_asset.clone())
            .or_insert_with(|| {
                self.order
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(pool_asset.clone());
                info!("created pool {pool_asset} via add");
                Pool::new(pool_asset.clone())
            });
        pool.balance_base += r;
        pool.balance_asset += t;
        drop(pool);

        let event_id = self.events.append(
            height,
            Some(in_tx.clone()),
            EventPayload::Add(AddEvent {
                pool: pool_asset.clone(),
            }),
        );
        Ok(event_id)
    }

    /// Prices and applies a swap, or records its rejection.
    ///
    /// The caller resolved which pool the trade crosses; `source` is the
    /// custodied input coin, `target` the requested output asset.
    #[allow(clippy::too_many_arguments)]
    pub fn swap(
        &self,
        pool_asset: &Asset,
        source: &Coin,
        target: &Asset,
        price_limit: Option<Amount>,
        network_fee: Amount,
        in_tx: &TxId,
        height: u64,
    ) -> Result<SwapApplied, LedgerError> {
        let source_is_base = self.is_base(&source.asset);
        let pool = self
            .pools
            .get(pool_asset)
            .map(|p| p.clone())
            .ok_or_else(|| LedgerError::PoolNotFound(pool_asset.clone()))?;

        let outcome = (|| -> Result<swap_engine::SwapOutput, LedgerError> {
            if pool.status != PoolStatus::Enabled {
                return Err(LedgerError::InvalidPoolStatus {
                    pool: pool_asset.clone(),
                    status: pool.status,
                });
            }
            let (input_depth, output_depth) = if source_is_base {
                (pool.balance_base, pool.balance_asset)
            } else {
                (pool.balance_asset, pool.balance_base)
            };
            let priced = swap_engine::price(input_depth, output_depth, source.amount)?;
            if !swap_engine::meets_price_limit(priced.emitted, source.amount, price_limit) {
                return Err(LedgerError::TradeTargetNotMet {
                    realized: swap_engine::realized_price(priced.emitted, source.amount),
                    limit: price_limit.unwrap_or(0),
                });
            }
            Ok(priced)
        })();

        match outcome {
            Ok(priced) => {
                let mut pool = self
                    .pools
                    .get_mut(pool_asset)
                    .ok_or_else(|| LedgerError::PoolNotFound(pool_asset.clone()))?;
                if source_is_base {
                    pool.balance_base = priced.input_depth_after;
                    pool.balance_asset = priced.output_depth_after;
                } else {
                    pool.balance_asset = priced.input_depth_after;
                    pool.balance_base = priced.output_depth_after;
                }
                drop(pool);

                let event_id = self.events.append(
                    height,
                    Some(in_tx.clone()),
                    EventPayload::Swap(SwapEvent {
                        pool: pool_asset.clone(),
                        price_target: price_limit.unwrap_or(0),
                        trade_slip: priced.trade_slip_bps,
                        liquidity_fee: priced.liquidity_fee,
                    }),
                );
                info!(
                    "swap {} -> {} emitted {} (event {event_id})",
                    source, target, priced.emitted
                );
                Ok(SwapApplied::Executed {
                    event_id,
                    output: Coin::new(target.clone(), priced.emitted),
                })
            }
            Err(err) if err.is_business_rejection() => {
                // Rejection path: the pool's base balance pays the fixed
                // network fee and the input refunds in kind. Nothing else
                // moves.
                let mut pool = self
                    .pools
                    .get_mut(pool_asset)
                    .ok_or_else(|| LedgerError::PoolNotFound(pool_asset.clone()))?;
                let fee = network_fee.min(pool.balance_base);
                pool.balance_base -= fee;
                drop(pool);

                let reason = err.to_string();
                let event_id = self.events.append(
                    height,
                    Some(in_tx.clone()),
                    EventPayload::Refund(RefundEvent {
                        code: err.refund_code(),
                        reason: reason.clone(),
                    }),
                );
                info!("swap rejected on {pool_asset}: {reason} (event {event_id})");
                Ok(SwapApplied::Rejected {
                    event_id,
                    refund: source.clone(),
                    reason,
                })
            }
            Err(err) => Err(err),
        }
    }

    pub fn get_pool(&self, asset: &Asset) -> Option<Pool> {
        self.pools.get(asset).map(|p| p.clone())
    }

    /// Pools in creation order. Destroyed pools are gone from here even
    /// though their events remain queryable.
    pub fn list_pools(&self) -> Vec<Pool> {
        let order = self.order.lock().unwrap_or_else(|e| e.into_inner());
        order
            .iter()
            .filter_map(|asset| self.pools.get(asset).map(|p| p.clone()))
            .collect()
    }

    /// `None` exactly when the pool has no staker positions — a pool that
    /// was fully unstaked answers the same as one that never existed.
    pub fn list_stakers(&self, asset: &Asset) -> Option<Vec<StakePosition>> {
        let positions = self.stakers.get(asset)?;
        if positions.is_empty() {
            return None;
        }
        Some(
            positions
                .iter()
                .map(|(staker, units)| StakePosition {
                    staker: staker.clone(),
                    units: *units,
                })
                .collect(),
        )
    }
}

/// Units for a follow-on stake: `P * (r*T + R*t) / (2*R*T)`, i.e. the
/// average of the contribution's share of each side, denominated in existing
/// units.
fn calc_stake_units(p: Amount, big_r: Amount, big_t: Amount, r: Amount, t: Amount) -> Amount {
    if big_r == 0 || big_t == 0 {
        return 0;
    }
    let numerator = U256::from(p) * (U256::from(r) * U256::from(big_t) + U256::from(big_r) * U256::from(t));
    let denominator = U256::from(2u8) * U256::from(big_r) * U256::from(big_t);
    u128::try_from(numerator / denominator).unwrap_or(u128::MAX)
}

/// Deviation of the contributed ratio from the pool price, in basis points.
fn ratio_deviation_bps(big_r: Amount, big_t: Amount, r: Amount, t: Amount) -> u64 {
    let cross_contrib = U256::from(r) * U256::from(big_t);
    let cross_pool = U256::from(big_r) * U256::from(t);
    let max = cross_contrib.max(cross_pool);
    if max == U256::ZERO {
        return MAX_WITHDRAW_BASIS_POINTS;
    }
    let diff = max - cross_contrib.min(cross_pool);
    u128::try_from(diff * U256::from(10_000u32) / max).unwrap_or(u128::MAX) as u64
}

fn mul_div(a: Amount, b: Amount, c: Amount) -> Amount {
    if c == 0 {
        return 0;
    }
    u128::try_from(U256::from(a) * U256::from(b) / U256::from(c)).unwrap_or(u128::MAX)
}
