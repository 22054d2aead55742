//! # Instruction Memos
//!
//! Inbound transactions carry their instruction in the transaction memo.
//! The grammar is colon-separated:
//!
//! ```text
//! stake:ASSET
//! withdraw:ASSET[.FRACTION_BPS]     (also: withdraw:ASSET:FRACTION_BPS)
//! swap:ASSET:DESTINATION[:PRICE_LIMIT]
//! add:ASSET
//! GAS
//! OUTBOUND:ORIGIN_TX_ID
//! ```
//!
//! Keywords are case-insensitive and the single-character aliases `+` (stake),
//! `-` (withdraw), `=` (swap) and `%` (add) are accepted. Assets may be
//! abbreviated to their bare symbol; the ledger's default chain qualifies
//! them. A memo that fails to parse is never an error at the submission
//! boundary — the processor absorbs it as a no-op gas transaction.

use thiserror::Error;

use crate::types::{Amount, Asset, Chain, TxId, TypeError};

/// Basis-point denominator for withdraw fractions (10_000 = 100%).
pub const MAX_WITHDRAW_BASIS_POINTS: u64 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoError {
    #[error("memo is empty")]
    Empty,
    #[error("unknown instruction {0:?}")]
    UnknownInstruction(String),
    #[error("instruction is missing its asset")]
    MissingAsset,
    #[error("invalid asset: {0}")]
    InvalidAsset(#[from] TypeError),
    #[error("swap instruction is missing its destination")]
    MissingDestination,
    #[error("invalid withdraw fraction {0:?}")]
    InvalidFraction(String),
    #[error("invalid price limit {0:?}")]
    InvalidPriceLimit(String),
    #[error("invalid origin transaction id {0:?}")]
    InvalidOrigin(String),
}

/// A parsed instruction memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Memo {
    Stake {
        asset: Asset,
    },
    Withdraw {
        asset: Asset,
        basis_points: u64,
    },
    Swap {
        target: Asset,
        destination: String,
        price_limit: Option<Amount>,
    },
    Add {
        asset: Asset,
    },
    Gas,
    /// Confirmation that an outbound payment for `origin` left custody.
    Outbound {
        origin: TxId,
    },
}

impl Memo {
    pub fn parse(raw: &str, default_chain: &Chain) -> Result<Memo, MemoError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MemoError::Empty);
        }
        let parts: Vec<&str> = trimmed.split(':').collect();
        let keyword = parts[0].trim().to_ascii_lowercase();

        match keyword.as_str() {
            "stake" | "+" => Ok(Memo::Stake {
                asset: required_asset(&parts, default_chain)?,
            }),
            "withdraw" | "-" => parse_withdraw(&parts, default_chain),
            "swap" | "=" => parse_swap(&parts, default_chain),
            "add" | "%" => Ok(Memo::Add {
                asset: required_asset(&parts, default_chain)?,
            }),
            "gas" => Ok(Memo::Gas),
            "outbound" => {
                let raw = arg(&parts, 1).ok_or_else(|| MemoError::InvalidOrigin(String::new()))?;
                let origin = raw
                    .parse::<TxId>()
                    .map_err(|_| MemoError::InvalidOrigin(raw.to_string()))?;
                Ok(Memo::Outbound { origin })
            }
            other => Err(MemoError::UnknownInstruction(other.to_string())),
        }
    }
}

fn arg<'a>(parts: &[&'a str], idx: usize) -> Option<&'a str> {
    parts.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn required_asset(parts: &[&str], default_chain: &Chain) -> Result<Asset, MemoError> {
    let raw = arg(parts, 1).ok_or(MemoError::MissingAsset)?;
    Ok(Asset::parse(raw, default_chain)?)
}

fn parse_withdraw(parts: &[&str], default_chain: &Chain) -> Result<Memo, MemoError> {
    let raw = arg(parts, 1).ok_or(MemoError::MissingAsset)?;

    // Either withdraw:ASSET:BPS or the dotted shorthand withdraw:ASSET.BPS.
    // Asset symbols contain dots only in their chain qualifier and never end
    // in an all-digit segment, so the shorthand is unambiguous.
    let (asset_raw, mut basis_points) = match raw.rsplit_once('.').map(|(p, s)| (p, fraction(s))) {
        Some((prefix, Some(bp))) => (prefix, bp),
        _ => (raw, MAX_WITHDRAW_BASIS_POINTS),
    };

    if let Some(explicit) = arg(parts, 2) {
        basis_points = explicit
            .parse::<u64>()
            .ok()
            .filter(|bp| (1..=MAX_WITHDRAW_BASIS_POINTS).contains(bp))
            .ok_or_else(|| MemoError::InvalidFraction(explicit.to_string()))?;
    }

    Ok(Memo::Withdraw {
        asset: Asset::parse(asset_raw, default_chain)?,
        basis_points,
    })
}

fn fraction(segment: &str) -> Option<u64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment
        .parse::<u64>()
        .ok()
        .filter(|bp| (1..=MAX_WITHDRAW_BASIS_POINTS).contains(bp))
}

fn parse_swap(parts: &[&str], default_chain: &Chain) -> Result<Memo, MemoError> {
    let target = required_asset(parts, default_chain)?;
    let destination = arg(parts, 2).ok_or(MemoError::MissingDestination)?;
    let price_limit = match arg(parts, 3) {
        Some(raw) => Some(
            raw.parse::<Amount>()
                .map_err(|_| MemoError::InvalidPriceLimit(raw.to_string()))?,
        ),
        None => None,
    };
    Ok(Memo::Swap {
        target,
        destination: destination.to_string(),
        price_limit,
    })
}
