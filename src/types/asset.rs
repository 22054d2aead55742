// src/types/asset.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Amount, TypeError};

/// External chain code, e.g. `BNB`, `BTC`, `ETH`.
///
/// Stored upper-cased; comparisons are therefore case-sensitive on the
/// canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Chain(String);

impl Chain {
    pub fn new(code: &str) -> Result<Self, TypeError> {
        let trimmed = code.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TypeError::InvalidChain(code.to_string()));
        }
        Ok(Chain(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Chain {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chain::new(s)
    }
}

impl TryFrom<String> for Chain {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Chain::new(&value)
    }
}

impl From<Chain> for String {
    fn from(chain: Chain) -> String {
        chain.0
    }
}

/// Chain-qualified asset identifier, e.g. `BNB.BOLT-014`.
///
/// The symbol may carry an issuance suffix after `-`; the portion before it
/// is the ticker (`BOLT`). Instruction memos may abbreviate an asset to its
/// bare symbol, in which case the ledger's default chain qualifies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    chain: Chain,
    symbol: String,
}

impl Asset {
    pub fn new(chain: Chain, symbol: &str) -> Result<Self, TypeError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(TypeError::EmptyAsset);
        }
        Ok(Asset {
            chain,
            symbol: symbol.to_ascii_uppercase(),
        })
    }

    /// Parses `CHAIN.SYMBOL`, or a bare `SYMBOL` qualified by `default_chain`.
    pub fn parse(input: &str, default_chain: &Chain) -> Result<Self, TypeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TypeError::EmptyAsset);
        }
        match trimmed.split_once('.') {
            Some((chain, symbol)) => Asset::new(Chain::new(chain)?, symbol),
            None => Asset::new(default_chain.clone(), trimmed),
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Symbol up to the issuance suffix: `BOLT-014` → `BOLT`.
    pub fn ticker(&self) -> &str {
        self.symbol.split('-').next().unwrap_or(&self.symbol)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.chain, self.symbol)
    }
}

impl FromStr for Asset {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Bare symbols default to the BNB chain, matching the observed feed.
        Asset::parse(s, &Chain("BNB".to_string()))
    }
}

impl TryFrom<String> for Asset {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> String {
        asset.to_string()
    }
}

/// An (asset, amount) pair as carried by observed transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub asset: Asset,
    #[serde(with = "super::amount_string")]
    pub amount: Amount,
}

impl Coin {
    pub fn new(asset: Asset, amount: Amount) -> Self {
        Coin { asset, amount }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.asset)
    }
}
