// src/types/tx.rs

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::{Chain, Coin, TypeError};

static BLANK_TX_ID: Lazy<TxId> = Lazy::new(|| TxId("0".repeat(64)));

/// External transaction hash: 64 hex characters, stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxId(String);

impl TxId {
    pub fn new(raw: &str) -> Result<Self, TypeError> {
        let trimmed = raw.trim();
        if trimmed.len() != 64 || hex::decode(trimmed).is_err() {
            return Err(TypeError::InvalidTxId(raw.to_string()));
        }
        Ok(TxId(trimmed.to_ascii_uppercase()))
    }

    /// Placeholder id used where a slot must exist before the real hash does.
    pub fn blank() -> Self {
        BLANK_TX_ID.clone()
    }

    pub fn is_blank(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TxId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TxId::new(s)
    }
}

impl TryFrom<String> for TxId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TxId::new(&value)
    }
}

impl From<TxId> for String {
    fn from(id: TxId) -> String {
        id.0
    }
}

/// Whether a submitted transaction was observed entering or leaving custody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Inbound,
    Outbound,
}

/// An already-validated transaction delivered by the external observer.
///
/// `coins` may be empty for pure instructions (e.g. a withdraw). `height` is
/// the external chain height at which the transaction was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub id: TxId,
    pub chain: Chain,
    pub from_address: String,
    pub to_address: String,
    #[serde(default)]
    pub coins: Vec<Coin>,
    #[serde(default)]
    pub memo: String,
    pub height: u64,
}

impl Tx {
    /// Structural validation only; business outcomes are never errors here.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.id.is_blank() {
            return Err(TypeError::BlankTxId);
        }
        if self.from_address.trim().is_empty() || self.to_address.trim().is_empty() {
            return Err(TypeError::EmptyAddress);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txid_requires_64_hex_chars() {
        assert!(TxId::new("abc").is_err());
        assert!(TxId::new(&"g".repeat(64)).is_err());
        let id = TxId::new(&"a9".repeat(32)).unwrap();
        assert_eq!(id.as_str(), "A9".repeat(32));
        assert!(!id.is_blank());
        assert!(TxId::blank().is_blank());
    }

    #[test]
    fn tx_validation_rejects_blank_id_and_empty_addresses() {
        let tx = Tx {
            id: TxId::blank(),
            chain: Chain::new("BNB").unwrap(),
            from_address: "sender".into(),
            to_address: "vault".into(),
            coins: vec![],
            memo: "GAS".into(),
            height: 1,
        };
        assert_eq!(tx.validate(), Err(TypeError::BlankTxId));

        let tx = Tx {
            id: TxId::new(&"1f".repeat(32)).unwrap(),
            from_address: "".into(),
            ..tx
        };
        assert_eq!(tx.validate(), Err(TypeError::EmptyAddress));
    }
}
