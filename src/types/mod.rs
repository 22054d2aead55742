// Core value types shared across the ledger.

/// Chain, asset and coin primitives
pub mod asset;
/// Transaction identifiers and observed transactions
pub mod tx;

pub use asset::{Asset, Chain, Coin};
pub use tx::{Direction, Tx, TxId};

/// Fixed-point amount in the ledger's smallest unit (1e8 per whole unit).
pub type Amount = u128;

/// One whole unit of any asset in smallest-unit fixed point.
pub const ONE_ASSET: Amount = 100_000_000;

/// Errors raised while parsing or validating the value types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("chain code is empty or not alphanumeric: {0:?}")]
    InvalidChain(String),
    #[error("asset is empty")]
    EmptyAsset,
    #[error("transaction id must be 64 hex characters: {0:?}")]
    InvalidTxId(String),
    #[error("transaction id is blank")]
    BlankTxId,
    #[error("from/to address is empty")]
    EmptyAddress,
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),
}

/// Serde helper serializing amounts as decimal strings.
///
/// The observed-transaction feed and the query surface both carry amounts as
/// strings (smallest-unit fixed point), so numbers survive JSON consumers
/// that would truncate 64-bit-plus integers.
pub mod amount_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s
                .trim()
                .parse::<u128>()
                .map_err(|_| de::Error::custom(format!("invalid amount {s:?}"))),
            Raw::Number(n) => Ok(n as u128),
        }
    }
}
