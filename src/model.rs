//! Core domain types for deposit reconciliation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Amount;

/// Fields that identify one real-world transaction output.
pub const NATURAL_KEY: [&str; 2] = ["txid", "vout"];

/// Minimum confirmations for a deposit to count in aggregates.
pub const MIN_CONFIRMATIONS: u64 = 6;

/// Ledger category of a wallet transaction.
///
/// Unknown categories keep their wire string so records round-trip untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Funds received by the wallet.
    Receive,
    /// Mature coinbase reward.
    Generate,
    /// Funds sent by the wallet.
    Send,
    /// Coinbase reward that is not yet spendable.
    Immature,
    /// Coinbase reward from a block that is no longer on the main chain.
    Orphan,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Receive => "receive",
            Category::Generate => "generate",
            Category::Send => "send",
            Category::Immature => "immature",
            Category::Orphan => "orphan",
            Category::Other(other) => other,
        }
    }

    /// Only incoming categories can be deposits.
    pub fn is_incoming(&self) -> bool {
        matches!(self, Category::Receive | Category::Generate)
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.as_str() {
            "receive" => Category::Receive,
            "generate" => Category::Generate,
            "send" => Category::Send,
            "immature" => Category::Immature,
            "orphan" => Category::Orphan,
            _ => Category::Other(value),
        }
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        match value {
            Category::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed ledger event, as delivered by the ledger source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub address: String,
    pub category: Category,
    pub amount: Amount,
    pub confirmations: u64,
    pub txid: String,
    pub vout: u32,
    /// Every other source field, persisted but never interpreted.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TransactionRecord {
    pub fn new(
        address: impl Into<String>,
        category: Category,
        amount: Amount,
        confirmations: u64,
        txid: impl Into<String>,
        vout: u32,
    ) -> Self {
        Self {
            address: address.into(),
            category,
            amount,
            confirmations,
            txid: txid.into(),
            vout,
            extra: Map::new(),
        }
    }

    /// A valid deposit is confirmed enough, non-zero and incoming.
    ///
    /// Recomputed on every call, never cached on the record.
    pub fn is_valid_deposit(&self) -> bool {
        self.confirmations >= MIN_CONFIRMATIONS
            && self.amount.is_positive()
            && self.category.is_incoming()
    }
}

/// Opaque continuation token returned by a ledger source.
///
/// Only equality is exposed: cursors are passed back, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Cursor(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
