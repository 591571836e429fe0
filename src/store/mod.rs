//! Keyed record store with ordered, idempotent batch upserts.
//!
//! A record's identity is the projection of its document form onto a
//! caller-supplied list of key fields. Upserting a record whose projection
//! already exists replaces the stored document wholesale.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::model::TransactionRecord;

mod disk;
pub use disk::FjallStore;

mod memory;
pub use memory::MemoryStore;

mod error;
pub use error::{AggregationQueryError, StoreError, StoreWriteError, WriteFailure};

/// Tally of committed operations in one upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub inserted: usize,
    pub replaced: usize,
}

impl BatchResult {
    pub fn applied(&self) -> usize {
        self.inserted + self.replaced
    }

    pub fn absorb(&mut self, other: BatchResult) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
    }

    fn record(&mut self, outcome: Upserted) {
        match outcome {
            Upserted::Inserted => self.inserted += 1,
            Upserted::Replaced => self.replaced += 1,
        }
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} inserted, {} replaced", self.inserted, self.replaced)
    }
}

/// Outcome of a single upsert operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upserted {
    Inserted,
    Replaced,
}

/// Which addresses a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressScope {
    Any,
    In(BTreeSet<String>),
    NotIn(BTreeSet<String>),
}

impl AddressScope {
    pub fn contains(&self, address: &str) -> bool {
        match self {
            AddressScope::Any => true,
            AddressScope::In(set) => set.contains(address),
            AddressScope::NotIn(set) => !set.contains(address),
        }
    }
}

/// Read filter: valid deposits within an address scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositFilter {
    pub scope: AddressScope,
}

impl DepositFilter {
    pub fn valid_deposits() -> Self {
        Self {
            scope: AddressScope::Any,
        }
    }

    pub fn addresses_in(addresses: &BTreeSet<String>) -> Self {
        Self {
            scope: AddressScope::In(addresses.clone()),
        }
    }

    pub fn addresses_not_in(addresses: &BTreeSet<String>) -> Self {
        Self {
            scope: AddressScope::NotIn(addresses.clone()),
        }
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        record.is_valid_deposit() && self.scope.contains(&record.address)
    }
}

/// A durable collection of transaction records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Upsert `records` in order, keyed by their projection onto `key_fields`.
    ///
    /// Stops at the first failing operation; the error reports the committed prefix.
    async fn upsert_many(
        &self,
        key_fields: &[&str],
        records: &[TransactionRecord],
    ) -> Result<BatchResult, StoreWriteError>;

    /// Return every stored record matching `filter`, in store iteration order.
    async fn find(
        &self,
        filter: &DepositFilter,
    ) -> Result<Vec<TransactionRecord>, AggregationQueryError>;
}

/// Encode a record as its stored document.
fn to_document(record: &TransactionRecord) -> Result<Map<String, Value>, WriteFailure> {
    match serde_json::to_value(record)? {
        Value::Object(document) => Ok(document),
        other => Err(WriteFailure::Encode(serde::ser::Error::custom(format!(
            "record encoded as {other} instead of an object"
        )))),
    }
}

/// Build the canonical selector for `document` from `key_fields`.
///
/// `{txid, vout}` becomes `{"txid":"..","vout":49}` regardless of field order.
fn selector(key_fields: &[&str], document: &Map<String, Value>) -> Result<String, WriteFailure> {
    if key_fields.is_empty() {
        return Err(WriteFailure::EmptyKey);
    }

    let mut fields = key_fields.to_vec();
    fields.sort_unstable();
    fields.dedup();

    let mut projection = Map::new();
    for field in fields {
        let value = document
            .get(field)
            .ok_or_else(|| WriteFailure::MissingKeyField(field.to_string()))?;
        projection.insert(field.to_string(), value.clone());
    }
    Ok(Value::Object(projection).to_string())
}
