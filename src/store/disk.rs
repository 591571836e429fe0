use std::path::Path;

use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::{debug, info};

use super::{
    AggregationQueryError, BatchResult, DepositFilter, RecordStore, StoreError, StoreWriteError,
    Upserted, WriteFailure, selector, to_document,
};
use crate::model::TransactionRecord;

/// Fjall-backed durable record store.
///
/// Documents live in one `transactions` partition keyed by their selector.
/// Iteration order is selector byte order.
#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    transactions: PartitionHandle,
}

impl FjallStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Opening record store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let transactions =
            keyspace.open_partition("transactions", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            transactions,
        })
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        for item in self.transactions.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.transactions.is_empty()?)
    }

    /// Every stored record, valid or not, in iteration order.
    pub fn records(&self) -> Result<Vec<TransactionRecord>, AggregationQueryError> {
        self.scan(|_| true)
    }

    fn upsert(&self, key_fields: &[&str], record: &TransactionRecord) -> Result<Upserted, WriteFailure> {
        let document = to_document(record)?;
        let key = selector(key_fields, &document)?;
        let value = serde_json::to_vec(&document)?;

        let existed = self.transactions.contains_key(key.as_bytes())?;
        self.transactions.insert(key.as_bytes(), value)?;

        Ok(if existed {
            Upserted::Replaced
        } else {
            Upserted::Inserted
        })
    }

    fn scan(
        &self,
        keep: impl Fn(&TransactionRecord) -> bool,
    ) -> Result<Vec<TransactionRecord>, AggregationQueryError> {
        let mut records = Vec::new();
        for item in self.transactions.iter() {
            let (_, value) = item?;
            let record: TransactionRecord = serde_json::from_slice(&value)?;
            if keep(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl RecordStore for FjallStore {
    async fn upsert_many(
        &self,
        key_fields: &[&str],
        records: &[TransactionRecord],
    ) -> Result<BatchResult, StoreWriteError> {
        let mut committed = BatchResult::default();

        for (index, record) in records.iter().enumerate() {
            let outcome = self
                .upsert(key_fields, record)
                .map_err(|cause| StoreWriteError {
                    index,
                    committed,
                    cause,
                })?;
            committed.record(outcome);
        }

        debug!(%committed, "fjall batch applied");
        Ok(committed)
    }

    async fn find(
        &self,
        filter: &DepositFilter,
    ) -> Result<Vec<TransactionRecord>, AggregationQueryError> {
        self.scan(|record| filter.matches(record))
    }
}
