use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    AggregationQueryError, BatchResult, DepositFilter, RecordStore, StoreWriteError, Upserted,
    WriteFailure, selector, to_document,
};
use crate::model::TransactionRecord;

/// In-process record store.
///
/// Iteration order is first-insert order; replacing a record keeps its slot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Documents>,
}

#[derive(Debug, Default)]
struct Documents {
    /// selector -> position in `records`
    index: HashMap<String, usize>,
    records: Vec<TransactionRecord>,
}

impl Documents {
    fn upsert(&mut self, key_fields: &[&str], record: &TransactionRecord) -> Result<Upserted, WriteFailure> {
        let key = selector(key_fields, &to_document(record)?)?;
        match self.index.get(&key) {
            Some(&slot) => {
                self.records[slot] = record.clone();
                Ok(Upserted::Replaced)
            }
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record.clone());
                Ok(Upserted::Inserted)
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every stored record, valid or not.
    pub async fn records(&self) -> Vec<TransactionRecord> {
        self.inner.read().await.records.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert_many(
        &self,
        key_fields: &[&str],
        records: &[TransactionRecord],
    ) -> Result<BatchResult, StoreWriteError> {
        let mut documents = self.inner.write().await;
        let mut committed = BatchResult::default();

        for (index, record) in records.iter().enumerate() {
            let outcome = documents
                .upsert(key_fields, record)
                .map_err(|cause| StoreWriteError {
                    index,
                    committed,
                    cause,
                })?;
            committed.record(outcome);
        }

        debug!(%committed, "memory batch applied");
        Ok(committed)
    }

    async fn find(
        &self,
        filter: &DepositFilter,
    ) -> Result<Vec<TransactionRecord>, AggregationQueryError> {
        let documents = self.inner.read().await;
        Ok(documents
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}
