//! Validity-filtered aggregates over the record store.
//!
//! Every query only sees valid deposits (see
//! [`TransactionRecord::is_valid_deposit`]). Queries are independent reads:
//! if ingestion runs concurrently, two calls may observe different snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::Amount;
use crate::model::TransactionRecord;
use crate::report::AddressRegistry;
use crate::store::{AggregationQueryError, DepositFilter, RecordStore};

/// Sentinel id of the bucket for deposits to unknown addresses.
pub const UNKNOWN_BUCKET_ID: u32 = 0;

/// Count and sum of valid deposits for one known address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressTotal {
    #[serde(rename = "_id")]
    pub address: String,
    pub count: usize,
    pub sum: Amount,
}

/// Count and sum of valid deposits for every address outside a known set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownBucket {
    #[serde(rename = "_id")]
    pub id: u32,
    pub count: usize,
    pub sum: Amount,
}

/// A single deposit amount, everything else projected out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepositAmount {
    pub amount: Amount,
}

/// All four aggregates, bundled for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositSummary {
    pub known: Vec<AddressTotal>,
    pub unknown: Option<UnknownBucket>,
    pub min: Option<DepositAmount>,
    pub max: Option<DepositAmount>,
}

/// Read-only queries over a shared record store.
pub struct AggregationEngine<S> {
    store: Arc<S>,
}

impl<S: RecordStore> AggregationEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Group valid deposits to `addresses` by address, ordered by address.
    ///
    /// Addresses without a valid deposit get no row.
    pub async fn sum_by_known_addresses(
        &self,
        addresses: &BTreeSet<String>,
    ) -> Result<Vec<AddressTotal>, AggregationQueryError> {
        let records = self.store.find(&DepositFilter::addresses_in(addresses)).await?;

        let mut groups: BTreeMap<String, (usize, Amount)> = BTreeMap::new();
        for record in records {
            let (count, sum) = groups.entry(record.address).or_default();
            *count += 1;
            *sum = sum
                .checked_add(record.amount)
                .ok_or(AggregationQueryError::SumOverflow)?;
        }

        debug!(addresses = addresses.len(), rows = groups.len(), "known totals computed");
        Ok(groups
            .into_iter()
            .map(|(address, (count, sum))| AddressTotal {
                address,
                count,
                sum,
            })
            .collect())
    }

    /// Collapse valid deposits to addresses outside `addresses` into one bucket.
    ///
    /// Returns `None` when no such deposit exists.
    pub async fn sum_by_unknown_addresses(
        &self,
        addresses: &BTreeSet<String>,
    ) -> Result<Option<UnknownBucket>, AggregationQueryError> {
        let records = self
            .store
            .find(&DepositFilter::addresses_not_in(addresses))
            .await?;
        if records.is_empty() {
            return Ok(None);
        }

        let sum = checked_sum(&records)?;
        Ok(Some(UnknownBucket {
            id: UNKNOWN_BUCKET_ID,
            count: records.len(),
            sum,
        }))
    }

    /// Largest valid deposit.
    ///
    /// Among equal amounts the first in store iteration order wins; which
    /// record that is depends on the backend and is not part of the contract.
    pub async fn max_valid_deposit(&self) -> Result<Option<DepositAmount>, AggregationQueryError> {
        let records = self.store.find(&DepositFilter::valid_deposits()).await?;
        Ok(extremum(&records, |candidate, best| candidate > best))
    }

    /// Smallest valid deposit; ties behave as in [`max_valid_deposit`](Self::max_valid_deposit).
    pub async fn min_valid_deposit(&self) -> Result<Option<DepositAmount>, AggregationQueryError> {
        let records = self.store.find(&DepositFilter::valid_deposits()).await?;
        Ok(extremum(&records, |candidate, best| candidate < best))
    }

    /// Run all four queries for the addresses in `registry`.
    pub async fn summarize(
        &self,
        registry: &AddressRegistry,
    ) -> Result<DepositSummary, AggregationQueryError> {
        let addresses = registry.addresses();
        Ok(DepositSummary {
            known: self.sum_by_known_addresses(&addresses).await?,
            unknown: self.sum_by_unknown_addresses(&addresses).await?,
            min: self.min_valid_deposit().await?,
            max: self.max_valid_deposit().await?,
        })
    }
}

fn checked_sum(records: &[TransactionRecord]) -> Result<Amount, AggregationQueryError> {
    records.iter().try_fold(Amount::ZERO, |acc, record| {
        acc.checked_add(record.amount)
            .ok_or(AggregationQueryError::SumOverflow)
    })
}

/// Keep the first record that no later record `beats`.
fn extremum(
    records: &[TransactionRecord],
    beats: impl Fn(Amount, Amount) -> bool,
) -> Option<DepositAmount> {
    records
        .iter()
        .map(|record| record.amount)
        .reduce(|best, candidate| if beats(candidate, best) { candidate } else { best })
        .map(|amount| DepositAmount { amount })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, NATURAL_KEY};
    use crate::store::MemoryStore;

    const X: &str = "mmFFG4jqAtw9MoCC88hw5FNfreQWuEHADp";
    const Y: &str = "mzzg8fvHXydKs8j9D2a8t7KpSXpGgAnk4n";
    const Z: &str = "2N1SP7r92ZZJvYKG2oNtzPwYnzw62up7mTo";

    // test utils

    fn tx(
        address: &str,
        category: Category,
        amount: &str,
        confirmations: u64,
        txid: &str,
        vout: u32,
    ) -> TransactionRecord {
        TransactionRecord::new(
            address,
            category,
            amount.parse().unwrap(),
            confirmations,
            txid,
            vout,
        )
    }

    fn set(addresses: &[&str]) -> BTreeSet<String> {
        addresses.iter().map(|a| a.to_string()).collect()
    }

    fn amount(value: &str) -> Amount {
        value.parse().unwrap()
    }

    async fn engine_with(records: Vec<TransactionRecord>) -> AggregationEngine<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.upsert_many(&NATURAL_KEY, &records).await.unwrap();
        AggregationEngine::new(store)
    }

    async fn scenario() -> AggregationEngine<MemoryStore> {
        engine_with(vec![
            tx(X, Category::Receive, "8", 1, "T1", 32),
            tx(Y, Category::Receive, "7.71", 6, "T2", 49),
        ])
        .await
    }

    // Scenario

    #[tokio::test]
    async fn known_address_with_valid_deposit_gets_a_row() {
        let engine = scenario().await;
        let rows = engine.sum_by_known_addresses(&set(&[Y])).await.unwrap();
        assert_eq!(
            rows,
            vec![AddressTotal {
                address: Y.to_string(),
                count: 1,
                sum: amount("7.71"),
            }]
        );
    }

    #[tokio::test]
    async fn known_address_without_valid_deposit_is_absent() {
        let engine = scenario().await;
        let rows = engine.sum_by_known_addresses(&set(&[X])).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn unknown_bucket_collects_the_rest() {
        let engine = scenario().await;
        let bucket = engine.sum_by_unknown_addresses(&set(&[X])).await.unwrap();
        assert_eq!(
            bucket,
            Some(UnknownBucket {
                id: UNKNOWN_BUCKET_ID,
                count: 1,
                sum: amount("7.71"),
            })
        );
    }

    #[tokio::test]
    async fn extrema_of_single_valid_deposit() {
        let engine = scenario().await;
        let expected = Some(DepositAmount {
            amount: amount("7.71"),
        });
        assert_eq!(engine.max_valid_deposit().await.unwrap(), expected);
        assert_eq!(engine.min_valid_deposit().await.unwrap(), expected);
    }

    // Validity

    #[tokio::test]
    async fn five_confirmations_are_excluded_everywhere() {
        let engine = engine_with(vec![tx(X, Category::Receive, "1", 5, "T1", 0)]).await;

        assert!(engine.sum_by_known_addresses(&set(&[X])).await.unwrap().is_empty());
        assert_eq!(engine.sum_by_unknown_addresses(&set(&[])).await.unwrap(), None);
        assert_eq!(engine.max_valid_deposit().await.unwrap(), None);
        assert_eq!(engine.min_valid_deposit().await.unwrap(), None);
    }

    #[tokio::test]
    async fn six_confirmations_are_included() {
        let engine = engine_with(vec![tx(X, Category::Receive, "1", 6, "T1", 0)]).await;
        let rows = engine.sum_by_known_addresses(&set(&[X])).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn sends_and_zero_amounts_are_excluded() {
        let engine = engine_with(vec![
            tx(X, Category::Send, "-2", 10, "T1", 0),
            tx(X, Category::Receive, "0", 10, "T2", 0),
            tx(X, Category::Immature, "50", 10, "T3", 0),
            tx(X, Category::Generate, "12.5", 10, "T4", 0),
        ])
        .await;

        let rows = engine.sum_by_known_addresses(&set(&[X])).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 1);
        assert_eq!(rows[0].sum, amount("12.5"));
    }

    // Grouping

    #[tokio::test]
    async fn groups_are_per_address_and_sums_are_exact() {
        let engine = engine_with(vec![
            tx(Y, Category::Receive, "0.1", 6, "T1", 0),
            tx(X, Category::Receive, "0.2", 6, "T2", 0),
            tx(Y, Category::Receive, "0.2", 6, "T3", 0),
            tx(Y, Category::Generate, "0.00000001", 6, "T4", 0),
        ])
        .await;

        let rows = engine.sum_by_known_addresses(&set(&[X, Y])).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].address, X);
        assert_eq!(rows[1].address, Y);
        assert_eq!(rows[1].count, 3);
        assert_eq!(rows[1].sum, amount("0.30000001"));
    }

    #[tokio::test]
    async fn partition_counts_every_valid_deposit_exactly_once() {
        let engine = engine_with(vec![
            tx(X, Category::Receive, "1", 6, "T1", 0),
            tx(Y, Category::Receive, "2", 7, "T2", 0),
            tx(Z, Category::Generate, "3", 8, "T3", 0),
            tx(Z, Category::Receive, "4", 2, "T4", 0),
        ])
        .await;

        for known in [set(&[]), set(&[X]), set(&[X, Y]), set(&[X, Y, Z]), set(&["nobody"])] {
            let rows = engine.sum_by_known_addresses(&known).await.unwrap();
            let bucket = engine.sum_by_unknown_addresses(&known).await.unwrap();

            let known_count: usize = rows.iter().map(|r| r.count).sum();
            let known_sum: Amount = rows.iter().map(|r| r.sum).sum();
            let (unknown_count, unknown_sum) =
                bucket.map_or((0, Amount::ZERO), |b| (b.count, b.sum));

            assert_eq!(known_count + unknown_count, 3, "known set {known:?}");
            assert_eq!(known_sum + unknown_sum, amount("6"), "known set {known:?}");
        }
    }

    // Extrema

    #[tokio::test]
    async fn extrema_bound_every_valid_deposit() {
        let engine = engine_with(vec![
            tx(X, Category::Receive, "3.5", 6, "T1", 0),
            tx(Y, Category::Receive, "0.5", 6, "T2", 0),
            tx(Z, Category::Generate, "12.5", 100, "T3", 0),
            tx(Z, Category::Receive, "99", 1, "T4", 0),
            tx(Z, Category::Receive, "0.01", 1, "T5", 0),
        ])
        .await;

        let max = engine.max_valid_deposit().await.unwrap().unwrap();
        let min = engine.min_valid_deposit().await.unwrap().unwrap();
        assert_eq!(max.amount, amount("12.5"));
        assert_eq!(min.amount, amount("0.5"));
    }

    #[tokio::test]
    async fn tied_extrema_return_the_tied_amount() {
        // which tied record wins is unspecified; only the amount is
        let engine = engine_with(vec![
            tx(X, Category::Receive, "2", 6, "T1", 0),
            tx(Y, Category::Receive, "2", 6, "T2", 0),
        ])
        .await;

        assert_eq!(engine.max_valid_deposit().await.unwrap().unwrap().amount, amount("2"));
        assert_eq!(engine.min_valid_deposit().await.unwrap().unwrap().amount, amount("2"));
    }

    // Wire shapes

    #[test]
    fn result_shapes_serialize_with_underscore_id() {
        let row = AddressTotal {
            address: Y.to_string(),
            count: 1,
            sum: amount("7.71"),
        };
        let bucket = UnknownBucket {
            id: UNKNOWN_BUCKET_ID,
            count: 1,
            sum: amount("7.71"),
        };

        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            serde_json::json!({"_id": Y, "count": 1, "sum": 7.71})
        );
        assert_eq!(
            serde_json::to_value(&bucket).unwrap(),
            serde_json::json!({"_id": 0, "count": 1, "sum": 7.71})
        );
        assert_eq!(
            serde_json::to_value(DepositAmount { amount: amount("7.71") }).unwrap(),
            serde_json::json!({"amount": 7.71})
        );
    }

    #[tokio::test]
    async fn summarize_uses_registry_addresses() {
        let engine = scenario().await;
        let registry = AddressRegistry::from_iter([(X.to_string(), "Leonard McCoy".to_string())]);

        let summary = engine.summarize(&registry).await.unwrap();
        assert!(summary.known.is_empty());
        assert_eq!(summary.unknown.unwrap().count, 1);
        assert_eq!(summary.min, summary.max);
    }
}
