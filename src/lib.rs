pub mod aggregate;
pub mod amount;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod report;
pub mod source;
pub mod store;

pub use aggregate::AggregationEngine;
pub use amount::Amount;
pub use error::Error;
pub use ingest::Ingestor;
pub use model::{Category, Cursor, TransactionRecord};
pub use source::{FixtureSource, LedgerSource};
pub use store::{FjallStore, MemoryStore, RecordStore};
