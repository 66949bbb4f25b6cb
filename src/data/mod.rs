//! Historical data: provider abstraction, on-disk cache, and gap-aware
//! retrieval.

pub mod cache;
pub mod provider;
pub mod retriever;

pub use cache::{CsvCache, SeriesKind};
pub use provider::{DataError, DataProvider, BARS_SCHEMA_V, TRADES_SCHEMA_V};
pub use retriever::{missing_date_ranges, HistoricalRetriever, RetrieveOptions};
