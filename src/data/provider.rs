//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over historical data sources so the
//! retriever can swap implementations and tests can use canned fixtures. A
//! provider implements whichever download methods its source supports; the
//! defaults report the capability as unavailable.

use crate::domain::{Bar, Resolution, TickQuote, TradeTick};
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// On-disk schema version for bar and tick-quote partitions.
pub const BARS_SCHEMA_V: u32 = 1;

/// On-disk schema version for trade-print partitions.
pub const TRADES_SCHEMA_V: u32 = 2;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("provider does not support {capability}")]
    NotImplemented { capability: String },

    #[error("end date precedes start date")]
    InvalidRange,

    #[error("schema version mismatch at {path}: found {found}, expected {expected}")]
    SchemaMismatch { path: PathBuf, found: u32, expected: u32 },

    #[error("I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error at {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed cache entry at {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("download failed for {symbol} over {start}..={end}: {reason}")]
    Download { symbol: String, start: NaiveDate, end: NaiveDate, reason: String },
}

/// A source of historical market data.
///
/// `rth` restricts results to regular trading hours. Ranges are inclusive on
/// both ends. Every method has a default that reports the capability as
/// unsupported, so a provider implements only what its source offers.
pub trait DataProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Daily OHLCV bars, one per trading date in `[start, end]`.
    fn download_daily_bars(
        &mut self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        rth: bool,
    ) -> Result<Vec<Bar>, DataError> {
        let _ = (symbol, start, end, rth);
        Err(DataError::NotImplemented { capability: "daily bars".to_string() })
    }

    /// Intraday OHLCV bars at `resolution` for every session in `[start, end]`.
    fn download_intraday_bars(
        &mut self,
        symbol: &str,
        resolution: Resolution,
        start: NaiveDate,
        end: NaiveDate,
        rth: bool,
    ) -> Result<Vec<Bar>, DataError> {
        let _ = (symbol, resolution, start, end, rth);
        Err(DataError::NotImplemented { capability: "intraday bars".to_string() })
    }

    /// One-second bid/ask quotes for every session in `[start, end]`.
    fn download_tick_quotes(
        &mut self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        rth: bool,
    ) -> Result<Vec<TickQuote>, DataError> {
        let _ = (symbol, start, end, rth);
        Err(DataError::NotImplemented { capability: "tick quotes".to_string() })
    }

    /// Individual trade prints for every session in `[start, end]`.
    fn download_trade_ticks(
        &mut self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        rth: bool,
    ) -> Result<Vec<TradeTick>, DataError> {
        let _ = (symbol, start, end, rth);
        Err(DataError::NotImplemented { capability: "trade ticks".to_string() })
    }
}
