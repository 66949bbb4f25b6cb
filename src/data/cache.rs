//! CSV cache with date-partitioned layout.
//!
//! Layout: `{root}/{asset_class}/{SYMBOL}/{series_token}/...`
//!
//! Daily bars live in a single `daily.csv` per symbol; intraday bars, tick
//! quotes, and trade prints are partitioned one file per session date
//! (`YYYY-MM-DD.csv`). Each series directory carries a `.schema_v` marker so
//! stale layouts fail loudly instead of parsing garbage.
//!
//! Writes are atomic: write to `.tmp`, rename into place.

use super::provider::{DataError, BARS_SCHEMA_V, TRADES_SCHEMA_V};
use crate::domain::{Bar, Contract, Exchange, Resolution, TickQuote, TradeTick};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

const SCHEMA_MARKER: &str = ".schema_v";
const DAILY_FILE: &str = "daily.csv";

/// Which series of a symbol a cache operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    DailyBars,
    IntradayBars(Resolution),
    TickQuotes,
    TradeTicks,
}

impl SeriesKind {
    /// Directory token under the symbol directory.
    pub fn token(&self) -> String {
        match self {
            SeriesKind::DailyBars => "daily".to_string(),
            SeriesKind::IntradayBars(res) => res.token(),
            SeriesKind::TickQuotes => "tick".to_string(),
            SeriesKind::TradeTicks => "trades".to_string(),
        }
    }

    pub fn schema_version(&self) -> u32 {
        match self {
            SeriesKind::TradeTicks => TRADES_SCHEMA_V,
            _ => BARS_SCHEMA_V,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DailyBarRecord {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct IntradayBarRecord {
    datetime: NaiveDateTime,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct TickRecord {
    datetime: NaiveDateTime,
    bid: f64,
    ask: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct TradeRecord {
    timestamp: NaiveDateTime,
    exchange: Option<Exchange>,
    size: f64,
    price: f64,
}

/// The on-disk historical cache.
#[derive(Debug, Clone)]
pub struct CsvCache {
    root: PathBuf,
}

impl CsvCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CsvCache { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one series of one symbol.
    fn series_dir(&self, contract: &Contract, kind: SeriesKind) -> PathBuf {
        self.root
            .join(contract.security_class().asset_token())
            .join(contract.symbol.to_uppercase())
            .join(kind.token())
    }

    /// Session dates present in the cache for this series, ascending.
    pub fn cached_dates(
        &self,
        contract: &Contract,
        kind: SeriesKind,
    ) -> Result<Vec<NaiveDate>, DataError> {
        let dir = self.series_dir(contract, kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        match kind {
            SeriesKind::DailyBars => {
                let path = dir.join(DAILY_FILE);
                if !path.exists() {
                    return Ok(Vec::new());
                }
                let records: Vec<DailyBarRecord> = read_csv(&path)?;
                let mut dates: Vec<_> = records.into_iter().map(|r| r.date).collect();
                dates.sort_unstable();
                Ok(dates)
            }
            _ => partition_dates(&dir),
        }
    }

    /// Cache daily bars, merging with any existing file.
    ///
    /// On overlap the newly supplied row wins; the merged file is rewritten
    /// whole, sorted by date.
    pub fn store_daily_bars(&self, contract: &Contract, bars: &[Bar]) -> Result<(), DataError> {
        let dir = self.series_dir(contract, SeriesKind::DailyBars);
        ensure_schema(&dir, SeriesKind::DailyBars.schema_version())?;

        let path = dir.join(DAILY_FILE);
        let new_dates: BTreeSet<NaiveDate> =
            bars.iter().map(|b| b.datetime.date()).collect();
        let mut records: Vec<DailyBarRecord> = bars
            .iter()
            .map(|b| DailyBarRecord {
                date: b.datetime.date(),
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                volume: b.volume,
            })
            .collect();
        if path.exists() {
            let existing: Vec<DailyBarRecord> = read_csv(&path)?;
            records.extend(existing.into_iter().filter(|r| !new_dates.contains(&r.date)));
        }
        records.sort_by_key(|r| r.date);
        log::debug!("caching {} daily rows to {}", records.len(), path.display());
        write_csv_atomic(&path, &records)
    }

    pub fn load_daily_bars(&self, contract: &Contract) -> Result<Vec<Bar>, DataError> {
        let dir = self.series_dir(contract, SeriesKind::DailyBars);
        verify_schema(&dir, SeriesKind::DailyBars.schema_version())?;
        let path = dir.join(DAILY_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut records: Vec<DailyBarRecord> = read_csv(&path)?;
        records.sort_by_key(|r| r.date);
        Ok(records
            .into_iter()
            .map(|r| Bar {
                datetime: r.date.and_hms_opt(0, 0, 0).unwrap_or_default(),
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.volume,
            })
            .collect())
    }

    /// Cache intraday bars, one file per session date. A date's file is
    /// replaced entirely by the rows supplied for it.
    pub fn store_intraday_bars(
        &self,
        contract: &Contract,
        resolution: Resolution,
        bars: &[Bar],
    ) -> Result<(), DataError> {
        let kind = SeriesKind::IntradayBars(resolution);
        let records = bars.iter().map(|b| {
            (
                b.datetime.date(),
                IntradayBarRecord {
                    datetime: b.datetime,
                    open: b.open,
                    high: b.high,
                    low: b.low,
                    close: b.close,
                    volume: b.volume,
                },
            )
        });
        self.store_partitioned(contract, kind, records, |r| r.datetime)
    }

    pub fn load_intraday_bars(
        &self,
        contract: &Contract,
        resolution: Resolution,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        let kind = SeriesKind::IntradayBars(resolution);
        let records: Vec<IntradayBarRecord> = self.load_partitioned(contract, kind, start, end)?;
        let mut bars: Vec<Bar> = records
            .into_iter()
            .map(|r| Bar {
                datetime: r.datetime,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.volume,
            })
            .collect();
        bars.sort_by_key(|b| b.datetime);
        Ok(bars)
    }

    pub fn store_tick_quotes(
        &self,
        contract: &Contract,
        quotes: &[TickQuote],
    ) -> Result<(), DataError> {
        let records = quotes.iter().map(|q| {
            (
                q.datetime.date(),
                TickRecord { datetime: q.datetime, bid: q.bid, ask: q.ask },
            )
        });
        self.store_partitioned(contract, SeriesKind::TickQuotes, records, |r| r.datetime)
    }

    pub fn load_tick_quotes(
        &self,
        contract: &Contract,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TickQuote>, DataError> {
        let records: Vec<TickRecord> =
            self.load_partitioned(contract, SeriesKind::TickQuotes, start, end)?;
        let mut quotes: Vec<TickQuote> = records
            .into_iter()
            .map(|r| TickQuote { datetime: r.datetime, bid: r.bid, ask: r.ask })
            .collect();
        quotes.sort_by_key(|q| q.datetime);
        Ok(quotes)
    }

    pub fn store_trade_ticks(
        &self,
        contract: &Contract,
        trades: &[TradeTick],
    ) -> Result<(), DataError> {
        let records = trades.iter().map(|t| {
            (
                t.timestamp.date(),
                TradeRecord {
                    timestamp: t.timestamp,
                    exchange: t.exchange,
                    size: t.size,
                    price: t.price,
                },
            )
        });
        self.store_partitioned(contract, SeriesKind::TradeTicks, records, |r| r.timestamp)
    }

    pub fn load_trade_ticks(
        &self,
        contract: &Contract,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TradeTick>, DataError> {
        let records: Vec<TradeRecord> =
            self.load_partitioned(contract, SeriesKind::TradeTicks, start, end)?;
        let mut trades: Vec<TradeTick> = records
            .into_iter()
            .map(|r| TradeTick {
                timestamp: r.timestamp,
                exchange: r.exchange,
                size: r.size,
                price: r.price,
            })
            .collect();
        trades.sort_by_key(|t| t.timestamp);
        Ok(trades)
    }

    fn store_partitioned<R: Serialize>(
        &self,
        contract: &Contract,
        kind: SeriesKind,
        records: impl Iterator<Item = (NaiveDate, R)>,
        sort_key: impl Fn(&R) -> NaiveDateTime,
    ) -> Result<(), DataError> {
        let dir = self.series_dir(contract, kind);
        ensure_schema(&dir, kind.schema_version())?;

        let mut by_date: BTreeMap<NaiveDate, Vec<R>> = BTreeMap::new();
        for (date, record) in records {
            by_date.entry(date).or_default().push(record);
        }
        for (date, mut rows) in by_date {
            rows.sort_by_key(|r| sort_key(r));
            let path = dir.join(format!("{date}.csv"));
            log::debug!("caching {} rows to {}", rows.len(), path.display());
            write_csv_atomic(&path, &rows)?;
        }
        Ok(())
    }

    fn load_partitioned<R: DeserializeOwned>(
        &self,
        contract: &Contract,
        kind: SeriesKind,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<R>, DataError> {
        let dir = self.series_dir(contract, kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        verify_schema(&dir, kind.schema_version())?;
        let mut rows = Vec::new();
        for date in partition_dates(&dir)? {
            if date < start || date > end {
                continue;
            }
            let path = dir.join(format!("{date}.csv"));
            rows.extend(read_csv::<R>(&path)?);
        }
        Ok(rows)
    }
}

/// Parse the partition dates out of a series directory's file names.
fn partition_dates(dir: &Path) -> Result<Vec<NaiveDate>, DataError> {
    let entries = fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    let mut dates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if let Ok(date) = stem.parse::<NaiveDate>() {
                dates.push(date);
            }
        }
    }
    dates.sort_unstable();
    Ok(dates)
}

/// Create the series directory and stamp its schema marker, verifying an
/// existing marker.
fn ensure_schema(dir: &Path, expected: u32) -> Result<(), DataError> {
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    let marker = dir.join(SCHEMA_MARKER);
    if marker.exists() {
        return check_marker(&marker, expected);
    }
    fs::write(&marker, expected.to_string()).map_err(|e| io_err(&marker, e))
}

/// Verify the schema marker if one is present.
fn verify_schema(dir: &Path, expected: u32) -> Result<(), DataError> {
    let marker = dir.join(SCHEMA_MARKER);
    if marker.exists() {
        check_marker(&marker, expected)?;
    }
    Ok(())
}

fn check_marker(marker: &Path, expected: u32) -> Result<(), DataError> {
    let content = fs::read_to_string(marker).map_err(|e| io_err(marker, e))?;
    let found: u32 = content.trim().parse().map_err(|_| DataError::Malformed {
        path: marker.to_path_buf(),
        reason: format!("schema marker is not an integer: {content:?}"),
    })?;
    if found != expected {
        return Err(DataError::SchemaMismatch {
            path: marker.to_path_buf(),
            found,
            expected,
        });
    }
    Ok(())
}

fn write_csv_atomic<R: Serialize>(path: &Path, records: &[R]) -> Result<(), DataError> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp).map_err(|e| csv_err(&tmp, e))?;
        for record in records {
            writer.serialize(record).map_err(|e| csv_err(&tmp, e))?;
        }
        writer.flush().map_err(|e| io_err(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        io_err(path, e)
    })
}

fn read_csv<R: DeserializeOwned>(path: &Path) -> Result<Vec<R>, DataError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_err(path, e))?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record.map_err(|e| csv_err(path, e))?);
    }
    Ok(records)
}

fn io_err(path: &Path, source: std::io::Error) -> DataError {
    DataError::Io { path: path.to_path_buf(), source }
}

fn csv_err(path: &Path, source: csv::Error) -> DataError {
    DataError::Csv { path: path.to_path_buf(), source }
}
