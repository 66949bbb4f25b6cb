//! Cache-first historical retrieval with gap detection.
//!
//! The retriever answers "give me this series over this range" by loading
//! whatever the cache already has, downloading only the missing trading
//! dates, and persisting what it downloaded for next time. Dates from today
//! onward are never cached because their sessions may still be in progress.

use super::cache::{CsvCache, SeriesKind};
use super::provider::{DataError, DataProvider};
use crate::calendar::TradingCalendar;
use crate::domain::{Bar, Contract, Resolution, TickQuote, TradeTick};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;

/// Per-call retrieval knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrieveOptions {
    /// Never call the provider; serve whatever the cache holds.
    pub cache_only: bool,
    /// Allow fetching through today. Rows dated today or later are returned
    /// but not cached.
    pub allow_partial: bool,
    /// Restrict results to regular trading hours. Daily bars are exempt.
    pub rth: bool,
}

/// Cache-backed access to historical series, with optional download.
pub struct HistoricalRetriever {
    cache: CsvCache,
    provider: Option<Box<dyn DataProvider>>,
    today_override: Option<NaiveDate>,
}

impl HistoricalRetriever {
    pub fn new(cache: CsvCache, provider: Option<Box<dyn DataProvider>>) -> Self {
        HistoricalRetriever { cache, provider, today_override: None }
    }

    /// Pin "today" instead of reading the system clock. For tests that
    /// exercise the cache-write boundary.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today_override = Some(today);
        self
    }

    pub fn cache(&self) -> &CsvCache {
        &self.cache
    }

    /// OHLCV bars at `resolution` over `[start, end]`. Use
    /// [`HistoricalRetriever::retrieve_tick_quotes`] for tick data.
    pub fn retrieve_bars(
        &mut self,
        contract: &Contract,
        resolution: Resolution,
        start: NaiveDate,
        end: NaiveDate,
        opts: RetrieveOptions,
    ) -> Result<Vec<Bar>, DataError> {
        debug_assert!(!resolution.is_tick());
        let kind = if resolution.is_daily() {
            SeriesKind::DailyBars
        } else {
            SeriesKind::IntradayBars(resolution)
        };
        let mut bars = self.retrieve_series(
            contract,
            kind,
            start,
            end,
            opts,
            |provider, symbol, s, e| {
                if resolution.is_daily() {
                    provider.download_daily_bars(symbol, s, e, false)
                } else {
                    provider.download_intraday_bars(symbol, resolution, s, e, false)
                }
            },
            |bar| bar.datetime.date(),
            |cache, contract, rows| {
                if resolution.is_daily() {
                    cache.store_daily_bars(contract, rows)
                } else {
                    cache.store_intraday_bars(contract, resolution, rows)
                }
            },
            |cache, contract, s, e| {
                if resolution.is_daily() {
                    let bars = cache.load_daily_bars(contract)?;
                    Ok(bars
                        .into_iter()
                        .filter(|b| b.datetime.date() >= s && b.datetime.date() <= e)
                        .collect())
                } else {
                    cache.load_intraday_bars(contract, resolution, s, e)
                }
            },
        )?;
        bars.sort_by_key(|b| b.datetime);
        if opts.rth && !resolution.is_daily() {
            bars = rth_filter(bars, start, end, |b| b.datetime);
        }
        Ok(bars)
    }

    /// One-second bid/ask quotes over `[start, end]`.
    pub fn retrieve_tick_quotes(
        &mut self,
        contract: &Contract,
        start: NaiveDate,
        end: NaiveDate,
        opts: RetrieveOptions,
    ) -> Result<Vec<TickQuote>, DataError> {
        let mut quotes = self.retrieve_series(
            contract,
            SeriesKind::TickQuotes,
            start,
            end,
            opts,
            |provider, symbol, s, e| provider.download_tick_quotes(symbol, s, e, false),
            |quote| quote.datetime.date(),
            |cache, contract, rows| cache.store_tick_quotes(contract, rows),
            |cache, contract, s, e| cache.load_tick_quotes(contract, s, e),
        )?;
        quotes.sort_by_key(|q| q.datetime);
        if opts.rth {
            quotes = rth_filter(quotes, start, end, |q| q.datetime);
        }
        Ok(quotes)
    }

    /// Individual trade prints over `[start, end]`.
    pub fn retrieve_trade_ticks(
        &mut self,
        contract: &Contract,
        start: NaiveDate,
        end: NaiveDate,
        opts: RetrieveOptions,
    ) -> Result<Vec<TradeTick>, DataError> {
        let mut trades = self.retrieve_series(
            contract,
            SeriesKind::TradeTicks,
            start,
            end,
            opts,
            |provider, symbol, s, e| provider.download_trade_ticks(symbol, s, e, false),
            |trade| trade.timestamp.date(),
            |cache, contract, rows| cache.store_trade_ticks(contract, rows),
            |cache, contract, s, e| cache.load_trade_ticks(contract, s, e),
        )?;
        trades.sort_by_key(|t| t.timestamp);
        if opts.rth {
            trades = rth_filter(trades, start, end, |t| t.timestamp);
        }
        Ok(trades)
    }

    #[allow(clippy::too_many_arguments)]
    fn retrieve_series<R>(
        &mut self,
        contract: &Contract,
        kind: SeriesKind,
        start: NaiveDate,
        end: NaiveDate,
        opts: RetrieveOptions,
        download: impl Fn(
            &mut dyn DataProvider,
            &str,
            NaiveDate,
            NaiveDate,
        ) -> Result<Vec<R>, DataError>,
        row_date: impl Fn(&R) -> NaiveDate,
        store: impl Fn(&CsvCache, &Contract, &[R]) -> Result<(), DataError>,
        load: impl Fn(&CsvCache, &Contract, NaiveDate, NaiveDate) -> Result<Vec<R>, DataError>,
    ) -> Result<Vec<R>, DataError> {
        if end < start {
            return Err(DataError::InvalidRange);
        }
        let today = self.today_override.unwrap_or_else(|| Local::now().date_naive());
        let boundary = today - Duration::days(1);
        let fetch_end = if opts.allow_partial { end } else { end.min(boundary) };

        let mut partial_rows = Vec::new();
        if fetch_end >= start && !opts.cache_only {
            let calendar = TradingCalendar::nyse(start, fetch_end);
            let trading: Vec<NaiveDate> = calendar.days().iter().map(|d| d.date).collect();
            let cached: Vec<NaiveDate> = self
                .cache
                .cached_dates(contract, kind)?
                .into_iter()
                .filter(|d| *d >= start && *d <= fetch_end)
                .collect();
            let missing = missing_date_ranges(&trading, &cached);
            if !missing.is_empty() {
                let provider = self.provider.as_deref_mut().ok_or_else(|| {
                    DataError::Download {
                        symbol: contract.symbol.clone(),
                        start,
                        end,
                        reason: "no data provider configured".to_string(),
                    }
                })?;
                for (range_start, range_end) in missing {
                    log::info!(
                        "downloading {} {} over {range_start}..={range_end}",
                        contract.symbol,
                        kind.token(),
                    );
                    let rows = download(provider, &contract.symbol, range_start, range_end)?;
                    let (cacheable, partial): (Vec<R>, Vec<R>) =
                        rows.into_iter().partition(|r| row_date(r) <= boundary);
                    if !cacheable.is_empty() {
                        store(&self.cache, contract, &cacheable)?;
                    }
                    partial_rows.extend(partial);
                }
            }
        }

        let mut out = load(&self.cache, contract, start, end)?;
        out.append(&mut partial_rows);
        Ok(out)
    }
}

/// Contiguous runs of trading dates absent from the cache, as inclusive
/// `(first, last)` ranges. `trading_days` and `cached` must be ascending.
pub fn missing_date_ranges(
    trading_days: &[NaiveDate],
    cached: &[NaiveDate],
) -> Vec<(NaiveDate, NaiveDate)> {
    let cached: BTreeSet<NaiveDate> = cached.iter().copied().collect();
    let mut ranges = Vec::new();
    let mut current: Option<(NaiveDate, NaiveDate)> = None;
    for &day in trading_days {
        if cached.contains(&day) {
            if let Some(range) = current.take() {
                ranges.push(range);
            }
        } else {
            current = Some(match current {
                Some((first, _)) => (first, day),
                None => (day, day),
            });
        }
    }
    if let Some(range) = current {
        ranges.push(range);
    }
    ranges
}

fn rth_filter<R>(
    rows: Vec<R>,
    start: NaiveDate,
    end: NaiveDate,
    timestamp: impl Fn(&R) -> NaiveDateTime,
) -> Vec<R> {
    let calendar = TradingCalendar::nyse(start, end);
    rows.into_iter()
        .filter(|row| {
            let ts = timestamp(row);
            match calendar.session(ts.date()) {
                Some(day) => ts.time() >= day.open && ts.time() < day.close,
                None => false,
            }
        })
        .collect()
}
