//! Replays cached history as live-looking bar and tick callbacks.

use crate::calendar::next_trading_date;
use crate::clock::SimulationClock;
use crate::data::{DataError, HistoricalRetriever, RetrieveOptions};
use crate::domain::{Bar, Contract, PriceType, Resolution, TickQuote};
use crate::events::{BarEvent, Subscribers, Subscription, TickEvent};
use crate::runner::{SimError, SimulationPiece};
use chrono::{Duration, NaiveDateTime};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(
        "cannot stream '{requested}' data on a clock stepping every {step_secs}s"
    )]
    UnsupportedResolution { requested: Resolution, step_secs: i64 },

    #[error("no bar available for {symbol} at {datetime}")]
    NoBar { symbol: String, datetime: NaiveDateTime },

    #[error(transparent)]
    Data(#[from] DataError),
}

struct BarCell {
    resolution: Resolution,
    entries: Vec<(Contract, Subscribers<BarEvent>)>,
}

struct TickSub {
    sub: Subscription,
    contract: Contract,
    price_type: PriceType,
    callback: Box<dyn FnMut(&TickEvent)>,
}

/// Delivers historical data against the simulation clock.
///
/// Each `step()` delivers everything due at the clock's current time: first
/// tick quotes in timestamp order across all subscribed contracts, then
/// completed bars per resolution in subscription order. Series are fetched
/// lazily, once per contract/resolution pair, spanning the whole simulation
/// range.
///
/// Callbacks run while the streamer is mutably borrowed, so they must only
/// record what they see. Acting on the data belongs in a consumer's own
/// `step()`.
pub struct SimulationDataStreamer {
    clock: Rc<RefCell<SimulationClock>>,
    retriever: HistoricalRetriever,
    cache_only: bool,
    bar_table: Vec<BarCell>,
    tick_subs: Vec<TickSub>,
    bar_series: HashMap<(Contract, Resolution), Vec<Bar>>,
    tick_series: HashMap<Contract, Vec<TickQuote>>,
    next_sub_id: u64,
}

impl SimulationDataStreamer {
    /// `cache_only` fixes whether lazy series fetches may hit the data
    /// provider or must be served from cache alone.
    pub fn new(
        clock: Rc<RefCell<SimulationClock>>,
        retriever: HistoricalRetriever,
        cache_only: bool,
    ) -> Self {
        SimulationDataStreamer {
            clock,
            retriever,
            cache_only,
            bar_table: Vec::new(),
            tick_subs: Vec::new(),
            bar_series: HashMap::new(),
            tick_series: HashMap::new(),
            next_sub_id: 0,
        }
    }

    pub fn clock(&self) -> Rc<RefCell<SimulationClock>> {
        Rc::clone(&self.clock)
    }

    fn allocate_sub(&mut self) -> Subscription {
        let sub = Subscription(self.next_sub_id);
        self.next_sub_id += 1;
        sub
    }

    /// Subscribe to completed bars for one contract at one resolution.
    ///
    /// The resolution may be coarser than the clock step but not finer.
    pub fn subscribe_to_bars(
        &mut self,
        contract: Contract,
        resolution: Resolution,
        callback: Box<dyn FnMut(&BarEvent)>,
    ) -> Result<Subscription, StreamError> {
        let step_secs = self.clock.borrow().step().seconds();
        if !resolution.is_daily() && resolution.seconds() < step_secs {
            return Err(StreamError::UnsupportedResolution { requested: resolution, step_secs });
        }
        let sub = self.allocate_sub();
        let cell = match self.bar_table.iter_mut().find(|c| c.resolution == resolution) {
            Some(cell) => cell,
            None => {
                self.bar_table.push(BarCell { resolution, entries: Vec::new() });
                self.bar_table.last_mut().unwrap()
            }
        };
        match cell.entries.iter_mut().find(|(c, _)| *c == contract) {
            Some((_, subs)) => subs.insert(sub, callback),
            None => {
                let mut subs = Subscribers::new();
                subs.insert(sub, callback);
                cell.entries.push((contract, subs));
            }
        }
        Ok(sub)
    }

    /// Remove a bar subscription. Returns whether it was present.
    pub fn cancel_bar_subscription(&mut self, sub: Subscription) -> bool {
        let mut removed = false;
        for cell in &mut self.bar_table {
            for (_, subs) in &mut cell.entries {
                removed |= subs.unsubscribe(sub);
            }
            cell.entries.retain(|(_, subs)| !subs.is_empty());
        }
        self.bar_table.retain(|cell| !cell.entries.is_empty());
        removed
    }

    /// Subscribe to per-second tick prices for one contract. Requires a
    /// one-second clock.
    pub fn subscribe_to_ticks(
        &mut self,
        contract: Contract,
        price_type: PriceType,
        callback: Box<dyn FnMut(&TickEvent)>,
    ) -> Result<Subscription, StreamError> {
        let step_secs = self.clock.borrow().step().seconds();
        if step_secs != 1 {
            return Err(StreamError::UnsupportedResolution {
                requested: Resolution::Tick,
                step_secs,
            });
        }
        let sub = self.allocate_sub();
        self.tick_subs.push(TickSub { sub, contract, price_type, callback });
        Ok(sub)
    }

    /// Remove a tick subscription. Returns whether it was present.
    pub fn cancel_tick_subscription(&mut self, sub: Subscription) -> bool {
        let before = self.tick_subs.len();
        self.tick_subs.retain(|t| t.sub != sub);
        self.tick_subs.len() != before
    }

    /// Deliver everything due at the clock's current time.
    pub fn deliver_due(&mut self) -> Result<(), StreamError> {
        let now = self.clock.borrow().datetime();
        self.deliver_ticks(now)?;
        self.deliver_bars(now)?;
        Ok(())
    }

    fn deliver_ticks(&mut self, now: NaiveDateTime) -> Result<(), StreamError> {
        if self.tick_subs.is_empty() {
            return Ok(());
        }
        for i in 0..self.tick_subs.len() {
            let contract = self.tick_subs[i].contract.clone();
            self.ensure_tick_series(&contract)?;
        }
        // Window for the quotes that became visible on this step. Half-open
        // so a quote lands in exactly one window.
        let window_start = now - Duration::seconds(1);
        let mut due: Vec<(NaiveDateTime, usize, f64)> = Vec::new();
        for (idx, sub) in self.tick_subs.iter().enumerate() {
            if let Some(quotes) = self.tick_series.get(&sub.contract) {
                let from = quotes.partition_point(|q| q.datetime < window_start);
                for quote in &quotes[from..] {
                    if quote.datetime >= now {
                        break;
                    }
                    due.push((quote.datetime, idx, quote.price(sub.price_type)));
                }
            }
        }
        // Stable: equal timestamps keep subscription order.
        due.sort_by_key(|(datetime, _, _)| *datetime);
        for (datetime, idx, price) in due {
            let sub = &mut self.tick_subs[idx];
            let event = TickEvent { contract: sub.contract.clone(), datetime, price };
            (sub.callback)(&event);
        }
        Ok(())
    }

    fn deliver_bars(&mut self, now: NaiveDateTime) -> Result<(), StreamError> {
        let end_of_day = self.clock.borrow().end_of_day();
        let mut due: Vec<(usize, usize, Contract, Resolution)> = Vec::new();
        for (cell_idx, cell) in self.bar_table.iter().enumerate() {
            let is_due = if cell.resolution.is_daily() {
                end_of_day
            } else {
                now.and_utc().timestamp() % cell.resolution.seconds() == 0
            };
            if !is_due {
                continue;
            }
            for (entry_idx, (contract, _)) in cell.entries.iter().enumerate() {
                due.push((cell_idx, entry_idx, contract.clone(), cell.resolution));
            }
        }
        for (_, _, contract, resolution) in &due {
            self.ensure_bar_series(contract, *resolution)?;
        }
        for (cell_idx, entry_idx, contract, resolution) in due {
            let bar = match self.completed_bar(&contract, resolution, now) {
                Some(bar) => bar,
                None => continue,
            };
            let event = BarEvent { contract: contract.clone(), resolution, bar };
            self.bar_table[cell_idx].entries[entry_idx].1.emit(&event);
        }
        Ok(())
    }

    /// The bar most recently completed as of `now`, if any.
    fn completed_bar(
        &self,
        contract: &Contract,
        resolution: Resolution,
        now: NaiveDateTime,
    ) -> Option<Bar> {
        let series = self.bar_series.get(&(contract.clone(), resolution))?;
        if resolution.is_daily() {
            let idx = series.partition_point(|b| b.datetime.date() < now.date());
            let bar = series.get(idx)?;
            (bar.datetime.date() == now.date()).then_some(*bar)
        } else {
            let completed = now - resolution.as_duration();
            let idx = series.partition_point(|b| b.datetime <= completed);
            idx.checked_sub(1).map(|i| series[i])
        }
    }

    /// The bar a fill at the current time would execute against: the bar
    /// opening at `now` for intraday resolutions, the next session's bar for
    /// daily.
    pub fn get_bar(
        &mut self,
        contract: &Contract,
        resolution: Resolution,
    ) -> Result<Bar, StreamError> {
        self.ensure_bar_series(contract, resolution)?;
        let now = self.clock.borrow().datetime();
        let series = &self.bar_series[&(contract.clone(), resolution)];
        let found = if resolution.is_daily() {
            let idx = series.partition_point(|b| b.datetime.date() <= now.date());
            series.get(idx).copied()
        } else {
            series
                .binary_search_by_key(&now, |b| b.datetime)
                .ok()
                .map(|i| series[i])
        };
        found.ok_or_else(|| StreamError::NoBar {
            symbol: contract.symbol.clone(),
            datetime: now,
        })
    }

    fn retrieve_options(&self, rth: bool) -> RetrieveOptions {
        RetrieveOptions { cache_only: self.cache_only, allow_partial: false, rth }
    }

    fn ensure_bar_series(
        &mut self,
        contract: &Contract,
        resolution: Resolution,
    ) -> Result<(), StreamError> {
        let key = (contract.clone(), resolution);
        if self.bar_series.contains_key(&key) {
            return Ok(());
        }
        let (start, end) = self.series_range();
        let opts = self.retrieve_options(!resolution.is_daily());
        let bars = self.retriever.retrieve_bars(contract, resolution, start, end, opts)?;
        log::debug!(
            "loaded {} {} bars for {} over {start}..={end}",
            bars.len(),
            resolution,
            contract.symbol,
        );
        self.bar_series.insert(key, bars);
        Ok(())
    }

    fn ensure_tick_series(&mut self, contract: &Contract) -> Result<(), StreamError> {
        if self.tick_series.contains_key(contract) {
            return Ok(());
        }
        let (start, end) = self.series_range();
        let opts = self.retrieve_options(true);
        let quotes = self.retriever.retrieve_tick_quotes(contract, start, end, opts)?;
        log::debug!(
            "loaded {} tick quotes for {} over {start}..={end}",
            quotes.len(),
            contract.symbol,
        );
        self.tick_series.insert(contract.clone(), quotes);
        Ok(())
    }

    /// Series span one session past the simulation end so next-session
    /// lookups at the final close still resolve.
    fn series_range(&self) -> (chrono::NaiveDate, chrono::NaiveDate) {
        let clock = self.clock.borrow();
        (clock.start_date(), next_trading_date(clock.end_date()))
    }
}

impl SimulationPiece for SimulationDataStreamer {
    fn step(&mut self) -> Result<(), SimError> {
        self.deliver_due().map_err(SimError::from)
    }
}
