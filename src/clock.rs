//! Discrete-event simulation clock driven by the trading calendar.

use crate::calendar::{TradingCalendar, TradingDay};
use crate::domain::Resolution;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClockError {
    /// The schedule is exhausted. Repeated ticks keep returning this.
    #[error("simulation has reached the end of its schedule")]
    EndOfSimulation,

    #[error("invalid simulation time {datetime}: {reason}")]
    InvalidTime { datetime: NaiveDateTime, reason: String },

    #[error("no trading days between {start} and {end}")]
    EmptySchedule { start: NaiveDate, end: NaiveDate },
}

/// Steps simulated time through trading sessions.
///
/// A `Daily` step visits each session once, at its close. Intraday steps
/// visit `open + step`, `open + 2*step`, ... up to the close, then jump to
/// the next session. Time between sessions does not exist for this clock.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    calendar: TradingCalendar,
    step: Resolution,
    step_duration: Duration,
    start_date: NaiveDate,
    end_date: NaiveDate,
    day_idx: usize,
    now: NaiveDateTime,
}

impl SimulationClock {
    /// Clock over NYSE sessions in `[start_date, end_date]`.
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        step: Resolution,
    ) -> Result<Self, ClockError> {
        let calendar = TradingCalendar::nyse(start_date, end_date);
        Self::with_calendar(calendar, start_date, end_date, step)
    }

    /// Clock over an explicit schedule. Intended for tests with synthetic
    /// sessions.
    pub fn with_calendar(
        calendar: TradingCalendar,
        start_date: NaiveDate,
        end_date: NaiveDate,
        step: Resolution,
    ) -> Result<Self, ClockError> {
        let first = calendar
            .days()
            .first()
            .ok_or(ClockError::EmptySchedule { start: start_date, end: end_date })?;
        if step.seconds() <= 0 {
            return Err(ClockError::InvalidTime {
                datetime: first.date.and_time(first.open),
                reason: "clock step must be a positive duration".to_string(),
            });
        }
        let now = first.date.and_time(first.open);
        Ok(SimulationClock {
            calendar,
            step,
            step_duration: step.as_duration(),
            start_date,
            end_date,
            day_idx: 0,
            now,
        })
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.now
    }

    pub fn date(&self) -> NaiveDate {
        self.now.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.now.time()
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn step(&self) -> Resolution {
        self.step
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    /// Advance one step. Returns the new simulated time, or
    /// [`ClockError::EndOfSimulation`] once the schedule is exhausted.
    pub fn tick(&mut self) -> Result<NaiveDateTime, ClockError> {
        if self.step.is_daily() {
            self.tick_daily()
        } else {
            self.tick_intraday()
        }
    }

    fn tick_daily(&mut self) -> Result<NaiveDateTime, ClockError> {
        let day = *self.current_day().ok_or(ClockError::EndOfSimulation)?;
        self.now = day.date.and_time(day.close);
        self.day_idx += 1;
        Ok(self.now)
    }

    fn tick_intraday(&mut self) -> Result<NaiveDateTime, ClockError> {
        let day = *self.current_day().ok_or(ClockError::EndOfSimulation)?;
        let advanced = self.now + self.step_duration;
        // A step can overshoot the close or even the date for coarse steps.
        if advanced.time() > day.close || advanced.date() != day.date {
            self.day_idx += 1;
            let next = *self.current_day().ok_or(ClockError::EndOfSimulation)?;
            self.now = next.date.and_time(next.open) + self.step_duration;
        } else {
            self.now = advanced;
        }
        Ok(self.now)
    }

    fn current_day(&self) -> Option<&TradingDay> {
        self.calendar.days().get(self.day_idx)
    }

    /// Jump to an arbitrary in-session time.
    ///
    /// The target must fall on a scheduled trading date within the clock's
    /// range, inside session hours, and on a step boundary measured from the
    /// open. On error the clock is unchanged.
    pub fn set_datetime(&mut self, datetime: NaiveDateTime) -> Result<(), ClockError> {
        let date = datetime.date();
        if date < self.start_date || date > self.end_date {
            return Err(self.invalid(datetime, "outside the simulation range"));
        }
        let idx = self
            .calendar
            .days()
            .binary_search_by_key(&date, |d| d.date)
            .map_err(|_| self.invalid(datetime, "not a trading date"))?;
        let day = self.calendar.days()[idx];
        let t = datetime.time();
        if t < day.open || t >= day.close {
            return Err(self.invalid(datetime, "outside session hours"));
        }
        let offset = (t - day.open).num_seconds();
        let step_secs = self.step.seconds();
        if step_secs > 0 && offset % step_secs != 0 {
            return Err(self.invalid(datetime, "not aligned to the clock step"));
        }
        self.day_idx = idx;
        self.now = datetime;
        Ok(())
    }

    /// Whether the current time is at or before the open of today's session.
    pub fn start_of_day(&self) -> bool {
        match self.calendar.session(self.now.date()) {
            Some(day) => self.now.time() <= day.open,
            None => false,
        }
    }

    /// Whether the current time is at or after the close of today's session.
    pub fn end_of_day(&self) -> bool {
        match self.calendar.session(self.now.date()) {
            Some(day) => self.now.time() >= day.close,
            None => false,
        }
    }
}

impl SimulationClock {
    fn invalid(&self, datetime: NaiveDateTime, reason: &str) -> ClockError {
        ClockError::InvalidTime { datetime, reason: reason.to_string() }
    }
}
