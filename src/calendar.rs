//! NYSE trading schedule: which days trade and at what hours.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// One trading session with its open and close times (exchange-local).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingDay {
    pub date: NaiveDate,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

/// An ordered list of trading sessions over a date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingCalendar {
    days: Vec<TradingDay>,
}

impl TradingCalendar {
    /// NYSE sessions for every trading date in `[start, end]` inclusive.
    pub fn nyse(start: NaiveDate, end: NaiveDate) -> Self {
        let mut days = Vec::new();
        let mut date = start;
        while date <= end {
            if is_trading_date(date) {
                days.push(TradingDay {
                    date,
                    open: regular_open(),
                    close: session_close(date),
                });
            }
            date += Duration::days(1);
        }
        TradingCalendar { days }
    }

    /// Build a calendar directly from sessions. Days must be sorted by date.
    pub fn from_days(days: Vec<TradingDay>) -> Self {
        debug_assert!(days.windows(2).all(|w| w[0].date < w[1].date));
        TradingCalendar { days }
    }

    pub fn days(&self) -> &[TradingDay] {
        &self.days
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// The session on `date`, if the market trades that day.
    pub fn session(&self, date: NaiveDate) -> Option<&TradingDay> {
        self.days
            .binary_search_by_key(&date, |d| d.date)
            .ok()
            .map(|i| &self.days[i])
    }
}

/// First trading date strictly after `date`.
pub fn next_trading_date(date: NaiveDate) -> NaiveDate {
    let mut d = date + Duration::days(1);
    while !is_trading_date(d) {
        d += Duration::days(1);
    }
    d
}

/// Whether the NYSE is open on `date`.
pub fn is_trading_date(date: NaiveDate) -> bool {
    !is_weekend(date) && !is_holiday(date)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn regular_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap()
}

fn session_close(date: NaiveDate) -> NaiveTime {
    if is_half_day(date) {
        NaiveTime::from_hms_opt(13, 0, 0).unwrap()
    } else {
        NaiveTime::from_hms_opt(16, 0, 0).unwrap()
    }
}

/// Fixed-date holiday observance: Saturday holidays are observed the Friday
/// before, Sunday holidays the Monday after.
fn observed(holiday: NaiveDate) -> NaiveDate {
    match holiday.weekday() {
        Weekday::Sat => holiday - Duration::days(1),
        Weekday::Sun => holiday + Duration::days(1),
        _ => holiday,
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    first + Duration::days(i64::from(offset) + i64::from(n - 1) * 7)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let fifth = nth_weekday(year, month, weekday, 5);
    if fifth.month() == month {
        fifth
    } else {
        fifth - Duration::days(7)
    }
}

/// Easter Sunday by the anonymous Gregorian computus.
fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).unwrap()
}

fn is_holiday(date: NaiveDate) -> bool {
    let year = date.year();

    // New Year's Day. A Jan 1 Saturday is not observed on Dec 31 of the
    // prior year, so only the Sunday shift applies.
    let new_years = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
    let new_years = if new_years.weekday() == Weekday::Sun {
        new_years + Duration::days(1)
    } else {
        new_years
    };
    if date == new_years && !is_weekend(date) {
        return true;
    }

    if date == nth_weekday(year, 1, Weekday::Mon, 3) {
        return true; // Martin Luther King Jr. Day
    }
    if date == nth_weekday(year, 2, Weekday::Mon, 3) {
        return true; // Washington's Birthday
    }
    if date == easter_sunday(year) - Duration::days(2) {
        return true; // Good Friday
    }
    if date == last_weekday(year, 5, Weekday::Mon) {
        return true; // Memorial Day
    }
    if year >= 2022 && date == observed(NaiveDate::from_ymd_opt(year, 6, 19).unwrap()) {
        return true; // Juneteenth
    }
    if date == observed(NaiveDate::from_ymd_opt(year, 7, 4).unwrap()) {
        return true; // Independence Day
    }
    if date == nth_weekday(year, 9, Weekday::Mon, 1) {
        return true; // Labor Day
    }
    if date == nth_weekday(year, 11, Weekday::Thu, 4) {
        return true; // Thanksgiving
    }
    if date == observed(NaiveDate::from_ymd_opt(year, 12, 25).unwrap()) {
        return true; // Christmas
    }
    false
}

/// Sessions that close at 13:00: the day after Thanksgiving, and the
/// weekday eves of Independence Day and Christmas.
fn is_half_day(date: NaiveDate) -> bool {
    let year = date.year();
    if date == nth_weekday(year, 11, Weekday::Thu, 4) + Duration::days(1) {
        return true;
    }
    let july3 = NaiveDate::from_ymd_opt(year, 7, 3).unwrap();
    if date == july3 && !is_weekend(july3) && !is_holiday(july3) {
        return true;
    }
    let dec24 = NaiveDate::from_ymd_opt(year, 12, 24).unwrap();
    if date == dec24 && !is_weekend(dec24) && !is_holiday(dec24) {
        return true;
    }
    false
}
