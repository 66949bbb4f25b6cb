//! Market data rows: OHLCV bars, bid/ask quotes, and trade prints.

use super::contract::{Exchange, PriceType};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One OHLCV bucket.
///
/// Intraday bars are stamped with the bucket start; daily bars carry the
/// session date at midnight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub datetime: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A bid/ask snapshot at one-second granularity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickQuote {
    pub datetime: NaiveDateTime,
    pub bid: f64,
    pub ask: f64,
}

impl TickQuote {
    /// Price on the requested side; `Market` is the bid/ask midpoint.
    pub fn price(&self, price_type: PriceType) -> f64 {
        match price_type {
            PriceType::Bid => self.bid,
            PriceType::Ask => self.ask,
            PriceType::Market => (self.bid + self.ask) / 2.0,
        }
    }
}

/// A single reported execution (time-and-sales row).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub timestamp: NaiveDateTime,
    pub exchange: Option<Exchange>,
    pub size: f64,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_quote() -> TickQuote {
        TickQuote {
            datetime: NaiveDate::from_ymd_opt(2020, 4, 6)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            bid: 100.0,
            ask: 100.2,
        }
    }

    #[test]
    fn price_selects_quote_side() {
        let quote = sample_quote();
        assert_eq!(quote.price(PriceType::Bid), 100.0);
        assert_eq!(quote.price(PriceType::Ask), 100.2);
        assert!((quote.price(PriceType::Market) - 100.1).abs() < 1e-10);
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = Bar {
            datetime: NaiveDate::from_ymd_opt(2020, 4, 6)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            open: 100.0,
            high: 101.5,
            low: 99.75,
            close: 101.0,
            volume: 1_250_000.0,
        };
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
