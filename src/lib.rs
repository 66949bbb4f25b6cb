//! tradesim — deterministic backtesting core.
//!
//! The building blocks of a simulated trading session:
//! - Domain types (contracts, orders, trades, positions, bars, ticks)
//! - NYSE trading calendar and a discrete-event clock over it
//! - CSV historical cache with gap-aware retrieval behind a provider trait
//! - Data streamer replaying history as bar/tick callbacks
//! - Simulated broker with cash, positions, and trade lifecycle events
//! - Runner wiring clock, providers, and consumers into one loop

pub mod broker;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod data;
pub mod domain;
pub mod events;
pub mod runner;
pub mod streamer;
