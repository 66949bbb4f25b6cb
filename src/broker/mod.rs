//! Broker surface: the trait callers program against and the simulated
//! implementation.

pub mod sim;

pub use sim::SimulationBroker;

use crate::domain::{Contract, Currency, Trade};
use crate::events::{NewTradeEvent, PositionUpdateEvent, Subscription, TradeUpdateEvent};
use crate::streamer::StreamError;
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("illegal fill: {reason}")]
    IllegalFill { reason: String },

    #[error("no trade with order id {order_id}")]
    UnknownTrade { order_id: u64 },

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// What a trading venue looks like to a strategy.
///
/// Accepting a trade fires the new-trade subscribers only; execution and
/// cancellation fire the trade-update subscribers.
pub trait Broker {
    /// Cash balance held in `currency`.
    fn acc_cash(&self, currency: Currency) -> f64;

    /// The broker's current time.
    fn datetime(&self) -> NaiveDateTime;

    /// Commission charged per executed order.
    fn transaction_fee(&self) -> f64;

    /// Every trade this broker has seen, in placement order.
    fn trades(&self) -> Vec<Trade>;

    /// Trades still awaiting execution or cancellation.
    fn open_trades(&self) -> Vec<Trade>;

    /// Signed holding in `contract`. With an account, the lookup is exact
    /// and a missing entry reads as flat. Without one, holdings are summed
    /// across accounts for every position the contract loosely matches.
    fn get_position(&self, contract: &Contract, account: Option<&str>) -> f64;

    /// Submit a trade. The returned copy carries the assigned order id and
    /// current status.
    fn place_trade(&mut self, trade: Trade) -> Result<Trade, BrokerError>;

    /// Cancel a trade identified by its contract and order. The status moves
    /// to cancelled with filled and remaining left as they stood; the state
    /// it was in is not checked, so callers should not cancel filled trades.
    fn cancel_trade(&mut self, trade: &Trade) -> Result<Trade, BrokerError>;

    fn subscribe_to_new_trades(
        &mut self,
        callback: Box<dyn FnMut(&NewTradeEvent)>,
    ) -> Subscription;

    fn unsubscribe_from_new_trades(&mut self, sub: Subscription) -> bool;

    fn subscribe_to_trade_updates(
        &mut self,
        callback: Box<dyn FnMut(&TradeUpdateEvent)>,
    ) -> Subscription;

    fn unsubscribe_from_trade_updates(&mut self, sub: Subscription) -> bool;

    fn subscribe_to_position_updates(
        &mut self,
        callback: Box<dyn FnMut(&PositionUpdateEvent)>,
    ) -> Subscription;

    fn unsubscribe_from_position_updates(&mut self, sub: Subscription) -> bool;
}
