//! Simulated broker: executes against streamed historical prices.

use super::{Broker, BrokerError};
use crate::clock::SimulationClock;
use crate::domain::{
    Contract, Currency, OrderAction, OrderType, Position, Trade, TradeState, DEFAULT_ACCOUNT,
};
use crate::events::{
    NewTradeEvent, PositionUpdateEvent, Subscribers, Subscription, TradeUpdateEvent,
};
use crate::runner::{SimError, SimulationPiece};
use crate::streamer::SimulationDataStreamer;
use chrono::NaiveDateTime;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Fill bookkeeping below this size is treated as zero.
const QTY_EPSILON: f64 = 1e-9;

/// Broker backed by the simulation streamer.
///
/// Market orders execute immediately on placement, priced at the open of the
/// bar starting at the current clock time. Other order types stay open until
/// driven through [`SimulationBroker::simulate_trade_execution`] or
/// cancelled.
pub struct SimulationBroker {
    clock: Rc<RefCell<SimulationClock>>,
    streamer: Rc<RefCell<SimulationDataStreamer>>,
    cash: HashMap<Currency, f64>,
    transaction_fee: f64,
    positions: HashMap<String, Vec<Position>>,
    trades: Vec<Trade>,
    next_order_id: u64,
    new_trade_subs: Subscribers<NewTradeEvent>,
    trade_update_subs: Subscribers<TradeUpdateEvent>,
    position_update_subs: Subscribers<PositionUpdateEvent>,
}

impl SimulationBroker {
    pub fn new(
        clock: Rc<RefCell<SimulationClock>>,
        streamer: Rc<RefCell<SimulationDataStreamer>>,
        starting_funds: f64,
        currency: Currency,
        transaction_fee: f64,
    ) -> Self {
        let mut cash = HashMap::new();
        cash.insert(currency, starting_funds);
        SimulationBroker {
            clock,
            streamer,
            cash,
            transaction_fee,
            positions: HashMap::new(),
            trades: Vec::new(),
            next_order_id: 1,
            new_trade_subs: Subscribers::new(),
            trade_update_subs: Subscribers::new(),
            position_update_subs: Subscribers::new(),
        }
    }

    /// Execute some or all of an open trade.
    ///
    /// `n_shares` defaults to the full remaining quantity; `price` defaults
    /// to the open of the bar starting at the current clock time. Validation
    /// happens before any state changes, so a rejected fill leaves cash,
    /// positions, and the trade untouched.
    pub fn simulate_trade_execution(
        &mut self,
        trade: &Trade,
        n_shares: Option<f64>,
        price: Option<f64>,
    ) -> Result<Trade, BrokerError> {
        let idx = self.find_trade(trade)?;
        let status = self.trades[idx].status;
        let contract = self.trades[idx].contract.clone();
        let order = self.trades[idx].order.clone();

        if !matches!(status.state, TradeState::Pending | TradeState::Submitted) {
            return Err(BrokerError::IllegalFill {
                reason: format!("trade is {:?}", status.state),
            });
        }
        let quantity = n_shares.unwrap_or(status.remaining);
        if quantity > status.remaining + QTY_EPSILON {
            return Err(BrokerError::IllegalFill {
                reason: format!(
                    "fill of {quantity} exceeds remaining quantity {}",
                    status.remaining
                ),
            });
        }
        let fill_price = match price {
            Some(p) => p,
            None => {
                let step = self.clock.borrow().step();
                self.streamer.borrow_mut().get_bar(&contract, step)?.open
            }
        };
        if let OrderType::Limit { limit_price } = order.order_type {
            let violates = match order.action {
                OrderAction::Buy => fill_price > limit_price,
                OrderAction::Sell => fill_price < limit_price,
            };
            if violates {
                return Err(BrokerError::IllegalFill {
                    reason: format!(
                        "fill price {fill_price} violates limit {limit_price}"
                    ),
                });
            }
        }

        // Validation passed. Cash, then position, then status.
        let gross = quantity * fill_price;
        let cash = self.cash.entry(contract.currency).or_insert(0.0);
        let signed_quantity = match order.action {
            OrderAction::Buy => {
                *cash -= gross + self.transaction_fee;
                quantity
            }
            OrderAction::Sell => {
                *cash += gross - self.transaction_fee;
                -quantity
            }
        };

        let position = self.apply_position_fill(&contract, signed_quantity, fill_price);
        self.position_update_subs.emit(&PositionUpdateEvent { position });

        let updated = {
            let trade = &mut self.trades[idx];
            let status = &mut trade.status;
            let new_filled = status.filled + quantity;
            status.ave_fill_price =
                (status.ave_fill_price * status.filled + fill_price * quantity) / new_filled;
            status.filled = new_filled;
            status.remaining = trade.order.quantity - new_filled;
            if status.remaining.abs() < QTY_EPSILON {
                status.remaining = 0.0;
                status.filled = trade.order.quantity;
            }
            status.state = if status.remaining == 0.0 {
                TradeState::Filled
            } else {
                TradeState::Submitted
            };
            trade.clone()
        };
        log::debug!(
            "executed {quantity} {} at {fill_price} (order {:?})",
            contract.symbol,
            updated.order.order_id,
        );
        self.trade_update_subs
            .emit(&TradeUpdateEvent { trade: updated.clone(), status: updated.status });
        Ok(updated)
    }

    fn apply_position_fill(
        &mut self,
        contract: &Contract,
        signed_quantity: f64,
        fill_price: f64,
    ) -> Position {
        let account_positions = self.positions.entry(DEFAULT_ACCOUNT.to_string()).or_default();
        let position = match account_positions.iter_mut().find(|p| p.contract == *contract) {
            Some(position) => position,
            None => {
                account_positions.push(Position::new(DEFAULT_ACCOUNT, contract.clone()));
                account_positions.last_mut().unwrap()
            }
        };
        position.apply_fill(signed_quantity, fill_price);
        position.clone()
    }

    fn find_trade(&self, trade: &Trade) -> Result<usize, BrokerError> {
        let order_id = trade.order.order_id.unwrap_or(0);
        self.trades
            .iter()
            .position(|t| t == trade)
            .ok_or(BrokerError::UnknownTrade { order_id })
    }
}

impl Broker for SimulationBroker {
    fn acc_cash(&self, currency: Currency) -> f64 {
        self.cash.get(&currency).copied().unwrap_or(0.0)
    }

    fn datetime(&self) -> NaiveDateTime {
        self.clock.borrow().datetime()
    }

    fn transaction_fee(&self) -> f64 {
        self.transaction_fee
    }

    fn trades(&self) -> Vec<Trade> {
        self.trades.clone()
    }

    fn open_trades(&self) -> Vec<Trade> {
        self.trades
            .iter()
            .filter(|t| matches!(t.status.state, TradeState::Pending | TradeState::Submitted))
            .cloned()
            .collect()
    }

    fn get_position(&self, contract: &Contract, account: Option<&str>) -> f64 {
        match account {
            Some(account) => self
                .positions
                .get(account)
                .and_then(|ps| ps.iter().find(|p| p.contract == *contract))
                .map_or(0.0, |p| p.position),
            None => self
                .positions
                .values()
                .flatten()
                .filter(|p| contract.loosely_matches(&p.contract))
                .map(|p| p.position)
                .sum(),
        }
    }

    fn place_trade(&mut self, mut trade: Trade) -> Result<Trade, BrokerError> {
        trade.order.order_id = Some(self.next_order_id);
        self.next_order_id += 1;
        trade.status.state = TradeState::Submitted;
        self.trades.push(trade.clone());
        log::debug!(
            "accepted {:?} {} x{} (order {:?})",
            trade.order.action,
            trade.contract.symbol,
            trade.order.quantity,
            trade.order.order_id,
        );
        self.new_trade_subs.emit(&NewTradeEvent { trade: trade.clone() });

        if trade.order.order_type == OrderType::Market {
            return self.simulate_trade_execution(&trade, None, None);
        }
        Ok(trade)
    }

    fn cancel_trade(&mut self, trade: &Trade) -> Result<Trade, BrokerError> {
        let idx = self.find_trade(trade)?;
        self.trades[idx].status.state = TradeState::Cancelled;
        let cancelled = self.trades[idx].clone();
        self.trade_update_subs
            .emit(&TradeUpdateEvent { trade: cancelled.clone(), status: cancelled.status });
        Ok(cancelled)
    }

    fn subscribe_to_new_trades(
        &mut self,
        callback: Box<dyn FnMut(&NewTradeEvent)>,
    ) -> Subscription {
        self.new_trade_subs.subscribe(callback)
    }

    fn unsubscribe_from_new_trades(&mut self, sub: Subscription) -> bool {
        self.new_trade_subs.unsubscribe(sub)
    }

    fn subscribe_to_trade_updates(
        &mut self,
        callback: Box<dyn FnMut(&TradeUpdateEvent)>,
    ) -> Subscription {
        self.trade_update_subs.subscribe(callback)
    }

    fn unsubscribe_from_trade_updates(&mut self, sub: Subscription) -> bool {
        self.trade_update_subs.unsubscribe(sub)
    }

    fn subscribe_to_position_updates(
        &mut self,
        callback: Box<dyn FnMut(&PositionUpdateEvent)>,
    ) -> Subscription {
        self.position_update_subs.subscribe(callback)
    }

    fn unsubscribe_from_position_updates(&mut self, sub: Subscription) -> bool {
        self.position_update_subs.unsubscribe(sub)
    }
}

impl SimulationPiece for SimulationBroker {
    fn step(&mut self) -> Result<(), SimError> {
        // Fills are synchronous with placement or explicit execution calls,
        // so the broker has no per-tick work.
        Ok(())
    }
}
