//! Trade — an order bound to a contract, plus its execution status.

use super::contract::Contract;
use super::order::Order;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeState {
    Pending,
    Submitted,
    Filled,
    Cancelled,
    Inactive,
}

/// Execution progress of a trade.
///
/// Invariant: `filled + remaining == order.quantity` at all times, and
/// `ave_fill_price` is the quantity-weighted average over executed fills
/// (0.0 while nothing has filled).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeStatus {
    pub state: TradeState,
    pub filled: f64,
    pub remaining: f64,
    pub ave_fill_price: f64,
}

impl TradeStatus {
    pub fn pending(quantity: f64) -> Self {
        TradeStatus {
            state: TradeState::Pending,
            filled: 0.0,
            remaining: quantity,
            ave_fill_price: 0.0,
        }
    }
}

/// A contract/order pair tracked through its lifecycle.
///
/// Equality considers only the contract and order, not the mutable status,
/// so a caller's stale copy still identifies the same trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub contract: Contract,
    pub order: Order,
    pub status: TradeStatus,
}

impl Trade {
    pub fn new(contract: Contract, order: Order) -> Self {
        let status = TradeStatus::pending(order.quantity);
        Trade { contract, order, status }
    }
}

impl PartialEq for Trade {
    fn eq(&self, other: &Self) -> bool {
        self.contract == other.contract && self.order == other.order
    }
}
