//! Order types: action, kind, time-in-force, and attachment conditions.

use super::contract::{Contract, Exchange, SecurityClass};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Valid for the current session only.
    Day,
    /// Good till cancelled.
    Gtc,
}

/// How a trailing stop tracks the market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailSpec {
    /// Absolute stop price that ratchets with the market.
    StopPrice(f64),
    /// Percentage offset from the high-water mark.
    TrailPercent(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit { limit_price: f64 },
    TrailingStop { trail: TrailSpec },
}

/// Direction for threshold conditions: trigger when the observed value is
/// above or below the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionDirection {
    More,
    Less,
}

/// How this condition combines with the next one in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainType {
    And,
    Or,
}

/// A predicate attached to an order. Conditions are carried on the order as
/// data; evaluation is the executing broker's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderCondition {
    Price {
        contract: Contract,
        price: f64,
        direction: ConditionDirection,
        chain: ChainType,
    },
    DateTime {
        target: NaiveDateTime,
        direction: ConditionDirection,
        chain: ChainType,
    },
    Execution {
        security: SecurityClass,
        exchange: Exchange,
        symbol: String,
        chain: ChainType,
    },
}

/// An order: what to do, how much, and under what constraints.
///
/// `order_id` is `None` until the order has been accepted by a broker.
/// `parent_id` links child orders of a bracket to their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub action: OrderAction,
    pub quantity: f64,
    pub order_type: OrderType,
    pub order_id: Option<u64>,
    pub time_in_force: TimeInForce,
    pub conditions: Vec<OrderCondition>,
    pub parent_id: Option<u64>,
}

impl Order {
    pub fn market(action: OrderAction, quantity: f64) -> Self {
        Order {
            action,
            quantity,
            order_type: OrderType::Market,
            order_id: None,
            time_in_force: TimeInForce::Day,
            conditions: Vec::new(),
            parent_id: None,
        }
    }

    pub fn limit(action: OrderAction, quantity: f64, limit_price: f64) -> Self {
        Order {
            order_type: OrderType::Limit { limit_price },
            ..Order::market(action, quantity)
        }
    }

    pub fn trailing_stop(action: OrderAction, quantity: f64, trail: TrailSpec) -> Self {
        Order {
            order_type: OrderType::TrailingStop { trail },
            ..Order::market(action, quantity)
        }
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<OrderCondition>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn limit_price(&self) -> Option<f64> {
        match self.order_type {
            OrderType::Limit { limit_price } => Some(limit_price),
            _ => None,
        }
    }
}
