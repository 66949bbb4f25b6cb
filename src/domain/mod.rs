//! Domain types for the simulation core.

pub mod bar;
pub mod contract;
pub mod order;
pub mod position;
pub mod resolution;
pub mod trade;

pub use bar::{Bar, TickQuote, TradeTick};
pub use contract::{
    Contract, Currency, Exchange, OptionTerms, PriceType, Right, SecurityClass, SecurityType,
};
pub use order::{
    ChainType, ConditionDirection, Order, OrderAction, OrderCondition, OrderType, TimeInForce,
    TrailSpec,
};
pub use position::{Position, DEFAULT_ACCOUNT};
pub use resolution::Resolution;
pub use trade::{Trade, TradeState, TradeStatus};
