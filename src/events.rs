//! Typed pub-sub: subscriber registries and the event payloads they carry.

use crate::domain::{Bar, Contract, Position, Resolution, Trade, TradeStatus};
use chrono::NaiveDateTime;

/// Handle identifying one subscription within the registry that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription(pub u64);

/// Ordered registry of callbacks for one event type.
///
/// Callbacks fire in subscription order. Unsubscribing mid-stream is
/// supported; emitting is not re-entrant (callbacks must not call back into
/// the registry they run under).
pub struct Subscribers<E> {
    next_id: u64,
    entries: Vec<(Subscription, Box<dyn FnMut(&E)>)>,
}

impl<E> Subscribers<E> {
    pub fn new() -> Self {
        Subscribers { next_id: 0, entries: Vec::new() }
    }

    /// Register a callback, allocating a fresh handle.
    pub fn subscribe(&mut self, callback: Box<dyn FnMut(&E)>) -> Subscription {
        let sub = Subscription(self.next_id);
        self.next_id += 1;
        self.entries.push((sub, callback));
        sub
    }

    /// Register a callback under a caller-allocated handle. The caller is
    /// responsible for handle uniqueness across its registries.
    pub fn insert(&mut self, sub: Subscription, callback: Box<dyn FnMut(&E)>) {
        self.entries.push((sub, callback));
    }

    /// Remove a subscription. Returns whether it was present.
    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(s, _)| *s != sub);
        self.entries.len() != before
    }

    /// Deliver `event` to every subscriber, in subscription order.
    pub fn emit(&mut self, event: &E) {
        for (_, callback) in &mut self.entries {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers").field("len", &self.entries.len()).finish()
    }
}

/// A trade was accepted by the broker.
#[derive(Debug, Clone)]
pub struct NewTradeEvent {
    pub trade: Trade,
}

/// A trade's status changed (execution or cancellation).
#[derive(Debug, Clone)]
pub struct TradeUpdateEvent {
    pub trade: Trade,
    pub status: TradeStatus,
}

/// A position changed as the result of a fill.
#[derive(Debug, Clone)]
pub struct PositionUpdateEvent {
    pub position: Position,
}

/// A bar completed for a subscribed contract.
#[derive(Debug, Clone)]
pub struct BarEvent {
    pub contract: Contract,
    pub resolution: Resolution,
    pub bar: Bar,
}

/// A tick price for a subscribed contract.
#[derive(Debug, Clone)]
pub struct TickEvent {
    pub contract: Contract,
    pub datetime: NaiveDateTime,
    pub price: f64,
}
