//! Integration tests for the simulated broker against a cached minute
//! series.

use chrono::{NaiveDate, NaiveDateTime};
use std::cell::RefCell;
use std::rc::Rc;
use tempfile::TempDir;
use tradesim::broker::{Broker, BrokerError, SimulationBroker};
use tradesim::clock::SimulationClock;
use tradesim::data::{CsvCache, HistoricalRetriever};
use tradesim::domain::{
    Bar, Contract, Currency, Order, OrderAction, Resolution, Trade, TradeState, DEFAULT_ACCOUNT,
};
use tradesim::streamer::SimulationDataStreamer;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn dt(y: i32, m: u32, day: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    d(y, m, day).and_hms_opt(h, min, s).unwrap()
}

fn bar(datetime: NaiveDateTime, open: f64) -> Bar {
    Bar {
        datetime,
        open,
        high: open + 0.5,
        low: open - 0.5,
        close: open + 0.2,
        volume: 10_000.0,
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn spy() -> Contract {
    Contract::stock("SPY")
}

struct Fixture {
    _dir: TempDir,
    broker: SimulationBroker,
}

/// Minute bars for Mon Apr 6 2020, clock parked at 10:00, $10k cash and a
/// $1 fee.
fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let cache = CsvCache::new(dir.path());
    cache
        .store_intraday_bars(
            &spy(),
            Resolution::Minutes(1),
            &[
                bar(dt(2020, 4, 6, 10, 0, 0), 257.78),
                bar(dt(2020, 4, 6, 10, 1, 0), 258.10),
                bar(dt(2020, 4, 6, 10, 2, 0), 257.95),
            ],
        )
        .unwrap();

    let clock = SimulationClock::new(d(2020, 4, 6), d(2020, 4, 6), Resolution::Minutes(1)).unwrap();
    let clock = Rc::new(RefCell::new(clock));
    clock.borrow_mut().set_datetime(dt(2020, 4, 6, 10, 0, 0)).unwrap();

    let retriever = HistoricalRetriever::new(cache, None);
    let streamer = SimulationDataStreamer::new(Rc::clone(&clock), retriever, true);
    let streamer = Rc::new(RefCell::new(streamer));
    let broker = SimulationBroker::new(clock, streamer, 10_000.0, Currency::Usd, 1.0);
    Fixture { _dir: dir, broker }
}

#[test]
fn market_buy_fills_at_the_bar_open() {
    let mut f = fixture();
    let trade = f
        .broker
        .place_trade(Trade::new(spy(), Order::market(OrderAction::Buy, 2.0)))
        .unwrap();

    assert_eq!(trade.order.order_id, Some(1));
    assert_eq!(trade.status.state, TradeState::Filled);
    assert!(approx(trade.status.ave_fill_price, 257.78));
    assert!(approx(trade.status.filled, 2.0));
    assert!(approx(trade.status.remaining, 0.0));

    assert!(approx(f.broker.acc_cash(Currency::Usd), 10_000.0 - 2.0 * 257.78 - 1.0));
    assert!(approx(f.broker.get_position(&spy(), Some(DEFAULT_ACCOUNT)), 2.0));
    assert!(f.broker.open_trades().is_empty());
    assert_eq!(f.broker.datetime(), dt(2020, 4, 6, 10, 0, 0));
}

#[test]
fn market_sell_credits_cash_net_of_fee() {
    let mut f = fixture();
    f.broker
        .place_trade(Trade::new(spy(), Order::market(OrderAction::Sell, 3.0)))
        .unwrap();

    assert!(approx(f.broker.acc_cash(Currency::Usd), 10_000.0 + 3.0 * 257.78 - 1.0));
    assert!(approx(f.broker.get_position(&spy(), Some(DEFAULT_ACCOUNT)), -3.0));
}

#[test]
fn limit_order_stays_open_until_executed() {
    let mut f = fixture();
    let trade = f
        .broker
        .place_trade(Trade::new(spy(), Order::limit(OrderAction::Buy, 5.0, 260.0)))
        .unwrap();
    assert_eq!(trade.status.state, TradeState::Submitted);
    assert_eq!(f.broker.open_trades().len(), 1);
    assert!(approx(f.broker.acc_cash(Currency::Usd), 10_000.0));

    let filled = f.broker.simulate_trade_execution(&trade, None, None).unwrap();
    assert_eq!(filled.status.state, TradeState::Filled);
    assert!(approx(filled.status.ave_fill_price, 257.78));
    assert!(f.broker.open_trades().is_empty());
}

#[test]
fn rejected_fill_changes_nothing() {
    let mut f = fixture();
    let trade = f
        .broker
        .place_trade(Trade::new(spy(), Order::limit(OrderAction::Buy, 5.0, 250.0)))
        .unwrap();

    // bar open 257.78 violates the 250 buy limit
    let err = f.broker.simulate_trade_execution(&trade, None, None).unwrap_err();
    assert!(matches!(err, BrokerError::IllegalFill { .. }));

    assert!(approx(f.broker.acc_cash(Currency::Usd), 10_000.0));
    assert!(approx(f.broker.get_position(&spy(), None), 0.0));
    let open = f.broker.open_trades();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].status.state, TradeState::Submitted);
    assert!(approx(open[0].status.remaining, 5.0));
}

#[test]
fn partial_fills_blend_the_average_price() {
    let mut f = fixture();
    let trade = f
        .broker
        .place_trade(Trade::new(spy(), Order::limit(OrderAction::Buy, 10.0, 260.0)))
        .unwrap();

    let partial = f
        .broker
        .simulate_trade_execution(&trade, Some(4.0), Some(258.0))
        .unwrap();
    assert_eq!(partial.status.state, TradeState::Submitted);
    assert!(approx(partial.status.filled, 4.0));
    assert!(approx(partial.status.remaining, 6.0));
    assert!(approx(partial.status.ave_fill_price, 258.0));

    let filled = f
        .broker
        .simulate_trade_execution(&trade, Some(6.0), Some(256.0))
        .unwrap();
    assert_eq!(filled.status.state, TradeState::Filled);
    assert!(approx(filled.status.ave_fill_price, 256.8));

    let expected_cash = 10_000.0 - (4.0 * 258.0 + 1.0) - (6.0 * 256.0 + 1.0);
    assert!(approx(f.broker.acc_cash(Currency::Usd), expected_cash));
    assert!(approx(f.broker.get_position(&spy(), None), 10.0));
}

#[test]
fn overfill_is_rejected() {
    let mut f = fixture();
    let trade = f
        .broker
        .place_trade(Trade::new(spy(), Order::limit(OrderAction::Buy, 5.0, 260.0)))
        .unwrap();

    let err = f
        .broker
        .simulate_trade_execution(&trade, Some(6.0), Some(258.0))
        .unwrap_err();
    assert!(matches!(err, BrokerError::IllegalFill { .. }));
    assert!(approx(f.broker.open_trades()[0].status.remaining, 5.0));
}

#[test]
fn cancel_preserves_fill_bookkeeping() {
    let mut f = fixture();
    let trade = f
        .broker
        .place_trade(Trade::new(spy(), Order::limit(OrderAction::Buy, 10.0, 260.0)))
        .unwrap();
    f.broker
        .simulate_trade_execution(&trade, Some(4.0), Some(258.0))
        .unwrap();

    let cancelled = f.broker.cancel_trade(&trade).unwrap();
    assert_eq!(cancelled.status.state, TradeState::Cancelled);
    assert!(approx(cancelled.status.filled, 4.0));
    assert!(approx(cancelled.status.remaining, 6.0));
    assert!(approx(cancelled.status.ave_fill_price, 258.0));
    assert!(f.broker.open_trades().is_empty());

    // the partial fill's cash and position effects stand
    assert!(approx(f.broker.acc_cash(Currency::Usd), 10_000.0 - 4.0 * 258.0 - 1.0));
    assert!(approx(f.broker.get_position(&spy(), None), 4.0));
}

#[test]
fn cancel_does_not_check_the_trade_state() {
    let mut f = fixture();
    let filled = f
        .broker
        .place_trade(Trade::new(spy(), Order::market(OrderAction::Buy, 1.0)))
        .unwrap();
    assert_eq!(filled.status.state, TradeState::Filled);

    // the state is left to callers to respect
    let cancelled = f.broker.cancel_trade(&filled).unwrap();
    assert_eq!(cancelled.status.state, TradeState::Cancelled);
    assert!(approx(cancelled.status.filled, 1.0));
}

#[test]
fn never_placed_trades_are_unknown() {
    let mut f = fixture();
    let stranger = Trade::new(spy(), Order::market(OrderAction::Buy, 1.0));
    assert!(matches!(
        f.broker.simulate_trade_execution(&stranger, None, None),
        Err(BrokerError::UnknownTrade { .. })
    ));
    assert!(matches!(
        f.broker.cancel_trade(&stranger),
        Err(BrokerError::UnknownTrade { .. })
    ));
}

#[test]
fn placement_fires_new_trade_and_execution_fires_the_rest() {
    let mut f = fixture();
    let events = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&events);
    f.broker
        .subscribe_to_new_trades(Box::new(move |_| sink.borrow_mut().push("new")));
    let sink = Rc::clone(&events);
    f.broker
        .subscribe_to_trade_updates(Box::new(move |_| sink.borrow_mut().push("update")));
    let sink = Rc::clone(&events);
    f.broker
        .subscribe_to_position_updates(Box::new(move |_| sink.borrow_mut().push("position")));

    let trade = f
        .broker
        .place_trade(Trade::new(spy(), Order::limit(OrderAction::Buy, 5.0, 260.0)))
        .unwrap();
    assert_eq!(*events.borrow(), vec!["new"]);

    f.broker.simulate_trade_execution(&trade, None, None).unwrap();
    assert_eq!(*events.borrow(), vec!["new", "position", "update"]);
}

#[test]
fn unsubscribed_callbacks_stop_firing() {
    let mut f = fixture();
    let count = Rc::new(RefCell::new(0));

    let sink = Rc::clone(&count);
    let sub = f
        .broker
        .subscribe_to_new_trades(Box::new(move |_| *sink.borrow_mut() += 1));

    f.broker
        .place_trade(Trade::new(spy(), Order::market(OrderAction::Buy, 1.0)))
        .unwrap();
    assert_eq!(*count.borrow(), 1);

    assert!(f.broker.unsubscribe_from_new_trades(sub));
    f.broker
        .place_trade(Trade::new(spy(), Order::market(OrderAction::Buy, 1.0)))
        .unwrap();
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn position_lookup_is_loose_without_an_account() {
    let mut f = fixture();
    f.broker
        .place_trade(Trade::new(spy(), Order::market(OrderAction::Buy, 2.0)))
        .unwrap();

    assert!(approx(f.broker.get_position(&spy(), None), 2.0));
    assert!(approx(f.broker.get_position(&spy(), Some(DEFAULT_ACCOUNT)), 2.0));
    assert!(approx(f.broker.get_position(&spy(), Some("other")), 0.0));

    // an exchange-qualified query still loosely matches the held position
    let mut qualified = spy();
    qualified.exchange = Some(tradesim::domain::Exchange::Nyse);
    assert!(approx(f.broker.get_position(&qualified, None), 2.0));
    assert!(approx(f.broker.get_position(&qualified, Some(DEFAULT_ACCOUNT)), 0.0));
}
