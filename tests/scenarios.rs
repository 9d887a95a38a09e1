//! End-to-end book-building scenarios through the engine.
//!
//! One cumulative flow: sells rest at two levels, non-marketable buys rest,
//! a marketable buy trades at the best ask, and a sweep of one level fills
//! in strict arrival order.

use std::sync::Arc;

use equity_matching_engine::{
    Instrument, InstrumentDirectory, MatchingEngine, Order, OrderType, Side,
};
use rust_decimal::Decimal;

fn init_log() {
    let _ = env_logger::try_init();
}

fn px(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn directory() -> Arc<InstrumentDirectory> {
    let directory = InstrumentDirectory::new();
    directory.insert(Instrument::new("ACME", px("20.00")));
    Arc::new(directory)
}

fn limit(
    directory: &InstrumentDirectory,
    client: &str,
    side: Side,
    qty: i64,
    price: &str,
) -> Order {
    Order::builder(
        client,
        directory.lookup("ACME").unwrap(),
        side,
        OrderType::Limit,
    )
    .price(px(price))
    .quantity(Decimal::from(qty))
    .build()
    .unwrap()
}

/// (price, remaining quantities in FIFO order) per ask level, best first.
fn ask_shape(engine: &MatchingEngine) -> Vec<(Decimal, Vec<Decimal>)> {
    let book = engine.book("ACME").unwrap();
    let guard = book.read().expect("book lock");
    guard
        .ask_levels()
        .iter()
        .map(|(price, orders)| {
            (
                *price,
                orders.iter().map(|o| o.remaining_quantity()).collect(),
            )
        })
        .collect()
}

fn bid_shape(engine: &MatchingEngine) -> Vec<(Decimal, Vec<Decimal>)> {
    let book = engine.book("ACME").unwrap();
    let guard = book.read().expect("book lock");
    guard
        .bid_levels()
        .iter()
        .map(|(price, orders)| {
            (
                *price,
                orders.iter().map(|o| o.remaining_quantity()).collect(),
            )
        })
        .collect()
}

#[tokio::test]
async fn book_building_and_crossing_flow() {
    init_log();
    let directory = directory();
    let engine = MatchingEngine::new(Arc::clone(&directory));

    // resting sells at two levels, no buys: zero trades
    let s1 = engine
        .submit(limit(&directory, "s1", Side::Sell, 100, "20.30"))
        .await
        .unwrap();
    let s2 = engine
        .submit(limit(&directory, "s2", Side::Sell, 100, "20.25"))
        .await
        .unwrap();
    let s3 = engine
        .submit(limit(&directory, "s3", Side::Sell, 200, "20.30"))
        .await
        .unwrap();
    for order in [&s1, &s2, &s3] {
        assert_eq!(order.trade_count(), 0);
        assert!(order.is_open());
    }
    assert_eq!(
        ask_shape(&engine),
        vec![
            (px("20.25"), vec![Decimal::from(100)]),
            (px("20.30"), vec![Decimal::from(100), Decimal::from(200)]),
        ]
    );

    // buys below the best ask rest unmatched
    let b1 = engine
        .submit(limit(&directory, "b1", Side::Buy, 100, "20.15"))
        .await
        .unwrap();
    let b2 = engine
        .submit(limit(&directory, "b2", Side::Buy, 200, "20.20"))
        .await
        .unwrap();
    assert!(b1.is_open() && b2.is_open());
    assert_eq!(b1.trade_count() + b2.trade_count(), 0);
    assert_eq!(
        bid_shape(&engine),
        vec![
            (px("20.20"), vec![Decimal::from(200)]),
            (px("20.15"), vec![Decimal::from(100)]),
        ]
    );

    // a marketable buy crosses the resting 20.25 sell in full, at the
    // passive price; the emptied level is pruned
    let b3 = engine
        .submit(limit(&directory, "b3", Side::Buy, 100, "20.30"))
        .await
        .unwrap();
    assert!(b3.is_closed());
    assert_eq!(b3.trade_count(), 1);
    let trade = b3.trades().next().unwrap();
    assert_eq!(trade.price, px("20.25"));
    assert_eq!(trade.quantity, Decimal::from(100));
    assert_eq!(trade.counterparty_client_order_id, "s2");
    assert_eq!(
        ask_shape(&engine),
        vec![(px("20.30"), vec![Decimal::from(100), Decimal::from(200)])]
    );
    // fully filled: not resting on the bid side
    assert_eq!(
        bid_shape(&engine),
        vec![
            (px("20.20"), vec![Decimal::from(200)]),
            (px("20.15"), vec![Decimal::from(100)]),
        ]
    );

    // sweeping the 20.30 level fills the earlier 100 lot, then the 200 lot
    let b4 = engine
        .submit(limit(&directory, "b4", Side::Buy, 300, "20.30"))
        .await
        .unwrap();
    assert!(b4.is_closed());
    assert_eq!(b4.trade_count(), 2);
    let trades: Vec<_> = b4.trades().collect();
    assert_eq!(trades[0].counterparty_client_order_id, "s1");
    assert_eq!(trades[0].quantity, Decimal::from(100));
    assert_eq!(trades[0].price, px("20.30"));
    assert_eq!(trades[1].counterparty_client_order_id, "s3");
    assert_eq!(trades[1].quantity, Decimal::from(200));
    assert_eq!(trades[1].price, px("20.30"));
    assert!(trades[0].trade_id < trades[1].trade_id);
    assert!(ask_shape(&engine).is_empty());

    // average across the sweep is the single level price
    assert_eq!(b4.average_fill_price(), px("20.30"));

    // quantity conservation for every order that traded
    let book = engine.book("ACME").unwrap();
    let guard = book.read().expect("book lock");
    for order in guard.order_history() {
        assert_eq!(
            order.cumulative_quantity() + order.remaining_quantity(),
            order.ordered_quantity(),
            "conservation violated for {}",
            order.client_order_id()
        );
    }
}

#[tokio::test]
async fn depth_view_reflects_resting_orders() {
    init_log();
    let directory = directory();
    let engine = MatchingEngine::new(Arc::clone(&directory));
    engine
        .submit(limit(&directory, "s1", Side::Sell, 100, "20.30"))
        .await
        .unwrap();
    engine
        .submit(limit(&directory, "s2", Side::Sell, 200, "20.30"))
        .await
        .unwrap();
    engine
        .submit(limit(&directory, "b1", Side::Buy, 150, "20.20"))
        .await
        .unwrap();

    let book = engine.book("ACME").unwrap();
    let depth = book.read().expect("book lock").depth(5);
    assert_eq!(depth.instrument, "ACME");
    assert_eq!(depth.asks.len(), 1);
    assert_eq!(depth.asks[0].displayed_quantity, Decimal::from(300));
    assert_eq!(depth.asks[0].order_count, 2);
    assert_eq!(depth.bids[0].price, px("20.20"));
    assert_eq!(depth.bids[0].displayed_quantity, Decimal::from(150));
}
