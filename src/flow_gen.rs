//! Deterministic synthetic order-flow generator.
//!
//! Seeded order stream for property tests, load tests, and benchmarks. Same
//! seed ⇒ same sequence of orders.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::instrument::Instrument;
use crate::order::Order;
use crate::order_book::OrderBook;
use crate::types::{OrderId, OrderType, Side};

/// Configuration for the synthetic flow generator.
/// All ranges are inclusive. Same config + seed produces the same stream.
#[derive(Clone, Debug)]
pub struct FlowConfig {
    /// RNG seed. Same seed ⇒ same order stream.
    pub seed: u64,
    /// Number of orders to generate when collecting the full stream.
    pub num_orders: usize,
    /// Probability of Buy (0.0..=1.0). Sell otherwise.
    pub buy_ratio: f64,
    /// Probability of a limit order (0.0..=1.0). Market otherwise.
    pub limit_ratio: f64,
    /// Limit price range in hundredths (e.g. 2025 => 20.25).
    pub price_min_cents: i64,
    pub price_max_cents: i64,
    /// Quantity range, whole units.
    pub quantity_min: u64,
    pub quantity_max: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            num_orders: 1000,
            buy_ratio: 0.5,
            limit_ratio: 0.95,
            price_min_cents: 1975,
            price_max_cents: 2075,
            quantity_min: 1,
            quantity_max: 100,
        }
    }
}

/// Deterministic order stream for one instrument.
pub struct FlowGenerator {
    rng: StdRng,
    config: FlowConfig,
    instrument: Arc<Instrument>,
    next_seq: u64,
}

impl FlowGenerator {
    /// Builds a generator with the given config. Same config (including seed)
    /// ⇒ same stream.
    pub fn new(instrument: Arc<Instrument>, config: FlowConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            rng,
            config,
            instrument,
            next_seq: 1,
        }
    }

    /// Generates the next order. Advances internal state (sequence, RNG).
    /// Client order ids are unique within the stream, so generated flow never
    /// trips the duplicate-submission guard.
    pub fn next_order(&mut self) -> Order {
        let seq = self.next_seq;
        self.next_seq += 1;
        let client_order_id = format!("gen-{}", seq);
        let side = if self.rng.gen::<f64>() < self.config.buy_ratio {
            Side::Buy
        } else {
            Side::Sell
        };
        let is_limit = self.rng.gen::<f64>() < self.config.limit_ratio;
        let order_type = if is_limit {
            OrderType::Limit
        } else {
            OrderType::Market
        };
        let quantity = Decimal::from(
            self.rng
                .gen_range(self.config.quantity_min..=self.config.quantity_max),
        );
        let mut builder = Order::builder(
            client_order_id,
            Arc::clone(&self.instrument),
            side,
            order_type,
        )
        .quantity(quantity);
        if is_limit {
            let cents = self
                .rng
                .gen_range(self.config.price_min_cents..=self.config.price_max_cents);
            builder = builder.price(Decimal::new(cents, 2));
        }
        builder.build().expect("generated order parameters are valid")
    }

    /// Returns exactly `n` orders, advancing the generator state.
    pub fn take_orders(&mut self, n: usize) -> Vec<Order> {
        (0..n).map(|_| self.next_order()).collect()
    }

    /// Returns the full stream as defined by `config.num_orders`.
    pub fn all_orders(&mut self) -> Vec<Order> {
        self.take_orders(self.config.num_orders)
    }
}

/// Replays orders straight through a book's admission and crossing, assigning
/// sequential order ids after any already admitted. Returns the total number
/// of aggressor trades.
pub fn replay_into_book(book: &mut OrderBook, orders: Vec<Order>) -> usize {
    let mut next_id = book.order_count() as u64 + 1;
    let mut total_trades = 0usize;
    for mut order in orders {
        let order_id = OrderId(next_id);
        next_id += 1;
        order.assign_order_id(order_id);
        if book.set_order(order) {
            total_trades += crate::crossing::process_order(book, order_id).len();
        }
    }
    total_trades
}
