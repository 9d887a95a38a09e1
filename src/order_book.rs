//! Single-instrument order book: price-time priority storage.
//!
//! Bids and asks are price-keyed maps of FIFO queues of order ids; the
//! history index owns every admitted [`Order`] for the life of the book.
//! Best-level lookups walk toward worse prices, pruning levels left empty by
//! matching. All mutation happens on the instrument's matching lane; readers
//! get cloned snapshots.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use log::{debug, error};
use rust_decimal::Decimal;

use crate::instrument::Instrument;
use crate::order::{now_nanos, Order};
use crate::types::{OrderId, Side, TradeId};

/// Process-wide trade-id source: a monotonic counter seeded from wall-clock
/// nanos on first use, so ids are unique and increasing within the process.
fn next_trade_id() -> TradeId {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| AtomicU64::new(now_nanos()));
    TradeId(counter.fetch_add(1, Ordering::Relaxed))
}

/// One aggregated price level in a depth view.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DepthLevel {
    pub price: Decimal,
    /// Sum of displayed quantity: each order shows at most its visible
    /// quantity (iceberg cap), otherwise its full remaining quantity.
    pub displayed_quantity: Decimal,
    pub order_count: usize,
}

/// Best-N-levels snapshot of both sides, for display collaborators.
#[derive(Clone, Debug, serde::Serialize)]
pub struct BookDepth {
    pub instrument: String,
    /// Best (highest) bid first.
    pub bids: Vec<DepthLevel>,
    /// Best (lowest) ask first.
    pub asks: Vec<DepthLevel>,
}

/// Order book for one instrument.
///
/// Created lazily per instrument by the engine and retained for the process
/// lifetime. Orders are inserted by [`OrderBook::set_order`] and matched by
/// [`crate::crossing::process_order`]; fully filled orders leave the price
/// levels but stay in the history index.
#[derive(Debug)]
pub struct OrderBook {
    instrument: Arc<Instrument>,
    bids: BTreeMap<Decimal, VecDeque<OrderId>>,
    asks: BTreeMap<Decimal, VecDeque<OrderId>>,
    history: HashMap<OrderId, Order>,
}

impl OrderBook {
    pub fn new(instrument: Arc<Instrument>) -> Self {
        Self {
            instrument,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            history: HashMap::new(),
        }
    }

    pub fn instrument(&self) -> &Arc<Instrument> {
        &self.instrument
    }

    /// Admits an order: records it in the history index, then appends it to
    /// its side's price level, preserving arrival order. Rejects (false, with
    /// a log line) orders without an engine-assigned id and duplicate
    /// submissions — an order with the same (client_order_id, instrument,
    /// side) identity already resting at that price level. Sets the order's
    /// received timestamp on admission.
    pub fn set_order(&mut self, mut order: Order) -> bool {
        let Some(order_id) = order.order_id() else {
            error!(
                "order without engine-assigned id rejected client_order_id={}",
                order.client_order_id()
            );
            return false;
        };
        let price = order.effective_price();
        let side = order.side();
        let level = match side {
            Side::Buy => self.bids.get(&price),
            Side::Sell => self.asks.get(&price),
        };
        let duplicate = level.is_some_and(|queue| {
            queue
                .iter()
                .filter_map(|id| self.history.get(id))
                .any(|resting| resting.same_identity(&order))
        });
        if duplicate {
            error!(
                "duplicate {:?} order received client_order_id={} instrument={} price={}",
                side,
                order.client_order_id(),
                self.instrument.name(),
                price
            );
            // recorded in history for audit, but never rests
            self.history.insert(order_id, order);
            return false;
        }
        order.set_received_ts(now_nanos());
        self.history.insert(order_id, order);
        match side {
            Side::Buy => self.bids.entry(price).or_default().push_back(order_id),
            Side::Sell => self.asks.entry(price).or_default().push_back(order_id),
        }
        true
    }

    /// FIFO ids resting at the best (highest) bid price. Walks to worse
    /// prices, pruning levels left empty by matching, until a non-empty level
    /// is found; empty when the side is exhausted.
    pub fn best_bid(&mut self) -> Vec<OrderId> {
        loop {
            let Some((&price, queue)) = self.bids.last_key_value() else {
                return Vec::new();
            };
            if !queue.is_empty() {
                return queue.iter().copied().collect();
            }
            self.bids.remove(&price);
        }
    }

    /// FIFO ids resting at the best (lowest) ask price; prunes like
    /// [`OrderBook::best_bid`].
    pub fn best_ask(&mut self) -> Vec<OrderId> {
        loop {
            let Some((&price, queue)) = self.asks.first_key_value() else {
                return Vec::new();
            };
            if !queue.is_empty() {
                return queue.iter().copied().collect();
            }
            self.asks.remove(&price);
        }
    }

    /// Best FIFO sequence on the side opposite to `side`.
    pub fn best_opposite_orders(&mut self, side: Side) -> Vec<OrderId> {
        match side {
            Side::Buy => self.best_ask(),
            Side::Sell => self.best_bid(),
        }
    }

    pub fn best_bid_price(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask_price(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Best opposite price if it is marketable against `order`: a bid must be
    /// at or above the best ask, an ask at or below the best bid. A market
    /// order (or a zero effective price standing in for one) is marketable
    /// against any non-empty opposite side. `None` means no acceptable
    /// opposite price exists and the order rests as inserted.
    pub fn best_opposite_price(&self, order: &Order) -> Option<Decimal> {
        let bypass_limit = order.is_market() || order.effective_price() == Decimal::ZERO;
        match order.side() {
            Side::Buy => {
                let best_ask = self.best_ask_price()?;
                if bypass_limit || order.effective_price() >= best_ask {
                    Some(best_ask)
                } else {
                    debug!(
                        "price can't match as bid price {} is lower than best opposite price {}",
                        order.effective_price(),
                        best_ask
                    );
                    None
                }
            }
            Side::Sell => {
                let best_bid = self.best_bid_price()?;
                if bypass_limit || order.effective_price() <= best_bid {
                    Some(best_bid)
                } else {
                    debug!(
                        "price can't match as ask price {} is higher than best opposite price {}",
                        order.effective_price(),
                        best_bid
                    );
                    None
                }
            }
        }
    }

    /// Removes the order from the side its `side` field names, pruning the
    /// price level if it empties. Returns whether book state changed. The
    /// order stays in the history index.
    pub fn remove_order(&mut self, order: &Order) -> bool {
        let Some(order_id) = order.order_id() else {
            error!(
                "unidentified order to be removed client_order_id={}",
                order.client_order_id()
            );
            return false;
        };
        let price = order.effective_price();
        let levels = match order.side() {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let Some(queue) = levels.get_mut(&price) else {
            error!(
                "no {:?} level at {} to remove order from, potential race indication client_order_id={}",
                order.side(),
                price,
                order.client_order_id()
            );
            return false;
        };
        let before = queue.len();
        queue.retain(|id| *id != order_id);
        let removed = queue.len() != before;
        if queue.is_empty() {
            levels.remove(&price);
        }
        debug!(
            "after removal, {:?} level at {} removed={} client_order_id={}",
            order.side(),
            price,
            removed,
            order.client_order_id()
        );
        removed
    }

    /// Unique, increasing trade id.
    pub fn generate_trade_id(&self) -> TradeId {
        next_trade_id()
    }

    /// Snapshot of one order by engine id.
    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        self.history.get(&order_id).cloned()
    }

    pub(crate) fn order_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        self.history.get_mut(&order_id)
    }

    /// Snapshots of every order ever admitted, open or closed.
    pub fn order_history(&self) -> Vec<Order> {
        self.history.values().cloned().collect()
    }

    /// Number of orders in the history index.
    pub fn order_count(&self) -> usize {
        self.history.len()
    }

    /// Bid levels as (price, FIFO order snapshots), best first.
    pub fn bid_levels(&self) -> Vec<(Decimal, Vec<Order>)> {
        self.bids
            .iter()
            .rev()
            .map(|(price, queue)| (*price, self.level_orders(queue)))
            .collect()
    }

    /// Ask levels as (price, FIFO order snapshots), best first.
    pub fn ask_levels(&self) -> Vec<(Decimal, Vec<Order>)> {
        self.asks
            .iter()
            .map(|(price, queue)| (*price, self.level_orders(queue)))
            .collect()
    }

    fn level_orders(&self, queue: &VecDeque<OrderId>) -> Vec<Order> {
        queue
            .iter()
            .filter_map(|id| self.history.get(id).cloned())
            .collect()
    }

    /// Aggregated depth view of the best `levels` price levels per side.
    /// Displayed quantity honors each order's iceberg cap.
    pub fn depth(&self, levels: usize) -> BookDepth {
        fn aggregate<'a>(
            source: impl Iterator<Item = (&'a Decimal, &'a VecDeque<OrderId>)>,
            history: &HashMap<OrderId, Order>,
            levels: usize,
        ) -> Vec<DepthLevel> {
            source
                .filter(|(_, queue)| !queue.is_empty())
                .take(levels)
                .map(|(price, queue)| {
                    let mut displayed = Decimal::ZERO;
                    let mut count = 0usize;
                    for order in queue.iter().filter_map(|id| history.get(id)) {
                        let shown = match order.visible_quantity() {
                            Some(visible) => visible.min(order.remaining_quantity()),
                            None => order.remaining_quantity(),
                        };
                        displayed += shown;
                        count += 1;
                    }
                    DepthLevel {
                        price: *price,
                        displayed_quantity: displayed,
                        order_count: count,
                    }
                })
                .collect()
        }
        BookDepth {
            instrument: self.instrument.name().to_owned(),
            bids: aggregate(self.bids.iter().rev(), &self.history, levels),
            asks: aggregate(self.asks.iter(), &self.history, levels),
        }
    }
}
