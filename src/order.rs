//! Order entity and its trade records.
//!
//! [`Order`] is the mutable trading intent: quantity and price state, fill
//! bookkeeping, and the [`Trade`]s executed against it. The admitting book
//! owns each order exclusively; everything handed to outside callers is a
//! clone, so [`Order::fill`] and [`Order::rollback`] only ever run inside the
//! owning book's matching lane.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};
use rust_decimal::Decimal;

use crate::error::OrderCreationError;
use crate::instrument::Instrument;
use crate::types::{OrderId, OrderType, Side, TradeId};

/// Wall-clock nanoseconds since the Unix epoch, for receive/execution stamps.
pub(crate) fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// One execution leg, attached to the order it belongs to.
///
/// Every match produces two records, one per side, each naming the other
/// side's client order id as counterparty.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Trade {
    pub order_id: OrderId,
    pub instrument: Arc<Instrument>,
    pub price: Decimal,
    pub quantity: Decimal,
    pub side: Side,
    pub trade_id: TradeId,
    pub counterparty_client_order_id: String,
}

/// A client order and its fill state.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Order {
    client_order_id: String,
    order_id: Option<OrderId>,
    instrument: Arc<Instrument>,
    side: Side,
    order_type: OrderType,
    limit_price: Option<Decimal>,
    ordered_quantity: Decimal,
    visible_quantity: Option<Decimal>,
    cumulative_quantity: Decimal,
    remaining_quantity: Decimal,
    last_fill_price: Option<Decimal>,
    last_fill_quantity: Decimal,
    average_fill_price: Decimal,
    received_ts: u64,
    execution_ts: u64,
    is_open: bool,
    trades: BTreeMap<TradeId, Trade>,
}

impl Order {
    pub fn builder(
        client_order_id: impl Into<String>,
        instrument: Arc<Instrument>,
        side: Side,
        order_type: OrderType,
    ) -> OrderBuilder {
        OrderBuilder {
            client_order_id: client_order_id.into(),
            instrument,
            side,
            order_type,
            price: None,
            quantity: None,
            visible_quantity: None,
        }
    }

    pub fn client_order_id(&self) -> &str {
        &self.client_order_id
    }

    /// Engine-assigned id; `None` until the order passes the engine boundary.
    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    /// Sets the engine-assigned id exactly once; later calls are no-ops.
    pub fn assign_order_id(&mut self, order_id: OrderId) {
        if self.order_id.is_some() {
            return;
        }
        self.order_id = Some(order_id);
    }

    pub fn instrument(&self) -> &Arc<Instrument> {
        &self.instrument
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn is_limit(&self) -> bool {
        matches!(self.order_type, OrderType::Limit)
    }

    pub fn is_market(&self) -> bool {
        matches!(self.order_type, OrderType::Market)
    }

    /// `None` for market orders.
    pub fn limit_price(&self) -> Option<Decimal> {
        self.limit_price
    }

    /// Limit price with zero standing in for "no price"; the book keys price
    /// levels on this, so market orders rest at the zero level.
    pub fn effective_price(&self) -> Decimal {
        self.limit_price.unwrap_or(Decimal::ZERO)
    }

    pub fn ordered_quantity(&self) -> Decimal {
        self.ordered_quantity
    }

    /// Iceberg display hint; caps displayed size only, never matching.
    pub fn visible_quantity(&self) -> Option<Decimal> {
        self.visible_quantity
    }

    pub fn cumulative_quantity(&self) -> Decimal {
        self.cumulative_quantity
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.remaining_quantity
    }

    pub fn last_fill_price(&self) -> Option<Decimal> {
        self.last_fill_price
    }

    pub fn last_fill_quantity(&self) -> Decimal {
        self.last_fill_quantity
    }

    /// Quantity-weighted running average of all fills.
    pub fn average_fill_price(&self) -> Decimal {
        self.average_fill_price
    }

    /// Book-insertion timestamp (nanos); FIFO order within a price level.
    pub fn received_ts(&self) -> u64 {
        self.received_ts
    }

    pub(crate) fn set_received_ts(&mut self, ts: u64) {
        self.received_ts = ts;
    }

    pub fn execution_ts(&self) -> u64 {
        self.execution_ts
    }

    pub(crate) fn set_execution_ts(&mut self, ts: u64) {
        self.execution_ts = ts;
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_closed(&self) -> bool {
        !self.is_open
    }

    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.values()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// Submission identity used by the duplicate guard: two orders are the
    /// same submission when client order id, instrument, and side all match.
    pub fn same_identity(&self, other: &Order) -> bool {
        self.client_order_id == other.client_order_id
            && self.instrument == other.instrument
            && self.side == other.side
    }

    /// Applies one fill to this order and records the resulting [`Trade`].
    ///
    /// Returns `None` without mutating quantities when the order is already
    /// fully filled (caller logic error) or over-filled (defect telemetry);
    /// both cases force the order closed.
    pub fn fill(
        &mut self,
        trade_id: TradeId,
        fill_price: Decimal,
        fill_quantity: Decimal,
        counterparty_client_order_id: &str,
    ) -> Option<Trade> {
        debug!(
            "start executing trade_id={} fill_price={} fill_quantity={} client_order_id={} leaves={}",
            trade_id.0, fill_price, fill_quantity, self.client_order_id, self.remaining_quantity
        );
        if fill_quantity <= Decimal::ZERO {
            warn!(
                "non-positive fill quantity {} ignored client_order_id={}",
                fill_quantity, self.client_order_id
            );
            return None;
        }
        let Some(order_id) = self.order_id else {
            warn!(
                "fill on order without engine-assigned id client_order_id={}",
                self.client_order_id
            );
            return None;
        };
        if self.remaining_quantity == Decimal::ZERO {
            info!(
                "order is fully filled client_order_id={} order_id={}",
                self.client_order_id, order_id.0
            );
            self.is_open = false;
            return None;
        }
        if self.remaining_quantity < Decimal::ZERO {
            error!(
                "order is over filled client_order_id={} remaining={}",
                self.client_order_id, self.remaining_quantity
            );
            self.is_open = false;
            return None;
        }

        let new_cumulative = self.cumulative_quantity + fill_quantity;
        let average = (self.average_fill_price * self.cumulative_quantity
            + fill_price * fill_quantity)
            / new_cumulative;

        self.last_fill_price = Some(fill_price);
        self.last_fill_quantity = fill_quantity;
        self.cumulative_quantity = new_cumulative;
        self.remaining_quantity -= fill_quantity;
        self.average_fill_price = average;

        let trade = Trade {
            order_id,
            instrument: Arc::clone(&self.instrument),
            price: fill_price,
            quantity: fill_quantity,
            side: self.side,
            trade_id,
            counterparty_client_order_id: counterparty_client_order_id.to_owned(),
        };
        self.trades.insert(trade_id, trade.clone());
        self.is_open = self.remaining_quantity > Decimal::ZERO;
        debug!(
            "end executing trade_id={} client_order_id={} leaves={}",
            trade_id.0, self.client_order_id, self.remaining_quantity
        );
        Some(trade)
    }

    /// Compensates a previously applied fill: adds the quantity back, reverses
    /// the average, and removes the trade record, so remaining quantity and
    /// average stay consistent with the trades still on the order. Not called
    /// by the matching path.
    pub fn rollback(&mut self, trade_id: TradeId) -> Option<Trade> {
        let Some(trade) = self.trades.remove(&trade_id) else {
            warn!(
                "rollback of unknown trade_id={} client_order_id={}",
                trade_id.0, self.client_order_id
            );
            return None;
        };
        debug!(
            "start rollback trade_id={} fill_price={} fill_quantity={} client_order_id={} leaves={}",
            trade_id.0, trade.price, trade.quantity, self.client_order_id, self.remaining_quantity
        );
        let new_cumulative = self.cumulative_quantity - trade.quantity;
        self.average_fill_price = if new_cumulative > Decimal::ZERO {
            (self.average_fill_price * self.cumulative_quantity - trade.price * trade.quantity)
                / new_cumulative
        } else {
            Decimal::ZERO
        };
        self.cumulative_quantity = new_cumulative;
        self.remaining_quantity += trade.quantity;
        self.last_fill_price = Some(trade.price);
        self.last_fill_quantity = trade.quantity;
        self.is_open = self.remaining_quantity > Decimal::ZERO;
        debug!(
            "end rollback trade_id={} client_order_id={} leaves={}",
            trade_id.0, self.client_order_id, self.remaining_quantity
        );
        Some(trade)
    }
}

/// Builds an [`Order`], enforcing that limit orders carry a price and that
/// the ordered quantity is positive.
pub struct OrderBuilder {
    client_order_id: String,
    instrument: Arc<Instrument>,
    side: Side,
    order_type: OrderType,
    price: Option<Decimal>,
    quantity: Option<Decimal>,
    visible_quantity: Option<Decimal>,
}

impl OrderBuilder {
    /// Limit price. Ignored for market orders.
    pub fn price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Iceberg display cap.
    pub fn visible_quantity(mut self, visible_quantity: Decimal) -> Self {
        self.visible_quantity = Some(visible_quantity);
        self
    }

    pub fn build(self) -> Result<Order, OrderCreationError> {
        let limit_price = match self.order_type {
            OrderType::Limit => match self.price {
                Some(price) => Some(price),
                None => {
                    return Err(OrderCreationError::MissingLimitPrice(self.client_order_id))
                }
            },
            OrderType::Market => None,
        };
        let quantity = self.quantity.unwrap_or(Decimal::ZERO);
        if quantity <= Decimal::ZERO {
            return Err(OrderCreationError::InvalidQuantity {
                client_order_id: self.client_order_id,
                quantity,
            });
        }
        Ok(Order {
            client_order_id: self.client_order_id,
            order_id: None,
            instrument: self.instrument,
            side: self.side,
            order_type: self.order_type,
            limit_price,
            ordered_quantity: quantity,
            visible_quantity: self.visible_quantity,
            cumulative_quantity: Decimal::ZERO,
            remaining_quantity: quantity,
            last_fill_price: None,
            last_fill_quantity: Decimal::ZERO,
            average_fill_price: Decimal::ZERO,
            received_ts: 0,
            execution_ts: 0,
            is_open: true,
            trades: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> Arc<Instrument> {
        Arc::new(Instrument::new("ACME", Decimal::from(100)))
    }

    fn limit_order(client_order_id: &str, side: Side, qty: i64, price: &str) -> Order {
        Order::builder(client_order_id, acme(), side, OrderType::Limit)
            .price(price.parse().unwrap())
            .quantity(Decimal::from(qty))
            .build()
            .unwrap()
    }

    #[test]
    fn builder_rejects_limit_without_price() {
        let err = Order::builder("c1", acme(), Side::Buy, OrderType::Limit)
            .quantity(Decimal::from(10))
            .build()
            .unwrap_err();
        assert_eq!(err, OrderCreationError::MissingLimitPrice("c1".into()));
    }

    #[test]
    fn builder_rejects_non_positive_quantity() {
        let err = Order::builder("c1", acme(), Side::Buy, OrderType::Market)
            .quantity(Decimal::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, OrderCreationError::InvalidQuantity { .. }));
    }

    #[test]
    fn builder_drops_price_on_market_order() {
        let order = Order::builder("c1", acme(), Side::Buy, OrderType::Market)
            .price(Decimal::from(50))
            .quantity(Decimal::from(10))
            .build()
            .unwrap();
        assert_eq!(order.limit_price(), None);
        assert_eq!(order.effective_price(), Decimal::ZERO);
    }

    #[test]
    fn order_id_is_assigned_exactly_once() {
        let mut order = limit_order("c1", Side::Buy, 10, "20.25");
        assert_eq!(order.order_id(), None);
        order.assign_order_id(OrderId(7));
        order.assign_order_id(OrderId(9));
        assert_eq!(order.order_id(), Some(OrderId(7)));
    }

    #[test]
    fn fill_updates_quantities_and_weighted_average() {
        let mut order = limit_order("c1", Side::Buy, 300, "20.30");
        order.assign_order_id(OrderId(1));
        order.fill(TradeId(1), "20.25".parse().unwrap(), Decimal::from(100), "c2");
        order.fill(TradeId(2), "20.30".parse().unwrap(), Decimal::from(200), "c3");

        assert_eq!(order.cumulative_quantity(), Decimal::from(300));
        assert_eq!(order.remaining_quantity(), Decimal::ZERO);
        assert!(order.is_closed());
        assert_eq!(order.last_fill_price(), Some("20.30".parse().unwrap()));
        assert_eq!(order.last_fill_quantity(), Decimal::from(200));
        // (20.25*100 + 20.30*200) / 300
        let expected: Decimal = "20.283333333333333333333333333".parse().unwrap();
        assert!((order.average_fill_price() - expected).abs() < Decimal::new(1, 10));
        assert_eq!(order.trade_count(), 2);
    }

    #[test]
    fn fill_keeps_ordered_quantity_conserved() {
        let mut order = limit_order("c1", Side::Sell, 100, "20.25");
        order.assign_order_id(OrderId(1));
        order.fill(TradeId(1), "20.25".parse().unwrap(), Decimal::from(40), "c2");
        assert_eq!(
            order.cumulative_quantity() + order.remaining_quantity(),
            order.ordered_quantity()
        );
        assert!(order.is_open());
    }

    #[test]
    fn fill_on_fully_filled_order_returns_none_and_closes() {
        let mut order = limit_order("c1", Side::Buy, 10, "20.25");
        order.assign_order_id(OrderId(1));
        order.fill(TradeId(1), "20.25".parse().unwrap(), Decimal::from(10), "c2");
        let trade = order.fill(TradeId(2), "20.25".parse().unwrap(), Decimal::from(5), "c3");
        assert!(trade.is_none());
        assert!(order.is_closed());
        assert_eq!(order.trade_count(), 1);
        assert_eq!(order.remaining_quantity(), Decimal::ZERO);
    }

    #[test]
    fn fill_without_assigned_id_is_rejected() {
        let mut order = limit_order("c1", Side::Buy, 10, "20.25");
        let trade = order.fill(TradeId(1), "20.25".parse().unwrap(), Decimal::from(5), "c2");
        assert!(trade.is_none());
        assert_eq!(order.remaining_quantity(), Decimal::from(10));
    }

    #[test]
    fn trade_records_counterparty_and_side() {
        let mut order = limit_order("c1", Side::Sell, 10, "20.25");
        order.assign_order_id(OrderId(3));
        let trade = order
            .fill(TradeId(9), "20.25".parse().unwrap(), Decimal::from(10), "c2")
            .unwrap();
        assert_eq!(trade.order_id, OrderId(3));
        assert_eq!(trade.side, Side::Sell);
        assert_eq!(trade.counterparty_client_order_id, "c2");
        assert_eq!(trade.trade_id, TradeId(9));
    }

    #[test]
    fn rollback_reverses_fill_and_removes_trade() {
        let mut order = limit_order("c1", Side::Buy, 300, "20.30");
        order.assign_order_id(OrderId(1));
        order.fill(TradeId(1), "20.25".parse().unwrap(), Decimal::from(100), "c2");
        order.fill(TradeId(2), "20.30".parse().unwrap(), Decimal::from(200), "c3");

        order.rollback(TradeId(2)).unwrap();
        assert_eq!(order.cumulative_quantity(), Decimal::from(100));
        assert_eq!(order.remaining_quantity(), Decimal::from(200));
        assert!(order.is_open());
        assert_eq!(order.trade_count(), 1);
        // back to the first fill's average
        assert_eq!(order.average_fill_price(), "20.25".parse().unwrap());
    }

    #[test]
    fn rollback_of_only_fill_restores_new_state() {
        let mut order = limit_order("c1", Side::Buy, 100, "20.30");
        order.assign_order_id(OrderId(1));
        order.fill(TradeId(1), "20.25".parse().unwrap(), Decimal::from(100), "c2");
        assert!(order.is_closed());
        order.rollback(TradeId(1)).unwrap();
        assert_eq!(order.cumulative_quantity(), Decimal::ZERO);
        assert_eq!(order.remaining_quantity(), Decimal::from(100));
        assert_eq!(order.average_fill_price(), Decimal::ZERO);
        assert!(order.is_open());
        assert_eq!(order.trade_count(), 0);
    }

    #[test]
    fn rollback_of_unknown_trade_is_a_no_op() {
        let mut order = limit_order("c1", Side::Buy, 100, "20.30");
        order.assign_order_id(OrderId(1));
        assert!(order.rollback(TradeId(42)).is_none());
        assert_eq!(order.remaining_quantity(), Decimal::from(100));
    }

    #[test]
    fn clone_is_an_independent_snapshot() {
        let mut order = limit_order("c1", Side::Buy, 100, "20.30");
        order.assign_order_id(OrderId(1));
        let snapshot = order.clone();
        order.fill(TradeId(1), "20.25".parse().unwrap(), Decimal::from(60), "c2");
        assert_eq!(snapshot.remaining_quantity(), Decimal::from(100));
        assert_eq!(snapshot.trade_count(), 0);
        assert_eq!(order.trade_count(), 1);
    }

    #[test]
    fn same_identity_matches_on_client_id_instrument_side() {
        let a = limit_order("c1", Side::Buy, 10, "20.25");
        let b = limit_order("c1", Side::Buy, 99, "21.00");
        let c = limit_order("c1", Side::Sell, 10, "20.25");
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
    }
}
