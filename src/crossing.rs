//! Price-time priority crossing.
//!
//! [`process_order`] walks the opposite side of the book for one newly
//! admitted order: better prices first, arrival order within a price level.
//! Each match fills both orders with the same quantity and price and removes
//! exhausted resting orders from their level. Runs exactly once per order,
//! inside the instrument's matching lane, after [`OrderBook::set_order`].

use log::{debug, error, info, warn};
use rust_decimal::Decimal;

use crate::order::{now_nanos, Trade};
use crate::order_book::OrderBook;
use crate::types::{OrderId, Side};

/// Runs the crossing algorithm for the admitted order identified by
/// `order_id`. Returns the aggressor-side trades, in execution order; the
/// passive legs are recorded on the resting orders. An order that cannot (or
/// can no longer) cross stays resting at its own price level.
pub fn process_order(book: &mut OrderBook, order_id: OrderId) -> Vec<Trade> {
    let mut trades = Vec::new();
    let Some(aggressor) = book.order(order_id) else {
        error!("no order {} in book history to process", order_id.0);
        return trades;
    };
    let side = aggressor.side();
    let client_order_id = aggressor.client_order_id().to_owned();
    debug!(
        "{}, side {:?} order received, will try to match with opposite side for best price",
        client_order_id, side
    );

    if aggressor.remaining_quantity() <= Decimal::ZERO || aggressor.is_closed() {
        return trades;
    }
    let mut opposite = book.best_opposite_orders(side);
    if opposite.is_empty() {
        info!("no opposite order exists for side {:?}", side);
        return trades;
    }

    loop {
        let Some(aggressor) = book.order(order_id) else {
            return trades;
        };
        if aggressor.remaining_quantity() <= Decimal::ZERO
            || aggressor.is_closed()
            || opposite.is_empty()
        {
            return trades;
        }
        // not marketable against the current best level: rest as inserted
        if book.best_opposite_price(&aggressor).is_none() {
            return trades;
        }
        debug!(
            "started processing {}, leaves {}",
            client_order_id,
            aggressor.remaining_quantity()
        );

        let mut filled_this_pass = false;
        for resting_id in opposite.drain(..) {
            if execute_pair(book, order_id, resting_id, side, &client_order_id, &mut trades) {
                filled_this_pass = true;
            }
            let Some(aggressor) = book.order(order_id) else {
                return trades;
            };
            if aggressor.remaining_quantity() <= Decimal::ZERO || aggressor.is_closed() {
                return trades;
            }
        }
        // the level produced no fill (e.g. only market-vs-market pairs):
        // nothing further on this side can cross
        if !filled_this_pass {
            return trades;
        }
        debug!(
            "check for the next best price opposite side of order {}",
            client_order_id
        );
        opposite = book.best_opposite_orders(side);
        if opposite.is_empty() {
            return trades;
        }
    }
}

/// Attempts one aggressor/resting match. Returns whether a fill happened.
fn execute_pair(
    book: &mut OrderBook,
    aggressor_id: OrderId,
    resting_id: OrderId,
    side: Side,
    client_order_id: &str,
    trades: &mut Vec<Trade>,
) -> bool {
    let Some(aggressor) = book.order(aggressor_id) else {
        return false;
    };
    let Some(resting) = book.order(resting_id) else {
        return false;
    };

    if aggressor.is_market() && resting.is_market() {
        debug!("matching can't be done as BUY and SELL both orders are MARKET orders");
        return false;
    }

    let crossable = aggressor.is_market()
        || resting.is_market()
        || aggressor.effective_price() == Decimal::ZERO
        || match side {
            Side::Buy => aggressor.effective_price() >= resting.effective_price(),
            Side::Sell => aggressor.effective_price() <= resting.effective_price(),
        };
    if !crossable {
        return false;
    }

    let match_quantity = aggressor
        .remaining_quantity()
        .min(resting.remaining_quantity());
    debug!(
        "match quantity {} for side {:?} and {} with opposite side {:?} and {}",
        match_quantity,
        side,
        client_order_id,
        resting.side(),
        resting.client_order_id()
    );
    if match_quantity <= Decimal::ZERO {
        warn!("match quantity should be larger than 0, no matching found");
        return false;
    }

    // the passive limit sets the execution price; an aggressor limit prices
    // a resting market order
    let match_price = if resting.is_limit() {
        resting.effective_price()
    } else {
        match aggressor.limit_price() {
            Some(price) => price,
            None => return false, // two market orders cannot establish a price
        }
    };
    debug!(
        "match price {} for side {:?} and {} with opposite side {:?} and {}",
        match_price,
        side,
        client_order_id,
        resting.side(),
        resting.client_order_id()
    );

    let resting_client_order_id = resting.client_order_id().to_owned();
    debug!(
        "transaction starts on instrument {} between {} and {}",
        book.instrument().name(),
        client_order_id,
        resting_client_order_id
    );

    let aggressor_trade_id = book.generate_trade_id();
    let passive_trade_id = book.generate_trade_id();
    if let Some(aggressor) = book.order_mut(aggressor_id) {
        if let Some(trade) = aggressor.fill(
            aggressor_trade_id,
            match_price,
            match_quantity,
            &resting_client_order_id,
        ) {
            trades.push(trade);
        }
    }
    if let Some(resting) = book.order_mut(resting_id) {
        resting.fill(
            passive_trade_id,
            match_price,
            match_quantity,
            client_order_id,
        );
    }
    let transaction_ts = now_nanos();
    if let Some(aggressor) = book.order_mut(aggressor_id) {
        aggressor.set_execution_ts(transaction_ts);
    }
    if let Some(resting) = book.order_mut(resting_id) {
        resting.set_execution_ts(transaction_ts);
    }

    if let Some(resting) = book.order(resting_id) {
        if resting.remaining_quantity() == Decimal::ZERO {
            book.remove_order(&resting);
            debug!(
                "removed from matching book as resting order {}, order_id={}",
                resting.client_order_id(),
                resting_id.0
            );
        } else if resting.remaining_quantity() < Decimal::ZERO {
            error!(
                "order over executed [check fill logic if happened] order {}",
                resting.client_order_id()
            );
            book.remove_order(&resting);
        }
    }
    if let Some(aggressor) = book.order(aggressor_id) {
        if aggressor.remaining_quantity() == Decimal::ZERO {
            let removed = book.remove_order(&aggressor);
            debug!(
                "removed from matching book? {}, client_order_id={}, order_id={}",
                removed, client_order_id, aggressor_id.0
            );
        } else if aggressor.remaining_quantity() < Decimal::ZERO {
            warn!(
                "order over executed [check fill logic if happened] order {}",
                client_order_id
            );
            let removed = book.remove_order(&aggressor);
            debug!("overfilled but is removed {}", removed);
        }
    }
    debug!(
        "transaction ends on instrument {} between {} and {}",
        book.instrument().name(),
        client_order_id,
        resting_client_order_id
    );
    true
}
