//! Matching engine entry point.
//!
//! [`MatchingEngine`] validates submissions, assigns order ids from one
//! process-wide counter, and dispatches each order to its instrument's
//! matching lane: a dedicated task that serializes admission and crossing for
//! that book, so matching for one instrument never interleaves. Different
//! instruments match fully in parallel. Books are created lazily per
//! instrument and live for the process lifetime.
//!
//! [`MatchingEngine::submit`] resolves with the aggressor's terminal
//! snapshot, so callers observe rejections and fill outcomes that the
//! fire-and-forget path ([`MatchingEngine::submit_detached`]) only logs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::{error, info};
use tokio::sync::{mpsc, oneshot};

use crate::crossing::process_order;
use crate::error::EngineError;
use crate::instrument::{Instrument, InstrumentDirectory};
use crate::order::Order;
use crate::order_book::OrderBook;
use crate::types::OrderId;

/// Terminal outcome of one submission: the aggressor's post-matching
/// snapshot, or a structured rejection.
pub type SubmitResult = Result<Order, EngineError>;

struct Submission {
    order: Order,
    reply: Option<oneshot::Sender<SubmitResult>>,
}

/// One instrument's serialized matching lane: its book plus the queue feeding
/// the lane task.
struct Lane {
    queue: mpsc::UnboundedSender<Submission>,
    book: Arc<RwLock<OrderBook>>,
}

/// Multi-instrument matching engine.
///
/// Must be created inside a tokio runtime: each instrument's lane is a
/// spawned task.
pub struct MatchingEngine {
    directory: Arc<InstrumentDirectory>,
    lanes: RwLock<HashMap<String, Arc<Lane>>>,
    next_order_id: AtomicU64,
}

impl MatchingEngine {
    /// Creates the engine and pre-warms one book lane per instrument already
    /// registered in the directory.
    pub fn new(directory: Arc<InstrumentDirectory>) -> Self {
        let engine = Self {
            directory,
            lanes: RwLock::new(HashMap::new()),
            next_order_id: AtomicU64::new(1),
        };
        for instrument in engine.directory.all() {
            engine.lane(&instrument);
        }
        engine
    }

    /// Submits an order and awaits its terminal state after crossing.
    pub async fn submit(&self, order: Order) -> SubmitResult {
        let (reply, outcome) = oneshot::channel();
        let (instrument_name, _) = self.enqueue(order, Some(reply))?;
        outcome
            .await
            .map_err(|_| EngineError::LaneClosed(instrument_name))?
    }

    /// Fire-and-forget submission: validates and dispatches, then returns the
    /// assigned order id. Matching outcomes are observable only through book
    /// queries; lane-side failures are logged.
    pub fn submit_detached(&self, order: Order) -> Result<OrderId, EngineError> {
        let (_, order_id) = self.enqueue(order, None)?;
        Ok(order_id)
    }

    fn enqueue(
        &self,
        mut order: Order,
        reply: Option<oneshot::Sender<SubmitResult>>,
    ) -> Result<(String, OrderId), EngineError> {
        // side and order type are total enums here; malformed intake text is
        // rejected where it is parsed (types::Side / types::OrderType FromStr)
        let instrument = self.directory.lookup(order.instrument().name())?;
        let order_id = OrderId(self.next_order_id.fetch_add(1, Ordering::SeqCst));
        order.assign_order_id(order_id);
        info!(
            "received to add client_order_id={}, side={:?}, price={:?}, quantity={}, order_id={}",
            order.client_order_id(),
            order.side(),
            order.limit_price(),
            order.ordered_quantity(),
            order_id.0
        );
        let lane = self.lane(&instrument);
        lane.queue
            .send(Submission { order, reply })
            .map_err(|_| EngineError::LaneClosed(instrument.name().to_owned()))?;
        Ok((instrument.name().to_owned(), order_id))
    }

    /// Order cancellation is not supported by this engine version.
    pub fn cancel_order(&self, _order: &Order) -> Result<(), EngineError> {
        Err(EngineError::Unsupported("order cancellation"))
    }

    /// Order amendment is not supported by this engine version.
    pub fn amend_order(&self, _order: &Order) -> Result<(), EngineError> {
        Err(EngineError::Unsupported("order amendment"))
    }

    /// Shared read handle on an instrument's book, for inspection
    /// collaborators (history, depth views). Readers never observe a price
    /// level mid-mutation: the lane mutates under the write guard.
    pub fn book(&self, instrument_name: &str) -> Result<Arc<RwLock<OrderBook>>, EngineError> {
        let instrument = self.directory.lookup(instrument_name)?;
        Ok(Arc::clone(&self.lane(&instrument).book))
    }

    /// The book lane for an instrument, created on first reference.
    fn lane(&self, instrument: &Arc<Instrument>) -> Arc<Lane> {
        if let Some(lane) = self
            .lanes
            .read()
            .expect("lanes lock")
            .get(instrument.name())
        {
            return Arc::clone(lane);
        }
        let mut lanes = self.lanes.write().expect("lanes lock");
        Arc::clone(
            lanes
                .entry(instrument.name().to_owned())
                .or_insert_with(|| Arc::new(spawn_lane(Arc::clone(instrument)))),
        )
    }
}

/// Spawns one instrument's lane task: submissions are admitted and crossed
/// strictly in arrival order, under the book's write guard.
fn spawn_lane(instrument: Arc<Instrument>) -> Lane {
    let (queue, mut submissions) = mpsc::unbounded_channel::<Submission>();
    let book = Arc::new(RwLock::new(OrderBook::new(instrument)));
    let lane_book = Arc::clone(&book);
    tokio::spawn(async move {
        while let Some(Submission { order, reply }) = submissions.recv().await {
            let client_order_id = order.client_order_id().to_owned();
            let outcome = run_submission(&lane_book, order);
            match reply {
                Some(reply) => {
                    let _ = reply.send(outcome);
                }
                None => {
                    if let Err(err) = outcome {
                        error!(
                            "detached submission failed client_order_id={}: {}",
                            client_order_id, err
                        );
                    }
                }
            }
        }
    });
    Lane { queue, book }
}

fn run_submission(book: &Arc<RwLock<OrderBook>>, order: Order) -> SubmitResult {
    let client_order_id = order.client_order_id().to_owned();
    let Some(order_id) = order.order_id() else {
        return Err(EngineError::UnassignedOrderId(client_order_id));
    };
    let mut book = book.write().expect("book lock");
    if !book.set_order(order) {
        return Err(EngineError::DuplicateOrder(client_order_id));
    }
    let trades = process_order(&mut book, order_id);
    info!(
        "processed order_id={} client_order_id={} trades={}",
        order_id.0,
        client_order_id,
        trades.len()
    );
    book.order(order_id)
        .ok_or(EngineError::UnassignedOrderId(client_order_id))
}
