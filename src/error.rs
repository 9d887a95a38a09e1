//! Error taxonomy for order construction, intake parsing, and submission.
//!
//! Construction-time failures ([`OrderCreationError`]) surface synchronously
//! from the builder. [`EngineError`] covers everything the engine boundary or
//! a matching lane can reject; the submission future resolves with it, so a
//! caller can observe rejections that the original fire-and-forget path only
//! logged.

use thiserror::Error;

/// Rejected while building an [`crate::Order`], before it reaches the engine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrderCreationError {
    #[error("limit order must have a price (client_order_id {0})")]
    MissingLimitPrice(String),
    #[error("invalid order quantity {quantity} for client_order_id {client_order_id}")]
    InvalidQuantity {
        client_order_id: String,
        quantity: rust_decimal::Decimal,
    },
}

/// Rejected at the engine boundary or inside a matching lane.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown instrument {0}")]
    UnknownInstrument(String),
    #[error("instrument directory is not initialized")]
    DirectoryNotInitialized,
    #[error("order has no engine-assigned id (client_order_id {0})")]
    UnassignedOrderId(String),
    #[error("duplicate submission rejected (client_order_id {0})")]
    DuplicateOrder(String),
    #[error("{0} is not supported")]
    Unsupported(&'static str),
    #[error("matching lane for {0} is closed")]
    LaneClosed(String),
}

/// A side string that maps to neither BUY nor SELL.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unrecognized side {0:?}")]
pub struct ParseSideError(pub String);

/// An order-type string that maps to neither LIMIT nor MARKET.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unrecognized order type {0:?}")]
pub struct ParseOrderTypeError(pub String);
