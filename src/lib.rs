//! # Equity Matching Engine
//!
//! Continuous double-auction matching core: per-instrument order books,
//! price-time priority crossing, and one serialized matching lane per
//! instrument.
//!
//! ## Entry point
//!
//! Use [`MatchingEngine`] as the single entry point: create it with a
//! populated [`InstrumentDirectory`], then submit orders built with
//! [`Order::builder`]. [`MatchingEngine::submit`] resolves with the order's
//! terminal state after crossing; [`MatchingEngine::submit_detached`] is the
//! fire-and-forget variant. Cancel and amend are rejected as unsupported.
//!
//! ## Example
//!
//! The book and crossing algorithm are also usable directly when you manage
//! order ids yourself:
//!
//! ```rust
//! use equity_matching_engine::{process_order, Instrument, Order, OrderBook, OrderId, OrderType, Side};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! let acme = Arc::new(Instrument::new("ACME", Decimal::new(2025, 2)));
//! let mut book = OrderBook::new(Arc::clone(&acme));
//!
//! let mut sell = Order::builder("s1", Arc::clone(&acme), Side::Sell, OrderType::Limit)
//!     .price(Decimal::new(2025, 2))
//!     .quantity(Decimal::from(100))
//!     .build()
//!     .unwrap();
//! sell.assign_order_id(OrderId(1));
//! book.set_order(sell);
//! process_order(&mut book, OrderId(1));
//!
//! let mut buy = Order::builder("b1", acme, Side::Buy, OrderType::Limit)
//!     .price(Decimal::new(2030, 2))
//!     .quantity(Decimal::from(100))
//!     .build()
//!     .unwrap();
//! buy.assign_order_id(OrderId(2));
//! book.set_order(buy);
//! let trades = process_order(&mut book, OrderId(2));
//!
//! assert_eq!(trades.len(), 1);
//! // the passive limit sets the execution price
//! assert_eq!(trades[0].price, Decimal::new(2025, 2));
//! assert!(book.order(OrderId(2)).unwrap().is_closed());
//! ```

pub mod crossing;
pub mod engine;
pub mod error;
pub mod flow_gen;
pub mod instrument;
pub mod order;
pub mod order_book;
pub mod types;

pub use crossing::process_order;
pub use engine::{MatchingEngine, SubmitResult};
pub use error::{EngineError, OrderCreationError, ParseOrderTypeError, ParseSideError};
pub use flow_gen::{replay_into_book, FlowConfig, FlowGenerator};
pub use instrument::{Instrument, InstrumentDirectory};
pub use order::{Order, OrderBuilder, Trade};
pub use order_book::{BookDepth, DepthLevel, OrderBook};
pub use types::{OrderId, OrderType, Side, TradeId};
