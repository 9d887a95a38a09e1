//! Core types and IDs for the matching engine.
//!
//! All identifiers are newtype wrappers. [`Side`] and [`OrderType`] carry
//! `FromStr` impls so untyped intake text (client feeds, reference files) is
//! rejected at the boundary; the typed API cannot express a malformed value.

use std::str::FromStr;

use crate::error::{ParseOrderTypeError, ParseSideError};

/// Unique order identifier (engine-assigned, monotonic process-wide).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct OrderId(pub u64);

/// Trade identifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct TradeId(pub u64);

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl FromStr for Side {
    type Err = ParseSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("buy") {
            Ok(Side::Buy)
        } else if s.eq_ignore_ascii_case("sell") {
            Ok(Side::Sell)
        } else {
            Err(ParseSideError(s.to_owned()))
        }
    }
}

/// Order type: limit (with price) or market (take best available).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

impl FromStr for OrderType {
    type Err = ParseOrderTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("limit") {
            Ok(OrderType::Limit)
        } else if s.eq_ignore_ascii_case("market") {
            Ok(OrderType::Market)
        } else {
            Err(ParseOrderTypeError(s.to_owned()))
        }
    }
}
