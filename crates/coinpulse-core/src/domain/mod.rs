//! # Domain Models
//!
//! Canonical schema every provider response is translated into.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CanonicalCoin`] | One market listing entry |
//! | [`GlobalMarketSnapshot`] | Whole-market aggregates |
//! | [`TrendingList`] / [`TrendingCoin`] | Provider trending list |
//! | [`CanonicalPayload`] | Any of the above, as stored in the cache |
//! | [`UtcDateTime`] | RFC3339 UTC timestamp |

mod models;
mod timestamp;

pub use models::{
    finite_or_zero, CanonicalCoin, CanonicalPayload, GlobalMarketSnapshot, TrendingCoin,
    TrendingList,
};
pub use timestamp::UtcDateTime;
