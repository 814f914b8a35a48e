//! Persisted state.
//!
//! - **json**: single-document JSON files with atomic replace
//! - **cache**: 30-day package detail cache keyed by package id
//! - **rate_limit**: GitHub request counter with hourly reset

pub mod cache;
pub mod json;
pub mod rate_limit;

pub use cache::{CACHE_TTL_DAYS, CacheEntry, CacheStats, DetailCache, DetailStore, NoCache};
pub use json::{JsonDocument, StoreError};
pub use rate_limit::{RateLimitState, RateLimitStore};
