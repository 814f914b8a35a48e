//! Local GitHub request counter.
//!
//! GitHub allows 60 unauthenticated requests per hour (5000 with a token). We
//! keep our own count so a run can stop before the API starts refusing us.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::json::{JsonDocument, StoreError};

/// Hourly budget without a token.
pub const UNAUTHENTICATED_LIMIT: u32 = 60;

/// Hourly budget with a bearer token.
pub const AUTHENTICATED_LIMIT: u32 = 5000;

/// Persisted counter state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RateLimitState {
    pub request_count: u32,
    pub last_reset: DateTime<Utc>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl RateLimitState {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            request_count: 0,
            last_reset: now,
        }
    }

    /// Whether the hourly window has elapsed.
    pub fn should_reset(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_reset) > Duration::hours(1)
    }

    /// Start a fresh window if the previous one is over.
    pub fn roll_window(&mut self, now: DateTime<Utc>) {
        if self.should_reset(now) {
            self.request_count = 0;
            self.last_reset = now;
        }
    }

    pub fn remaining(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.request_count)
    }

    /// When the current window ends.
    pub fn resets_at(&self) -> DateTime<Utc> {
        self.last_reset + Duration::hours(1)
    }
}

/// File-backed counter store.
#[derive(Debug, Clone)]
pub struct RateLimitStore {
    doc: JsonDocument<RateLimitState>,
}

impl RateLimitStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            doc: JsonDocument::new(path),
        }
    }

    /// Current state with the window rolled forward to `now`.
    pub fn get_at(&self, now: DateTime<Utc>) -> RateLimitState {
        let mut state = match self.doc.try_load() {
            Ok(Some(state)) => state,
            Ok(None) => RateLimitState::starting_at(now),
            Err(e) => {
                debug!("starting a fresh GitHub request window: {e}");
                RateLimitState::starting_at(now)
            }
        };
        state.roll_window(now);
        state
    }

    pub fn get(&self) -> RateLimitState {
        self.get_at(Utc::now())
    }

    /// Count one request. Returns the updated state.
    pub fn record_request_at(&self, now: DateTime<Utc>) -> RateLimitState {
        let mut state = self.get_at(now);
        state.request_count = state.request_count.saturating_add(1);
        if let Err(e) = self.doc.save(&state) {
            warn!("failed to persist GitHub request counter: {e}");
        }
        debug!(count = state.request_count, "recorded GitHub request");
        state
    }

    pub fn record_request(&self) -> RateLimitState {
        self.record_request_at(Utc::now())
    }

    /// Forget the counter entirely.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.doc.remove()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn counts_requests_within_window() {
        let dir = TempDir::new().unwrap();
        let store = RateLimitStore::new(dir.path().join("rate.json"));
        let now = Utc::now();
        store.record_request_at(now);
        store.record_request_at(now);
        let state = store.get_at(now + Duration::minutes(10));
        assert_eq!(state.request_count, 2);
        assert_eq!(state.remaining(UNAUTHENTICATED_LIMIT), 58);
    }

    #[test]
    fn window_resets_after_an_hour() {
        let dir = TempDir::new().unwrap();
        let store = RateLimitStore::new(dir.path().join("rate.json"));
        let start = Utc::now() - Duration::hours(3);
        for _ in 0..5 {
            store.record_request_at(start);
        }
        let later = start + Duration::hours(1) + Duration::seconds(1);
        let state = store.get_at(later);
        assert_eq!(state.request_count, 0);
        assert_eq!(state.last_reset, later);
    }

    #[test]
    fn persisted_document_uses_expected_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rate.json");
        let store = RateLimitStore::new(&path);
        store.record_request();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["RequestCount"], 1);
        assert!(raw["LastReset"].is_string());
    }

    #[test]
    fn remaining_saturates() {
        let state = RateLimitState {
            request_count: 75,
            last_reset: Utc::now(),
        };
        assert_eq!(state.remaining(UNAUTHENTICATED_LIMIT), 0);
        assert_eq!(state.remaining(AUTHENTICATED_LIMIT), 4925);
    }

    #[test]
    fn reset_removes_state() {
        let dir = TempDir::new().unwrap();
        let store = RateLimitStore::new(dir.path().join("rate.json"));
        store.record_request();
        store.reset().unwrap();
        assert_eq!(store.get().request_count, 0);
    }
}
