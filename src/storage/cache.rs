//! Package detail cache.
//!
//! One JSON document maps package id to `{CachedDate, Details}`. Entries older
//! than [`CACHE_TTL_DAYS`] read as absent; nothing sweeps them in the
//! background. Writes are read-modify-write of the whole document and are
//! serialized through a mutex so concurrent fetch workers cannot drop each
//! other's entries.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::json::{JsonDocument, StoreError};
use crate::model::types::PackageDetail;

/// How long a cached detail stays valid.
pub const CACHE_TTL_DAYS: i64 = 30;

/// One persisted cache value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CacheEntry {
    pub cached_date: DateTime<Utc>,
    pub details: PackageDetail,
}

impl CacheEntry {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.cached_date) <= Duration::days(CACHE_TTL_DAYS)
    }
}

type CacheDocument = BTreeMap<String, CacheEntry>;

/// Keyed detail storage shared by the fetch workers and manual lookups.
pub trait DetailStore: Send + Sync {
    /// Cached detail for `id`, if present and not expired.
    fn get(&self, id: &str) -> Option<PackageDetail>;

    /// Overwrite the entry for `id`. Failures are logged, never returned.
    fn put(&self, id: &str, detail: &PackageDetail);

    /// Drop every entry, returning how many were removed.
    fn clear(&self) -> Result<usize, StoreError>;
}

/// Counts reported by `wgb cache stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    pub expired: usize,
}

/// File-backed [`DetailStore`].
#[derive(Debug)]
pub struct DetailCache {
    doc: JsonDocument<CacheDocument>,
    write_lock: Mutex<()>,
}

impl DetailCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            doc: JsonDocument::new(path),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        self.doc.path()
    }

    pub fn get_at(&self, id: &str, now: DateTime<Utc>) -> Option<PackageDetail> {
        let entry = self.doc.load().remove(id)?;
        if entry.is_fresh_at(now) {
            Some(entry.details)
        } else {
            debug!(id, cached = %entry.cached_date, "cache entry expired");
            None
        }
    }

    pub fn put_at(&self, id: &str, detail: &PackageDetail, now: DateTime<Utc>) {
        let _guard = self.write_lock.lock();
        let mut doc = self.doc.load();
        doc.insert(
            id.to_string(),
            CacheEntry {
                cached_date: now,
                details: detail.clone(),
            },
        );
        if let Err(e) = self.doc.save(&doc) {
            warn!(id, "failed to write package cache: {e}");
        }
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let doc = self.doc.load();
        let fresh = doc.values().filter(|e| e.is_fresh_at(now)).count();
        CacheStats {
            total: doc.len(),
            fresh,
            expired: doc.len() - fresh,
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now())
    }
}

impl DetailStore for DetailCache {
    fn get(&self, id: &str) -> Option<PackageDetail> {
        self.get_at(id, Utc::now())
    }

    fn put(&self, id: &str, detail: &PackageDetail) {
        self.put_at(id, detail, Utc::now());
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock();
        let count = self.doc.load().len();
        self.doc.remove()?;
        Ok(count)
    }
}

/// Store used with `--no-cache`: never hits, never writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl DetailStore for NoCache {
    fn get(&self, _id: &str) -> Option<PackageDetail> {
        None
    }

    fn put(&self, _id: &str, _detail: &PackageDetail) {}

    fn clear(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}
