//! Background detail fetching.
//!
//! The scheduler splits a list of package ids into contiguous slices, one per
//! worker thread, and returns a [`FetchJob`] per slice immediately. Each worker
//! walks its slice in order, answering from the detail cache when it can and
//! calling `show` otherwise. Workers check their cancel flag between ids, so a
//! cancelled job stops after the id it is currently fetching.
//!
//! The [`coordinator`] decides which jobs still matter once the user has made
//! a selection.

pub mod coordinator;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::types::PackageDetail;
use crate::parse::parse_detail_lines;
use crate::storage::DetailStore;
use crate::winget::{PackageManager, PackageManagerError};

pub use coordinator::{DEFAULT_SELECTION_TIMEOUT, ReconcileOutcome, reconcile};

/// Upper bound on concurrent workers.
pub const MAX_WORKERS: usize = 10;

/// Why a single detail could not be produced.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    PackageManager(#[from] PackageManagerError),

    #[error("`show {id}` exited with code {code}")]
    ShowFailed { id: String, code: i32 },

    #[error("`show {id}` printed no recognizable details")]
    NoDetails { id: String },
}

/// Split `ids` into at most `max_workers` contiguous slices.
///
/// Every slice gets `len / workers` ids and the first `len % workers` slices
/// get one more, so no worker is idle and slice sizes differ by at most one.
/// Concatenating the slices yields `ids` unchanged.
pub fn partition<T: Clone>(ids: &[T], max_workers: usize) -> Vec<Vec<T>> {
    if ids.is_empty() || max_workers == 0 {
        return Vec::new();
    }
    let workers = max_workers.min(ids.len());
    let base = ids.len() / workers;
    let extra = ids.len() % workers;

    let mut slices = Vec::with_capacity(workers);
    let mut start = 0;
    for w in 0..workers {
        let len = base + usize::from(w < extra);
        slices.push(ids[start..start + len].to_vec());
        start += len;
    }
    slices
}

/// Cache-first detail lookup for one id.
///
/// A cache hit never touches the package manager. A fresh fetch is written
/// back to the cache only when `show` succeeded and printed at least one
/// recognized field.
pub fn fetch_detail(
    pm: &dyn PackageManager,
    store: &dyn DetailStore,
    id: &str,
) -> Result<PackageDetail, FetchError> {
    if let Some(hit) = store.get(id) {
        debug!(id, "detail cache hit");
        return Ok(hit);
    }
    let output = pm.show(id)?;
    if !output.success() {
        return Err(FetchError::ShowFailed {
            id: id.to_string(),
            code: output.exit_code,
        });
    }
    let detail = parse_detail_lines(output.stdout_lines(), id);
    if detail.is_placeholder() {
        return Err(FetchError::NoDetails { id: id.to_string() });
    }
    store.put(id, &detail);
    Ok(detail)
}

/// Result of one worker: id to detail for every id it managed to fetch.
pub type JobResult = HashMap<String, PackageDetail>;

/// How waiting on a worker ended.
#[derive(Debug)]
pub enum JobWait {
    Reported(JobResult),
    /// Still running at the deadline.
    TimedOut,
    /// The worker is gone without reporting: it panicked or never started.
    Lost,
}

/// One in-flight worker and the ids it owns.
#[derive(Debug)]
pub struct FetchJob {
    pub job_id: usize,
    pub ids: Vec<String>,
    cancel: Arc<AtomicBool>,
    result_rx: Receiver<JobResult>,
    handle: Option<JoinHandle<()>>,
}

impl FetchJob {
    /// Whether any of this job's ids were selected.
    pub fn is_relevant(&self, selected: &HashSet<String>) -> bool {
        self.ids.iter().any(|id| selected.contains(id))
    }

    /// Ask the worker to stop after its current id.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the worker's result until `deadline`.
    pub fn wait_until(&self, deadline: Instant) -> JobWait {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match self.result_rx.recv_timeout(timeout) {
            Ok(result) => JobWait::Reported(result),
            Err(RecvTimeoutError::Timeout) => JobWait::TimedOut,
            Err(RecvTimeoutError::Disconnected) => JobWait::Lost,
        }
    }

    /// Release the job. Finished workers are joined; running ones are told to
    /// stop and left to wind down on their own.
    pub fn dispose(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!(job = self.job_id, "fetch worker panicked");
                }
            } else {
                self.cancel();
            }
        }
    }
}

/// Launches fetch workers against a package manager and a detail store.
#[derive(Clone)]
pub struct FetchScheduler {
    pm: Arc<dyn PackageManager>,
    store: Arc<dyn DetailStore>,
    max_workers: usize,
}

impl FetchScheduler {
    pub fn new(pm: Arc<dyn PackageManager>, store: Arc<dyn DetailStore>) -> Self {
        Self {
            pm,
            store,
            max_workers: MAX_WORKERS,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Start one worker per slice and return without waiting for any.
    pub fn launch(&self, ids: &[String]) -> Vec<FetchJob> {
        partition(ids, self.max_workers)
            .into_iter()
            .enumerate()
            .map(|(job_id, slice)| self.spawn_job(job_id, slice))
            .collect()
    }

    fn spawn_job(&self, job_id: usize, ids: Vec<String>) -> FetchJob {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(1);
        let pm = self.pm.clone();
        let store = self.store.clone();
        let worker_ids = ids.clone();
        let worker_cancel = cancel.clone();

        let handle = thread::Builder::new()
            .name(format!("wgb-fetch-{job_id}"))
            .spawn(move || {
                let mut result = JobResult::with_capacity(worker_ids.len());
                for id in &worker_ids {
                    if worker_cancel.load(Ordering::SeqCst) {
                        debug!(job = job_id, "fetch worker cancelled");
                        return;
                    }
                    match fetch_detail(pm.as_ref(), store.as_ref(), id) {
                        Ok(detail) => {
                            result.insert(id.clone(), detail);
                        }
                        Err(e) => debug!(job = job_id, id = %id, "detail fetch failed: {e}"),
                    }
                }
                let _ = tx.send(result);
            });

        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(job = job_id, "could not start fetch worker: {e}");
                None
            }
        };

        FetchJob {
            job_id,
            ids,
            cancel,
            result_rx: rx,
            handle,
        }
    }
}
