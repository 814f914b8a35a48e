//! Reconciling background fetches with the user's selection.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{FetchJob, JobWait};
use crate::model::types::PackageDetail;

/// How long to wait on relevant workers once a selection is made.
pub const DEFAULT_SELECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// What came back from reconciling.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// One entry per selected id, placeholders included.
    pub details: HashMap<String, PackageDetail>,
    /// Selected ids that got a placeholder (timed out or failed).
    pub placeholders: Vec<String>,
    /// Jobs cancelled because none of their ids were selected.
    pub cancelled_jobs: usize,
    /// Relevant jobs that had not reported by the deadline.
    pub timed_out_jobs: usize,
    /// Relevant jobs whose worker died or never started.
    pub failed_jobs: usize,
}

impl ReconcileOutcome {
    /// Details for `selected`, in that order.
    pub fn ordered<'a>(&'a self, selected: &'a [String]) -> Vec<&'a PackageDetail> {
        selected
            .iter()
            .filter_map(|id| self.details.get(id))
            .collect()
    }
}

/// Collect details for `selected` from `jobs`.
///
/// Jobs owning no selected id are cancelled right away. The remaining jobs
/// share one deadline of `timeout`; whatever they have not delivered by then
/// becomes a placeholder detail. Every job is disposed before returning.
pub fn reconcile(jobs: Vec<FetchJob>, selected: &[String], timeout: Duration) -> ReconcileOutcome {
    let wanted: HashSet<String> = selected.iter().cloned().collect();
    let (relevant, irrelevant): (Vec<FetchJob>, Vec<FetchJob>) =
        jobs.into_iter().partition(|job| job.is_relevant(&wanted));

    let mut outcome = ReconcileOutcome::default();

    for job in &irrelevant {
        job.cancel();
    }
    outcome.cancelled_jobs = irrelevant.len();

    let deadline = Instant::now() + timeout;
    let mut merged: HashMap<String, PackageDetail> = HashMap::new();
    for job in &relevant {
        match job.wait_until(deadline) {
            JobWait::Reported(result) => merged.extend(result),
            JobWait::TimedOut => {
                debug!(job = job.job_id, "relevant fetch job did not report in time");
                job.cancel();
                outcome.timed_out_jobs += 1;
            }
            JobWait::Lost => {
                warn!(job = job.job_id, "relevant fetch worker exited without a result");
                outcome.failed_jobs += 1;
            }
        }
    }

    for id in selected {
        if outcome.details.contains_key(id) {
            continue;
        }
        let detail = match merged.remove(id) {
            Some(detail) => detail,
            None => {
                outcome.placeholders.push(id.clone());
                PackageDetail::placeholder(id.clone())
            }
        };
        outcome.details.insert(id.clone(), detail);
    }

    info!(
        relevant = relevant.len(),
        cancelled = outcome.cancelled_jobs,
        timed_out = outcome.timed_out_jobs,
        failed = outcome.failed_jobs,
        placeholders = outcome.placeholders.len(),
        "reconciled background fetches"
    );

    for job in relevant.into_iter().chain(irrelevant) {
        job.dispose();
    }

    outcome
}
