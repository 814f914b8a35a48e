//! Sequential install / upgrade / uninstall of a list of ids.
//!
//! Items run one at a time: concurrent winget invocations fight over the same
//! installer locks. A failed item is recorded and the batch moves on; nothing
//! is retried.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::model::types::BatchAction;
use crate::winget::PackageManager;

/// How one item ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Succeeded,
    /// The package manager ran and exited non-zero.
    Failed { exit_code: i32 },
    /// The package manager could not be run.
    Error { message: String },
}

impl ItemStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemStatus::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub id: String,
    #[serde(flatten)]
    pub status: ItemStatus,
}

/// Progress notifications emitted while a batch runs.
#[derive(Debug)]
pub enum BatchEvent<'a> {
    Starting {
        index: usize,
        total: usize,
        id: &'a str,
    },
    Finished {
        index: usize,
        total: usize,
        outcome: &'a ItemOutcome,
    },
}

/// Aggregate result of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub action: String,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.status.is_success())
            .map(|o| o.id.as_str())
            .collect()
    }
}

/// Drop repeated ids, keeping first occurrences in order.
pub fn dedup_ids<S: AsRef<str>>(ids: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        let id: &str = id.as_ref();
        if seen.insert(id) {
            unique.push(id.to_string());
        }
    }
    unique
}

/// Apply `action` to each id in order.
pub fn execute_batch<F>(
    pm: &dyn PackageManager,
    action: BatchAction,
    ids: &[String],
    mut on_event: F,
) -> BatchReport
where
    F: FnMut(BatchEvent<'_>),
{
    let ids = dedup_ids(ids);
    let total = ids.len();
    let mut outcomes = Vec::with_capacity(total);

    for (index, id) in ids.iter().enumerate() {
        on_event(BatchEvent::Starting {
            index,
            total,
            id: id.as_str(),
        });

        let status = match pm.apply(action, id) {
            Ok(0) => ItemStatus::Succeeded,
            Ok(code) => {
                warn!(%action, id = %id, exit_code = code, "package manager reported failure");
                ItemStatus::Failed { exit_code: code }
            }
            Err(e) => {
                warn!(%action, id = %id, "package manager could not run: {e}");
                ItemStatus::Error {
                    message: e.to_string(),
                }
            }
        };
        let outcome = ItemOutcome {
            id: id.clone(),
            status,
        };
        on_event(BatchEvent::Finished {
            index,
            total,
            outcome: &outcome,
        });
        outcomes.push(outcome);
    }

    let succeeded = outcomes.iter().filter(|o| o.status.is_success()).count();
    let report = BatchReport {
        action: action.verb().to_string(),
        succeeded,
        failed: outcomes.len() - succeeded,
        outcomes,
    };
    info!(
        action = %action,
        succeeded = report.succeeded,
        failed = report.failed,
        "batch finished"
    );
    report
}
