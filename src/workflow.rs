//! Search, select, review, then run a batch.
//!
//! [`BatchFlow`] is a small state machine:
//!
//! ```text
//! Searching -> Selecting -> Confirming -> Installing -> Done
//!                  ^             |
//!                  +---- Back ---+      (any prompt failure -> Cancelled)
//! ```
//!
//! Detail fetching starts when Selecting is entered, so by the time the user
//! has picked packages most of the `show` calls have already run.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::batch::{BatchEvent, BatchReport, dedup_ids, execute_batch};
use crate::fetch::{DEFAULT_SELECTION_TIMEOUT, FetchJob, FetchScheduler, reconcile};
use crate::model::types::{BatchAction, PackageDetail, PackageRecord};
use crate::parse::{filter_records, parse_table};
use crate::winget::{PackageManager, PackageManagerError};

/// Errors from the interactive layer.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error(
        "Interactive selection requires a terminal.\n\n\
         For non-interactive use pass --yes (install) or --all (upgrade)."
    )]
    Unavailable,

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Prompt failed: {0}")]
    Io(String),
}

/// Answer to the review screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    Proceed,
    Back,
    Cancel,
}

/// The human side of the flow.
pub trait Prompter {
    /// Pick any subset of `choices`; returns indices into `choices`.
    fn select(
        &mut self,
        title: &str,
        choices: &[String],
        defaults: &[bool],
    ) -> Result<Vec<usize>, PromptError>;

    /// Show the fetched details of the selection and ask how to go on.
    fn review(&mut self, details: &[&PackageDetail]) -> Result<Review, PromptError>;
}

/// Side effects the flow reports as it runs. Everything defaults to a no-op.
pub trait FlowObserver {
    fn on_state(&mut self, _state: FlowState) {}

    /// No interactive UI: show what would have been offered.
    fn on_listing(&mut self, _records: &[PackageRecord]) {}

    /// Selected ids whose details did not arrive in time.
    fn on_placeholders(&mut self, _ids: &[String]) {}

    fn on_batch_event(&mut self, _event: BatchEvent<'_>) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct SilentObserver;

impl FlowObserver for SilentObserver {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Searching,
    Selecting,
    Confirming,
    Installing,
    Done,
    Cancelled,
}

impl FlowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowState::Done | FlowState::Cancelled)
    }
}

/// Where candidate packages come from.
#[derive(Debug, Clone)]
pub enum CandidateQuery {
    /// One `search` per term; results are concatenated.
    Search(Vec<String>),
    /// Installed packages with an upgrade available.
    Upgrades,
    /// Installed packages, filtered locally by the terms.
    Installed(Vec<String>),
    /// A list built elsewhere.
    Records(Vec<PackageRecord>),
}

/// Run the listing behind `query` and parse it.
///
/// Rows from different search terms are kept even when their ids repeat;
/// each carries the term that produced it.
pub fn gather_candidates(
    pm: &dyn PackageManager,
    query: &CandidateQuery,
) -> Result<Vec<PackageRecord>, PackageManagerError> {
    let records = match query {
        CandidateQuery::Search(terms) => {
            let mut all = Vec::new();
            for term in terms {
                let output = pm.search(term)?;
                if !output.success() {
                    debug!(term = %term, code = output.exit_code, "search returned non-zero");
                }
                all.extend(parse_table(output.all_lines(), term));
            }
            all
        }
        CandidateQuery::Upgrades => {
            let output = pm.upgrades()?;
            parse_table(output.all_lines(), "")
        }
        CandidateQuery::Installed(terms) => {
            let output = pm.list(None)?;
            let query = terms.join(" ");
            let records = parse_table(output.all_lines(), "");
            filter_records(records, &query)
        }
        CandidateQuery::Records(records) => records.clone(),
    };
    Ok(records)
}

/// How a flow run ended.
#[derive(Debug)]
pub struct FlowOutcome {
    pub state: FlowState,
    /// Every state entered, in order.
    pub visited: Vec<FlowState>,
    pub candidates: Vec<PackageRecord>,
    pub selected: Vec<String>,
    /// Present only when the batch ran.
    pub report: Option<BatchReport>,
}

/// Drives one search-select-review-execute run.
pub struct BatchFlow {
    pm: Arc<dyn PackageManager>,
    scheduler: FetchScheduler,
    action: BatchAction,
    timeout: Duration,
    select_all: bool,
}

impl BatchFlow {
    pub fn new(pm: Arc<dyn PackageManager>, scheduler: FetchScheduler, action: BatchAction) -> Self {
        Self {
            pm,
            scheduler,
            action,
            timeout: DEFAULT_SELECTION_TIMEOUT,
            select_all: false,
        }
    }

    /// Ceiling on waiting for relevant detail fetches after selection.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Act on every candidate without prompting.
    pub fn select_all(mut self, yes: bool) -> Self {
        self.select_all = yes;
        self
    }

    fn title(&self) -> String {
        format!("Select packages to {}", self.action.verb())
    }

    pub fn run<P, O>(
        &self,
        query: &CandidateQuery,
        prompter: &mut P,
        observer: &mut O,
    ) -> Result<FlowOutcome, PackageManagerError>
    where
        P: Prompter + ?Sized,
        O: FlowObserver + ?Sized,
    {
        let mut outcome = FlowOutcome {
            state: FlowState::Searching,
            visited: Vec::new(),
            candidates: Vec::new(),
            selected: Vec::new(),
            report: None,
        };
        let mut jobs: Vec<FetchJob> = Vec::new();
        let mut state = FlowState::Searching;

        loop {
            outcome.visited.push(state);
            observer.on_state(state);
            debug!(?state, action = %self.action, "flow state");

            state = match state {
                FlowState::Searching => {
                    outcome.candidates = gather_candidates(self.pm.as_ref(), query)?;
                    if outcome.candidates.is_empty() {
                        info!(action = %self.action, "no candidate packages");
                        FlowState::Done
                    } else {
                        FlowState::Selecting
                    }
                }
                FlowState::Selecting => {
                    let ids: Vec<&str> =
                        outcome.candidates.iter().map(|r| r.id.as_str()).collect();
                    let unique = dedup_ids(&ids);

                    if self.select_all {
                        outcome.selected = unique;
                        FlowState::Confirming
                    } else {
                        jobs = self.scheduler.launch(&unique);
                        let choices: Vec<String> =
                            outcome.candidates.iter().map(PackageRecord::label).collect();
                        let defaults = vec![false; choices.len()];
                        match prompter.select(&self.title(), &choices, &defaults) {
                            Ok(picked) => {
                                let picked: Vec<&str> = picked
                                    .into_iter()
                                    .filter_map(|i| outcome.candidates.get(i))
                                    .map(|r| r.id.as_str())
                                    .collect();
                                outcome.selected = dedup_ids(&picked);
                                if outcome.selected.is_empty() {
                                    info!("nothing selected");
                                    FlowState::Cancelled
                                } else {
                                    FlowState::Confirming
                                }
                            }
                            Err(PromptError::Unavailable) => {
                                observer.on_listing(&outcome.candidates);
                                FlowState::Cancelled
                            }
                            Err(e) => {
                                debug!("selection ended: {e}");
                                FlowState::Cancelled
                            }
                        }
                    }
                }
                FlowState::Confirming => {
                    if self.select_all {
                        FlowState::Installing
                    } else {
                        let reconciled =
                            reconcile(std::mem::take(&mut jobs), &outcome.selected, self.timeout);
                        if !reconciled.placeholders.is_empty() {
                            observer.on_placeholders(&reconciled.placeholders);
                        }
                        match prompter.review(&reconciled.ordered(&outcome.selected)) {
                            Ok(Review::Proceed) => FlowState::Installing,
                            Ok(Review::Back) => FlowState::Selecting,
                            Ok(Review::Cancel) => FlowState::Cancelled,
                            Err(e) => {
                                warn!("review prompt failed: {e}");
                                FlowState::Cancelled
                            }
                        }
                    }
                }
                FlowState::Installing => {
                    let report = execute_batch(
                        self.pm.as_ref(),
                        self.action,
                        &outcome.selected,
                        |event| observer.on_batch_event(event),
                    );
                    outcome.report = Some(report);
                    FlowState::Done
                }
                FlowState::Done | FlowState::Cancelled => break,
            };
        }

        for job in jobs {
            job.cancel();
            job.dispose();
        }
        outcome.state = *outcome.visited.last().unwrap_or(&FlowState::Cancelled);
        Ok(outcome)
    }
}
