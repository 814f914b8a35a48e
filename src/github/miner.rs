//! Turning raw commits into new-package candidates.

use std::collections::HashSet;

use crate::model::types::CommitCandidate;
use crate::parse::{classify_commit, commit::headline};

use super::client::CommitRecord;

const SHORT_HASH_LEN: usize = 7;

/// Classify `commits` and keep the newest commit per package name.
///
/// `filter`, when given, keeps only names containing it (case-insensitive).
/// The result is ordered newest first.
pub fn mine_new_packages(commits: &[CommitRecord], filter: Option<&str>) -> Vec<CommitCandidate> {
    let needle = filter
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty());

    let mut ordered: Vec<&CommitRecord> = commits.iter().collect();
    ordered.sort_by(|a, b| b.date.cmp(&a.date));

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for commit in ordered {
        let Some(found) = classify_commit(&commit.message) else {
            continue;
        };
        if let Some(needle) = &needle
            && !found.name.to_lowercase().contains(needle.as_str())
        {
            continue;
        }
        if !seen.insert(found.name.to_lowercase()) {
            continue;
        }
        candidates.push(CommitCandidate {
            name: found.name,
            version: found.version,
            commit_date: commit.date,
            author_name: commit.author_name.clone(),
            short_hash: commit.sha.chars().take(SHORT_HASH_LEN).collect(),
            headline: headline(&commit.message).to_string(),
        });
    }
    candidates
}
