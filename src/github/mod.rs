//! New-package discovery from the manifest repository's commit history.
//!
//! - **client**: paginated `GET /repos/{repo}/commits` with a local request budget
//! - **miner**: turns commits into [`CommitCandidate`](crate::model::types::CommitCandidate)s
//! - **token**: the optional personal access token

pub mod client;
pub mod miner;
pub mod token;

pub use client::{CommitHistory, CommitQuery, CommitRecord, GithubClient, GithubError};
pub use miner::mine_new_packages;
pub use token::{TokenSource, TokenStore, mask_token};

/// Repository whose history is mined by default.
pub const DEFAULT_REPO: &str = "microsoft/winget-pkgs";
