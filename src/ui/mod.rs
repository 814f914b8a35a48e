//! Terminal presentation.
//!
//! - **prompt**: dialoguer-backed [`Prompter`](crate::workflow::Prompter)
//! - **format**: colored tables, detail cards and summaries
//! - **progress**: spinners for slow listings and GitHub paging

pub mod format;
pub mod progress;
pub mod prompt;

pub use progress::spinner;
pub use prompt::{ConsoleObserver, DialoguerPrompter, read_secret};
