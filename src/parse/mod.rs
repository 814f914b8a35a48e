//! Parsers for package-manager output.
//!
//! - **table**: column-aligned listings (`search`, `list`, `upgrade`)
//! - **details**: `label: value` dumps printed by `show`
//! - **commit**: manifest-repository commit messages

pub mod commit;
pub mod details;
pub mod table;

pub use commit::{classify_commit, CommitMatch};
pub use details::{parse_detail_lines, parse_details};
pub use table::{filter_records, parse_table};
