//! Commit-message classification for the manifest repository.
//!
//! Only commits that introduce a package are interesting. Maintenance commits
//! (removals, deprecations, version bumps, automated moves) are rejected before
//! any shape is tried, even when they mention `NAME version VERSION`.

use once_cell::sync::Lazy;
use regex::Regex;

static MAINTENANCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:Remove|Delete|Deprecat(?:e|ion)|Update:|New version:|Automatic|Move)")
        .expect("maintenance prefix regex")
});

/// Recognized shapes, narrowest first. Later shapes are looser versions of
/// earlier ones, so order matters.
static SHAPES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^New package:\s*(?P<name>.+?)\s+version\s+(?P<version>.+?)(?:\s*\(#\d+\).*)?$",
        r"^Add:\s*(?P<name>.+?)\s+version\s+(?P<version>.+?)(?:\s*\(#\d+\).*)?$",
        r"^(?P<name>\S+)\s+version\s+(?P<version>.+?)\s*\(#\d+\)",
        r"^(?P<name>\S+)\s+version\s+(?P<version>\S+)\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("commit shape regex"))
    .collect()
});

/// Package name and version pulled from a commit headline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMatch {
    pub name: String,
    pub version: String,
}

/// First line of a commit message, trimmed.
pub fn headline(message: &str) -> &str {
    message.lines().next().unwrap_or("").trim()
}

/// Whether the message is a maintenance-only commit.
pub fn is_maintenance(message: &str) -> bool {
    MAINTENANCE_RE.is_match(message)
}

/// Classify a commit message. Only the headline is examined.
pub fn classify_commit(message: &str) -> Option<CommitMatch> {
    if is_maintenance(message) {
        return None;
    }
    let line = headline(message);
    SHAPES.iter().find_map(|shape| {
        let caps = shape.captures(line)?;
        let name = caps.name("name")?.as_str().trim();
        let version = caps.name("version")?.as_str().trim();
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(CommitMatch {
            name: name.to_string(),
            version: version.to_string(),
        })
    })
}
