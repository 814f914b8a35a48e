//! Normalized entity structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel used when a listing has no value for a column.
pub const UNKNOWN: &str = "Unknown";

/// One row of a search, list or upgrade table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    /// Version offered by `upgrade` listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<String>,
    pub source: String,
    /// Query that produced this row.
    pub search_term: String,
}

impl PackageRecord {
    /// Single-line label used in selection prompts.
    pub fn label(&self) -> String {
        match &self.available {
            Some(available) => format!(
                "{} ({}) {} -> {}",
                self.name, self.id, self.version, available
            ),
            None => format!("{} ({}) {}", self.name, self.id, self.version),
        }
    }
}

/// Everything `winget show` tells us about one package.
///
/// Every field except `id` is optional; an empty value in the dump leaves the
/// field unset rather than holding an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PackageDetail {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_url: Option<String>,
    /// Set only when `publisher_url` points at a source-hosting site.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_source_host_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_notes_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_trial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moniker: Option<String>,
}

impl PackageDetail {
    /// Placeholder used when a detail could not be fetched in time.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// True when nothing beyond the id is known.
    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder(self.id.clone())
    }
}

/// A newly published package found in the manifest repository history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommitCandidate {
    pub name: String,
    pub version: String,
    pub commit_date: DateTime<Utc>,
    pub author_name: String,
    /// First seven characters of the commit sha.
    pub short_hash: String,
    /// First line of the commit message.
    pub headline: String,
}

/// Which package-manager action a batch performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum BatchAction {
    Install,
    Upgrade,
    Uninstall,
}

impl BatchAction {
    pub fn verb(&self) -> &'static str {
        match self {
            BatchAction::Install => "install",
            BatchAction::Upgrade => "upgrade",
            BatchAction::Uninstall => "uninstall",
        }
    }

    pub fn progressive(&self) -> &'static str {
        match self {
            BatchAction::Install => "Installing",
            BatchAction::Upgrade => "Upgrading",
            BatchAction::Uninstall => "Uninstalling",
        }
    }
}

impl std::fmt::Display for BatchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.verb())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_only_carries_id() {
        let detail = PackageDetail::placeholder("Acme.Widget");
        assert_eq!(detail.id, "Acme.Widget");
        assert!(detail.tags.is_empty());
        assert!(detail.version.is_none());
        assert!(detail.is_placeholder());

        let filled = PackageDetail {
            version: Some("1.0".into()),
            ..detail
        };
        assert!(!filled.is_placeholder());
    }

    #[test]
    fn detail_serializes_pascal_case_and_skips_absent_fields() {
        let detail = PackageDetail {
            id: "Acme.Widget".into(),
            publisher_url: Some("https://github.com/acme".into()),
            ..PackageDetail::default()
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["Id"], "Acme.Widget");
        assert_eq!(json["PublisherUrl"], "https://github.com/acme");
        assert!(json.get("Version").is_none());
        assert_eq!(json["Tags"], serde_json::json!([]));
    }

    #[test]
    fn detail_deserializes_with_missing_fields() {
        let detail: PackageDetail = serde_json::from_str(r#"{"Id":"X.Y"}"#).unwrap();
        assert_eq!(detail, PackageDetail::placeholder("X.Y"));
    }

    #[test]
    fn record_label_includes_available_version() {
        let record = PackageRecord {
            id: "Git.Git".into(),
            name: "Git".into(),
            version: "2.40.0".into(),
            available: Some("2.41.0".into()),
            source: "winget".into(),
            search_term: String::new(),
        };
        assert_eq!(record.label(), "Git (Git.Git) 2.40.0 -> 2.41.0");
    }
}
