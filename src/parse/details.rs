//! `label: value` dumps printed by `winget show`.
//!
//! Labels are matched exactly (case-sensitive) against [`LABELS`]; anything
//! else is ignored. A recognized label with an empty inline value may be
//! followed by indented lines that carry the value instead, which is how
//! winget prints tag lists and multi-line descriptions:
//!
//! ```text
//! Found Widget [Acme.Widget]
//! Version: 3.0.1
//! Publisher Url: https://github.com/acme/widget
//! Tags:
//!   editor
//!   developer-tools
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::types::PackageDetail;

static FOUND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Found\s+(.+?)\s+\[([^\]]+)\]\s*$").expect("found banner regex"));

static TAG_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*").expect("tag split regex"));

/// Publisher URLs on these hosts also populate the source-host link.
pub const SOURCE_HOSTS: &[&str] = &["github.com/", "gitlab.com/", "codeberg.org/", "bitbucket.org/"];

/// Detail fields addressable by a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailField {
    Version,
    Publisher,
    PublisherUrl,
    Author,
    Homepage,
    Description,
    Category,
    Tags,
    License,
    LicenseUrl,
    Copyright,
    CopyrightUrl,
    PrivacyUrl,
    PackageUrl,
    ReleaseNotes,
    ReleaseNotesUrl,
    InstallerType,
    Pricing,
    StoreLicense,
    FreeTrial,
    AgeRating,
    Moniker,
}

/// Label dispatch table.
pub const LABELS: &[(&str, DetailField)] = &[
    ("Version", DetailField::Version),
    ("Publisher", DetailField::Publisher),
    ("Publisher Url", DetailField::PublisherUrl),
    ("Author", DetailField::Author),
    ("Homepage", DetailField::Homepage),
    ("Description", DetailField::Description),
    ("Category", DetailField::Category),
    ("Tags", DetailField::Tags),
    ("License", DetailField::License),
    ("License Url", DetailField::LicenseUrl),
    ("Copyright", DetailField::Copyright),
    ("Copyright Url", DetailField::CopyrightUrl),
    ("Privacy Url", DetailField::PrivacyUrl),
    ("Package Url", DetailField::PackageUrl),
    ("Release Notes", DetailField::ReleaseNotes),
    ("Release Notes Url", DetailField::ReleaseNotesUrl),
    ("Installer Type", DetailField::InstallerType),
    ("Pricing", DetailField::Pricing),
    ("Store License", DetailField::StoreLicense),
    ("Free Trial", DetailField::FreeTrial),
    ("Age Rating", DetailField::AgeRating),
    ("Moniker", DetailField::Moniker),
];

impl DetailField {
    pub fn from_label(label: &str) -> Option<Self> {
        LABELS
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, field)| *field)
    }

    fn slot<'a>(&self, detail: &'a mut PackageDetail) -> Option<&'a mut Option<String>> {
        let slot = match self {
            DetailField::Version => &mut detail.version,
            DetailField::Publisher => &mut detail.publisher,
            DetailField::PublisherUrl => &mut detail.publisher_url,
            DetailField::Author => &mut detail.author,
            DetailField::Homepage => &mut detail.homepage,
            DetailField::Description => &mut detail.description,
            DetailField::Category => &mut detail.category,
            DetailField::Tags => return None,
            DetailField::License => &mut detail.license,
            DetailField::LicenseUrl => &mut detail.license_url,
            DetailField::Copyright => &mut detail.copyright,
            DetailField::CopyrightUrl => &mut detail.copyright_url,
            DetailField::PrivacyUrl => &mut detail.privacy_url,
            DetailField::PackageUrl => &mut detail.package_url,
            DetailField::ReleaseNotes => &mut detail.release_notes,
            DetailField::ReleaseNotesUrl => &mut detail.release_notes_url,
            DetailField::InstallerType => &mut detail.installer_type,
            DetailField::Pricing => &mut detail.pricing,
            DetailField::StoreLicense => &mut detail.store_license,
            DetailField::FreeTrial => &mut detail.free_trial,
            DetailField::AgeRating => &mut detail.age_rating,
            DetailField::Moniker => &mut detail.moniker,
        };
        Some(slot)
    }

    /// Store `value` unless it is blank or the field is already set.
    fn assign(&self, detail: &mut PackageDetail, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        match self.slot(detail) {
            Some(slot) => {
                if slot.is_none() {
                    *slot = Some(value.to_string());
                }
            }
            None => {
                if detail.tags.is_empty() {
                    detail.tags = split_tags(value);
                }
            }
        }
    }

    fn assign_block(&self, detail: &mut PackageDetail, lines: &[String]) {
        if lines.is_empty() {
            return;
        }
        match self {
            DetailField::Tags => {
                if detail.tags.is_empty() {
                    detail.tags = lines
                        .iter()
                        .flat_map(|l| split_tags(l))
                        .collect();
                }
            }
            _ => self.assign(detail, &lines.join("\n")),
        }
    }
}

fn split_tags(value: &str) -> Vec<String> {
    TAG_SPLIT_RE
        .split(value)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// The URL itself when it points at a known source-hosting site.
pub fn source_host_link(url: &str) -> Option<String> {
    let lower = url.to_ascii_lowercase();
    SOURCE_HOSTS
        .iter()
        .any(|host| lower.contains(host))
        .then(|| url.to_string())
}

/// Parse a whole dump held in one string.
pub fn parse_details(text: &str, id: &str) -> PackageDetail {
    parse_detail_lines(text.lines(), id)
}

/// Parse a dump given line by line. `id` always comes from the caller, never
/// from the dump. Never fails: unrecognized input yields a detail carrying
/// only the id.
pub fn parse_detail_lines<I, S>(lines: I, id: &str) -> PackageDetail
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut detail = PackageDetail::placeholder(id);
    let mut pending: Option<(DetailField, Vec<String>)> = None;
    // Blank lines seen inside a block; kept only if the block goes on.
    let mut blank_run = 0;

    for raw in lines {
        let raw = raw.as_ref();
        let line = raw.trim();

        if let Some((field, block)) = pending.as_mut() {
            if line.is_empty() {
                if !block.is_empty() {
                    blank_run += 1;
                }
                continue;
            }
            let indented = raw.starts_with(char::is_whitespace);
            let is_label_line = line
                .split_once(':')
                .is_some_and(|(label, _)| DetailField::from_label(label.trim()).is_some());
            if indented && !is_label_line {
                block.extend(std::iter::repeat_n(String::new(), blank_run));
                blank_run = 0;
                block.push(line.to_string());
                continue;
            }
            blank_run = 0;
            field.assign_block(&mut detail, block);
            pending = None;
        }

        if detail.name.is_none()
            && let Some(caps) = FOUND_RE.captures(line)
        {
            detail.name = Some(caps[1].trim().to_string());
            continue;
        }

        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let Some(field) = DetailField::from_label(label.trim()) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            pending = Some((field, Vec::new()));
        } else {
            field.assign(&mut detail, value);
        }
    }

    if let Some((field, block)) = pending {
        field.assign_block(&mut detail, &block);
    }

    detail.publisher_source_host_link = detail
        .publisher_url
        .as_deref()
        .and_then(source_host_link);
    detail
}
