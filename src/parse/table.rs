//! Column-aligned table parsing.
//!
//! winget prints listings as a header line, a dashed separator and rows padded
//! to the header's column offsets:
//!
//! ```text
//! Name               Id                      Version  Match        Source
//! -----------------------------------------------------------------------
//! Visual Studio Code Microsoft.VisualStudioCode 1.85.0 Moniker: code winget
//! ```
//!
//! Offsets are captured from the header in terminal cells, since winget pads
//! by display width: a CJK character takes two cells. Each row is sliced at
//! those offsets. Rows whose text straddles a column boundary are re-split on
//! runs of two or more spaces instead.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::model::types::{PackageRecord, UNKNOWN};

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Name\s+Id(\s|$)").expect("table header regex"));

static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9.\-_+]+$").expect("id regex"));

static VERSION_LIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+").expect("version-like regex"));

static WIDE_GAP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("gap regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Name,
    Id,
    Version,
    Available,
    Match,
    Source,
}

/// Cell offsets of the recognized columns of one header line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnLayout {
    id: usize,
    version: Option<usize>,
    available: Option<usize>,
    matched: Option<usize>,
    source: Option<usize>,
}

impl ColumnLayout {
    fn from_header(line: &str) -> Option<Self> {
        if !HEADER_RE.is_match(line) {
            return None;
        }
        Some(Self {
            id: label_offset(line, "Id")?,
            version: label_offset(line, "Version"),
            available: label_offset(line, "Available"),
            matched: label_offset(line, "Match"),
            source: label_offset(line, "Source"),
        })
    }

    /// Columns in left-to-right order with their start offsets.
    fn columns(&self) -> Vec<(Column, usize)> {
        let mut cols = vec![(Column::Name, 0), (Column::Id, self.id)];
        for (col, off) in [
            (Column::Version, self.version),
            (Column::Available, self.available),
            (Column::Match, self.matched),
            (Column::Source, self.source),
        ] {
            if let Some(off) = off {
                cols.push((col, off));
            }
        }
        cols.sort_by_key(|(_, off)| *off);
        cols
    }

    /// Leftmost known column start strictly greater than `start`.
    fn next_boundary(&self, start: usize) -> Option<usize> {
        [self.version, self.available, self.matched, self.source]
            .into_iter()
            .flatten()
            .filter(|&off| off > start)
            .min()
    }

    fn slice_aligned(&self, cells: &[String]) -> RawRow {
        let len = cells.len();
        let end_of = |start: usize| self.next_boundary(start).unwrap_or(len);
        let mut row = RawRow {
            name: slice(cells, 0, self.id),
            id: slice(cells, self.id, end_of(self.id)),
            ..RawRow::default()
        };
        if let Some(v) = self.version {
            row.version = Some(slice(cells, v, end_of(v)));
        }
        if let Some(a) = self.available {
            row.available = Some(slice(cells, a, end_of(a)));
        }
        if let Some(s) = self.source {
            row.source = Some(slice(cells, s, len));
        }
        row
    }

    /// Split on runs of spaces. A blank Match or Available cell leaves one
    /// token fewer than there are columns; that column is then taken as empty.
    fn split_on_gaps(&self, line: &str) -> Option<RawRow> {
        let tokens: Vec<&str> = WIDE_GAP_RE.split(line.trim()).collect();
        let mut columns: Vec<Column> = self.columns().into_iter().map(|(col, _)| col).collect();
        if tokens.len() + 1 == columns.len() {
            let blank = columns
                .iter()
                .position(|c| *c == Column::Match)
                .or_else(|| columns.iter().position(|c| *c == Column::Available))?;
            columns.remove(blank);
        }
        if tokens.len() != columns.len() {
            return None;
        }
        let mut row = RawRow::default();
        for (col, token) in columns.into_iter().zip(tokens) {
            let token = token.trim().to_string();
            match col {
                Column::Name => row.name = token,
                Column::Id => row.id = token,
                Column::Version => row.version = Some(token),
                Column::Available => row.available = Some(token),
                Column::Match => {}
                Column::Source => row.source = Some(token),
            }
        }
        Some(row)
    }

    /// A boundary is straddled when the cells on both sides of it are
    /// non-blank, meaning the row was not padded to the header.
    fn is_misaligned(&self, cells: &[String]) -> bool {
        self.columns().iter().skip(1).any(|(_, off)| {
            *off > 0 && *off < cells.len() && !is_blank(&cells[*off - 1]) && !is_blank(&cells[*off])
        })
    }

    fn extract(&self, line: &str) -> Option<RawRow> {
        let cells = cells(line);
        if cells.len() <= self.id {
            return None;
        }
        if self.is_misaligned(&cells) {
            self.split_on_gaps(line)
        } else {
            Some(self.slice_aligned(&cells))
        }
    }
}

#[derive(Debug, Default)]
struct RawRow {
    name: String,
    id: String,
    version: Option<String>,
    available: Option<String>,
    source: Option<String>,
}

fn label_offset(line: &str, label: &str) -> Option<usize> {
    let re = Regex::new(&format!(r"\b{label}\b")).ok()?;
    let m = re.find(line)?;
    Some(line[..m.start()].width())
}

/// Split a row into terminal cells. A wide character fills its cell and
/// leaves an empty continuation cell after it; zero-width marks join the
/// cell before them.
fn cells(line: &str) -> Vec<String> {
    let mut cells: Vec<String> = Vec::with_capacity(line.len());
    for c in line.chars() {
        match c.width().unwrap_or(1) {
            0 => match cells.last_mut() {
                Some(last) => last.push(c),
                None => cells.push(c.to_string()),
            },
            w => {
                cells.push(c.to_string());
                cells.extend(std::iter::repeat_n(String::new(), w - 1));
            }
        }
    }
    cells
}

fn is_blank(cell: &str) -> bool {
    !cell.is_empty() && cell.chars().all(char::is_whitespace)
}

fn slice(cells: &[String], start: usize, end: usize) -> String {
    let end = end.min(cells.len());
    if start >= end {
        return String::new();
    }
    cells[start..end].concat().trim().to_string()
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '-')
}

/// Whether `id` looks like a package identifier rather than a stray token.
pub fn is_valid_id(id: &str) -> bool {
    ID_RE.is_match(id) && !VERSION_LIKE_RE.is_match(id)
}

fn non_empty_or_unknown(value: Option<String>) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => UNKNOWN.to_string(),
    }
}

/// Lowercased words of a multi-word query; empty for single-word queries,
/// which the package manager already matched on its own.
fn filter_words(query: &str) -> Vec<String> {
    let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if words.len() > 1 { words } else { Vec::new() }
}

/// Parse a listing into records tagged with `query`.
///
/// Lines before the first header + separator pair are ignored. Rows that are
/// too short, carry an invalid id, or fail the multi-word filter are skipped.
/// The first occurrence of each id wins.
pub fn parse_table<I, S>(lines: I, query: &str) -> Vec<PackageRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let words = filter_words(query);
    let mut layout: Option<ColumnLayout> = None;
    let mut in_data = false;
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for line in lines {
        let line = line.as_ref().trim_end();

        if let Some(header) = ColumnLayout::from_header(line) {
            layout = Some(header);
            in_data = false;
            continue;
        }
        let Some(current) = layout.as_ref() else {
            continue;
        };
        if is_separator(line) {
            in_data = true;
            continue;
        }
        if !in_data || line.trim().is_empty() {
            continue;
        }

        let Some(row) = current.extract(line) else {
            continue;
        };
        if !is_valid_id(&row.id) {
            continue;
        }
        if !words.is_empty() {
            let haystack = line.to_lowercase();
            if !words.iter().all(|w| haystack.contains(w.as_str())) {
                continue;
            }
        }
        if !seen.insert(row.id.clone()) {
            continue;
        }

        records.push(PackageRecord {
            id: row.id,
            name: row.name,
            version: non_empty_or_unknown(row.version),
            available: row.available.filter(|a| !a.is_empty()),
            source: non_empty_or_unknown(row.source),
            search_term: query.to_string(),
        });
    }

    records
}

/// Keep records whose name or id contains every word of `query`
/// (case-insensitive). An empty query keeps everything.
pub fn filter_records(records: Vec<PackageRecord>, query: &str) -> Vec<PackageRecord> {
    let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if words.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| {
            let haystack = format!("{} {}", r.name, r.id).to_lowercase();
            words.iter().all(|w| haystack.contains(w.as_str()))
        })
        .collect()
}
