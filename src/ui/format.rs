//! Rendering of listings, detail cards and batch summaries.

use std::fmt::Write as _;

use colored::Colorize;
use itertools::Itertools;

use crate::batch::{BatchReport, ItemStatus};
use crate::model::types::{CommitCandidate, PackageDetail, PackageRecord};

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{text}{}", " ".repeat(width.saturating_sub(len)))
}

/// Render rows as left-aligned columns. The first row is the header.
fn columns(rows: &[Vec<String>]) -> String {
    let Some(header) = rows.first() else {
        return String::new();
    };
    let mut widths = vec![0usize; header.len()];
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad(cell, *w))
            .join("  ");
        let line = line.trim_end();
        if i == 0 {
            let _ = writeln!(out, "{}", line.bold());
            let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
            let _ = writeln!(out, "{}", "-".repeat(total).dimmed());
        } else {
            let _ = writeln!(out, "{line}");
        }
    }
    out
}

/// Package listing with an `Available` column when any row has one.
pub fn records_table(records: &[PackageRecord]) -> String {
    let with_available = records.iter().any(|r| r.available.is_some());
    let mut rows = Vec::with_capacity(records.len() + 1);
    let mut header = vec!["Name".to_string(), "Id".into(), "Version".into()];
    if with_available {
        header.push("Available".into());
    }
    header.push("Source".into());
    rows.push(header);

    for r in records {
        let mut row = vec![r.name.clone(), r.id.clone(), r.version.clone()];
        if with_available {
            row.push(r.available.clone().unwrap_or_default());
        }
        row.push(r.source.clone());
        rows.push(row);
    }
    columns(&rows)
}

/// Newly published packages, newest first.
pub fn candidates_table(candidates: &[CommitCandidate]) -> String {
    let mut rows = vec![vec![
        "Name".to_string(),
        "Version".into(),
        "Date".into(),
        "Author".into(),
        "Commit".into(),
    ]];
    for c in candidates {
        rows.push(vec![
            c.name.clone(),
            c.version.clone(),
            c.commit_date.format("%Y-%m-%d %H:%M").to_string(),
            c.author_name.clone(),
            c.short_hash.clone(),
        ]);
    }
    columns(&rows)
}

fn field(out: &mut String, label: &str, value: Option<&String>) {
    if let Some(value) = value {
        let mut lines = value.lines();
        let first = lines.next().unwrap_or_default();
        let _ = writeln!(out, "  {} {first}", format!("{label}:").cyan());
        for more in lines {
            let _ = writeln!(out, "    {more}");
        }
    }
}

/// Multi-line card describing one package.
pub fn detail_card(detail: &PackageDetail) -> String {
    let mut out = String::new();
    let title = match &detail.name {
        Some(name) => format!("{name} [{}]", detail.id),
        None => detail.id.clone(),
    };
    let _ = writeln!(out, "{}", title.bold());
    if detail.is_placeholder() {
        let _ = writeln!(out, "  {}", "(details unavailable)".dimmed());
        return out;
    }
    field(&mut out, "Version", detail.version.as_ref());
    field(&mut out, "Publisher", detail.publisher.as_ref());
    field(&mut out, "Source", detail.publisher_source_host_link.as_ref());
    field(&mut out, "Author", detail.author.as_ref());
    field(&mut out, "Homepage", detail.homepage.as_ref());
    field(&mut out, "License", detail.license.as_ref());
    field(&mut out, "Category", detail.category.as_ref());
    field(&mut out, "Pricing", detail.pricing.as_ref());
    field(&mut out, "Installer", detail.installer_type.as_ref());
    field(&mut out, "Description", detail.description.as_ref());
    if !detail.tags.is_empty() {
        let tags = detail.tags.join(", ");
        field(&mut out, "Tags", Some(&tags));
    }
    out
}

/// Closing summary of a batch.
pub fn batch_summary(report: &BatchReport) -> String {
    let mut out = String::new();
    let headline = format!(
        "{}: {} succeeded, {} failed",
        report.action, report.succeeded, report.failed
    );
    if report.all_succeeded() {
        let _ = writeln!(out, "{}", headline.green().bold());
    } else {
        let _ = writeln!(out, "{}", headline.yellow().bold());
    }
    for outcome in report.outcomes.iter().filter(|o| !o.status.is_success()) {
        let reason = match &outcome.status {
            ItemStatus::Failed { exit_code } => format!("exit code {exit_code}"),
            ItemStatus::Error { message } => message.clone(),
            ItemStatus::Succeeded => continue,
        };
        let _ = writeln!(out, "  {} {} ({reason})", "✗".red(), outcome.id);
    }
    out
}
