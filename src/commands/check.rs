use anyhow::{Context, Result};
use std::fs;

use crate::bib::audit;
use crate::bib::config::load_config;
use crate::bib::paths::resolve_paths;
use crate::bib::reconcile::{CheckRow, run_check};
use crate::bib::report::{REPORT_ALL, REPORT_NON_BOOKS, render_report};
use crate::commands::{CommandReport, note_malformed_asset};

#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub no_format: bool,
    pub show_incomplete: bool,
    pub check_books: bool,
}

fn row_counts(row: &CheckRow) -> String {
    format!(
        "{}::{} type={} B={} D={} P={}",
        row.category,
        row.code,
        if row.entry_type.is_empty() { "-" } else { row.entry_type.as_str() },
        row.bib_count,
        row.pdf_count,
        row.image_count
    )
}

fn describe(row: &CheckRow) -> String {
    format!("incomplete {}", row_counts(row))
}

pub fn run(opts: &CheckOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut report = CommandReport::new("check");

    let format = cfg.check.format_bibtex && !opts.no_format;
    let show_incomplete = opts.show_incomplete || cfg.check.show_incomplete;
    let check_books = opts.check_books || cfg.check.check_books;

    let outcome = run_check(&paths, &cfg, format)?;
    report.detail(format!("categories={}", outcome.categories.join(",")));
    for file in &outcome.formatted_files {
        report.detail(format!("formatted {}", file.display()));
    }
    for category in &outcome.missing_bib_files {
        report.detail(format!("no bib file for category {category}"));
    }
    for malformed in &outcome.malformed_assets {
        note_malformed_asset(&mut report, "check", &malformed.category, &malformed.file_name);
    }
    for code in &outcome.unparsed_codes {
        report.issue(format!("code is not AUTHOR-YEAR-THEME[-SUFFIX]: {code}"));
    }

    if !outcome.collisions.is_empty() {
        for collision in &outcome.collisions {
            report.issue(format!(
                "short code collision: {} in {}",
                collision.code,
                collision.categories.join(",")
            ));
            for row in &collision.rows {
                report.issue(format!("  colliding {} title={}", row_counts(row), row.title));
            }
        }
        audit::append_event(
            &paths,
            "check",
            "failed",
            &format!("collisions={}", outcome.collisions.len()),
        )?;
        return Ok(report);
    }

    let title_max = cfg.check.title_max_chars;
    fs::create_dir_all(&paths.io_dir)
        .with_context(|| format!("failed to create {}", paths.io_dir.display()))?;
    let all_path = paths.io_dir.join(REPORT_ALL);
    fs::write(
        &all_path,
        render_report("Bibliography check: all entries", &outcome.rows, title_max),
    )
    .with_context(|| format!("failed to write {}", all_path.display()))?;
    let non_books_path = paths.io_dir.join(REPORT_NON_BOOKS);
    fs::write(
        &non_books_path,
        render_report(
            "Bibliography check: non-books",
            outcome.rows.iter().filter(|r| !r.is_book()),
            title_max,
        ),
    )
    .with_context(|| format!("failed to write {}", non_books_path.display()))?;
    report.detail(format!("report_all={}", all_path.display()));
    report.detail(format!("report_non_books={}", non_books_path.display()));

    let incomplete_non_books = outcome.incomplete_non_books();
    let incomplete_books = outcome.incomplete_books();
    report.detail(format!("entries={}", outcome.rows.len()));
    report.detail(format!("complete={}", outcome.complete_count()));
    report.detail(format!("incomplete_non_books={}", incomplete_non_books.len()));
    report.detail(format!("incomplete_books={}", incomplete_books.len()));
    if show_incomplete {
        for row in &incomplete_non_books {
            report.detail(describe(row));
        }
        if check_books {
            for row in &incomplete_books {
                report.detail(describe(row));
            }
        }
    }

    audit::append_event(
        &paths,
        "check",
        if report.ok { "ok" } else { "degraded" },
        &format!(
            "entries={} incomplete_non_books={} incomplete_books={}",
            outcome.rows.len(),
            incomplete_non_books.len(),
            incomplete_books.len()
        ),
    )?;
    Ok(report)
}
