use anyhow::Result;

use crate::bib::collect::run_collect;
use crate::bib::config::load_config;
use crate::bib::paths::resolve_paths;
use crate::bib::short_code::compress;
use crate::bib::util::file_name_string;
use crate::bib::warn::{self, WarnEvent};
use crate::commands::CommandReport;
use crate::crossref::client::CrossrefClient;

#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    pub dry_run: bool,
}

pub fn run(opts: &CollectOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let client = CrossrefClient::new(&cfg.crossref)?;
    let mut report = CommandReport::new("collect");

    let outcome = run_collect(&paths, &cfg, &client, opts.dry_run)?;
    if outcome.dry_run {
        report.detail("dry run: no files moved, no lookups made");
    }
    for item in &outcome.collected {
        report.detail(format!(
            "{} {}::{} from {} -> {} doi={}",
            if outcome.dry_run { "would collect" } else { "collected" },
            item.category,
            item.short_code,
            compress(&file_name_string(&item.source)),
            compress(&file_name_string(&item.target)),
            item.doi
        ));
    }
    for (inbox, archived) in &outcome.duplicates {
        report.detail(format!(
            "skipped duplicate {} (same content as {})",
            compress(&file_name_string(inbox)),
            compress(&file_name_string(archived))
        ));
    }
    for failure in &outcome.failures {
        let name = file_name_string(&failure.source);
        warn::emit(WarnEvent {
            code: "COLLECT_FAILED",
            stage: "collect",
            category: &failure.category,
            target: &name,
            reason: "file left in place",
            err: &failure.error,
        });
        report.issue(format!(
            "could not collect {} in {}: {}",
            compress(&name),
            failure.category,
            failure.error
        ));
    }
    report.detail(format!(
        "collected={} duplicates={} failed={}",
        outcome.collected.len(),
        outcome.duplicates.len(),
        outcome.failures.len()
    ));
    Ok(report)
}
