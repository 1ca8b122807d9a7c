use anyhow::Result;

use crate::bib::audit;
use crate::bib::config::load_config;
use crate::bib::paths::resolve_paths;
use crate::bib::select::run_select;
use crate::commands::CommandReport;

#[derive(Debug, Clone)]
pub struct SelectOptions {
    pub input: String,
    pub output: String,
}

pub fn run(opts: &SelectOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut report = CommandReport::new("select");

    let out = run_select(&paths, &cfg, &opts.input, &opts.output)?;
    report.detail(format!("references in input={}", out.cited));
    for (category, count) in &out.per_category {
        report.detail(format!("collected {count} entries from category {category}"));
    }
    report.detail(format!("collected={}", out.collected()));
    report.detail(format!("output={}", out.output_path.display()));
    report.detail(format!("output_latex={}", out.latex_path.display()));
    if !out.remaining.is_empty() {
        report.issue(format!("unresolved references: {}", out.remaining.join(", ")));
    }

    audit::append_event(
        &paths,
        "select",
        if report.ok { "ok" } else { "degraded" },
        &format!("cited={} collected={}", out.cited, out.collected()),
    )?;
    Ok(report)
}
