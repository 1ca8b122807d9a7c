use anyhow::Result;

use crate::bib::config::load_config;
use crate::bib::paths::resolve_paths;
use crate::bib::rename::{self, RenameRule};
use crate::bib::short_code::compress;
use crate::bib::util::file_name_string;
use crate::commands::CommandReport;

#[derive(Debug, Clone)]
pub struct RenameOptions {
    pub rule: RenameRule,
    pub category: Option<String>,
    pub dry_run: bool,
}

pub fn run(opts: &RenameOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let command = match opts.rule {
        RenameRule::Theme { .. } => "rename-theme",
        RenameRule::Code { .. } => "rename-code",
    };
    let mut report = CommandReport::new(command);

    let plan = rename::plan(&paths, &cfg, &opts.rule, opts.category.as_deref())?;
    let verb = if opts.dry_run { "would rename" } else { "renamed" };
    for change in &plan.key_changes {
        report.detail(format!(
            "{verb} key {}::{} -> {}",
            change.category, change.from, change.to
        ));
    }
    for change in &plan.file_changes {
        report.detail(format!(
            "{verb} file {} -> {}",
            compress(&file_name_string(&change.from)),
            compress(&file_name_string(&change.to))
        ));
    }
    if plan.key_changes.is_empty() && plan.file_changes.is_empty() {
        report.issue("nothing matched");
        return Ok(report);
    }
    if !opts.dry_run {
        rename::apply(&paths, &plan)?;
    }
    report.detail(format!(
        "keys={} files={}",
        plan.key_changes.len(),
        plan.file_changes.len()
    ));
    Ok(report)
}
