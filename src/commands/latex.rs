use anyhow::Result;

use crate::bib::audit;
use crate::bib::config::load_config;
use crate::bib::export::export_latex;
use crate::bib::paths::resolve_paths;
use crate::commands::CommandReport;

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut report = CommandReport::new("latex");

    let exported = export_latex(&paths, &cfg)?;
    for file in &exported {
        report.detail(format!(
            "{} entries={} path={}",
            file.category,
            file.entries,
            file.path.display()
        ));
    }
    report.detail(format!(
        "bibtex (latex) files updated in {}",
        paths.bibtex_latex_dir.display()
    ));
    audit::append_event(&paths, "latex", "ok", &format!("files={}", exported.len()))?;
    Ok(report)
}
