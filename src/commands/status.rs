use anyhow::Result;
use std::env;
use std::path::Path;

use crate::bib::audit::audit_log_path;
use crate::bib::config::{load_config, resolve_config_path};
use crate::bib::paths::resolve_paths;
use crate::bib::state;
use crate::commands::CommandReport;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/bib_env_allowlist.rs"));
}

fn presence(path: &Path) -> &'static str {
    if path.is_dir() {
        "dir"
    } else if path.is_file() {
        "file"
    } else {
        "missing"
    }
}

/// Names of the recognised environment variables that are currently set.
pub fn set_env_keys() -> Vec<&'static str> {
    generated::GENERATED_BIB_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env::var_os(key).is_some())
        .collect()
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("version={}", env!("CARGO_PKG_VERSION")));
    report.detail(format!("build={}", env!("BUILD_UUID")));
    report.detail(format!("root={}", paths.root.display()));
    for (name, dir) in [
        ("bibtex_dir", &paths.bibtex_dir),
        ("bibtex_latex_dir", &paths.bibtex_latex_dir),
        ("pdf_dir", &paths.pdf_dir),
        ("gallery_dir", &paths.gallery_dir),
        ("collect_dir", &paths.collect_dir),
        ("io_dir", &paths.io_dir),
        ("logs_dir", &paths.logs_dir),
    ] {
        report.detail(format!("{name}={} ({})", dir.display(), presence(dir)));
    }

    let config_path = resolve_config_path(&paths);
    report.detail(format!(
        "config_path={} ({})",
        config_path.display(),
        presence(&config_path)
    ));
    report.detail(format!("audit_log={}", audit_log_path(&paths).display()));

    match load_config(&paths) {
        Ok(cfg) => {
            let inspect = cfg.inspect_categories(&paths)?;
            report.detail(format!("inspect_categories={}", inspect.join(",")));
            report.detail(format!(
                "additional_categories={}",
                cfg.categories.additional.join(",")
            ));
            for category in &inspect {
                report.detail(format!(
                    "category {category}: bib={} assets={}",
                    presence(&paths.bib_file(category)),
                    presence(&paths.category_dir(category))
                ));
            }
        }
        Err(err) => report.issue(format!("{err:#}")),
    }

    let watch_state = state::load(&paths)?;
    report.detail(format!(
        "watch.last_cycle_epoch_secs={}",
        watch_state.last_cycle_epoch_secs
    ));
    report.detail(format!("env_overrides={}", set_env_keys().join(",")));
    Ok(report)
}
