use anyhow::Result;

use crate::bib::audit;
use crate::bib::config::load_config;
use crate::bib::gallery::generate_category;
use crate::bib::paths::resolve_paths;
use crate::commands::CommandReport;

#[derive(Debug, Clone, Default)]
pub struct GalleryOptions {
    pub category: Option<String>,
}

pub fn run(opts: &GalleryOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut report = CommandReport::new("gallery");

    let categories = match &opts.category {
        Some(category) => {
            if !cfg.is_inspected(&paths, category)? {
                report.issue(format!("category {category} is not inspected"));
                return Ok(report);
            }
            vec![category.clone()]
        }
        None => cfg.inspect_categories(&paths)?,
    };

    for category in &categories {
        let out = generate_category(&paths, category)?;
        report.detail(format!(
            "gallery {} images={} linked={} themes={} path={}",
            out.category,
            out.images,
            out.linked,
            out.themes,
            out.html_path.display()
        ));
    }
    audit::append_event(
        &paths,
        "gallery",
        "ok",
        &format!("categories={}", categories.join(",")),
    )?;
    Ok(report)
}
