use crate::bib::bibtex;
use crate::bib::config::BibConfig;
use crate::bib::paths::ArchivePaths;
use crate::bib::util::write_string;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const LATEX_SUFFIX: &str = "_latex";

#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub category: String,
    pub path: PathBuf,
    pub entries: usize,
}

/// `refs.bib` -> `refs_latex.bib`, next to the input.
pub fn latex_sibling(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{LATEX_SUFFIX}.bib"))
}

pub fn latex_file_path(paths: &ArchivePaths, category: &str) -> PathBuf {
    paths
        .bibtex_latex_dir
        .join(format!("{category}{LATEX_SUFFIX}.bib"))
}

/// Write LaTeX-encoded copies of every inspected and additional category.
/// Categories without a `.bib` file are skipped.
pub fn export_latex(paths: &ArchivePaths, cfg: &BibConfig) -> Result<Vec<ExportedFile>> {
    let mut out = Vec::new();
    for category in cfg.all_categories(paths)? {
        let source = paths.bib_file(&category);
        if !source.is_file() {
            continue;
        }
        let raw = fs::read_to_string(&source)
            .with_context(|| format!("failed to read {}", source.display()))?;
        let mut file = bibtex::parse(&raw, &source.display().to_string())?;
        file.normalize();
        let target = latex_file_path(paths, &category);
        write_string(&target, &file.latex_encoded().render())?;
        out.push(ExportedFile {
            category,
            entries: file.entries().count(),
            path: target,
        });
    }
    Ok(out)
}
