use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArchivePaths {
    pub root: PathBuf,
    pub bibtex_dir: PathBuf,
    pub bibtex_latex_dir: PathBuf,
    pub pdf_dir: PathBuf,
    pub gallery_dir: PathBuf,
    pub collect_dir: PathBuf,
    pub io_dir: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ArchivePaths {
    pub fn under(root: &Path) -> Self {
        let tool_dir = root.join(".bibarchive");
        Self {
            root: root.to_path_buf(),
            bibtex_dir: root.join("bib"),
            bibtex_latex_dir: root.join("bib_latex"),
            pdf_dir: root.join("PDF"),
            gallery_dir: root.join("Gallery"),
            collect_dir: root.join("to_collect"),
            io_dir: root.to_path_buf(),
            state_dir: tool_dir.join("state"),
            logs_dir: tool_dir.join("logs"),
        }
    }

    pub fn bib_file(&self, category: &str) -> PathBuf {
        self.bibtex_dir.join(format!("{category}.bib"))
    }

    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.pdf_dir.join(category)
    }

    pub fn gallery_file(&self, category: &str) -> PathBuf {
        self.gallery_dir.join(format!("Gallery - {category}.html"))
    }
}

/// Folder names are taken relative to the root unless absolute.
fn env_or_default_path(root: &Path, var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => root.join(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_root() -> Result<PathBuf> {
    match env::var("BIB_ROOT") {
        Ok(v) if !v.trim().is_empty() => Ok(PathBuf::from(v.trim())),
        _ => env::current_dir().context("current directory could not be resolved"),
    }
}

pub fn resolve_paths() -> Result<ArchivePaths> {
    let root = resolve_root()?;
    let defaults = ArchivePaths::under(&root);

    Ok(ArchivePaths {
        bibtex_dir: env_or_default_path(&root, "BIB_BIBTEX_DIR", defaults.bibtex_dir),
        bibtex_latex_dir: env_or_default_path(
            &root,
            "BIB_BIBTEX_LATEX_DIR",
            defaults.bibtex_latex_dir,
        ),
        pdf_dir: env_or_default_path(&root, "BIB_PDF_DIR", defaults.pdf_dir),
        gallery_dir: env_or_default_path(&root, "BIB_GALLERY_DIR", defaults.gallery_dir),
        collect_dir: env_or_default_path(&root, "BIB_COLLECT_DIR", defaults.collect_dir),
        io_dir: env_or_default_path(&root, "BIB_IO_DIR", defaults.io_dir),
        state_dir: defaults.state_dir,
        logs_dir: env_or_default_path(&root, "BIB_LOGS_DIR", defaults.logs_dir),
        root,
    })
}
