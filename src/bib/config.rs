use crate::bib::paths::ArchivePaths;
use crate::error::BibError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "bibarchive.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BibCategoriesConfig {
    /// Categories that are checked, collected, renamed and get galleries.
    /// Empty means every `.bib` file found in the bibtex dir.
    #[serde(default)]
    pub inspect: Vec<String>,
    /// Extra categories only used by `select` and `latex`.
    #[serde(default)]
    pub additional: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BibCheckConfig {
    pub format_bibtex: bool,
    pub show_incomplete: bool,
    pub check_books: bool,
    pub title_max_chars: usize,
}

impl Default for BibCheckConfig {
    fn default() -> Self {
        Self {
            format_bibtex: true,
            show_incomplete: false,
            check_books: false,
            title_max_chars: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BibWatchConfig {
    pub poll_interval_secs: u64,
}

impl Default for BibWatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BibCrossrefConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub mailto: Option<String>,
}

impl Default for BibCrossrefConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.crossref.org".to_string(),
            timeout_secs: 30,
            mailto: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BibConfig {
    pub categories: BibCategoriesConfig,
    pub check: BibCheckConfig,
    pub watch: BibWatchConfig,
    pub crossref: BibCrossrefConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialBibConfig {
    categories: Option<BibCategoriesConfig>,
    check: Option<BibCheckConfig>,
    watch: Option<BibWatchConfig>,
    crossref: Option<BibCrossrefConfig>,
}

impl BibConfig {
    /// Inspected categories, falling back to every `.bib` file on disk.
    pub fn inspect_categories(&self, paths: &ArchivePaths) -> Result<Vec<String>> {
        if !self.categories.inspect.is_empty() {
            return Ok(self.categories.inspect.clone());
        }
        discover_categories(&paths.bibtex_dir)
    }

    pub fn is_inspected(&self, paths: &ArchivePaths, category: &str) -> Result<bool> {
        Ok(self
            .inspect_categories(paths)?
            .iter()
            .any(|c| c == category))
    }

    /// Inspected plus additional categories, without duplicates.
    pub fn all_categories(&self, paths: &ArchivePaths) -> Result<Vec<String>> {
        let mut out = self.inspect_categories(paths)?;
        for extra in &self.categories.additional {
            if !out.contains(extra) {
                out.push(extra.clone());
            }
        }
        Ok(out)
    }
}

pub fn discover_categories(bibtex_dir: &Path) -> Result<Vec<String>> {
    if !bibtex_dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for path in crate::bib::util::list_files(bibtex_dir)? {
        if path.extension().and_then(|e| e.to_str()) != Some("bib") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            out.push(stem.to_string());
        }
    }
    Ok(out)
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_csv(var: &str, fallback: &[String]) -> Vec<String> {
    match env::var(var) {
        Ok(v) => {
            let out = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>();
            if out.is_empty() {
                fallback.to_vec()
            } else {
                out
            }
        }
        Err(_) => fallback.to_vec(),
    }
}

fn invalid(reason: impl Into<String>) -> anyhow::Error {
    BibError::InvalidConfig(reason.into()).into()
}

fn validate(cfg: &BibConfig) -> Result<()> {
    let mut seen = BTreeSet::new();
    for category in cfg
        .categories
        .inspect
        .iter()
        .chain(cfg.categories.additional.iter())
    {
        if category.trim().is_empty() {
            return Err(invalid("category names cannot be empty"));
        }
        if category.contains('/') || category.contains('\\') || category.contains("::") {
            return Err(invalid(format!(
                "category `{category}` cannot contain path separators or `::`"
            )));
        }
        if !seen.insert(category.as_str()) {
            return Err(invalid(format!("category `{category}` is listed twice")));
        }
    }
    if cfg.watch.poll_interval_secs == 0 {
        return Err(invalid("watch poll interval must be >= 1 second"));
    }
    if cfg.crossref.base_url.trim().is_empty() {
        return Err(invalid("crossref base url cannot be empty"));
    }
    if cfg.crossref.timeout_secs == 0 {
        return Err(invalid("crossref timeout must be >= 1 second"));
    }
    if cfg.check.title_max_chars == 0 {
        return Err(invalid("check title_max_chars must be >= 1"));
    }
    Ok(())
}

pub fn resolve_config_path(paths: &ArchivePaths) -> PathBuf {
    if let Ok(custom) = env::var("BIB_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    paths.root.join(CONFIG_FILE_NAME)
}

fn merge_file_config(base: &mut BibConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| invalid(format!("failed to read {}: {err}", path.display())))?;
    let parsed: PartialBibConfig = toml::from_str(&raw)
        .map_err(|err| invalid(format!("failed to parse {}: {err}", path.display())))?;
    if let Some(categories) = parsed.categories {
        base.categories = categories;
    }
    if let Some(check) = parsed.check {
        base.check = check;
    }
    if let Some(watch) = parsed.watch {
        base.watch = watch;
    }
    if let Some(crossref) = parsed.crossref {
        base.crossref = crossref;
    }
    Ok(())
}

pub fn load_config(paths: &ArchivePaths) -> Result<BibConfig> {
    let mut cfg = BibConfig::default();
    merge_file_config(&mut cfg, &resolve_config_path(paths))?;

    cfg.categories.inspect = env_or_csv("BIB_INSPECT_CATEGORIES", &cfg.categories.inspect);
    cfg.categories.additional =
        env_or_csv("BIB_ADDITIONAL_CATEGORIES", &cfg.categories.additional);
    cfg.check.format_bibtex = env_or_bool("BIB_FORMAT_BIBTEX", cfg.check.format_bibtex);
    cfg.watch.poll_interval_secs =
        env_or_u64("BIB_POLL_INTERVAL_SECS", cfg.watch.poll_interval_secs);
    cfg.crossref.base_url = env_or_string("BIB_CROSSREF_URL", &cfg.crossref.base_url);
    cfg.crossref.timeout_secs = env_or_u64("BIB_CROSSREF_TIMEOUT_SECS", cfg.crossref.timeout_secs);
    if let Ok(mailto) = env::var("BIB_CROSSREF_MAILTO")
        && !mailto.trim().is_empty()
    {
        cfg.crossref.mailto = Some(mailto.trim().to_string());
    }

    validate(&cfg)?;
    Ok(cfg)
}
