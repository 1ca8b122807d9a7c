use crate::bib::audit;
use crate::bib::bibtex;
use crate::bib::config::BibConfig;
use crate::bib::paths::ArchivePaths;
use crate::bib::short_code::ShortCode;
use crate::bib::util::{file_name_string, list_files};
use crate::error::BibError;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameRule {
    /// Replace the theme of every code whose theme equals `old`.
    Theme { old: String, new: String },
    /// Replace one exact code.
    Code { old: String, new: String },
}

impl RenameRule {
    pub fn validate(&self) -> Result<()> {
        match self {
            RenameRule::Theme { new, .. } => {
                if new.trim().is_empty() || new.chars().any(char::is_whitespace) {
                    return Err(BibError::InvalidShortCode(format!("theme `{new}`")).into());
                }
                ShortCode::parse(&format!("X-2000-{new}"))
                    .filter(|c| c.theme == *new)
                    .ok_or_else(|| BibError::InvalidShortCode(format!("theme `{new}`")))?;
            }
            RenameRule::Code { new, .. } => {
                if new.chars().any(char::is_whitespace) || new.contains("::") {
                    return Err(BibError::InvalidShortCode(new.clone()).into());
                }
                new.parse::<ShortCode>()?;
            }
        }
        Ok(())
    }

    pub fn apply(&self, code: &str) -> Option<String> {
        match self {
            RenameRule::Theme { old, new } => {
                let parsed = ShortCode::parse(code)?;
                (parsed.theme == *old).then(|| parsed.with_theme(new).to_string())
            }
            RenameRule::Code { old, new } => (code == old).then(|| new.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    pub category: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub category: String,
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct RenamePlan {
    pub key_changes: Vec<KeyChange>,
    pub file_changes: Vec<FileChange>,
    /// Rewritten bib files, keyed by path, ready to be written.
    pub bib_rewrites: Vec<(PathBuf, String)>,
}

fn plan_bib(
    paths: &ArchivePaths,
    category: &str,
    rule: &RenameRule,
    plan: &mut RenamePlan,
) -> Result<()> {
    let bib_path = paths.bib_file(category);
    if !bib_path.is_file() {
        return Ok(());
    }
    let raw = fs::read_to_string(&bib_path)
        .with_context(|| format!("failed to read {}", bib_path.display()))?;
    let mut file = bibtex::parse(&raw, &bib_path.display().to_string())?;
    file.normalize();

    let mut changes = Vec::new();
    for entry in file.entries_mut() {
        if let Some(new_key) = rule.apply(entry.key.trim()) {
            changes.push(KeyChange {
                category: category.to_string(),
                from: entry.key.clone(),
                to: new_key.clone(),
            });
            entry.key = new_key;
        }
    }
    if changes.is_empty() {
        return Ok(());
    }

    let renamed: BTreeSet<&str> = changes.iter().map(|c| c.to.as_str()).collect();
    let mut seen = BTreeSet::new();
    for entry in file.entries() {
        let key = entry.key.as_str();
        if renamed.contains(key) && !seen.insert(key) {
            return Err(BibError::ShortCodeCollision(format!("{category}::{key}")).into());
        }
    }

    file.sort();
    plan.bib_rewrites.push((bib_path, file.render()));
    plan.key_changes.extend(changes);
    Ok(())
}

fn plan_files(
    paths: &ArchivePaths,
    category: &str,
    rule: &RenameRule,
    plan: &mut RenamePlan,
) -> Result<()> {
    let dir = paths.category_dir(category);
    if !dir.is_dir() {
        return Ok(());
    }
    for path in list_files(&dir)? {
        let name = file_name_string(&path);
        let Some((code, rest)) = name.split_once(' ') else {
            continue;
        };
        let Some(new_code) = rule.apply(code) else {
            continue;
        };
        let target = dir.join(format!("{new_code} {rest}"));
        if target.exists() || plan.file_changes.iter().any(|c| c.to == target) {
            return Err(BibError::TargetExists(target.display().to_string()).into());
        }
        plan.file_changes.push(FileChange {
            category: category.to_string(),
            from: path,
            to: target,
        });
    }
    Ok(())
}

/// Work out every key and file rename without touching the archive, so a
/// conflict aborts before anything changes.
pub fn plan(
    paths: &ArchivePaths,
    cfg: &BibConfig,
    rule: &RenameRule,
    only_category: Option<&str>,
) -> Result<RenamePlan> {
    rule.validate()?;
    let categories = match only_category {
        Some(category) => vec![category.to_string()],
        None => cfg.inspect_categories(paths)?,
    };
    let mut out = RenamePlan::default();
    for category in &categories {
        plan_bib(paths, category, rule, &mut out)?;
        plan_files(paths, category, rule, &mut out)?;
    }
    Ok(out)
}

pub fn apply(paths: &ArchivePaths, plan: &RenamePlan) -> Result<()> {
    for (bib_path, rendered) in &plan.bib_rewrites {
        fs::write(bib_path, rendered)
            .with_context(|| format!("failed to write {}", bib_path.display()))?;
    }
    for change in &plan.file_changes {
        fs::rename(&change.from, &change.to).with_context(|| {
            format!(
                "failed to rename {} to {}",
                change.from.display(),
                change.to.display()
            )
        })?;
    }
    audit::append_event(
        paths,
        "rename",
        "ok",
        &format!(
            "keys={} files={}",
            plan.key_changes.len(),
            plan.file_changes.len()
        ),
    )?;
    Ok(())
}
