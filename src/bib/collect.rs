use crate::bib::audit;
use crate::bib::bibtex::{self, render_entry};
use crate::bib::config::BibConfig;
use crate::bib::paths::ArchivePaths;
use crate::bib::pdf_meta::{self, PdfMetadata};
use crate::bib::short_code::ShortCode;
use crate::bib::util::{file_hash, file_name_string, list_files, make_valid_filename, move_file};
use crate::bib::warn::{self, WarnEvent};
use crate::crossref::client::BibtexSource;
use crate::error::BibError;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedIdentity {
    pub short_code: String,
    pub doi: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct CollectedItem {
    pub category: String,
    pub source: PathBuf,
    pub target: PathBuf,
    pub short_code: String,
    pub doi: String,
}

#[derive(Debug, Clone)]
pub struct CollectFailure {
    pub category: String,
    pub source: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct CollectOutcome {
    pub dry_run: bool,
    pub collected: Vec<CollectedItem>,
    /// Inbox file and the archived file with identical content.
    pub duplicates: Vec<(PathBuf, PathBuf)>,
    pub failures: Vec<CollectFailure>,
}

/// First letter upper, the rest lower.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Surname of the first listed author: `"Jane Smith, Bo Li"` -> `Smith`.
pub fn first_author_surname(author: &str) -> Option<String> {
    let first = author.split(',').next()?.trim();
    let surname = first.split_whitespace().last()?;
    Some(capitalize(surname))
}

/// Publisher subjects look like `Journal, 12 (2021) 345. doi:10.1000/xyz`.
pub fn parse_subject(subject: &str) -> Option<(String, String)> {
    let last = subject.split_whitespace().last()?;
    let doi = last
        .strip_prefix("https://doi.org/")
        .or_else(|| last.strip_prefix("doi:"))
        .or_else(|| last.strip_prefix("DOI:"))
        .unwrap_or(last)
        .trim_end_matches('.')
        .to_string();
    let (_, after_open) = subject.split_once('(')?;
    let (year, _) = after_open.split_once(')')?;
    let year = year.trim();
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) || !doi.contains('/') {
        return None;
    }
    Some((doi, year.to_string()))
}

pub fn derive_identity(meta: &PdfMetadata, theme: &str, file: &str) -> Result<DerivedIdentity> {
    let incomplete = |reason: &str| BibError::IncompleteMetadata {
        file: file.to_string(),
        reason: reason.to_string(),
    };
    let author = first_author_surname(&meta.author).ok_or_else(|| incomplete("empty author"))?;
    let (doi, year) =
        parse_subject(&meta.subject).ok_or_else(|| incomplete("subject has no `(year)` and doi"))?;
    let short_code = format!("{author}-{year}-{}", theme.trim());
    ShortCode::parse(&short_code).ok_or_else(|| BibError::InvalidShortCode(short_code.clone()))?;
    Ok(DerivedIdentity {
        short_code,
        doi,
        title: meta.title.clone(),
    })
}

/// Normalize a fetched record and give it the archive's short code.
pub fn rekey_fetched(raw: &str, short_code: &str, doi: &str) -> Result<String> {
    let mut file = bibtex::parse(raw, doi)?;
    file.normalize();
    let entry = file.entries().next().ok_or_else(|| BibError::LookupFailed {
        doi: doi.to_string(),
        reason: "response contains no entry".into(),
    })?;
    Ok(render_entry(&entry.rekeyed(short_code)))
}

/// Appends `rendered` and returns the file length before the append.
fn append_bib(bib_path: &Path, rendered: &str) -> Result<u64> {
    if let Some(parent) = bib_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(bib_path)
        .with_context(|| format!("failed to open {}", bib_path.display()))?;
    let previous_len = file
        .metadata()
        .with_context(|| format!("failed to stat {}", bib_path.display()))?
        .len();
    if let Err(err) = file.write_all(format!("\n\n{rendered}\n").as_bytes()) {
        let _ = file.set_len(previous_len);
        return Err(err).with_context(|| format!("failed to append to {}", bib_path.display()));
    }
    Ok(previous_len)
}

fn truncate_bib(bib_path: &Path, len: u64) -> Result<()> {
    fs::OpenOptions::new()
        .write(true)
        .open(bib_path)
        .and_then(|file| file.set_len(len))
        .with_context(|| format!("failed to restore {}", bib_path.display()))
}

fn existing_keys(bib_path: &Path) -> Result<BTreeSet<String>> {
    if !bib_path.exists() {
        return Ok(BTreeSet::new());
    }
    let raw = fs::read_to_string(bib_path)
        .with_context(|| format!("failed to read {}", bib_path.display()))?;
    Ok(bibtex::parse(&raw, &bib_path.display().to_string())?.keys())
}

fn archived_hashes(category_dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut out = BTreeMap::new();
    if !category_dir.is_dir() {
        return Ok(out);
    }
    for path in list_files(category_dir)? {
        if is_pdf(&path) {
            out.insert(file_hash(&path)?, path);
        }
    }
    Ok(out)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

struct CategoryContext<'a> {
    paths: &'a ArchivePaths,
    category: &'a str,
    keys: BTreeSet<String>,
    hashes: BTreeMap<String, PathBuf>,
}

fn collect_one(
    ctx: &mut CategoryContext<'_>,
    source: &dyn BibtexSource,
    pdf: &Path,
    dry_run: bool,
    outcome: &mut CollectOutcome,
) -> Result<()> {
    let hash = file_hash(pdf)?;
    if let Some(existing) = ctx.hashes.get(&hash) {
        outcome
            .duplicates
            .push((pdf.to_path_buf(), existing.clone()));
        return Ok(());
    }

    let file_name = file_name_string(pdf);
    let theme = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .unwrap_or_default();
    let meta = pdf_meta::read_metadata(pdf)?;
    let identity = derive_identity(&meta, &theme, &file_name)?;
    if ctx.keys.contains(&identity.short_code) {
        return Err(BibError::ShortCodeCollision(identity.short_code).into());
    }

    let new_name = make_valid_filename(&format!("{} {}.pdf", identity.short_code, identity.title));
    let target = ctx.paths.category_dir(ctx.category).join(&new_name);
    if target.exists() {
        return Err(BibError::TargetExists(target.display().to_string()).into());
    }

    if !dry_run {
        let raw = source.bibtex_for_doi(&identity.doi)?;
        let rendered = rekey_fetched(&raw, &identity.short_code, &identity.doi)?;
        let bib_path = ctx.paths.bib_file(ctx.category);
        let previous_len = append_bib(&bib_path, &rendered)?;
        if let Err(err) = move_file(pdf, &target) {
            return Err(match truncate_bib(&bib_path, previous_len) {
                Ok(()) => err,
                Err(restore_err) => err.context(format!("{restore_err:#}")),
            });
        }
        ctx.hashes.insert(hash, target.clone());

        // The PDF and its record are committed; audit trouble only warns.
        if let Err(err) = audit::append_event(
            ctx.paths,
            "collect",
            "ok",
            &format!(
                "category={} code={} doi={} target={}",
                ctx.category,
                identity.short_code,
                identity.doi,
                target.display()
            ),
        ) {
            warn::emit(WarnEvent {
                code: "AUDIT_FAILED",
                stage: "collect",
                category: ctx.category,
                target: &identity.short_code,
                reason: "collected but not audited",
                err: &format!("{err:#}"),
            });
        }
    }

    ctx.keys.insert(identity.short_code.clone());
    outcome.collected.push(CollectedItem {
        category: ctx.category.to_string(),
        source: pdf.to_path_buf(),
        target,
        short_code: identity.short_code,
        doi: identity.doi,
    });
    Ok(())
}

pub fn run_collect(
    paths: &ArchivePaths,
    cfg: &BibConfig,
    source: &dyn BibtexSource,
    dry_run: bool,
) -> Result<CollectOutcome> {
    let mut outcome = CollectOutcome {
        dry_run,
        ..CollectOutcome::default()
    };
    if !paths.collect_dir.is_dir() {
        return Ok(outcome);
    }

    for category in cfg.inspect_categories(paths)? {
        let inbox = paths.collect_dir.join(&category);
        if !inbox.is_dir() {
            continue;
        }
        let pdfs: Vec<PathBuf> = list_files(&inbox)?.into_iter().filter(|p| is_pdf(p)).collect();
        if pdfs.is_empty() {
            continue;
        }

        let mut ctx = CategoryContext {
            paths,
            category: &category,
            keys: existing_keys(&paths.bib_file(&category))?,
            hashes: archived_hashes(&paths.category_dir(&category))?,
        };
        for pdf in pdfs {
            if let Err(err) = collect_one(&mut ctx, source, &pdf, dry_run, &mut outcome) {
                outcome.failures.push(CollectFailure {
                    category: category.clone(),
                    source: pdf,
                    error: format!("{err:#}"),
                });
            }
        }
    }
    Ok(outcome)
}
