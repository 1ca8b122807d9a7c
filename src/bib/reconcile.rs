use crate::bib::bibtex::{self, BibFile, Entry};
use crate::bib::config::BibConfig;
use crate::bib::library::{Asset, AssetKind, scan_category};
use crate::bib::paths::ArchivePaths;
use crate::bib::short_code::{ShortCode, qualified, theme_of};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub const TYPE_BOOK: &str = "book";
pub const TYPE_MISC: &str = "misc";

/// One short code with the number of records, documents and images found
/// for it in one category.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CheckRow {
    pub code: String,
    pub category: String,
    pub theme: String,
    pub entry_type: String,
    pub bib_count: usize,
    pub pdf_count: usize,
    pub image_count: usize,
    pub title: String,
    pub pdf_path: Option<PathBuf>,
}

impl CheckRow {
    fn new(category: &str, code: &str) -> Self {
        Self {
            code: code.to_string(),
            category: category.to_string(),
            theme: theme_of(code),
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.bib_count > 0 && self.pdf_path.is_some() && self.image_count > 0
    }

    /// Missing record, document or image, or duplicated record/document.
    /// `misc` entries are never reported.
    pub fn is_incomplete(&self) -> bool {
        let broken = self.bib_count != 1
            || self.pdf_count != 1
            || self.pdf_path.is_none()
            || self.image_count == 0;
        broken && self.entry_type != TYPE_MISC
    }

    pub fn is_book(&self) -> bool {
        self.entry_type == TYPE_BOOK
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Collision {
    pub code: String,
    pub categories: Vec<String>,
    pub rows: Vec<CheckRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MalformedAsset {
    pub category: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckOutcome {
    pub categories: Vec<String>,
    pub rows: Vec<CheckRow>,
    pub collisions: Vec<Collision>,
    pub malformed_assets: Vec<MalformedAsset>,
    pub unparsed_codes: Vec<String>,
    pub formatted_files: Vec<PathBuf>,
    pub missing_bib_files: Vec<String>,
}

impl CheckOutcome {
    pub fn incomplete_non_books(&self) -> Vec<&CheckRow> {
        self.rows
            .iter()
            .filter(|r| r.is_incomplete() && !r.is_book())
            .collect()
    }

    pub fn incomplete_books(&self) -> Vec<&CheckRow> {
        self.rows
            .iter()
            .filter(|r| r.is_incomplete() && r.is_book())
            .collect()
    }

    pub fn complete_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_complete()).count()
    }
}

/// Three-way join of records, documents and images keyed by
/// `Category::code`.
#[derive(Debug, Default)]
pub struct Reconciler {
    rows: BTreeMap<String, CheckRow>,
}

impl Reconciler {
    fn row(&mut self, category: &str, code: &str) -> &mut CheckRow {
        self.rows
            .entry(qualified(category, code))
            .or_insert_with(|| CheckRow::new(category, code))
    }

    pub fn add_asset(&mut self, category: &str, asset: &Asset) {
        let row = self.row(category, &asset.code);
        if row.title.is_empty() {
            row.title = asset.title.clone();
        }
        match asset.kind {
            AssetKind::Pdf => {
                row.pdf_count += 1;
                if row.pdf_path.is_none() {
                    row.pdf_path = Some(asset.path.clone());
                }
            }
            AssetKind::Image => row.image_count += 1,
            AssetKind::Other => {}
        }
    }

    pub fn add_entry(&mut self, category: &str, entry: &Entry) {
        let row = self.row(category, entry.key.trim());
        row.entry_type = entry.entry_type.to_ascii_lowercase();
        row.bib_count += 1;
        // Records without any file still get a readable title.
        if row.title.is_empty()
            && let Some(title) = entry.field("title")
        {
            row.title = title.to_string();
        }
    }

    /// Rows ordered by category, theme and code, plus bare codes that occur
    /// in more than one category.
    pub fn finish(self) -> (Vec<CheckRow>, Vec<Collision>) {
        let mut by_code: BTreeMap<&str, Vec<&CheckRow>> = BTreeMap::new();
        for row in self.rows.values() {
            by_code.entry(&row.code).or_default().push(row);
        }
        let collisions = by_code
            .into_iter()
            .filter(|(_, rows)| rows.len() > 1)
            .map(|(code, rows)| Collision {
                code: code.to_string(),
                categories: rows.iter().map(|r| r.category.clone()).collect(),
                rows: rows.into_iter().cloned().collect(),
            })
            .collect::<Vec<_>>();

        let mut rows: Vec<CheckRow> = self.rows.into_values().collect();
        rows.sort_by(|a, b| {
            (&a.category, &a.theme, &a.code).cmp(&(&b.category, &b.theme, &b.code))
        });
        (rows, collisions)
    }
}

fn load_category_bib(
    paths: &ArchivePaths,
    category: &str,
    format: bool,
    outcome: &mut CheckOutcome,
) -> Result<Option<BibFile>> {
    let file = paths.bib_file(category);
    if !file.is_file() {
        outcome.missing_bib_files.push(category.to_string());
        return Ok(None);
    }
    let raw =
        fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
    let mut bib = bibtex::parse(&raw, &file.display().to_string())?;
    if format {
        bib.normalize();
        let rendered = bib.render();
        if rendered != raw {
            fs::write(&file, &rendered)
                .with_context(|| format!("failed to write {}", file.display()))?;
            outcome.formatted_files.push(file);
        }
    }
    Ok(Some(bib))
}

pub fn run_check(paths: &ArchivePaths, cfg: &BibConfig, format: bool) -> Result<CheckOutcome> {
    let mut outcome = CheckOutcome {
        categories: cfg.inspect_categories(paths)?,
        ..CheckOutcome::default()
    };
    let mut reconciler = Reconciler::default();

    for category in outcome.categories.clone() {
        let bib = load_category_bib(paths, &category, format, &mut outcome)?;

        let scan = scan_category(&paths.category_dir(&category))?;
        for asset in &scan.assets {
            reconciler.add_asset(&category, asset);
        }
        for file_name in scan.malformed {
            outcome.malformed_assets.push(MalformedAsset {
                category: category.clone(),
                file_name,
            });
        }

        if let Some(bib) = bib {
            for entry in bib.entries() {
                reconciler.add_entry(&category, entry);
            }
        }
    }

    let (rows, collisions) = reconciler.finish();
    outcome.unparsed_codes = rows
        .iter()
        .filter(|r| ShortCode::parse(&r.code).is_none())
        .map(|r| qualified(&r.category, &r.code))
        .collect();
    outcome.rows = rows;
    outcome.collisions = collisions;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bib::library::parse_asset;
    use std::path::Path;

    fn asset(name: &str) -> Asset {
        parse_asset(Path::new(name)).expect("asset")
    }

    fn entry(key: &str, entry_type: &str) -> Entry {
        Entry {
            entry_type: entry_type.to_string(),
            key: key.to_string(),
            fields: Vec::new(),
        }
    }

    #[test]
    fn joins_records_documents_and_images() {
        let mut rec = Reconciler::default();
        rec.add_asset("Robotics", &asset("Smith-2020-Arms Robot Arms.pdf"));
        rec.add_asset("Robotics", &asset("Smith-2020-Arms Robot Arms.png"));
        rec.add_asset("Robotics", &asset("Smith-2020-Arms Robot Arms 2.jpg"));
        rec.add_entry("Robotics", &entry("Smith-2020-Arms", "Article"));
        rec.add_entry("Robotics", &entry("Adams-2019-Legs", "article"));

        let (rows, collisions) = rec.finish();
        assert!(collisions.is_empty());
        assert_eq!(rows.len(), 2);

        let arms = rows.iter().find(|r| r.code == "Smith-2020-Arms").expect("row");
        assert_eq!(arms.bib_count, 1);
        assert_eq!(arms.pdf_count, 1);
        assert_eq!(arms.image_count, 2);
        assert_eq!(arms.entry_type, "article");
        assert_eq!(arms.title, "Robot Arms");
        assert!(arms.is_complete());
        assert!(!arms.is_incomplete());

        let legs = rows.iter().find(|r| r.code == "Adams-2019-Legs").expect("row");
        assert!(!legs.is_complete());
        assert!(legs.is_incomplete());
    }

    #[test]
    fn rows_sort_by_category_then_theme() {
        let mut rec = Reconciler::default();
        rec.add_entry("B", &entry("Zed-2001-Alpha", "article"));
        rec.add_entry("A", &entry("Amy-2001-Zeta", "article"));
        rec.add_entry("A", &entry("Bob-2001-Beta", "article"));
        let (rows, _) = rec.finish();
        let order: Vec<_> = rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(order, vec!["Bob-2001-Beta", "Amy-2001-Zeta", "Zed-2001-Alpha"]);
    }

    #[test]
    fn duplicate_records_are_incomplete() {
        let mut rec = Reconciler::default();
        rec.add_asset("A", &asset("X-2001-T Title.pdf"));
        rec.add_asset("A", &asset("X-2001-T Title.png"));
        rec.add_entry("A", &entry("X-2001-T", "article"));
        rec.add_entry("A", &entry("X-2001-T", "article"));
        let (rows, _) = rec.finish();
        assert_eq!(rows[0].bib_count, 2);
        assert!(rows[0].is_complete());
        assert!(rows[0].is_incomplete());
    }

    #[test]
    fn misc_entries_are_never_incomplete() {
        let mut rec = Reconciler::default();
        rec.add_entry("A", &entry("X-2001-Dataset", "misc"));
        let (rows, _) = rec.finish();
        assert!(!rows[0].is_incomplete());
    }

    #[test]
    fn same_code_in_two_categories_collides() {
        let mut rec = Reconciler::default();
        rec.add_entry("Robotics", &entry("Smith-2020-Arms", "article"));
        rec.add_asset("Structural-Design", &asset("Smith-2020-Arms Arms.pdf"));
        let (_, collisions) = rec.finish();
        assert_eq!(collisions.len(), 1);
        let collision = &collisions[0];
        assert_eq!(collision.code, "Smith-2020-Arms");
        assert_eq!(
            collision.categories,
            vec!["Robotics".to_string(), "Structural-Design".to_string()]
        );
        assert_eq!(collision.rows.len(), 2);
        assert_eq!(collision.rows[0].entry_type, "article");
        assert_eq!(collision.rows[0].bib_count, 1);
        assert_eq!(collision.rows[1].pdf_count, 1);
        assert_eq!(collision.rows[1].title, "Arms");
    }
}
