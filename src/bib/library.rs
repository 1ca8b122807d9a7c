use crate::bib::util::{file_name_string, list_files};
use crate::error::BibError;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub const IMAGE_EXTENSIONS: [&str; 2] = ["png", "jpg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Pdf,
    Image,
    Other,
}

impl AssetKind {
    pub fn from_extension(ext: &str) -> Self {
        let lower = ext.to_ascii_lowercase();
        if lower == "pdf" {
            AssetKind::Pdf
        } else if IMAGE_EXTENSIONS.contains(&lower.as_str()) {
            AssetKind::Image
        } else {
            AssetKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub file_name: String,
    pub code: String,
    pub title: String,
    pub extension: String,
    pub kind: AssetKind,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryScan {
    pub assets: Vec<Asset>,
    pub malformed: Vec<String>,
}

impl CategoryScan {
    pub fn images(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter().filter(|a| a.kind == AssetKind::Image)
    }

    pub fn pdfs(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter().filter(|a| a.kind == AssetKind::Pdf)
    }

    /// The PDF whose short code is exactly `code`.
    pub fn pdf_for(&self, code: &str) -> Option<&Asset> {
        self.pdfs().find(|a| a.code == code)
    }
}

/// Split `<code> <title>.<ext>` into its parts.
pub fn split_asset_name(file_name: &str) -> Result<(String, String, String), BibError> {
    let malformed = || BibError::MalformedAssetName(file_name.to_string());
    let (stem, ext) = file_name.rsplit_once('.').ok_or_else(malformed)?;
    let (code, title) = stem.split_once(' ').ok_or_else(malformed)?;
    if code.is_empty() || ext.is_empty() {
        return Err(malformed());
    }
    Ok((code.to_string(), title.to_string(), ext.to_string()))
}

pub fn parse_asset(path: &Path) -> Result<Asset, BibError> {
    let file_name = file_name_string(path);
    let (code, title, extension) = split_asset_name(&file_name)?;
    Ok(Asset {
        path: path.to_path_buf(),
        kind: AssetKind::from_extension(&extension),
        file_name,
        code,
        title,
        extension,
    })
}

/// Asset files of one category folder. Hidden files are ignored; names that
/// do not follow the `<code> <title>.<ext>` pattern are collected in
/// `malformed`.
pub fn scan_category(dir: &Path) -> Result<CategoryScan> {
    let mut scan = CategoryScan::default();
    if !dir.is_dir() {
        return Ok(scan);
    }
    for path in list_files(dir)? {
        let name = file_name_string(&path);
        if name.starts_with('.') {
            continue;
        }
        match parse_asset(&path) {
            Ok(asset) => scan.assets.push(asset),
            Err(_) => scan.malformed.push(name),
        }
    }
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn splits_code_title_and_extension() {
        let (code, title, ext) =
            split_asset_name("Smith-2020-Origami Folding v2. Robots.PDF").expect("split");
        assert_eq!(code, "Smith-2020-Origami");
        assert_eq!(title, "Folding v2. Robots");
        assert_eq!(ext, "PDF");
        assert_eq!(AssetKind::from_extension(&ext), AssetKind::Pdf);
        assert_eq!(AssetKind::from_extension("JPG"), AssetKind::Image);
        assert_eq!(AssetKind::from_extension("docx"), AssetKind::Other);
    }

    #[test]
    fn rejects_names_without_title_or_extension() {
        assert!(split_asset_name("Smith-2020-Origami.pdf").is_err());
        assert!(split_asset_name("Smith-2020-Origami Title").is_err());
    }

    #[test]
    fn scan_classifies_and_reports_malformed() {
        let tmp = tempdir().expect("tempdir");
        let dir = tmp.path();
        fs::write(dir.join("Smith-2020-Origami Folding.pdf"), "").expect("write");
        fs::write(dir.join("Smith-2020-Origami Folding.png"), "").expect("write");
        fs::write(dir.join("Smith-2020-Origami Folding 2.jpg"), "").expect("write");
        fs::write(dir.join("notes.txt"), "").expect("write");
        fs::write(dir.join(".DS_Store"), "").expect("write");

        let scan = scan_category(dir).expect("scan");
        assert_eq!(scan.assets.len(), 3);
        assert_eq!(scan.images().count(), 2);
        assert!(scan.pdf_for("Smith-2020-Origami").is_some());
        assert!(scan.pdf_for("Smith-2020").is_none());
        assert_eq!(scan.malformed, vec!["notes.txt"]);
    }

    #[test]
    fn missing_folder_scans_empty() {
        let tmp = tempdir().expect("tempdir");
        let scan = scan_category(&tmp.path().join("absent")).expect("scan");
        assert!(scan.assets.is_empty());
    }
}
