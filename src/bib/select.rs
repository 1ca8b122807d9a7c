use crate::bib::bibtex::{self, BibFile};
use crate::bib::config::BibConfig;
use crate::bib::export::latex_sibling;
use crate::bib::paths::ArchivePaths;
use crate::bib::util::write_string;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

pub const DEFAULT_INPUT: &str = "input.typ";
pub const DEFAULT_OUTPUT: &str = "selected.bib";

fn year_word() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b[a-zA-Z-]*\d{4}[a-zA-Z-]*\b").expect("static regex"))
}

fn label() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<([A-Za-z0-9\-]+-\d{4}-[A-Za-z0-9\-]+)>").expect("static regex")
    })
}

fn is_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// Keys cited in a Typst document, as `@key` references or `<key>` labels.
pub fn cited_keys(text: &str) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for chunk in text.split('@').skip(1) {
        let end = chunk.find(|c: char| !is_code_char(c)).unwrap_or(chunk.len());
        let front = &chunk[..end];
        if year_word().is_match(front) {
            keys.insert(front.to_string());
        }
    }
    for caps in label().captures_iter(text) {
        keys.insert(caps[1].to_string());
    }
    keys
}

#[derive(Debug, Clone, Default)]
pub struct SelectOutcome {
    pub cited: usize,
    /// Category and number of entries taken from it, in search order.
    pub per_category: Vec<(String, usize)>,
    pub remaining: Vec<String>,
    pub output_path: PathBuf,
    pub latex_path: PathBuf,
}

impl SelectOutcome {
    pub fn collected(&self) -> usize {
        self.per_category.iter().map(|(_, n)| n).sum()
    }
}

pub fn run_select(
    paths: &ArchivePaths,
    cfg: &BibConfig,
    input: &str,
    output: &str,
) -> Result<SelectOutcome> {
    let input_path = paths.io_dir.join(input);
    let text = fs::read_to_string(&input_path)
        .with_context(|| format!("failed to read {}", input_path.display()))?;
    let mut wanted = cited_keys(&text);
    let mut outcome = SelectOutcome {
        cited: wanted.len(),
        ..SelectOutcome::default()
    };

    let mut selected = BibFile::default();
    for category in cfg.all_categories(paths)? {
        let bib_path = paths.bib_file(&category);
        if !bib_path.is_file() {
            continue;
        }
        let raw = fs::read_to_string(&bib_path)
            .with_context(|| format!("failed to read {}", bib_path.display()))?;
        let mut file = bibtex::parse(&raw, &bib_path.display().to_string())?;
        file.normalize();

        let mut count = 0usize;
        for entry in file.entries() {
            if wanted.remove(entry.key.trim()) {
                selected.push(entry.clone());
                count += 1;
            }
        }
        if count > 0 {
            outcome.per_category.push((category, count));
        }
    }
    selected.normalize();

    outcome.output_path = paths.io_dir.join(output);
    outcome.latex_path = latex_sibling(&outcome.output_path);
    write_string(&outcome.output_path, &selected.render())?;
    write_string(&outcome.latex_path, &selected.latex_encoded().render())?;
    outcome.remaining = wanted.into_iter().collect();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_references_and_labels() {
        let text = "As shown by @Smith-2020-Arms, and <Li-2019-Legs-2>.\n\
                    Contact me@home or see @fig:overview and @Jones-2018-Hands.";
        let keys: Vec<String> = cited_keys(text).into_iter().collect();
        assert_eq!(keys, vec!["Jones-2018-Hands", "Li-2019-Legs-2", "Smith-2020-Arms"]);
    }

    #[test]
    fn selects_each_key_once_across_categories() {
        let tmp = tempdir().expect("tempdir");
        let paths = ArchivePaths::under(tmp.path());
        fs::create_dir_all(&paths.bibtex_dir).expect("mkdir");
        fs::write(
            paths.bib_file("Robotics"),
            "@article{Smith-2020-Arms, title={Arms}}\n@article{Other-2000-X, title={X}}\n",
        )
        .expect("write");
        fs::write(
            paths.bib_file("Books"),
            "@book{Smith-2020-Arms, title={Dup}}\n@book{Li-2019-Legs, title={Schön}}\n",
        )
        .expect("write");
        fs::write(
            paths.io_dir.join("paper.typ"),
            "@Smith-2020-Arms @Li-2019-Legs @Ghost-1999-None",
        )
        .expect("write");

        let mut cfg = BibConfig::default();
        cfg.categories.inspect = vec!["Robotics".into()];
        cfg.categories.additional = vec!["Books".into()];

        let out = run_select(&paths, &cfg, "paper.typ", "refs.bib").expect("select");
        assert_eq!(out.cited, 3);
        assert_eq!(out.collected(), 2);
        assert_eq!(
            out.per_category,
            vec![("Robotics".to_string(), 1), ("Books".to_string(), 1)]
        );
        assert_eq!(out.remaining, vec!["Ghost-1999-None"]);

        let refs = fs::read_to_string(paths.io_dir.join("refs.bib")).expect("read");
        assert!(refs.contains("title = {Arms}"));
        assert!(!refs.contains("Dup"));
        assert!(refs.contains("title = {Schön}"));
        let latex = fs::read_to_string(paths.io_dir.join("refs_latex.bib")).expect("read");
        assert!(latex.contains(r#"title = {Sch{\"o}n}"#));
    }
}
