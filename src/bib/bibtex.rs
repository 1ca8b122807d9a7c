use crate::bib::latex;
use crate::error::BibError;
use anyhow::Result;
use std::collections::BTreeSet;

const DOI_URL_PREFIX: &str = "https://doi.org/";
const BLOCK_SEPARATOR: &str = "\n\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// `{...}` or `"..."`; stores the text between the delimiters.
    Delimited(String),
    /// Numbers, macro names and `#` concatenations, kept verbatim.
    Bare(String),
}

impl FieldValue {
    pub fn text(&self) -> &str {
        match self {
            FieldValue::Delimited(v) | FieldValue::Bare(v) => v,
        }
    }

    fn map_delimited(&self, f: impl Fn(&str) -> String) -> FieldValue {
        match self {
            FieldValue::Delimited(v) => FieldValue::Delimited(f(v)),
            FieldValue::Bare(v) => FieldValue::Bare(v.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub entry_type: String,
    pub key: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl Entry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.text())
    }

    pub fn rekeyed(&self, key: &str) -> Entry {
        Entry {
            key: key.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Entry(Entry),
    /// `@string`, `@preamble` and `@comment` blocks, verbatim.
    Raw(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BibFile {
    pub blocks: Vec<Block>,
}

struct Cursor<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(text: &str, source: &'a str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            source,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn line(&self) -> usize {
        self.chars[..self.pos.min(self.chars.len())]
            .iter()
            .filter(|c| **c == '\n')
            .count()
            + 1
    }

    fn error(&self, reason: impl Into<String>) -> anyhow::Error {
        BibError::MalformedBibtex {
            file: self.source.to_string(),
            reason: format!("line {}: {}", self.line(), reason.into()),
        }
        .into()
    }

    fn expect(&mut self, want: char) -> Result<()> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.error(format!("expected `{want}`, found `{c}`"))),
            None => Err(self.error(format!("expected `{want}`, found end of input"))),
        }
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&f) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Text up to the matching `close`, honouring nested braces.
    fn balanced(&mut self, close: char) -> Result<String> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' if depth > 0 => depth -= 1,
                c if c == close && depth == 0 => {
                    return Ok(self.chars[start..self.pos - 1].iter().collect());
                }
                _ => {}
            }
        }
        Err(self.error("unterminated block"))
    }

    fn quoted(&mut self) -> Result<String> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' if depth > 0 => depth -= 1,
                '"' if depth == 0 => {
                    return Ok(self.chars[start..self.pos - 1].iter().collect());
                }
                _ => {}
            }
        }
        Err(self.error("unterminated quoted value"))
    }

    fn value_part(&mut self) -> Result<String> {
        self.skip_ws();
        match self.peek() {
            Some('{') => {
                self.pos += 1;
                self.balanced('}')
            }
            Some('"') => {
                self.pos += 1;
                self.quoted()
            }
            Some(_) => {
                let bare = self.take_while(|c| {
                    !c.is_whitespace() && c != ',' && c != '#' && c != '}' && c != ')'
                });
                if bare.is_empty() {
                    return Err(self.error("empty field value"));
                }
                Ok(bare)
            }
            None => Err(self.error("missing field value")),
        }
    }

    fn value(&mut self) -> Result<FieldValue> {
        let start = self.pos;
        let first = self.value_part()?;
        let first_kind = self.chars[start..self.pos]
            .iter()
            .find(|c| !c.is_whitespace())
            .copied();
        self.skip_ws();
        if self.peek() != Some('#') {
            return Ok(match first_kind {
                Some('{') | Some('"') => FieldValue::Delimited(first),
                _ => FieldValue::Bare(first),
            });
        }
        while self.peek() == Some('#') {
            self.pos += 1;
            self.value_part()?;
            self.skip_ws();
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        Ok(FieldValue::Bare(raw.trim().to_string()))
    }

    fn entry_body(&mut self, entry_type: String, close: char) -> Result<Entry> {
        self.skip_ws();
        let key = self
            .take_while(|c| c != ',' && c != close && !c.is_whitespace())
            .trim()
            .to_string();
        let mut fields = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some(c) if c == close => {
                    self.pos += 1;
                    break;
                }
                Some(_) => return Err(self.error(format!("unexpected text in entry `{key}`"))),
                None => return Err(self.error(format!("unterminated entry `{key}`"))),
            }
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                break;
            }
            let name = self.take_while(|c| {
                !c.is_whitespace() && c != '=' && c != ',' && c != close
            });
            if name.is_empty() {
                return Err(self.error(format!("missing field name in entry `{key}`")));
            }
            self.expect('=')?;
            let value = self.value()?;
            fields.push((name, value));
        }
        Ok(Entry {
            entry_type,
            key,
            fields,
        })
    }
}

pub fn parse(text: &str, source: &str) -> Result<BibFile> {
    let mut cur = Cursor::new(text, source);
    let mut blocks = Vec::new();
    loop {
        while cur.peek().is_some_and(|c| c != '@') {
            cur.pos += 1;
        }
        let start = cur.pos;
        if cur.bump().is_none() {
            break;
        }
        let entry_type = cur.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        cur.skip_ws();
        let open = match cur.peek() {
            Some('{') => '{',
            Some('(') => '(',
            // A stray `@` in comment text, not a block.
            _ => continue,
        };
        cur.pos += 1;
        let close = if open == '{' { '}' } else { ')' };
        match entry_type.to_ascii_lowercase().as_str() {
            "string" | "preamble" | "comment" => {
                cur.balanced(close)?;
                let raw: String = cur.chars[start..cur.pos].iter().collect();
                blocks.push(Block::Raw(raw));
            }
            _ => {
                let entry = cur.entry_body(entry_type, close)?;
                blocks.push(Block::Entry(entry));
            }
        }
    }
    Ok(BibFile { blocks })
}

fn normalize_doi(value: &str) -> String {
    value.trim().trim_start_matches(DOI_URL_PREFIX).to_string()
}

impl BibFile {
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Entry(e) => Some(e),
            Block::Raw(_) => None,
        })
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.blocks.iter_mut().filter_map(|b| match b {
            Block::Entry(e) => Some(e),
            Block::Raw(_) => None,
        })
    }

    pub fn keys(&self) -> BTreeSet<String> {
        self.entries().map(|e| e.key.clone()).collect()
    }

    pub fn push(&mut self, entry: Entry) {
        self.blocks.push(Block::Entry(entry));
    }

    /// Raw blocks first, then entries ordered by key. Stable, so duplicate
    /// keys survive in their original order.
    pub fn sort(&mut self) {
        self.blocks.sort_by(|a, b| match (a, b) {
            (Block::Raw(_), Block::Raw(_)) => std::cmp::Ordering::Equal,
            (Block::Raw(_), Block::Entry(_)) => std::cmp::Ordering::Less,
            (Block::Entry(_), Block::Raw(_)) => std::cmp::Ordering::Greater,
            (Block::Entry(x), Block::Entry(y)) => x.key.trim().cmp(y.key.trim()),
        });
    }

    /// Lowercase types and field names, decode LaTeX accents, strip the
    /// resolver prefix from DOIs and sort.
    pub fn normalize(&mut self) {
        for entry in self.entries_mut() {
            entry.entry_type = entry.entry_type.to_ascii_lowercase();
            for (name, value) in entry.fields.iter_mut() {
                *name = name.to_ascii_lowercase();
                *value = value.map_delimited(latex::decode);
                if name == "doi" {
                    *value = value.map_delimited(normalize_doi);
                }
            }
        }
        self.sort();
    }

    pub fn latex_encoded(&self) -> BibFile {
        let mut out = self.clone();
        for entry in out.entries_mut() {
            for (_, value) in entry.fields.iter_mut() {
                *value = value.map_delimited(latex::encode);
            }
        }
        out
    }

    pub fn render(&self) -> String {
        let parts: Vec<String> = self
            .blocks
            .iter()
            .map(|b| match b {
                Block::Entry(e) => render_entry(e),
                Block::Raw(raw) => raw.trim().to_string(),
            })
            .collect();
        if parts.is_empty() {
            return String::new();
        }
        format!("{}\n", parts.join(BLOCK_SEPARATOR))
    }
}

pub fn render_entry(entry: &Entry) -> String {
    let mut out = format!("@{}{{{}", entry.entry_type, entry.key);
    for (name, value) in &entry.fields {
        out.push_str(",\n");
        match value {
            FieldValue::Delimited(v) => out.push_str(&format!("\t{name} = {{{v}}}")),
            FieldValue::Bare(v) => out.push_str(&format!("\t{name} = {v}")),
        }
    }
    if entry.fields.is_empty() {
        out.push_str(",\n}");
    } else {
        out.push_str("\n}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format_str(text: &str, source: &str) -> Result<String> {
        let mut file = parse(text, source)?;
        file.normalize();
        Ok(file.render())
    }

    const SAMPLE: &str = r#"
% leading comment is ignored
@Article{Smith-2020-Origami,
  Author = {Sch{\"o}n, Anna and Smith, John},
  title = "Folding {Paper} Robots",
  year = 2020,
  doi = {https://doi.org/10.1000/xyz},
  journal = jnl # " Letters",
}

@string{jnl = "Robotics"}

@book(Adams-1999-History,
  title = {A {History} of Things}
)
"#;

    #[test]
    fn parses_entries_and_raw_blocks() {
        let file = parse(SAMPLE, "sample.bib").expect("parse");
        assert_eq!(file.blocks.len(), 3);
        let entries: Vec<_> = file.entries().collect();
        assert_eq!(entries[0].key, "Smith-2020-Origami");
        assert_eq!(entries[0].entry_type, "Article");
        assert_eq!(entries[0].field("title"), Some("Folding {Paper} Robots"));
        assert_eq!(entries[0].field("YEAR"), Some("2020"));
        assert_eq!(
            entries[0].fields[4].1,
            FieldValue::Bare("jnl # \" Letters\"".to_string())
        );
        assert_eq!(entries[1].entry_type, "book");
        assert!(matches!(&file.blocks[1], Block::Raw(raw) if raw.starts_with("@string")));
    }

    #[test]
    fn normalize_sorts_decodes_and_strips_doi_prefix() {
        let out = format_str(SAMPLE, "sample.bib").expect("format");
        let blocks: Vec<&str> = out.trim_end().split("\n\n\n").collect();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].starts_with("@string"));
        assert!(blocks[1].starts_with("@book{Adams-1999-History,"));
        assert!(blocks[2].starts_with("@article{Smith-2020-Origami,"));
        assert!(blocks[2].contains("\tauthor = {Schön, Anna and Smith, John},"));
        assert!(blocks[2].contains("\tdoi = {10.1000/xyz},"));
        assert!(blocks[2].contains("\tyear = 2020,"));
        assert!(blocks[2].ends_with("\n}"));
        assert!(out.ends_with("}\n"));
    }

    #[test]
    fn formatting_is_idempotent() {
        let once = format_str(SAMPLE, "sample.bib").expect("format");
        let twice = format_str(&once, "sample.bib").expect("format");
        assert_eq!(once, twice);
    }

    #[test]
    fn duplicate_keys_are_preserved() {
        let text = "@misc{B-2000-X, title={1}}\n@misc{A-2000-X, title={2}}\n@misc{B-2000-X, title={3}}";
        let mut file = parse(text, "dup.bib").expect("parse");
        file.normalize();
        let titles: Vec<_> = file.entries().map(|e| e.field("title").unwrap_or("")).collect();
        assert_eq!(titles, vec!["2", "1", "3"]);
    }

    #[test]
    fn reports_unterminated_entries() {
        let err = parse("@article{Key,\n title = {open", "bad.bib").expect_err("error");
        assert!(format!("{err:#}").contains("bad.bib"));
    }

    #[test]
    fn latex_encoding_touches_only_delimited_values() {
        let file = parse("@misc{K-2000-T, author = {Gödel & Co}, year = 2000}", "x.bib")
            .expect("parse");
        let rendered = file.latex_encoded().render();
        assert!(rendered.contains(r#"author = {G{\"o}del \& Co}"#));
        assert!(rendered.contains("year = 2000"));
    }
}
