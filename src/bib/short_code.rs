use crate::error::BibError;
use regex::Regex;
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub const CATEGORY_SEPARATOR: &str = "::";

const MAX_DISPLAY_CHARS: usize = 63;
const DISPLAY_HEAD_CHARS: usize = 40;
const DISPLAY_TAIL_CHARS: usize = 20;

/// `AUTHOR-YEAR-THEME[-SUFFIX]`, the identifier shared by BibTeX keys and
/// asset file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortCode {
    pub author: String,
    pub year: String,
    pub theme: String,
    pub suffix: Option<String>,
}

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-([0-9]{4})-").expect("static regex"))
}

pub fn strip_category(raw: &str) -> &str {
    match raw.rsplit_once(CATEGORY_SEPARATOR) {
        Some((_, code)) => code,
        None => raw,
    }
}

pub fn qualified(category: &str, code: &str) -> String {
    format!("{category}{CATEGORY_SEPARATOR}{code}")
}

impl ShortCode {
    pub fn parse(raw: &str) -> Option<Self> {
        let code = strip_category(raw);
        let caps = year_pattern().captures(code)?;
        let whole = caps.get(0)?;
        let year = caps.get(1)?.as_str().to_string();
        let author = code[..whole.start()].to_string();
        let rest = &code[whole.end()..];

        let (theme, suffix) = match rest.rsplit_once('-') {
            Some((head, tail)) if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) => {
                (head.to_string(), Some(tail.to_string()))
            }
            _ => (rest.to_string(), None),
        };

        Some(Self {
            author,
            year,
            theme,
            suffix,
        })
    }

    pub fn year_number(&self) -> u32 {
        self.year.parse().unwrap_or(0)
    }

    /// Theme including the numeric suffix, as used to group galleries.
    pub fn theme_with_suffix(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}-{}", self.theme, suffix),
            None => self.theme.clone(),
        }
    }

    pub fn with_theme(&self, theme: &str) -> Self {
        Self {
            theme: theme.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.author, self.year, self.theme)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "-{suffix}")?;
        }
        Ok(())
    }
}

impl FromStr for ShortCode {
    type Err = BibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| BibError::InvalidShortCode(s.to_string()))
    }
}

/// Theme of a raw code, empty when the code does not parse.
pub fn theme_of(raw: &str) -> String {
    ShortCode::parse(raw).map(|c| c.theme).unwrap_or_default()
}

/// Shorten long file names for log lines.
pub fn compress(input: &str) -> String {
    let count = input.chars().count();
    if count <= MAX_DISPLAY_CHARS {
        return input.to_string();
    }
    let head: String = input.chars().take(DISPLAY_HEAD_CHARS).collect();
    let tail: String = input.chars().skip(count - DISPLAY_TAIL_CHARS).collect();
    format!("{head}...{tail}")
}

pub type GallerySortKey = (String, Reverse<u32>, String, String);

/// Ordering of gallery images: theme (with suffix), newest first, author, title.
pub fn gallery_sort_key(code: &str, title: &str) -> GallerySortKey {
    match ShortCode::parse(code) {
        Some(parsed) => (
            parsed.theme_with_suffix(),
            Reverse(parsed.year_number()),
            parsed.author,
            title.to_string(),
        ),
        None => (code.to_string(), Reverse(0), String::new(), title.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_code() {
        let code = ShortCode::parse("Smith-2020-Origami").expect("parse");
        assert_eq!(code.author, "Smith");
        assert_eq!(code.year, "2020");
        assert_eq!(code.theme, "Origami");
        assert_eq!(code.suffix, None);
        assert_eq!(code.to_string(), "Smith-2020-Origami");
    }

    #[test]
    fn splits_numeric_suffix_from_theme() {
        let code = ShortCode::parse("Wei-2018-Geometry-Partition-2").expect("parse");
        assert_eq!(code.theme, "Geometry-Partition");
        assert_eq!(code.suffix.as_deref(), Some("2"));
        assert_eq!(code.theme_with_suffix(), "Geometry-Partition-2");
        assert_eq!(code.to_string(), "Wei-2018-Geometry-Partition-2");
    }

    #[test]
    fn keeps_single_word_numeric_theme() {
        let code = ShortCode::parse("Lee-2019-3DP").expect("parse");
        assert_eq!(code.theme, "3DP");
        assert_eq!(code.suffix, None);

        let code = ShortCode::parse("Lee-2019-4D-Printing").expect("parse");
        assert_eq!(code.theme, "4D-Printing");
    }

    #[test]
    fn strips_category_prefix() {
        let code = ShortCode::parse("Robotics::Van-Der-Berg-2001-Arms").expect("parse");
        assert_eq!(code.author, "Van-Der-Berg");
        assert_eq!(code.theme, "Arms");
        assert_eq!(strip_category("Robotics::X-2001-Y"), "X-2001-Y");
        assert_eq!(qualified("Robotics", "X-2001-Y"), "Robotics::X-2001-Y");
    }

    #[test]
    fn rejects_codes_without_year() {
        assert!(ShortCode::parse("Smith-Origami").is_none());
        assert!(ShortCode::parse("Smith-20201-Origami").is_none());
        assert!("nope".parse::<ShortCode>().is_err());
        assert_eq!(theme_of("nope"), "");
    }

    #[test]
    fn with_theme_keeps_suffix() {
        let code = ShortCode::parse("Wei-2018-Partition-3").expect("parse");
        assert_eq!(code.with_theme("Topology").to_string(), "Wei-2018-Topology-3");
    }

    #[test]
    fn compress_keeps_head_and_tail() {
        assert_eq!(compress("short"), "short");
        let long = "a".repeat(50) + &"b".repeat(30);
        let out = compress(&long);
        assert_eq!(out.chars().count(), 63);
        assert!(out.starts_with(&"a".repeat(40)));
        assert!(out.ends_with(&"b".repeat(20)));
    }

    #[test]
    fn gallery_order_is_theme_then_newest() {
        let mut items = vec![
            ("Smith-2018-B", "x"),
            ("Jones-2021-A", "y"),
            ("Adams-2021-A", "z"),
            ("Brown-2019-A", "w"),
        ];
        items.sort_by_key(|(code, title)| gallery_sort_key(code, title));
        let codes: Vec<_> = items.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            codes,
            vec!["Adams-2021-A", "Jones-2021-A", "Brown-2019-A", "Smith-2018-B"]
        );
    }
}
