//! Conversion between LaTeX accent macros and Unicode for BibTeX field values.
//!
//! Only the accents and special letters that show up in author names and
//! titles are covered. `\&` is kept escaped in both directions so the
//! decoded files stay usable by LaTeX tooling.

const ACCENTS: &[(char, char, char)] = &[
    ('\'', 'a', 'á'),
    ('\'', 'e', 'é'),
    ('\'', 'i', 'í'),
    ('\'', 'o', 'ó'),
    ('\'', 'u', 'ú'),
    ('\'', 'y', 'ý'),
    ('\'', 'c', 'ć'),
    ('\'', 'n', 'ń'),
    ('\'', 's', 'ś'),
    ('\'', 'z', 'ź'),
    ('\'', 'A', 'Á'),
    ('\'', 'E', 'É'),
    ('\'', 'I', 'Í'),
    ('\'', 'O', 'Ó'),
    ('\'', 'U', 'Ú'),
    ('\'', 'Y', 'Ý'),
    ('\'', 'C', 'Ć'),
    ('\'', 'N', 'Ń'),
    ('\'', 'S', 'Ś'),
    ('\'', 'Z', 'Ź'),
    ('`', 'a', 'à'),
    ('`', 'e', 'è'),
    ('`', 'i', 'ì'),
    ('`', 'o', 'ò'),
    ('`', 'u', 'ù'),
    ('`', 'A', 'À'),
    ('`', 'E', 'È'),
    ('`', 'I', 'Ì'),
    ('`', 'O', 'Ò'),
    ('`', 'U', 'Ù'),
    ('^', 'a', 'â'),
    ('^', 'e', 'ê'),
    ('^', 'i', 'î'),
    ('^', 'o', 'ô'),
    ('^', 'u', 'û'),
    ('^', 'A', 'Â'),
    ('^', 'E', 'Ê'),
    ('^', 'I', 'Î'),
    ('^', 'O', 'Ô'),
    ('^', 'U', 'Û'),
    ('"', 'a', 'ä'),
    ('"', 'e', 'ë'),
    ('"', 'i', 'ï'),
    ('"', 'o', 'ö'),
    ('"', 'u', 'ü'),
    ('"', 'y', 'ÿ'),
    ('"', 'A', 'Ä'),
    ('"', 'E', 'Ë'),
    ('"', 'I', 'Ï'),
    ('"', 'O', 'Ö'),
    ('"', 'U', 'Ü'),
    ('~', 'a', 'ã'),
    ('~', 'n', 'ñ'),
    ('~', 'o', 'õ'),
    ('~', 'A', 'Ã'),
    ('~', 'N', 'Ñ'),
    ('~', 'O', 'Õ'),
    ('c', 'c', 'ç'),
    ('c', 's', 'ş'),
    ('c', 'C', 'Ç'),
    ('c', 'S', 'Ş'),
    ('v', 'c', 'č'),
    ('v', 'e', 'ě'),
    ('v', 'r', 'ř'),
    ('v', 's', 'š'),
    ('v', 'z', 'ž'),
    ('v', 'C', 'Č'),
    ('v', 'E', 'Ě'),
    ('v', 'R', 'Ř'),
    ('v', 'S', 'Š'),
    ('v', 'Z', 'Ž'),
    ('=', 'a', 'ā'),
    ('=', 'e', 'ē'),
    ('=', 'i', 'ī'),
    ('=', 'o', 'ō'),
    ('=', 'u', 'ū'),
    ('.', 'z', 'ż'),
    ('.', 'Z', 'Ż'),
    ('r', 'a', 'å'),
    ('r', 'A', 'Å'),
    ('H', 'o', 'ő'),
    ('H', 'u', 'ű'),
    ('H', 'O', 'Ő'),
    ('H', 'U', 'Ű'),
    ('u', 'a', 'ă'),
    ('u', 'g', 'ğ'),
    ('u', 'A', 'Ă'),
    ('u', 'G', 'Ğ'),
    ('k', 'a', 'ą'),
    ('k', 'e', 'ę'),
    ('k', 'A', 'Ą'),
    ('k', 'E', 'Ę'),
];

const LETTERS: &[(&str, char)] = &[
    ("ss", 'ß'),
    ("ae", 'æ'),
    ("AE", 'Æ'),
    ("oe", 'œ'),
    ("OE", 'Œ'),
    ("aa", 'å'),
    ("AA", 'Å'),
    ("o", 'ø'),
    ("O", 'Ø'),
    ("l", 'ł'),
    ("L", 'Ł'),
    ("i", 'ı'),
];

fn is_symbol_accent(c: char) -> bool {
    matches!(c, '\'' | '`' | '^' | '"' | '~' | '=' | '.')
}

fn is_letter_accent(c: char) -> bool {
    matches!(c, 'c' | 'v' | 'r' | 'H' | 'u' | 'k')
}

fn compose(accent: char, base: char) -> Option<char> {
    ACCENTS
        .iter()
        .find(|(a, b, _)| *a == accent && *b == base)
        .map(|(_, _, out)| *out)
}

fn decompose(c: char) -> Option<(char, char)> {
    if c == 'å' || c == 'Å' {
        // Prefer `\aa` / `\AA` on the way out.
        return None;
    }
    ACCENTS
        .iter()
        .find(|(_, _, out)| *out == c)
        .map(|(a, b, _)| (*a, *b))
}

/// Base letter of an accent argument: `e`, `{e}`, `\i`, `{\i}`.
fn accent_base(chars: &[char], mut pos: usize) -> Option<(char, usize)> {
    while pos < chars.len() && chars[pos] == ' ' {
        pos += 1;
    }
    let braced = chars.get(pos) == Some(&'{');
    if braced {
        pos += 1;
    }
    let base = match (chars.get(pos), chars.get(pos + 1)) {
        (Some('\\'), Some('i')) => {
            pos += 2;
            'i'
        }
        (Some('\\'), Some('j')) => {
            pos += 2;
            'j'
        }
        (Some(c), _) if c.is_ascii_alphabetic() => {
            pos += 1;
            *c
        }
        _ => return None,
    };
    if braced {
        if chars.get(pos) != Some(&'}') {
            return None;
        }
        pos += 1;
    }
    Some((base, pos))
}

/// Try to decode a macro starting at `chars[pos] == '\\'`.
/// Returns the decoded char and the position after the macro.
fn decode_macro(chars: &[char], pos: usize) -> Option<(char, usize)> {
    let accent = *chars.get(pos + 1)?;
    if is_symbol_accent(accent) {
        let (base, end) = accent_base(chars, pos + 2)?;
        return compose(accent, base).map(|c| (c, end));
    }
    if is_letter_accent(accent) {
        // `\c{c}` or `\c c`, but not `\copyright`.
        let next = chars.get(pos + 2)?;
        if *next == '{' || *next == ' ' {
            let (base, end) = accent_base(chars, pos + 2)?;
            if let Some(c) = compose(accent, base) {
                return Some((c, end));
            }
        }
    }
    for (name, out) in LETTERS {
        let name_chars: Vec<char> = name.chars().collect();
        let end = pos + 1 + name_chars.len();
        if chars.get(pos + 1..end) == Some(&name_chars[..])
            && !chars.get(end).is_some_and(|c| c.is_ascii_alphabetic())
        {
            let end = if chars.get(end) == Some(&' ') { end + 1 } else { end };
            return Some((*out, end));
        }
    }
    None
}

pub fn decode(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '{' && chars.get(i + 1) == Some(&'\\') {
            if let Some((decoded, end)) = decode_macro(&chars, i + 1)
                && chars.get(end) == Some(&'}')
            {
                out.push(decoded);
                i = end + 1;
                continue;
            }
        }
        if c == '\\' {
            if chars.get(i + 1) == Some(&'&') {
                out.push_str("\\&");
                i += 2;
                continue;
            }
            if let Some((decoded, end)) = decode_macro(&chars, i) {
                out.push(decoded);
                i = end;
                continue;
            }
        }
        if c == '&' {
            out.push_str("\\&");
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

pub fn encode(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    for (i, c) in chars.iter().copied().enumerate() {
        if c == '&' {
            if i > 0 && chars[i - 1] == '\\' {
                out.push('&');
            } else {
                out.push_str("\\&");
            }
            continue;
        }
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        match c {
            '–' => {
                out.push_str("--");
                continue;
            }
            '—' => {
                out.push_str("---");
                continue;
            }
            _ => {}
        }
        if let Some((accent, base)) = decompose(c) {
            let base = if base == 'i' && accent != 'c' {
                "\\i".to_string()
            } else {
                base.to_string()
            };
            if is_symbol_accent(accent) {
                out.push_str(&format!("{{\\{accent}{base}}}"));
            } else {
                out.push_str(&format!("{{\\{accent}{{{base}}}}}"));
            }
            continue;
        }
        if let Some((name, _)) = LETTERS.iter().find(|(_, out)| *out == c) {
            out.push_str(&format!("{{\\{name}}}"));
            continue;
        }
        out.push(c);
    }
    out
}
