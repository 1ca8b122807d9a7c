use anyhow::{Context, Result};
use lopdf::{Dictionary, Document, Object};
use std::path::Path;

/// Document-information fields publishers fill in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfMetadata {
    pub author: String,
    pub title: String,
    pub subject: String,
}

/// PDF text strings are either UTF-16BE with a byte-order mark or
/// PDFDocEncoding, which agrees with Latin-1 for printable text.
pub fn decode_pdf_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if bytes.len() >= 3 && bytes[..3] == [0xEF, 0xBB, 0xBF] {
        return String::from_utf8_lossy(&bytes[3..]).to_string();
    }
    bytes.iter().map(|b| char::from(*b)).collect()
}

fn text_field(info: Option<&Dictionary>, key: &[u8]) -> String {
    let Some(info) = info else {
        return String::new();
    };
    match info.get(key) {
        Ok(Object::String(bytes, _)) => decode_pdf_text(bytes).trim().to_string(),
        _ => String::new(),
    }
}

pub fn read_metadata(path: &Path) -> Result<PdfMetadata> {
    let doc = Document::load(path).with_context(|| format!("failed to open {}", path.display()))?;
    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    Ok(PdfMetadata {
        author: text_field(info, b"Author"),
        title: text_field(info, b"Title"),
        subject: text_field(info, b"Subject"),
    })
}

#[cfg(test)]
mod tests {
    use super::decode_pdf_text;

    #[test]
    fn decodes_utf16_with_bom() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "Gödel".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_pdf_text(&bytes), "Gödel");
    }

    #[test]
    fn decodes_single_byte_text() {
        assert_eq!(decode_pdf_text(b"Smith, J."), "Smith, J.");
        assert_eq!(decode_pdf_text(&[0x47, 0xF6, 0x64]), "Göd");
    }
}
