//! `/Info` dictionary to document metadata.

use lopdf::{Document, Object};

use super::fonts::decode_text_string;
use super::resolve;
use crate::types::DocumentMetadata;

/// Fill `metadata` from the trailer's `/Info` dictionary, when there is one.
pub fn read_info(doc: &Document, depth: usize, metadata: &mut DocumentMetadata) {
    let Some(info) = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| resolve(doc, obj, depth))
        .and_then(|obj| obj.as_dict().ok())
    else {
        return;
    };

    let text = |key: &[u8]| match info.get(key).ok().and_then(|obj| resolve(doc, obj, depth)) {
        Some(Object::String(bytes, _)) => {
            let value = decode_text_string(bytes);
            let value = value.trim_matches(|c: char| c.is_whitespace() || c == '\0');
            (!value.is_empty()).then(|| value.to_string())
        }
        _ => None,
    };

    metadata.title = text(b"Title");
    metadata.subject = text(b"Subject");
    metadata.author = text(b"Author");
    metadata.keywords = text(b"Keywords");
    metadata.created = text(b"CreationDate").map(|d| parse_pdf_date(&d));
    metadata.modified = text(b"ModDate").map(|d| parse_pdf_date(&d));
    for (key, field) in [("creator", b"Creator".as_slice()), ("producer", b"Producer".as_slice())] {
        if let Some(value) = text(field) {
            metadata.additional.insert(key.to_string(), serde_json::Value::String(value));
        }
    }
}

/// `D:20230115123045+01'00'` to `2023-01-15T12:30:45Z`; unrecognised values are kept as-is.
fn parse_pdf_date(value: &str) -> String {
    let digits = value.trim().trim_start_matches("D:");
    let part = |range: std::ops::Range<usize>| digits.get(range).filter(|s| s.bytes().all(|b| b.is_ascii_digit()));

    let (Some(year), Some(month), Some(day)) = (part(0..4), part(4..6), part(6..8)) else {
        return value.to_string();
    };
    let hour = part(8..10).unwrap_or("00");
    let minute = part(10..12).unwrap_or("00");
    let second = part(12..14).unwrap_or("00");
    format!("{year}-{month}-{day}T{hour}:{minute}:{second}Z")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{StringFormat, dictionary};

    #[test]
    fn test_parse_pdf_date() {
        assert_eq!(parse_pdf_date("D:20230115123045+01'00'"), "2023-01-15T12:30:45Z");
        assert_eq!(parse_pdf_date("D:20230115"), "2023-01-15T00:00:00Z");
        assert_eq!(parse_pdf_date("yesterday"), "yesterday");
    }

    #[test]
    fn test_read_info() {
        let mut doc = Document::with_version("1.5");
        let info = doc.add_object(dictionary! {
            "Title" => Object::String(b"Quarterly report".to_vec(), StringFormat::Literal),
            "Author" => Object::String(vec![0xFE, 0xFF, 0x00, 0x41, 0x00, 0x64, 0x00, 0x61], StringFormat::Hexadecimal),
            "CreationDate" => Object::string_literal("D:20240305093000Z"),
            "Producer" => Object::string_literal("Writer"),
        });
        doc.trailer.set("Info", info);

        let mut metadata = DocumentMetadata::default();
        read_info(&doc, 4, &mut metadata);
        assert_eq!(metadata.title.as_deref(), Some("Quarterly report"));
        assert_eq!(metadata.author.as_deref(), Some("Ada"));
        assert_eq!(metadata.created.as_deref(), Some("2024-03-05T09:30:00Z"));
        assert_eq!(metadata.additional["producer"], "Writer");
        assert!(metadata.subject.is_none());
    }
}
