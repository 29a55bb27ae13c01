//! `meta.xml` for ODF packages.

use crate::extraction::archive::Members;
use crate::extraction::xml;
use crate::types::DocumentMetadata;

pub const META_PATH: &str = "meta.xml";

/// Fill `metadata` from `meta.xml` when the member exists.
pub fn apply_odf_properties(members: &Members, metadata: &mut DocumentMetadata) {
    let Some(content) = members.text(META_PATH) else {
        return;
    };
    let doc = match xml::parse_document(&content, META_PATH) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("ignoring unreadable meta.xml: {e}");
            return;
        }
    };
    let root = doc.root_element();

    metadata.title = super::parse_xml_text(root, "title");
    metadata.subject = super::parse_xml_text(root, "subject");
    metadata.author =
        super::parse_xml_text(root, "initial-creator").or_else(|| super::parse_xml_text(root, "creator"));
    metadata.last_modified_by = super::parse_xml_text(root, "creator");
    metadata.description = super::parse_xml_text(root, "description");
    metadata.keywords = {
        let keywords: Vec<String> = xml::descendants(root, "keyword")
            .filter_map(|n| n.text())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        (!keywords.is_empty()).then(|| keywords.join(", "))
    };
    metadata.created = super::parse_xml_text(root, "creation-date");
    metadata.modified = super::parse_xml_text(root, "date");

    if let Some(stats) = xml::descendant(root, "document-statistic") {
        metadata.pages = xml::attr_usize(stats, "page-count");
    }
    for key in ["language", "generator"] {
        if let Some(value) = super::parse_xml_text(root, key) {
            metadata.additional.insert(key.to_string(), serde_json::Value::String(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::archive::test_support::zip_bytes;

    const META_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-meta xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0"
    xmlns:meta="urn:oasis:names:tc:opendocument:xmlns:meta:1.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <office:meta>
    <meta:generator>LibreOffice/7.6</meta:generator>
    <dc:title>Minutes</dc:title>
    <meta:initial-creator>Alice</meta:initial-creator>
    <dc:creator>Bob</dc:creator>
    <meta:keyword>board</meta:keyword>
    <meta:keyword>2024</meta:keyword>
    <meta:creation-date>2024-02-03T09:00:00</meta:creation-date>
    <dc:date>2024-02-04T09:00:00</dc:date>
    <meta:document-statistic meta:page-count="3" meta:word-count="120"/>
  </office:meta>
</office:document-meta>"#;

    #[test]
    fn test_apply_odf_properties() {
        let bytes = zip_bytes(&[(META_PATH, META_XML.as_bytes())]);
        let members = Members::extract(&bytes, |_| true).unwrap();
        let mut metadata = DocumentMetadata::default();
        apply_odf_properties(&members, &mut metadata);

        assert_eq!(metadata.title.as_deref(), Some("Minutes"));
        assert_eq!(metadata.author.as_deref(), Some("Alice"));
        assert_eq!(metadata.last_modified_by.as_deref(), Some("Bob"));
        assert_eq!(metadata.keywords.as_deref(), Some("board, 2024"));
        assert_eq!(metadata.modified.as_deref(), Some("2024-02-04T09:00:00"));
        assert_eq!(metadata.pages, Some(3));
        assert_eq!(metadata.additional["generator"], "LibreOffice/7.6");
    }
}
