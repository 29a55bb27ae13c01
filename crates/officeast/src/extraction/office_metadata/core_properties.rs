//! `docProps/core.xml` for OOXML packages.

use crate::extraction::archive::Members;
use crate::extraction::xml;
use crate::types::DocumentMetadata;

pub const CORE_PROPERTIES_PATH: &str = "docProps/core.xml";

/// Fill `metadata` from `docProps/core.xml` when the member exists.
pub fn apply_core_properties(members: &Members, metadata: &mut DocumentMetadata) {
    let Some(content) = members.text(CORE_PROPERTIES_PATH) else {
        return;
    };
    let doc = match xml::parse_document(&content, CORE_PROPERTIES_PATH) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("ignoring unreadable core properties: {e}");
            return;
        }
    };
    let root = doc.root_element();

    metadata.title = super::parse_xml_text(root, "title");
    metadata.subject = super::parse_xml_text(root, "subject");
    metadata.author = super::parse_xml_text(root, "creator");
    metadata.description = super::parse_xml_text(root, "description");
    metadata.keywords = super::parse_xml_text(root, "keywords");
    metadata.last_modified_by = super::parse_xml_text(root, "lastModifiedBy");
    metadata.created = super::parse_xml_text(root, "created");
    metadata.modified = super::parse_xml_text(root, "modified");

    for key in ["language", "category", "revision"] {
        if let Some(value) = super::parse_xml_text(root, key) {
            metadata.additional.insert(key.to_string(), serde_json::Value::String(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::archive::test_support::zip_bytes;

    const CORE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
    xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/">
  <dc:title>Quarterly Report</dc:title>
  <dc:creator>Jane Doe</dc:creator>
  <cp:keywords>finance, q3</cp:keywords>
  <cp:lastModifiedBy>John Roe</cp:lastModifiedBy>
  <dcterms:created>2024-01-01T10:00:00Z</dcterms:created>
  <dc:language>en-US</dc:language>
  <dc:subject>   </dc:subject>
</cp:coreProperties>"#;

    #[test]
    fn test_apply_core_properties() {
        let bytes = zip_bytes(&[(CORE_PROPERTIES_PATH, CORE_XML.as_bytes())]);
        let members = Members::extract(&bytes, |_| true).unwrap();
        let mut metadata = DocumentMetadata::default();
        apply_core_properties(&members, &mut metadata);

        assert_eq!(metadata.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(metadata.author.as_deref(), Some("Jane Doe"));
        assert_eq!(metadata.keywords.as_deref(), Some("finance, q3"));
        assert_eq!(metadata.last_modified_by.as_deref(), Some("John Roe"));
        assert_eq!(metadata.created.as_deref(), Some("2024-01-01T10:00:00Z"));
        assert!(metadata.subject.is_none());
        assert_eq!(metadata.additional["language"], "en-US");
    }

    #[test]
    fn test_missing_or_malformed_core_properties_are_ignored() {
        let bytes = zip_bytes(&[(CORE_PROPERTIES_PATH, b"<broken")]);
        let members = Members::extract(&bytes, |_| true).unwrap();
        let mut metadata = DocumentMetadata::default();
        apply_core_properties(&members, &mut metadata);
        assert!(metadata.title.is_none());

        let empty = Members::default();
        apply_core_properties(&empty, &mut metadata);
        assert!(metadata.title.is_none());
    }
}
