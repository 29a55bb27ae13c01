//! Document-level metadata for the zipped office formats.
//!
//! - `docProps/core.xml` - Dublin Core properties of DOCX, XLSX and PPTX
//! - `meta.xml` - the ODF counterpart for ODT, ODP and ODS
//!
//! Both files are optional. A missing or unparsable member leaves the metadata
//! untouched instead of failing the parse.

pub mod core_properties;
pub mod odf_properties;

pub use core_properties::apply_core_properties;
pub use odf_properties::apply_odf_properties;

use roxmltree::Node;

/// Trimmed, non-empty text of the first descendant with local name `name`.
pub(crate) fn parse_xml_text(node: Node, name: &str) -> Option<String> {
    node.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
}
