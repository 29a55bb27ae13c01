//! XML DOM access on top of `roxmltree`.
//!
//! Office schemas use stable prefixes but not always stable namespace URIs
//! (strict vs transitional OOXML, ODF 1.0 vs 1.2), so lookups here go by local
//! name. Callers that need to disambiguate colliding local names use
//! [`attr_ns`] instead.

use roxmltree::{Document, Node, ParsingOptions};

use crate::error::{OfficeError, Result};

pub const RELS_NAMESPACE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Parse `xml`, reporting failures as corruption of `path`.
pub fn parse_document<'i>(xml: &'i str, path: &str) -> Result<Document<'i>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(xml, options)
        .map_err(|e| OfficeError::corrupted(format!("invalid XML: {e}"), Some(path)))
}

pub fn local_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

pub fn is(node: Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// First element child with local name `name`.
pub fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| is(*n, name))
}

/// All element children with local name `name`.
pub fn children<'a, 'i: 'a>(node: Node<'a, 'i>, name: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children().filter(move |n| is(*n, name))
}

pub fn elements<'a, 'i: 'a>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children().filter(|n| n.is_element())
}

/// First descendant element (excluding `node`) with local name `name`.
pub fn descendant<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.descendants().skip(1).find(|n| is(*n, name))
}

pub fn descendants<'a, 'i: 'a>(node: Node<'a, 'i>, name: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.descendants().skip(1).filter(move |n| is(*n, name))
}

/// Follow a chain of child names (`path(root, &["plotArea", "barChart"])`).
pub fn path<'a, 'i>(node: Node<'a, 'i>, names: &[&str]) -> Option<Node<'a, 'i>> {
    names.iter().try_fold(node, |current, name| child(current, name))
}

/// Attribute value by local name, whatever its prefix.
pub fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes().find(|a| a.name() == name).map(|a| a.value())
}

/// Attribute value by namespace URI and local name.
pub fn attr_ns<'a>(node: Node<'a, '_>, namespace: &str, name: &str) -> Option<&'a str> {
    node.attribute((namespace, name))
}

/// Relationship id attribute (`r:id`, `r:embed`, ...).
pub fn rel_attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    attr_ns(node, RELS_NAMESPACE, name).or_else(|| {
        node.attributes()
            .find(|a| a.name() == name && a.namespace().is_some_and(|ns| ns.ends_with("/relationships")))
            .map(|a| a.value())
    })
}

pub fn attr_usize(node: Node<'_, '_>, name: &str) -> Option<usize> {
    attr(node, name).and_then(|v| v.trim().parse().ok())
}

/// OOXML on/off attribute: absent value, `1`, `true` and `on` mean true.
pub fn attr_toggle(node: Node<'_, '_>, name: &str) -> bool {
    match attr(node, name) {
        None => true,
        Some(v) => !matches!(v, "0" | "false" | "off" | "none"),
    }
}

/// Concatenated text of all descendant text nodes.
pub fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Concatenated text of descendants with local name `name` (`a:t`, `w:t`, ...).
pub fn joined_text(node: Node<'_, '_>, name: &str) -> String {
    node.descendants()
        .filter(|n| is(*n, name))
        .filter_map(|n| n.text())
        .collect()
}

/// Verbatim source slice of `node`.
pub fn raw_xml(source: &str, node: Node<'_, '_>) -> String {
    source.get(node.range()).unwrap_or_default().to_string()
}

/// Raw slice only when `keep` is set.
pub fn raw_if(keep: bool, source: &str, node: Node<'_, '_>) -> Option<String> {
    keep.then(|| raw_xml(source, node))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<w:document xmlns:w="urn:w" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <w:body><w:p w:rsid="1"><w:r><w:t>Hello</w:t></w:r><w:r><w:t> world</w:t></w:r><w:hyperlink r:id="rId3"/></w:p></w:body>
</w:document>"#;

    #[test]
    fn test_parse_and_navigate() {
        let doc = parse_document(SAMPLE, "word/document.xml").unwrap();
        let para = path(doc.root_element(), &["body", "p"]).unwrap();
        assert_eq!(local_name(para), "p");
        assert_eq!(attr(para, "rsid"), Some("1"));
        assert_eq!(joined_text(para, "t"), "Hello world");
        assert_eq!(children(para, "r").count(), 2);
        let link = child(para, "hyperlink").unwrap();
        assert_eq!(rel_attr(link, "id"), Some("rId3"));
    }

    #[test]
    fn test_invalid_xml_is_corrupted_with_path() {
        let err = parse_document("<a><b></a>", "content.xml").unwrap_err();
        assert!(err.is_corrupted());
        assert!(err.to_string().contains("content.xml"));
    }

    #[test]
    fn test_raw_xml_slice() {
        let doc = parse_document(SAMPLE, "x").unwrap();
        let t = descendant(doc.root_element(), "t").unwrap();
        assert_eq!(raw_xml(SAMPLE, t), "<w:t>Hello</w:t>");
        assert!(raw_if(false, SAMPLE, t).is_none());
    }

    #[test]
    fn test_attr_toggle() {
        let doc = parse_document(r#"<r><b/><i val="0"/><u val="true"/></r>"#, "x").unwrap();
        let root = doc.root_element();
        assert!(attr_toggle(child(root, "b").unwrap(), "val"));
        assert!(!attr_toggle(child(root, "i").unwrap(), "val"));
        assert!(attr_toggle(child(root, "u").unwrap(), "val"));
    }
}
