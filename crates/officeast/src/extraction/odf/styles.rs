//! ODF style resolution.
//!
//! `styles.xml` is loaded first, then the automatic styles of `content.xml`
//! into the same map, so a content-local style replaces a document style of
//! the same name. Parent chains (`style:parent-style-name`) are flattened once
//! after loading; lookups afterwards are plain map reads.

use indexmap::IndexMap;
use roxmltree::{Document, Node};
use std::collections::HashMap;

use crate::extraction::xml;
use crate::types::{Alignment, ListType, TextFormatting};

const MAX_PARENT_DEPTH: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct OdfStyle {
    pub formatting: TextFormatting,
    pub parent: Option<String>,
    pub alignment: Option<Alignment>,
    pub drop_cap: bool,
    pub list_style: Option<String>,
}

/// How items at one list level are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListLevelKind {
    Visible(ListType),
    /// No bullet, number or image: a layout-only list
    Hidden,
}

#[derive(Debug, Clone, Default)]
pub struct ListStyle {
    levels: HashMap<usize, ListLevelKind>,
}

impl ListStyle {
    fn any_visible(&self) -> bool {
        self.levels.values().any(|k| matches!(k, ListLevelKind::Visible(_)))
    }
}

#[derive(Debug, Default)]
pub struct OdfStyles {
    styles: IndexMap<String, OdfStyle>,
    list_styles: HashMap<String, ListStyle>,
}

impl OdfStyles {
    /// Load `styles.xml` (when present and readable) and the automatic styles of `content`.
    pub fn load(styles_xml: Option<&str>, content: &Document) -> Self {
        let mut styles = Self::default();

        if let Some(source) = styles_xml {
            match xml::parse_document(source, "styles.xml") {
                Ok(doc) => styles.read(doc.root_element()),
                Err(e) => tracing::debug!("ignoring unreadable styles.xml: {e}"),
            }
        }
        styles.read(content.root_element());
        styles.flatten();
        styles
    }

    fn read(&mut self, root: Node) {
        for section in xml::elements(root) {
            if !matches!(xml::local_name(section), "styles" | "automatic-styles" | "master-styles") {
                continue;
            }
            for node in xml::elements(section) {
                match xml::local_name(node) {
                    "style" | "default-style" => {
                        let name = match xml::local_name(node) {
                            "default-style" => format!("default:{}", xml::attr(node, "family").unwrap_or_default()),
                            _ => xml::attr(node, "name").unwrap_or_default().to_string(),
                        };
                        if !name.is_empty() {
                            self.styles.insert(name, parse_style(node));
                        }
                    }
                    "list-style" => {
                        if let Some(name) = xml::attr(node, "name") {
                            self.list_styles.insert(name.to_string(), parse_list_style(node));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn flatten(&mut self) {
        let names: Vec<String> = self.styles.keys().cloned().collect();
        for name in names {
            let mut chain = Vec::new();
            let mut current = self.styles.get(&name).and_then(|s| s.parent.clone());
            while let Some(parent) = current {
                if chain.len() >= MAX_PARENT_DEPTH || chain.contains(&parent) || parent == name {
                    break;
                }
                current = self.styles.get(&parent).and_then(|s| s.parent.clone());
                chain.push(parent);
            }

            let mut merged = OdfStyle::default();
            for ancestor in chain.iter().rev() {
                if let Some(style) = self.styles.get(ancestor) {
                    merged = merge_style(&merged, style);
                }
            }
            if let Some(own) = self.styles.get(&name) {
                let flat = merge_style(&merged, own);
                self.styles.insert(name, flat);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&OdfStyle> {
        self.styles.get(name)
    }

    /// Flat formatting of a named style (empty if unknown).
    pub fn formatting(&self, name: Option<&str>) -> TextFormatting {
        name.and_then(|n| self.styles.get(n))
            .map(|s| s.formatting.clone())
            .unwrap_or_default()
    }

    /// Render kind of `level` (0-based) in list style `name`.
    ///
    /// Unknown styles render as unordered lists; a known style without any
    /// visible level hides every level.
    pub fn list_level(&self, name: Option<&str>, level: usize) -> ListLevelKind {
        let Some(style) = name.and_then(|n| self.list_styles.get(n)) else {
            return ListLevelKind::Visible(ListType::Unordered);
        };
        match level.checked_add(1).and_then(|l| style.levels.get(&l)) {
            Some(kind) => *kind,
            None if style.any_visible() => ListLevelKind::Visible(ListType::Unordered),
            None => ListLevelKind::Hidden,
        }
    }

    /// Named, non-empty formatting records for the document metadata.
    pub fn style_map(&self) -> IndexMap<String, TextFormatting> {
        self.styles
            .iter()
            .filter(|(_, s)| !s.formatting.is_empty())
            .map(|(name, s)| (name.clone(), s.formatting.clone()))
            .collect()
    }
}

fn merge_style(base: &OdfStyle, own: &OdfStyle) -> OdfStyle {
    OdfStyle {
        formatting: base.formatting.merge(&own.formatting),
        parent: own.parent.clone(),
        alignment: own.alignment.or(base.alignment),
        drop_cap: own.drop_cap || base.drop_cap,
        list_style: own.list_style.clone().or_else(|| base.list_style.clone()),
    }
}

fn parse_style(node: Node) -> OdfStyle {
    let mut style = OdfStyle {
        parent: xml::attr(node, "parent-style-name").map(str::to_string),
        list_style: xml::attr(node, "list-style-name").map(str::to_string),
        ..Default::default()
    };

    if let Some(props) = xml::child(node, "text-properties") {
        style.formatting = text_properties(props);
    }
    if let Some(props) = xml::child(node, "paragraph-properties") {
        style.alignment = xml::attr(props, "text-align").and_then(Alignment::parse);
        style.drop_cap = xml::child(props, "drop-cap").is_some_and(|d| xml::attr_usize(d, "length").unwrap_or(1) > 0);
    }
    style
}

/// `style:text-properties` to a formatting record.
pub fn text_properties(props: Node) -> TextFormatting {
    let mut fmt = TextFormatting::default();

    if let Some(weight) = xml::attr(props, "font-weight") {
        fmt.bold = Some(weight == "bold" || weight.parse::<u32>().is_ok_and(|w| w >= 600));
    }
    if let Some(style) = xml::attr(props, "font-style") {
        fmt.italic = Some(matches!(style, "italic" | "oblique"));
    }
    if let Some(underline) = xml::attr(props, "text-underline-style") {
        fmt.underline = Some(underline != "none");
    }
    if let Some(strike) = xml::attr(props, "text-line-through-style") {
        fmt.strikethrough = Some(strike != "none");
    }
    if let Some(color) = xml::attr(props, "color") {
        fmt.color = Some(color.to_string());
    }
    if let Some(background) = xml::attr(props, "background-color").filter(|c| *c != "transparent") {
        fmt.background_color = Some(background.to_string());
    }
    if let Some(font) = xml::attr(props, "font-name").or_else(|| xml::attr(props, "font-family")) {
        fmt.font = Some(font.trim_matches('\'').to_string());
    }
    if let Some(size) = xml::attr(props, "font-size").and_then(parse_points) {
        fmt.size = Some(size);
    }
    if let Some(position) = xml::attr(props, "text-position") {
        let first = position.split_whitespace().next().unwrap_or_default();
        match first {
            "super" => fmt.superscript = Some(true),
            "sub" => fmt.subscript = Some(true),
            other => {
                let pct = other.trim_end_matches('%').parse::<f32>().unwrap_or(0.0);
                if pct > 0.0 {
                    fmt.superscript = Some(true);
                } else if pct < 0.0 {
                    fmt.subscript = Some(true);
                }
            }
        }
    }

    fmt
}

/// `12pt` -> 12.0. Relative sizes (`120%`) are not resolved.
fn parse_points(value: &str) -> Option<f32> {
    value.strip_suffix("pt")?.trim().parse().ok()
}

fn parse_list_style(node: Node) -> ListStyle {
    let mut levels = HashMap::new();
    for level in xml::elements(node) {
        let Some(index) = xml::attr_usize(level, "level") else {
            continue;
        };
        let kind = match xml::local_name(level) {
            "list-level-style-number" => match xml::attr(level, "num-format") {
                Some(fmt) if !fmt.is_empty() => ListLevelKind::Visible(ListType::Ordered),
                _ => ListLevelKind::Hidden,
            },
            "list-level-style-bullet" => match xml::attr(level, "bullet-char") {
                Some(ch) if !ch.trim().is_empty() => ListLevelKind::Visible(ListType::Unordered),
                _ => ListLevelKind::Hidden,
            },
            "list-level-style-image" => ListLevelKind::Visible(ListType::Unordered),
            _ => continue,
        };
        levels.insert(index, kind);
    }
    ListStyle { levels }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: &str = r##"<office:document-styles xmlns:office="urn:office" xmlns:style="urn:style" xmlns:fo="urn:fo" xmlns:text="urn:text">
  <office:styles>
    <style:style style:name="Base" style:family="paragraph"><style:text-properties fo:color="#112233" fo:font-size="11pt"/></style:style>
    <style:style style:name="Strong" style:family="text" style:parent-style-name="Base"><style:text-properties fo:font-weight="bold"/></style:style>
    <style:style style:name="Shadowed" style:family="text"><style:text-properties fo:font-style="italic"/></style:style>
  </office:styles>
</office:document-styles>"##;

    const CONTENT: &str = r#"<office:document-content xmlns:office="urn:office" xmlns:style="urn:style" xmlns:fo="urn:fo" xmlns:text="urn:text">
  <office:automatic-styles>
    <style:style style:name="Shadowed" style:family="text"><style:text-properties style:text-underline-style="solid"/></style:style>
    <style:style style:name="P1" style:family="paragraph" style:parent-style-name="Strong">
      <style:paragraph-properties fo:text-align="center"><style:drop-cap style:length="1"/></style:paragraph-properties>
      <style:text-properties style:text-position="super 58%"/>
    </style:style>
    <text:list-style style:name="L1">
      <text:list-level-style-number text:level="1" style:num-format="1"/>
      <text:list-level-style-bullet text:level="2" text:bullet-char="•"/>
    </text:list-style>
    <text:list-style style:name="Layout">
      <text:list-level-style-bullet text:level="1" text:bullet-char=""/>
      <text:list-level-style-number text:level="2" style:num-format=""/>
    </text:list-style>
  </office:automatic-styles>
</office:document-content>"#;

    fn load() -> OdfStyles {
        let content = xml::parse_document(CONTENT, "content.xml").unwrap();
        OdfStyles::load(Some(STYLES), &content)
    }

    #[test]
    fn test_parent_chain_is_flattened() {
        let styles = load();
        let fmt = styles.formatting(Some("P1"));
        assert_eq!(fmt.bold, Some(true));
        assert_eq!(fmt.color.as_deref(), Some("#112233"));
        assert_eq!(fmt.size, Some(11.0));
        assert_eq!(fmt.superscript, Some(true));
        let p1 = styles.get("P1").unwrap();
        assert_eq!(p1.alignment, Some(Alignment::Center));
        assert!(p1.drop_cap);
    }

    #[test]
    fn test_content_styles_replace_document_styles() {
        let styles = load();
        let fmt = styles.formatting(Some("Shadowed"));
        assert_eq!(fmt.underline, Some(true));
        assert_eq!(fmt.italic, None);
    }

    #[test]
    fn test_list_levels() {
        let styles = load();
        assert_eq!(styles.list_level(Some("L1"), 0), ListLevelKind::Visible(ListType::Ordered));
        assert_eq!(styles.list_level(Some("L1"), 1), ListLevelKind::Visible(ListType::Unordered));
        assert_eq!(styles.list_level(Some("L1"), 5), ListLevelKind::Visible(ListType::Unordered));
        assert_eq!(styles.list_level(Some("Layout"), 0), ListLevelKind::Hidden);
        assert_eq!(styles.list_level(Some("Layout"), 3), ListLevelKind::Hidden);
        assert_eq!(styles.list_level(None, 0), ListLevelKind::Visible(ListType::Unordered));
    }

    #[test]
    fn test_style_map_skips_empty() {
        let styles = load();
        let map = styles.style_map();
        assert!(map.contains_key("Strong"));
        assert!(map.contains_key("P1"));
    }
}
