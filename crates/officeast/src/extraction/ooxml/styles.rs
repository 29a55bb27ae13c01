//! WordprocessingML styles (`word/styles.xml`) and numbering (`word/numbering.xml`).
//!
//! Style chains (`w:basedOn`) are flattened at load time on top of
//! `w:docDefaults`, so a paragraph or run resolves its inherited formatting with
//! one map read.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::Node;
use std::collections::HashMap;

use super::word_run_formatting;
use crate::extraction::xml;
use crate::types::{Alignment, ListType, TextFormatting};

const MAX_BASED_ON_DEPTH: usize = 32;

static HEADING_STYLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^heading\s*([1-9])$").expect("Heading style regex pattern is valid and should compile")
});

#[derive(Debug, Clone, Default)]
pub struct WordStyle {
    pub name: Option<String>,
    pub based_on: Option<String>,
    pub formatting: TextFormatting,
    pub alignment: Option<Alignment>,
    pub heading_level: Option<u8>,
    /// `(numId, ilvl)` inherited by paragraphs of this style
    pub numbering: Option<(String, usize)>,
}

#[derive(Debug, Default)]
pub struct WordStyles {
    defaults: TextFormatting,
    default_paragraph: Option<String>,
    styles: IndexMap<String, WordStyle>,
}

impl WordStyles {
    /// Load `styles.xml`. A missing or unreadable part yields empty styles.
    pub fn load(source: Option<&str>) -> Self {
        let mut styles = Self::default();
        let Some(source) = source else {
            return styles;
        };
        let doc = match xml::parse_document(source, "word/styles.xml") {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!("ignoring unreadable styles: {e}");
                return styles;
            }
        };
        let root = doc.root_element();

        if let Some(rpr) = xml::path(root, &["docDefaults", "rPrDefault", "rPr"]) {
            styles.defaults = word_run_formatting(rpr);
        }
        for node in xml::children(root, "style") {
            let Some(id) = xml::attr(node, "styleId") else { continue };
            if xml::attr(node, "type") == Some("paragraph") && xml::attr(node, "default").is_some_and(|v| v == "1" || v == "true") {
                styles.default_paragraph = Some(id.to_string());
            }
            styles.styles.insert(id.to_string(), parse_style(node));
        }
        styles.flatten();
        styles
    }

    fn flatten(&mut self) {
        let ids: Vec<String> = self.styles.keys().cloned().collect();
        for id in ids {
            let mut chain = Vec::new();
            let mut current = self.styles.get(&id).and_then(|s| s.based_on.clone());
            while let Some(parent) = current {
                if chain.len() >= MAX_BASED_ON_DEPTH || chain.contains(&parent) || parent == id {
                    break;
                }
                current = self.styles.get(&parent).and_then(|s| s.based_on.clone());
                chain.push(parent);
            }

            let mut merged = WordStyle::default();
            for ancestor in chain.iter().rev() {
                if let Some(style) = self.styles.get(ancestor) {
                    merged = merge_style(&merged, style);
                }
            }
            if let Some(own) = self.styles.get(&id) {
                let flat = merge_style(&merged, own);
                self.styles.insert(id, flat);
            }
        }
    }

    /// The paragraph style `id`, or the default paragraph style.
    pub fn paragraph(&self, id: Option<&str>) -> Option<&WordStyle> {
        id.and_then(|i| self.styles.get(i))
            .or_else(|| self.default_paragraph.as_deref().and_then(|d| self.styles.get(d)))
    }

    /// Document defaults overlaid with the formatting of style `id`.
    pub fn formatting(&self, id: Option<&str>) -> TextFormatting {
        match id.and_then(|i| self.styles.get(i)) {
            Some(style) => self.defaults.merge(&style.formatting),
            None => self.defaults.clone(),
        }
    }

    /// Inherited run formatting of a paragraph with style `id`.
    pub fn paragraph_formatting(&self, id: Option<&str>) -> TextFormatting {
        match self.paragraph(id) {
            Some(style) => self.defaults.merge(&style.formatting),
            None => self.defaults.clone(),
        }
    }

    pub fn style_map(&self) -> IndexMap<String, TextFormatting> {
        self.styles
            .iter()
            .filter(|(_, s)| !s.formatting.is_empty())
            .map(|(id, s)| (id.clone(), s.formatting.clone()))
            .collect()
    }
}

fn merge_style(base: &WordStyle, own: &WordStyle) -> WordStyle {
    WordStyle {
        name: own.name.clone(),
        based_on: own.based_on.clone(),
        formatting: base.formatting.merge(&own.formatting),
        alignment: own.alignment.or(base.alignment),
        heading_level: own.heading_level.or(base.heading_level),
        numbering: own.numbering.clone().or_else(|| base.numbering.clone()),
    }
}

fn parse_style(node: Node) -> WordStyle {
    let name = xml::child(node, "name").and_then(|n| xml::attr(n, "val")).map(str::to_string);
    let mut style = WordStyle {
        heading_level: name.as_deref().and_then(heading_level_from_name),
        name,
        based_on: xml::child(node, "basedOn").and_then(|n| xml::attr(n, "val")).map(str::to_string),
        formatting: xml::child(node, "rPr").map(word_run_formatting).unwrap_or_default(),
        ..Default::default()
    };

    if let Some(ppr) = xml::child(node, "pPr") {
        style.alignment = paragraph_alignment(ppr);
        if let Some(level) = outline_level(ppr) {
            style.heading_level = Some(level);
        }
        style.numbering = numbering_reference(ppr);
    }
    style
}

/// `heading 2` -> 2, `Title` -> 1.
pub fn heading_level_from_name(name: &str) -> Option<u8> {
    if name.eq_ignore_ascii_case("title") {
        return Some(1);
    }
    HEADING_STYLE_NAME.captures(name.trim()).and_then(|c| c[1].parse().ok())
}

pub fn paragraph_alignment(ppr: Node) -> Option<Alignment> {
    xml::child(ppr, "jc").and_then(|n| xml::attr(n, "val")).and_then(Alignment::parse)
}

/// `w:outlineLvl` is 0-based; 9 marks body text.
pub fn outline_level(ppr: Node) -> Option<u8> {
    let level = xml::child(ppr, "outlineLvl").and_then(|n| xml::attr_usize(n, "val"))?;
    (level < 9).then_some(level as u8 + 1)
}

/// `w:numPr` as `(numId, ilvl)`.
pub fn numbering_reference(ppr: Node) -> Option<(String, usize)> {
    let num_pr = xml::child(ppr, "numPr")?;
    let num_id = xml::child(num_pr, "numId").and_then(|n| xml::attr(n, "val"))?;
    let level = xml::child(num_pr, "ilvl").and_then(|n| xml::attr_usize(n, "val")).unwrap_or(0);
    Some((num_id.to_string(), level))
}

/// `w:num` to `w:abstractNum` level formats.
#[derive(Debug, Default)]
pub struct Numbering {
    abstract_levels: HashMap<String, HashMap<usize, ListType>>,
    nums: HashMap<String, NumDefinition>,
}

#[derive(Debug, Default)]
struct NumDefinition {
    abstract_id: String,
    overrides: HashMap<usize, ListType>,
}

impl Numbering {
    pub fn load(source: Option<&str>) -> Self {
        let mut numbering = Self::default();
        let Some(source) = source else {
            return numbering;
        };
        let doc = match xml::parse_document(source, "word/numbering.xml") {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!("ignoring unreadable numbering: {e}");
                return numbering;
            }
        };
        let root = doc.root_element();

        for abs in xml::children(root, "abstractNum") {
            if let Some(id) = xml::attr(abs, "abstractNumId") {
                numbering.abstract_levels.insert(id.to_string(), level_formats(abs));
            }
        }
        for num in xml::children(root, "num") {
            let Some(id) = xml::attr(num, "numId") else { continue };
            let abstract_id = xml::child(num, "abstractNumId")
                .and_then(|n| xml::attr(n, "val"))
                .unwrap_or_default()
                .to_string();
            let overrides = xml::children(num, "lvlOverride")
                .filter_map(|o| {
                    let level = xml::attr_usize(o, "ilvl")?;
                    let lvl = xml::child(o, "lvl")?;
                    Some((level, level_format(lvl)?))
                })
                .collect();
            numbering.nums.insert(id.to_string(), NumDefinition { abstract_id, overrides });
        }
        numbering
    }

    /// List kind of `num_id` at `level`; `None` for `numId` 0 (numbering removed)
    /// and unknown ids.
    pub fn list_type(&self, num_id: &str, level: usize) -> Option<ListType> {
        if num_id == "0" {
            return None;
        }
        let Some(num) = self.nums.get(num_id) else {
            // Numbered paragraphs without numbering.xml still read as list items.
            return self.nums.is_empty().then_some(ListType::Unordered);
        };
        if let Some(kind) = num.overrides.get(&level) {
            return Some(*kind);
        }
        let levels = self.abstract_levels.get(&num.abstract_id);
        Some(levels.and_then(|l| l.get(&level)).copied().unwrap_or(ListType::Unordered))
    }
}

fn level_formats(abs: Node) -> HashMap<usize, ListType> {
    xml::children(abs, "lvl")
        .filter_map(|lvl| Some((xml::attr_usize(lvl, "ilvl")?, level_format(lvl)?)))
        .collect()
}

fn level_format(lvl: Node) -> Option<ListType> {
    let format = xml::child(lvl, "numFmt").and_then(|n| xml::attr(n, "val"))?;
    Some(match format {
        "bullet" | "none" => ListType::Unordered,
        _ => ListType::Ordered,
    })
}
