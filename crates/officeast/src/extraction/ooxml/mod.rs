//! Office Open XML family: shared package plumbing for Word, Excel and PowerPoint.
//!
//! Parts reference each other through `.rels` relationship files. A part at
//! `word/document.xml` keeps its relationships in `word/_rels/document.xml.rels`,
//! and relationship targets are relative to the source part's directory unless
//! they start with `/`.

pub mod docx;
pub mod pptx;
pub mod styles;
pub mod xlsx;

use roxmltree::Node;
use indexmap::IndexMap;

use crate::extraction::archive::{Members, basename};
use crate::extraction::chart;
use crate::extraction::xml;
use crate::types::{AttachmentType, OfficeAttachment, TextFormatting};

/// One `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Target resolved to a package path, or the raw URL for external targets
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Matches the last segment of the relationship type URI (`image`, `chart`, `notesSlide`, ...).
    pub fn is_type(&self, kind: &str) -> bool {
        self.rel_type.rsplit('/').next() == Some(kind)
    }
}

/// Relationships of one part, in document order.
pub type Relationships = IndexMap<String, Relationship>;

/// `word/document.xml` -> `word/_rels/document.xml.rels`
pub fn rels_path_for(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_path}.rels"),
    }
}

/// Resolve a relationship target against the directory of `part_path`.
pub fn resolve_target(part_path: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match part_path.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Load the relationships of `part_path`. Missing or unreadable files yield an empty map.
pub fn load_relationships(members: &Members, part_path: &str) -> Relationships {
    let rels_path = rels_path_for(part_path);
    let Some(content) = members.text(&rels_path) else {
        return Relationships::new();
    };
    match parse_relationships(&content, &rels_path, part_path) {
        Ok(rels) => rels,
        Err(e) => {
            tracing::debug!("ignoring unreadable relationships {rels_path}: {e}");
            Relationships::new()
        }
    }
}

pub fn parse_relationships(content: &str, rels_path: &str, part_path: &str) -> crate::Result<Relationships> {
    let doc = xml::parse_document(content, rels_path)?;
    let mut rels = Relationships::new();

    for node in doc.root_element().children().filter(|n| xml::is(*n, "Relationship")) {
        let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target")) else {
            continue;
        };
        let external = node.attribute("TargetMode") == Some("External");
        let target = if external {
            target.to_string()
        } else {
            resolve_target(part_path, target)
        };
        rels.insert(
            id.to_string(),
            Relationship {
                id: id.to_string(),
                rel_type: node.attribute("Type").unwrap_or_default().to_string(),
                target,
                external,
            },
        );
    }

    Ok(rels)
}

/// Formatting of a WordprocessingML run (`w:rPr`).
pub fn word_run_formatting(rpr: Node) -> TextFormatting {
    let mut fmt = TextFormatting::default();

    for prop in xml::elements(rpr) {
        match xml::local_name(prop) {
            "b" => fmt.bold = Some(xml::attr_toggle(prop, "val")),
            "i" => fmt.italic = Some(xml::attr_toggle(prop, "val")),
            "u" => fmt.underline = Some(xml::attr(prop, "val").is_none_or(|v| v != "none")),
            "strike" | "dstrike" => fmt.strikethrough = Some(xml::attr_toggle(prop, "val")),
            "color" => {
                fmt.color = xml::attr(prop, "val")
                    .filter(|v| *v != "auto")
                    .map(|v| format!("#{v}"));
            }
            "highlight" => {
                fmt.background_color = xml::attr(prop, "val").filter(|v| *v != "none").map(str::to_string);
            }
            "shd" => {
                if fmt.background_color.is_none() {
                    fmt.background_color = xml::attr(prop, "fill")
                        .filter(|v| *v != "auto")
                        .map(|v| format!("#{v}"));
                }
            }
            "rFonts" => {
                fmt.font = xml::attr(prop, "ascii")
                    .or_else(|| xml::attr(prop, "hAnsi"))
                    .or_else(|| xml::attr(prop, "cs"))
                    .map(str::to_string);
            }
            "sz" => {
                fmt.size = xml::attr(prop, "val")
                    .and_then(|v| v.parse::<f32>().ok())
                    .map(|half_points| half_points / 2.0);
            }
            "vertAlign" => match xml::attr(prop, "val") {
                Some("superscript") => fmt.superscript = Some(true),
                Some("subscript") => fmt.subscript = Some(true),
                _ => {}
            },
            _ => {}
        }
    }

    fmt
}

/// Formatting of a DrawingML run (`a:rPr`, `a:defRPr`, `a:endParaRPr`).
pub fn drawing_run_formatting(rpr: Node) -> TextFormatting {
    let mut fmt = TextFormatting::default();

    if let Some(b) = xml::attr(rpr, "b") {
        fmt.bold = Some(b == "1" || b == "true");
    }
    if let Some(i) = xml::attr(rpr, "i") {
        fmt.italic = Some(i == "1" || i == "true");
    }
    if let Some(u) = xml::attr(rpr, "u") {
        fmt.underline = Some(u != "none");
    }
    if let Some(strike) = xml::attr(rpr, "strike") {
        fmt.strikethrough = Some(strike != "noStrike");
    }
    if let Some(sz) = xml::attr(rpr, "sz").and_then(|v| v.parse::<f32>().ok()) {
        fmt.size = Some(sz / 100.0);
    }
    if let Some(baseline) = xml::attr(rpr, "baseline").and_then(|v| v.parse::<i32>().ok()) {
        if baseline > 0 {
            fmt.superscript = Some(true);
        } else if baseline < 0 {
            fmt.subscript = Some(true);
        }
    }
    if let Some(color) = xml::path(rpr, &["solidFill", "srgbClr"]).and_then(|n| xml::attr(n, "val")) {
        fmt.color = Some(format!("#{color}"));
    }
    if let Some(color) = xml::path(rpr, &["highlight", "srgbClr"]).and_then(|n| xml::attr(n, "val")) {
        fmt.background_color = Some(format!("#{color}"));
    }
    if let Some(font) = xml::child(rpr, "latin").and_then(|n| xml::attr(n, "typeface")) {
        fmt.font = Some(font.to_string());
    }

    fmt
}

/// Image attachments for every member under `media_prefix`, named by basename.
pub fn collect_media(members: &Members, media_prefix: &str) -> Vec<OfficeAttachment> {
    members
        .iter()
        .filter(|(path, _)| path.starts_with(media_prefix))
        .map(|(path, bytes)| OfficeAttachment::from_bytes(AttachmentType::Image, basename(path), bytes))
        .collect()
}

/// Chart attachments for every `chartN.xml` under `charts_prefix`, named by basename.
pub fn collect_charts(members: &Members, charts_prefix: &str, output_errors: bool) -> Vec<OfficeAttachment> {
    members
        .iter()
        .filter(|(path, _)| path.starts_with(charts_prefix) && !path[charts_prefix.len()..].contains('/'))
        .filter(|(path, _)| path.ends_with(".xml"))
        .filter_map(|(path, bytes)| chart::chart_attachment(basename(path), bytes, output_errors))
        .collect()
}

/// Trailing number of a part name (`ppt/slides/slide12.xml` -> 12).
pub fn part_number(path: &str, prefix: &str) -> Option<usize> {
    basename(path)
        .strip_prefix(prefix)?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rels_path_for() {
        assert_eq!(rels_path_for("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_path_for("ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("word/document.xml", "media/image1.png"), "word/media/image1.png");
        assert_eq!(resolve_target("ppt/slides/slide1.xml", "../media/image2.jpeg"), "ppt/media/image2.jpeg");
        assert_eq!(resolve_target("xl/workbook.xml", "/xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl/workbook.xml", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn test_parse_relationships() {
        let rels_xml = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.png"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#;
        let rels = parse_relationships(rels_xml, "ppt/slides/_rels/slide1.xml.rels", "ppt/slides/slide1.xml").unwrap();
        assert_eq!(rels["rId1"].target, "ppt/media/image1.png");
        assert!(rels["rId1"].is_type("image"));
        assert!(rels["rId2"].external);
        assert_eq!(rels["rId2"].target, "https://example.com");
    }

    #[test]
    fn test_word_run_formatting() {
        let doc = xml::parse_document(
            r#"<w:rPr xmlns:w="urn:w"><w:b/><w:i w:val="0"/><w:u w:val="single"/><w:color w:val="FF0000"/><w:sz w:val="28"/><w:vertAlign w:val="superscript"/><w:rFonts w:ascii="Arial"/></w:rPr>"#,
            "x",
        )
        .unwrap();
        let fmt = word_run_formatting(doc.root_element());
        assert_eq!(fmt.bold, Some(true));
        assert_eq!(fmt.italic, Some(false));
        assert_eq!(fmt.underline, Some(true));
        assert_eq!(fmt.color.as_deref(), Some("#FF0000"));
        assert_eq!(fmt.size, Some(14.0));
        assert_eq!(fmt.superscript, Some(true));
        assert_eq!(fmt.font.as_deref(), Some("Arial"));
    }

    #[test]
    fn test_drawing_run_formatting() {
        let doc = xml::parse_document(
            r#"<a:rPr xmlns:a="urn:a" b="1" sz="2400" u="sng" baseline="-25000"><a:solidFill><a:srgbClr val="00FF00"/></a:solidFill><a:latin typeface="Calibri"/></a:rPr>"#,
            "x",
        )
        .unwrap();
        let fmt = drawing_run_formatting(doc.root_element());
        assert_eq!(fmt.bold, Some(true));
        assert_eq!(fmt.size, Some(24.0));
        assert_eq!(fmt.underline, Some(true));
        assert_eq!(fmt.subscript, Some(true));
        assert_eq!(fmt.color.as_deref(), Some("#00FF00"));
        assert_eq!(fmt.font.as_deref(), Some("Calibri"));
    }

    #[test]
    fn test_part_number() {
        assert_eq!(part_number("ppt/slides/slide12.xml", "slide"), Some(12));
        assert_eq!(part_number("ppt/slides/slideLayout.xml", "slide"), None);
    }
}
