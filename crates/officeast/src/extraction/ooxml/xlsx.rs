//! Excel workbooks (`.xlsx`).
//!
//! Sheets are read in workbook order. Cell values go through the shared-string
//! table, which must agree with the sheets: an index outside the table means the
//! workbook is inconsistent and the parse fails.

use roxmltree::Node;
use std::collections::HashMap;

use super::{Relationships, collect_charts, collect_media, load_relationships, part_number};
use crate::core::config::ParseConfig;
use crate::extraction::archive::{Members, basename};
use crate::extraction::cells::{parse_area, parse_cell_ref};
use crate::extraction::office_metadata::apply_core_properties;
use crate::extraction::xml;
use crate::types::{
    Ast, CellMetadata, ChartMetadata, ContentNode, DocumentMetadata, FileType, ImageMetadata, NodeMetadata,
    NodeType, SheetMetadata, TextFormatting,
};
use crate::{OfficeError, Result};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";
const WORKSHEETS_DIR: &str = "xl/worksheets/";

/// A worksheet part and its display name.
#[derive(Debug, Clone, PartialEq)]
struct SheetEntry {
    name: String,
    path: String,
}

/// Parse-scoped state shared by every sheet.
struct WorkbookContext<'a> {
    config: &'a ParseConfig,
    shared_strings: Vec<String>,
    cell_formats: Vec<TextFormatting>,
}

/// Parse an Excel workbook.
///
/// # Errors
///
/// `Corrupted` when the archive is unreadable, holds no worksheets, a worksheet
/// named by the workbook is missing, or a cell points outside the shared-string table.
pub fn parse(bytes: &[u8], config: &ParseConfig) -> Result<Ast> {
    let wants_images = config.wants_images();
    let members = Members::extract(bytes, |path| {
        path == "docProps/core.xml"
            || path == WORKBOOK_PART
            || path == "xl/_rels/workbook.xml.rels"
            || path == SHARED_STRINGS_PART
            || path == STYLES_PART
            || path.starts_with(WORKSHEETS_DIR)
            || path.starts_with("xl/drawings/")
            || path.starts_with("xl/charts/")
            || (wants_images && path.starts_with("xl/media/"))
    })?;

    let sheets = sheet_entries(&members);
    if sheets.is_empty() {
        return Err(OfficeError::corrupted("no worksheets found", Some(WORKSHEETS_DIR)));
    }
    tracing::debug!(sheets = sheets.len(), "parsing Excel workbook");

    let shared_strings = match members.text(SHARED_STRINGS_PART) {
        Some(content) => load_shared_strings(&content)?,
        None => Vec::new(),
    };
    let cell_formats = members
        .text(STYLES_PART)
        .map(|content| load_cell_formats(&content))
        .unwrap_or_default();

    let ctx = WorkbookContext {
        config,
        shared_strings,
        cell_formats,
    };

    let mut nodes = Vec::with_capacity(sheets.len());
    for (index, entry) in sheets.iter().enumerate() {
        nodes.push(parse_sheet(&ctx, &members, entry, index)?);
    }

    let mut attachments = collect_charts(&members, "xl/charts/", config.output_error_to_console);
    if wants_images {
        attachments.extend(collect_media(&members, "xl/media/"));
    }

    let mut metadata = DocumentMetadata::default();
    apply_core_properties(&members, &mut metadata);
    metadata.pages = Some(sheets.len());
    metadata.style_map = ctx
        .cell_formats
        .iter()
        .enumerate()
        .filter(|(_, fmt)| !fmt.is_empty())
        .map(|(i, fmt)| (format!("xf{i}"), fmt.clone()))
        .collect();

    Ok(Ast {
        file_type: FileType::Xlsx,
        metadata,
        content: nodes,
        attachments,
        newline_delimiter: config.newline_delimiter.clone(),
    })
}

/// Worksheets in workbook order, or every `sheetN.xml` by number when the workbook lists none.
fn sheet_entries(members: &Members) -> Vec<SheetEntry> {
    let listed = members
        .text(WORKBOOK_PART)
        .map(|content| listed_sheets(&content, &load_relationships(members, WORKBOOK_PART)))
        .unwrap_or_default();
    if !listed.is_empty() {
        return listed;
    }

    let mut paths: Vec<(usize, &str)> = members
        .paths()
        .filter(|p| p.strip_prefix(WORKSHEETS_DIR).is_some_and(|name| !name.contains('/')))
        .filter_map(|p| part_number(p, "sheet").map(|n| (n, p)))
        .collect();
    paths.sort_unstable();
    paths
        .into_iter()
        .map(|(n, path)| SheetEntry {
            name: format!("Sheet{n}"),
            path: path.to_string(),
        })
        .collect()
}

fn listed_sheets(workbook: &str, rels: &Relationships) -> Vec<SheetEntry> {
    let Ok(doc) = xml::parse_document(workbook, WORKBOOK_PART) else {
        return Vec::new();
    };
    let Some(sheets) = xml::child(doc.root_element(), "sheets") else {
        return Vec::new();
    };

    xml::children(sheets, "sheet")
        .enumerate()
        .filter_map(|(i, sheet)| {
            let rel = rels.get(xml::rel_attr(sheet, "id")?)?;
            // Chart sheets and dialog sheets carry no cells.
            if !rel.is_type("worksheet") {
                return None;
            }
            Some(SheetEntry {
                name: xml::attr(sheet, "name")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Sheet{}", i + 1)),
                path: rel.target.clone(),
            })
        })
        .collect()
}

/// Shared-string table: one entry per `si`, rich-text runs concatenated, phonetic runs dropped.
fn load_shared_strings(content: &str) -> Result<Vec<String>> {
    let doc = xml::parse_document(content, SHARED_STRINGS_PART)?;
    Ok(xml::children(doc.root_element(), "si")
        .map(|si| {
            si.descendants()
                .filter(|n| xml::is(*n, "t"))
                .filter(|t| !t.ancestors().any(|a| xml::is(a, "rPh")))
                .filter_map(|t| t.text())
                .collect()
        })
        .collect())
}

/// Formatting per `cellXfs` entry, resolved through its font.
fn load_cell_formats(content: &str) -> Vec<TextFormatting> {
    let Ok(doc) = xml::parse_document(content, STYLES_PART) else {
        return Vec::new();
    };
    let root = doc.root_element();
    let fonts: Vec<TextFormatting> = xml::child(root, "fonts")
        .map(|fonts| xml::children(fonts, "font").map(font_formatting).collect())
        .unwrap_or_default();

    xml::child(root, "cellXfs")
        .map(|xfs| {
            xml::children(xfs, "xf")
                .map(|xf| {
                    xml::attr_usize(xf, "fontId")
                        .and_then(|id| fonts.get(id))
                        .cloned()
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn font_formatting(font: Node<'_, '_>) -> TextFormatting {
    let flag = |name: &str| {
        xml::child(font, name).map(|n| !matches!(xml::attr(n, "val"), Some("0" | "false")))
    };
    TextFormatting {
        bold: flag("b"),
        italic: flag("i"),
        underline: xml::child(font, "u").map(|n| xml::attr(n, "val") != Some("none")),
        strikethrough: flag("strike"),
        color: xml::child(font, "color")
            .and_then(|n| xml::attr(n, "rgb"))
            .map(argb_to_hex),
        font: xml::child(font, "name").and_then(|n| xml::attr(n, "val")).map(str::to_string),
        size: xml::child(font, "sz")
            .and_then(|n| xml::attr(n, "val"))
            .and_then(|v| v.parse().ok()),
        ..Default::default()
    }
}

/// `FF1F497D` -> `#1F497D`
fn argb_to_hex(argb: &str) -> String {
    let rgb = argb
        .get(2..)
        .filter(|_| argb.len() == 8 && argb.is_ascii())
        .unwrap_or(argb);
    format!("#{}", rgb.to_ascii_uppercase())
}

fn parse_sheet(ctx: &WorkbookContext<'_>, members: &Members, entry: &SheetEntry, index: usize) -> Result<ContentNode> {
    let source = members.require_text(&entry.path)?;
    let doc = xml::parse_document(&source, &entry.path)?;
    let root = doc.root_element();
    let delimiter = ctx.config.newline_delimiter.as_str();

    let spans = merge_spans(root);
    let mut children = Vec::new();
    if let Some(data) = xml::child(root, "sheetData") {
        for (position, row) in xml::children(data, "row").enumerate() {
            let row_index = xml::attr_usize(row, "r").map_or(position, |r| r.saturating_sub(1));
            let cells = row_cells(ctx, row, row_index, &spans, &source, &entry.path)?;
            if cells.is_empty() {
                continue;
            }
            children.push(
                ContentNode::block(NodeType::Row, cells, delimiter)
                    .with_raw_content(xml::raw_if(ctx.config.include_raw_content, &source, row)),
            );
        }
    }
    children.extend(drawing_nodes(members, &entry.path));

    Ok(ContentNode::block(NodeType::Sheet, children, delimiter)
        .with_metadata(NodeMetadata::Sheet(SheetMetadata {
            sheet_name: entry.name.clone(),
            sheet_index: index,
        }))
        .with_raw_content(xml::raw_if(ctx.config.include_raw_content, &source, root)))
}

/// `(row, col)` of each merge origin -> `(row_span, col_span)`.
fn merge_spans(root: Node<'_, '_>) -> HashMap<(usize, usize), (usize, usize)> {
    xml::child(root, "mergeCells")
        .into_iter()
        .flat_map(|merges| xml::children(merges, "mergeCell"))
        .filter_map(|m| parse_area(xml::attr(m, "ref")?))
        .map(|((r0, c0), (r1, c1))| ((r0, c0), (r1.abs_diff(r0) + 1, c1.abs_diff(c0) + 1)))
        .collect()
}

fn row_cells(
    ctx: &WorkbookContext<'_>,
    row: Node<'_, '_>,
    row_index: usize,
    spans: &HashMap<(usize, usize), (usize, usize)>,
    source: &str,
    path: &str,
) -> Result<Vec<ContentNode>> {
    let mut cells = Vec::new();
    let mut next_col = 0;
    for c in xml::children(row, "c") {
        let (r, col) = xml::attr(c, "r")
            .and_then(parse_cell_ref)
            .unwrap_or((row_index, next_col));
        next_col = col + 1;

        let Some(value) = cell_value(ctx, c, path)? else {
            continue;
        };
        let formatting = xml::attr_usize(c, "s")
            .and_then(|s| ctx.cell_formats.get(s))
            .cloned()
            .unwrap_or_default();
        let (row_span, col_span) = spans.get(&(r, col)).copied().unwrap_or((1, 1));
        let meta = CellMetadata {
            row_span: (row_span > 1).then_some(row_span),
            col_span: (col_span > 1).then_some(col_span),
            ..CellMetadata::at(r, col)
        };

        cells.push(
            ContentNode::block(
                NodeType::Cell,
                vec![ContentNode::text_run(value, &formatting)],
                &ctx.config.newline_delimiter,
            )
            .with_metadata(NodeMetadata::Cell(meta))
            .with_raw_content(xml::raw_if(ctx.config.include_raw_content, source, c)),
        );
    }
    Ok(cells)
}

/// Text of a cell, or `None` when the cell holds no value.
///
/// # Errors
///
/// `Corrupted` when a shared-string cell's index is not an integer inside the table.
fn cell_value(ctx: &WorkbookContext<'_>, c: Node<'_, '_>, path: &str) -> Result<Option<String>> {
    let cell_type = xml::attr(c, "t");
    if cell_type == Some("inlineStr") {
        let texts: Vec<_> = xml::children(c, "is").flat_map(|is| xml::children(is, "t")).collect();
        return Ok(match texts.as_slice() {
            [t] => Some(t.text().unwrap_or_default().to_string()),
            _ => None,
        });
    }

    let Some(raw) = xml::child(c, "v").and_then(|v| v.text()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if cell_type != Some("s") {
        return Ok(Some(raw.to_string()));
    }

    let reference = xml::attr(c, "r").unwrap_or("?");
    let index: usize = raw.trim().parse().map_err(|_| {
        OfficeError::corrupted(
            format!("shared string index {raw:?} of cell {reference} is not an integer"),
            Some(path),
        )
    })?;
    ctx.shared_strings
        .get(index)
        .cloned()
        .map(Some)
        .ok_or_else(|| {
            OfficeError::corrupted(
                format!(
                    "shared string index {index} of cell {reference} is outside the table of {} entries",
                    ctx.shared_strings.len()
                ),
                Some(path),
            )
        })
}

/// Charts and pictures anchored in the sheet's drawing parts, in anchor order.
fn drawing_nodes(members: &Members, sheet_path: &str) -> Vec<ContentNode> {
    let mut nodes = Vec::new();
    let drawings = load_relationships(members, sheet_path)
        .into_values()
        .filter(|r| r.is_type("drawing") && !r.external)
        .map(|r| r.target);

    for drawing in drawings {
        let Some(source) = members.text(&drawing) else {
            continue;
        };
        let Ok(doc) = xml::parse_document(&source, &drawing) else {
            tracing::debug!("skipping unreadable drawing {drawing}");
            continue;
        };
        let rels = load_relationships(members, &drawing);
        let target = |id: &str| {
            rels.get(id)
                .filter(|r| !r.external)
                .map(|r| basename(&r.target).to_string())
        };

        for anchor in xml::elements(doc.root_element()) {
            if let Some(pic) = xml::descendant(anchor, "pic") {
                let alt_text = xml::path(pic, &["nvPicPr", "cNvPr"])
                    .and_then(|n| xml::attr(n, "descr"))
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| s.trim().to_string());
                let attachment_name = xml::descendant(pic, "blip")
                    .and_then(|b| xml::rel_attr(b, "embed"))
                    .and_then(target);
                nodes.push(
                    ContentNode::new(NodeType::Image).with_metadata(NodeMetadata::Image(ImageMetadata {
                        attachment_name,
                        alt_text,
                    })),
                );
            } else if let Some(id) = xml::descendant(anchor, "chart").and_then(|c| xml::rel_attr(c, "id")) {
                nodes.push(
                    ContentNode::new(NodeType::Chart).with_metadata(NodeMetadata::Chart(ChartMetadata {
                        attachment_name: target(id),
                        chart_data: None,
                    })),
                );
            }
        }
    }
    nodes
}
