//! PowerPoint presentations (`.pptx`).
//!
//! Slides are read in the numeric order of their part names, each slide's shape
//! tree walked into headings, paragraphs, list items, tables, images and charts.
//! Speaker notes come from the notes slide linked in the slide's relationships.

use once_cell::sync::Lazy;
use roxmltree::Node;
use std::collections::HashMap;

use super::{
    Relationships, collect_charts, collect_media, drawing_run_formatting, load_relationships, part_number,
};
use crate::core::config::ParseConfig;
use crate::extraction::archive::{Members, basename};
use crate::extraction::lists::ListCounters;
use crate::extraction::office_metadata::apply_core_properties;
use crate::extraction::xml;
use crate::types::{
    Alignment, Ast, CellMetadata, ChartMetadata, ContentNode, DocumentMetadata, FileType, HeadingMetadata,
    ImageMetadata, ListMetadata, ListType, NodeMetadata, NodeType, NoteMetadata, NoteType, ParagraphMetadata,
    SlideMetadata, TextMetadata,
};
use crate::{OfficeError, Result};

const SLIDES_DIR: &str = "ppt/slides/";
const NOTES_DIR: &str = "ppt/notesSlides/";

/// Notes-slide placeholders that repeat slide furniture rather than notes text.
const NOTES_FURNITURE: [&str; 5] = ["sldImg", "sldNum", "hdr", "ftr", "dt"];

/// Parse-scoped state for one slide or notes slide.
struct SlideContext<'a> {
    config: &'a ParseConfig,
    rels: Relationships,
    source: &'a str,
    counters: ListCounters,
    is_notes: bool,
}

impl SlideContext<'_> {
    fn raw(&self, node: Node<'_, '_>) -> Option<String> {
        xml::raw_if(self.config.include_raw_content, self.source, node)
    }

    fn delimiter(&self) -> &str {
        &self.config.newline_delimiter
    }

    fn target_name(&self, id: &str) -> Option<String> {
        self.rels.get(id).filter(|r| !r.external).map(|r| basename(&r.target).to_string())
    }
}

type ShapeHandler = fn(&mut SlideContext<'_>, Node<'_, '_>, &mut Vec<ContentNode>);

static SHAPE_HANDLERS: Lazy<HashMap<&'static str, ShapeHandler>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, ShapeHandler> = HashMap::new();
    m.insert("sp", shape);
    m.insert("pic", picture);
    m.insert("graphicFrame", graphic_frame);
    m.insert("AlternateContent", alternate_content);
    for skipped in ["nvGrpSpPr", "grpSpPr", "cxnSp", "extLst", "contentPart"] {
        m.insert(skipped, skip);
    }
    m
});

fn skip(_: &mut SlideContext<'_>, _: Node<'_, '_>, _: &mut Vec<ContentNode>) {}

/// Sort key: numeric suffix first, parts without one last.
fn slide_order(path: &str) -> (usize, String) {
    (part_number(path, "slide").unwrap_or(usize::MAX), path.to_string())
}

/// Parse a PowerPoint presentation.
///
/// # Errors
///
/// `Corrupted` when the archive is unreadable, holds no slides, or a slide is malformed.
pub fn parse(bytes: &[u8], config: &ParseConfig) -> Result<Ast> {
    let wants_images = config.wants_images();
    let members = Members::extract(bytes, |path| {
        path == "docProps/core.xml"
            || path.starts_with(SLIDES_DIR)
            || path.starts_with("ppt/charts/")
            || (!config.ignore_notes && path.starts_with(NOTES_DIR))
            || (wants_images && path.starts_with("ppt/media/"))
    })?;

    let mut slide_paths: Vec<&str> = members
        .paths()
        .filter(|p| {
            p.strip_prefix(SLIDES_DIR)
                .is_some_and(|name| !name.contains('/') && name.ends_with(".xml"))
        })
        .collect();
    slide_paths.sort_by_key(|p| slide_order(p));
    if slide_paths.is_empty() {
        return Err(OfficeError::corrupted("no slides found", Some(SLIDES_DIR)));
    }
    tracing::debug!(slides = slide_paths.len(), "parsing PowerPoint presentation");

    let mut nodes = Vec::new();
    let mut deferred_notes = Vec::new();
    for (index, path) in slide_paths.iter().enumerate() {
        let slide_number = index + 1;
        let source = members.require_text(path)?;
        let doc = xml::parse_document(&source, path)?;
        let rels = load_relationships(&members, path);
        let notes_path = notes_part(&rels, path);

        let mut ctx = SlideContext {
            config,
            rels,
            source: &source,
            counters: ListCounters::new(),
            is_notes: false,
        };
        let mut children = Vec::new();
        if let Some(tree) = xml::path(doc.root_element(), &["cSld", "spTree"]) {
            walk_shapes(&mut ctx, tree, &mut children);
        }
        let name = xml::child(doc.root_element(), "cSld")
            .and_then(|n| xml::attr(n, "name"))
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        nodes.push(
            ContentNode::block(NodeType::Slide, children, &config.newline_delimiter)
                .with_metadata(NodeMetadata::Slide(SlideMetadata { slide_number, name }))
                .with_raw_content(ctx.raw(doc.root_element())),
        );

        if config.ignore_notes {
            continue;
        }
        let Some(note) = notes_path.and_then(|p| parse_notes(&members, &p, slide_number, config)) else {
            continue;
        };
        if config.put_notes_at_last {
            deferred_notes.push(note);
        } else {
            nodes.push(note);
        }
    }
    nodes.append(&mut deferred_notes);

    let mut attachments = collect_charts(&members, "ppt/charts/", config.output_error_to_console);
    if wants_images {
        attachments.extend(collect_media(&members, "ppt/media/"));
    }

    let mut metadata = DocumentMetadata::default();
    apply_core_properties(&members, &mut metadata);
    metadata.pages = Some(slide_paths.len());

    Ok(Ast {
        file_type: FileType::Pptx,
        metadata,
        content: nodes,
        attachments,
        newline_delimiter: config.newline_delimiter.clone(),
    })
}

/// Notes slide of a slide: its `notesSlide` relationship, else the same number suffix.
fn notes_part(rels: &Relationships, slide_path: &str) -> Option<String> {
    rels.values()
        .find(|r| r.is_type("notesSlide"))
        .map(|r| r.target.clone())
        .or_else(|| part_number(slide_path, "slide").map(|n| format!("{NOTES_DIR}notesSlide{n}.xml")))
}

/// A notes slide as a note node. Missing, malformed or empty notes yield `None`.
fn parse_notes(members: &Members, path: &str, slide_number: usize, config: &ParseConfig) -> Option<ContentNode> {
    let source = members.text(path)?;
    let doc = match xml::parse_document(&source, path) {
        Ok(doc) => doc,
        Err(e) => {
            if config.output_error_to_console {
                tracing::warn!("skipping notes of slide {slide_number}: {e}");
            }
            return None;
        }
    };

    let mut ctx = SlideContext {
        config,
        rels: load_relationships(members, path),
        source: &source,
        counters: ListCounters::new(),
        is_notes: true,
    };
    let mut children = Vec::new();
    if let Some(tree) = xml::path(doc.root_element(), &["cSld", "spTree"]) {
        walk_shapes(&mut ctx, tree, &mut children);
    }
    let note = ContentNode::block(NodeType::Note, children, &config.newline_delimiter)
        .with_metadata(NodeMetadata::Note(NoteMetadata {
            note_type: NoteType::SlideNotes,
            note_id: basename(path).trim_end_matches(".xml").to_string(),
            slide_number: Some(slide_number),
        }))
        .with_raw_content(ctx.raw(doc.root_element()));
    (!note.text.trim().is_empty()).then_some(note)
}

fn walk_shapes(ctx: &mut SlideContext<'_>, parent: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    for child in xml::elements(parent) {
        match SHAPE_HANDLERS.get(xml::local_name(child)) {
            Some(handler) => handler(ctx, child, out),
            None => walk_shapes(ctx, child, out),
        }
    }
}

fn alternate_content(ctx: &mut SlideContext<'_>, node: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    if let Some(branch) = xml::child(node, "Choice").or_else(|| xml::child(node, "Fallback")) {
        walk_shapes(ctx, branch, out);
    }
}

/// Placeholder type of a shape (`p:nvSpPr/p:nvPr/p:ph/@type`); `body` when a `ph` has no type.
fn placeholder_type<'a>(sp: Node<'a, '_>) -> Option<&'a str> {
    let ph = xml::path(sp, &["nvSpPr", "nvPr", "ph"])?;
    Some(xml::attr(ph, "type").unwrap_or("body"))
}

fn shape(ctx: &mut SlideContext<'_>, sp: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    let placeholder = placeholder_type(sp);
    if ctx.is_notes && placeholder.is_some_and(|p| NOTES_FURNITURE.contains(&p)) {
        return;
    }
    let Some(body) = xml::child(sp, "txBody") else {
        return;
    };
    let heading_level = match placeholder {
        Some("title" | "ctrTitle") => Some(1),
        Some("subTitle") => Some(2),
        _ => None,
    };
    let list_id = xml::path(sp, &["nvSpPr", "cNvPr"])
        .and_then(|n| xml::attr(n, "id"))
        .map(|id| format!("sp{id}"))
        .unwrap_or_else(|| format!("sp{}", out.len()));

    text_body(ctx, body, heading_level, &list_id, out);
}

/// Paragraphs of a `txBody`, as headings, list items or plain paragraphs.
fn text_body(
    ctx: &mut SlideContext<'_>,
    body: Node<'_, '_>,
    heading_level: Option<u8>,
    list_id: &str,
    out: &mut Vec<ContentNode>,
) {
    for p in xml::children(body, "p") {
        let runs = paragraph_runs(ctx, p);
        if runs.is_empty() {
            continue;
        }
        let ppr = xml::child(p, "pPr");
        let alignment = ppr.and_then(|n| xml::attr(n, "algn")).and_then(Alignment::parse);

        if let Some(level) = heading_level {
            out.push(
                ContentNode::block(NodeType::Heading, runs, ctx.delimiter())
                    .with_metadata(NodeMetadata::Heading(HeadingMetadata { level, alignment }))
                    .with_raw_content(ctx.raw(p)),
            );
            continue;
        }

        let paragraph = ContentNode::block(NodeType::Paragraph, runs, ctx.delimiter())
            .with_metadata(NodeMetadata::Paragraph(ParagraphMetadata {
                alignment,
                ..Default::default()
            }))
            .with_raw_content(ctx.raw(p));

        match ppr.and_then(list_properties) {
            Some((level, list_type)) => {
                let item_index = ctx.counters.next_index(list_id, level);
                out.push(
                    ContentNode::block(NodeType::List, vec![paragraph], ctx.delimiter())
                        .with_metadata(NodeMetadata::List(ListMetadata {
                            list_type,
                            indentation: level,
                            item_index,
                            list_id: list_id.to_string(),
                        }))
                        .with_raw_content(ctx.raw(p)),
                );
            }
            None => out.push(paragraph),
        }
    }
}

/// `(level, kind)` of a bulleted or numbered paragraph.
fn list_properties(ppr: Node<'_, '_>) -> Option<(usize, ListType)> {
    if xml::child(ppr, "buNone").is_some() {
        return None;
    }
    let level = xml::attr_usize(ppr, "lvl");
    let list_type = if xml::child(ppr, "buAutoNum").is_some() {
        ListType::Ordered
    } else if xml::child(ppr, "buChar").is_some() || xml::child(ppr, "buBlip").is_some() || level.is_some() {
        ListType::Unordered
    } else {
        return None;
    };
    Some((level.unwrap_or(0), list_type))
}

fn paragraph_runs(ctx: &SlideContext<'_>, p: Node<'_, '_>) -> Vec<ContentNode> {
    let mut runs = Vec::new();
    for child in xml::elements(p) {
        match xml::local_name(child) {
            "r" | "fld" => {
                let text = xml::child(child, "t").and_then(|t| t.text()).unwrap_or_default();
                if text.is_empty() {
                    continue;
                }
                let rpr = xml::child(child, "rPr");
                let formatting = rpr.map(drawing_run_formatting).unwrap_or_default();
                let mut node = ContentNode::text_run(text, &formatting);
                let link = rpr
                    .and_then(|n| xml::child(n, "hlinkClick"))
                    .and_then(|n| xml::rel_attr(n, "id"))
                    .and_then(|id| ctx.rels.get(id))
                    .map(|rel| rel.target.clone());
                if let Some(link) = link {
                    node.metadata = Some(NodeMetadata::Text(TextMetadata::for_link(&link)));
                }
                runs.push(node);
            }
            "br" => runs.push(ContentNode::text_run("\n", &Default::default())),
            _ => {}
        }
    }
    runs
}

fn picture(ctx: &mut SlideContext<'_>, pic: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    let c_nv_pr = xml::path(pic, &["nvPicPr", "cNvPr"]);
    let alt_text = c_nv_pr
        .and_then(|n| xml::attr(n, "descr").filter(|s| !s.trim().is_empty()))
        .or_else(|| c_nv_pr.and_then(|n| xml::attr(n, "title").filter(|s| !s.trim().is_empty())))
        .map(|s| s.trim().to_string());
    let attachment_name = xml::descendant(pic, "blip")
        .and_then(|b| xml::rel_attr(b, "embed"))
        .and_then(|id| ctx.target_name(id));

    out.push(
        ContentNode::new(NodeType::Image).with_metadata(NodeMetadata::Image(ImageMetadata {
            attachment_name,
            alt_text,
        })),
    );
}

fn graphic_frame(ctx: &mut SlideContext<'_>, frame: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    if let Some(tbl) = xml::descendant(frame, "tbl") {
        table(ctx, tbl, out);
        return;
    }
    if let Some(id) = xml::descendant(frame, "chart").and_then(|c| xml::rel_attr(c, "id")) {
        out.push(
            ContentNode::new(NodeType::Chart).with_metadata(NodeMetadata::Chart(ChartMetadata {
                attachment_name: ctx.target_name(id),
                chart_data: None,
            })),
        );
    }
}

fn table(ctx: &mut SlideContext<'_>, tbl: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    let mut rows = Vec::new();
    for (r, tr) in xml::children(tbl, "tr").enumerate() {
        let mut cells = Vec::new();
        for (c, tc) in xml::children(tr, "tc").enumerate() {
            // Merge continuation cells belong to the cell they are merged into.
            if xml::attr(tc, "hMerge").is_some() || xml::attr(tc, "vMerge").is_some() {
                continue;
            }
            let mut children = Vec::new();
            if let Some(body) = xml::child(tc, "txBody") {
                text_body(ctx, body, None, &format!("tbl{r}-{c}"), &mut children);
            }
            let meta = CellMetadata {
                col_span: xml::attr_usize(tc, "gridSpan").filter(|s| *s > 1),
                row_span: xml::attr_usize(tc, "rowSpan").filter(|s| *s > 1),
                ..CellMetadata::at(r, c)
            };
            cells.push(
                ContentNode::block(NodeType::Cell, children, ctx.delimiter())
                    .with_metadata(NodeMetadata::Cell(meta))
                    .with_raw_content(ctx.raw(tc)),
            );
        }
        rows.push(ContentNode::block(NodeType::Row, cells, ctx.delimiter()).with_raw_content(ctx.raw(tr)));
    }
    out.push(ContentNode::block(NodeType::Table, rows, ctx.delimiter()).with_raw_content(ctx.raw(tbl)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::archive::test_support::zip_bytes;

    const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

    fn slide(title: &str, body: &str) -> String {
        format!(
            r#"<p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr/><p:grpSpPr/>
              <p:sp><p:nvSpPr><p:cNvPr id="2" name="Title"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>{title}</a:t></a:r></a:p></p:txBody></p:sp>
              <p:sp><p:nvSpPr><p:cNvPr id="3" name="Body"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:txBody><a:p><a:r><a:rPr b="1"/><a:t>{body}</a:t></a:r></a:p></p:txBody></p:sp>
            </p:spTree></p:cSld></p:sld>"#
        )
    }

    fn notes(text: &str) -> String {
        format!(
            r#"<p:notes {NS}><p:cSld><p:spTree>
              <p:sp><p:nvSpPr><p:cNvPr id="2" name="Slide Image"/><p:cNvSpPr/><p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr></p:sp>
              <p:sp><p:nvSpPr><p:cNvPr id="3" name="Notes"/><p:cNvSpPr/><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>
              <p:sp><p:nvSpPr><p:cNvPr id="4" name="Number"/><p:cNvSpPr/><p:nvPr><p:ph type="sldNum" idx="5"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:fld type="slidenum"><a:t>1</a:t></a:fld></a:p></p:txBody></p:sp>
            </p:spTree></p:cSld></p:notes>"#
        )
    }

    fn deck() -> Vec<u8> {
        let s1 = slide("One", "first");
        let s2 = slide("Two", "second");
        let s10 = slide("Ten", "tenth");
        let n1 = notes("note one");
        let n2 = notes("note two");
        zip_bytes(&[
            ("ppt/slides/slide10.xml", s10.as_bytes()),
            ("ppt/slides/slide2.xml", s2.as_bytes()),
            ("ppt/slides/slide1.xml", s1.as_bytes()),
            ("ppt/notesSlides/notesSlide1.xml", n1.as_bytes()),
            ("ppt/notesSlides/notesSlide2.xml", n2.as_bytes()),
        ])
    }

    #[test]
    fn test_slides_sorted_numerically_with_interleaved_notes() {
        let ast = parse(&deck(), &ParseConfig::default()).unwrap();
        let texts: Vec<_> = ast.content.iter().map(|n| (n.node_type, n.text.as_str())).collect();
        assert_eq!(
            texts,
            vec![
                (NodeType::Slide, "One\nfirst"),
                (NodeType::Note, "note one"),
                (NodeType::Slide, "Two\nsecond"),
                (NodeType::Note, "note two"),
                (NodeType::Slide, "Ten\ntenth"),
            ]
        );
        assert_eq!(ast.content[0].children[0].node_type, NodeType::Heading);
        assert_eq!(
            ast.content[0].children[1].children[0].formatting.as_ref().and_then(|f| f.bold),
            Some(true)
        );
        assert_eq!(ast.metadata.pages, Some(3));
    }

    #[test]
    fn test_notes_at_last_in_slide_order() {
        let config = ParseConfig {
            put_notes_at_last: true,
            ..Default::default()
        };
        let ast = parse(&deck(), &config).unwrap();
        let kinds: Vec<_> = ast.content.iter().map(|n| n.node_type).collect();
        assert_eq!(
            kinds,
            vec![NodeType::Slide, NodeType::Slide, NodeType::Slide, NodeType::Note, NodeType::Note]
        );
        let slide_numbers: Vec<_> = ast.content[3..]
            .iter()
            .filter_map(|n| match &n.metadata {
                Some(NodeMetadata::Note(meta)) => meta.slide_number,
                _ => None,
            })
            .collect();
        assert_eq!(slide_numbers, vec![1, 2]);
    }

    #[test]
    fn test_ignore_notes() {
        let config = ParseConfig {
            ignore_notes: true,
            ..Default::default()
        };
        let ast = parse(&deck(), &config).unwrap();
        assert!(ast.content.iter().all(|n| n.node_type == NodeType::Slide));
    }

    #[test]
    fn test_no_slides_is_corrupted() {
        let bytes = zip_bytes(&[("ppt/presentation.xml", b"<p:presentation xmlns:p=\"urn:p\"/>")]);
        let err = parse(&bytes, &ParseConfig::default()).unwrap_err();
        assert!(err.is_corrupted());
    }

    #[test]
    fn test_bullets_and_tables() {
        let body = format!(
            r#"<p:sld {NS}><p:cSld><p:spTree>
              <p:sp><p:nvSpPr><p:cNvPr id="5" name="List"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:txBody>
                <a:p><a:pPr><a:buAutoNum type="arabicPeriod"/></a:pPr><a:r><a:t>first</a:t></a:r></a:p>
                <a:p><a:pPr lvl="1"><a:buChar char="-"/></a:pPr><a:r><a:t>nested</a:t></a:r></a:p>
                <a:p><a:pPr><a:buAutoNum type="arabicPeriod"/></a:pPr><a:r><a:t>second</a:t></a:r></a:p>
              </p:txBody></p:sp>
              <p:graphicFrame><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl>
                <a:tr><a:tc gridSpan="2"><a:txBody><a:p><a:r><a:t>wide</a:t></a:r></a:p></a:txBody></a:tc><a:tc hMerge="1"><a:txBody><a:p/></a:txBody></a:tc></a:tr>
                <a:tr><a:tc><a:txBody><a:p><a:r><a:t>a</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:p><a:r><a:t>b</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
              </a:tbl></a:graphicData></a:graphic></p:graphicFrame>
            </p:spTree></p:cSld></p:sld>"#
        );
        let bytes = zip_bytes(&[("ppt/slides/slide1.xml", body.as_bytes())]);
        let ast = parse(&bytes, &ParseConfig::default()).unwrap();
        let slide = &ast.content[0];

        let items: Vec<_> = slide
            .children
            .iter()
            .filter_map(|n| match &n.metadata {
                Some(NodeMetadata::List(meta)) => Some((n.text.as_str(), meta.list_type, meta.indentation, meta.item_index)),
                _ => None,
            })
            .collect();
        assert_eq!(
            items,
            vec![
                ("first", ListType::Ordered, 0, 0),
                ("nested", ListType::Unordered, 1, 0),
                ("second", ListType::Ordered, 0, 1),
            ]
        );

        let table = slide.children.iter().find(|n| n.node_type == NodeType::Table).unwrap();
        assert_eq!(table.children[0].children.len(), 1);
        assert_eq!(table.children[1].children.len(), 2);
        assert_eq!(table.children[1].children[1].cell_position(), Some((1, 1)));
    }
}
