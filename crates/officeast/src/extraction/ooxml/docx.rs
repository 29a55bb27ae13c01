//! Word documents (`.docx`).
//!
//! The main part is walked block by block (`w:p`, `w:tbl`, content controls);
//! paragraphs are walked run by run through a tag dispatch table. Footnotes and
//! endnotes are built up front from their own parts and placed where the body
//! references them.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use roxmltree::Node;
use std::collections::HashMap;

use super::styles::{Numbering, WordStyles, numbering_reference, outline_level, paragraph_alignment};
use super::{Relationships, collect_charts, collect_media, load_relationships, word_run_formatting};
use crate::Result;
use crate::core::config::ParseConfig;
use crate::extraction::archive::{Members, basename};
use crate::extraction::lists::ListCounters;
use crate::extraction::office_metadata::apply_core_properties;
use crate::extraction::xml;
use crate::types::{
    Ast, CellMetadata, ChartMetadata, ContentNode, DocumentMetadata, FileType, HeadingMetadata, ImageMetadata,
    ListMetadata, NodeMetadata, NodeType, NoteMetadata, NoteType, ParagraphMetadata, TextFormatting, TextMetadata,
};

const DEFAULT_MAIN_PART: &str = "word/document.xml";
const OFFICE_DOCUMENT_REL: &str = "officeDocument";

/// Note parts and the note type their entries produce.
const NOTE_PARTS: [(&str, NoteType); 2] = [
    ("word/footnotes.xml", NoteType::Footnote),
    ("word/endnotes.xml", NoteType::Endnote),
];

/// Run formatting and hyperlink in scope.
#[derive(Debug, Clone, Default)]
struct RunState {
    formatting: TextFormatting,
    link: Option<String>,
}

/// Parse-scoped state for one XML part.
struct DocxContext<'a> {
    config: &'a ParseConfig,
    styles: &'a WordStyles,
    numbering: &'a Numbering,
    rels: Relationships,
    source: &'a str,
    counters: &'a mut ListCounters,
    notes: &'a mut IndexMap<(NoteType, String), ContentNode>,
    deferred_notes: Vec<ContentNode>,
}

impl DocxContext<'_> {
    fn raw(&self, node: Node<'_, '_>) -> Option<String> {
        xml::raw_if(self.config.include_raw_content, self.source, node)
    }

    fn delimiter(&self) -> &str {
        &self.config.newline_delimiter
    }
}

type BlockHandler = fn(&mut DocxContext<'_>, Node<'_, '_>, &mut Vec<ContentNode>);
type RunHandler = fn(&mut DocxContext<'_>, Node<'_, '_>, &RunState, &mut Vec<ContentNode>);

static BLOCK_HANDLERS: Lazy<HashMap<&'static str, BlockHandler>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, BlockHandler> = HashMap::new();
    m.insert("p", paragraph);
    m.insert("tbl", table);
    for skipped in ["sectPr", "sdtPr", "sdtEndPr", "tblPr", "tblGrid", "trPr", "tcPr", "del", "moveFrom"] {
        m.insert(skipped, skip_block);
    }
    m
});

static RUN_HANDLERS: Lazy<HashMap<&'static str, RunHandler>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, RunHandler> = HashMap::new();
    m.insert("r", run);
    m.insert("hyperlink", hyperlink);
    m.insert("footnoteReference", note_reference);
    m.insert("endnoteReference", note_reference);
    for skipped in [
        "pPr",
        "rPr",
        "del",
        "moveFrom",
        "bookmarkStart",
        "bookmarkEnd",
        "proofErr",
        "commentRangeStart",
        "commentRangeEnd",
        "permStart",
        "permEnd",
        "sdtPr",
        "sdtEndPr",
    ] {
        m.insert(skipped, skip_run);
    }
    m
});

fn skip_block(_: &mut DocxContext<'_>, _: Node<'_, '_>, _: &mut Vec<ContentNode>) {}

fn skip_run(_: &mut DocxContext<'_>, _: Node<'_, '_>, _: &RunState, _: &mut Vec<ContentNode>) {}

/// Parse a Word document.
///
/// # Errors
///
/// `Corrupted` when the archive is unreadable or the main document part is missing or malformed.
pub fn parse(bytes: &[u8], config: &ParseConfig) -> Result<Ast> {
    let wants_images = config.wants_images();
    let members = Members::extract(bytes, |path| {
        path == "_rels/.rels"
            || path == "docProps/core.xml"
            || (path.starts_with("word/")
                && !path.starts_with("word/embeddings/")
                && (wants_images || !path.starts_with("word/media/")))
    })?;

    let main_part = main_document_part(&members);
    tracing::debug!(main_part = %main_part, "parsing Word document");
    let content = members.require_text(&main_part)?;
    let doc = xml::parse_document(&content, &main_part)?;

    let styles = WordStyles::load(members.text("word/styles.xml").as_deref());
    let numbering = Numbering::load(members.text("word/numbering.xml").as_deref());
    let mut counters = ListCounters::new();
    let mut notes = IndexMap::new();

    if !config.ignore_notes {
        for (part, note_type) in NOTE_PARTS {
            load_notes(&members, part, note_type, config, &styles, &numbering, &mut counters, &mut notes);
        }
    }

    let mut ctx = DocxContext {
        config,
        styles: &styles,
        numbering: &numbering,
        rels: load_relationships(&members, &main_part),
        source: &content,
        counters: &mut counters,
        notes: &mut notes,
        deferred_notes: Vec::new(),
    };

    let mut nodes = Vec::new();
    if let Some(body) = xml::child(doc.root_element(), "body") {
        walk_blocks(&mut ctx, body, &mut nodes);
    }
    nodes.append(&mut ctx.deferred_notes);
    // Notes nothing in the body points at still belong to the document.
    nodes.extend(notes.into_values());

    let mut attachments = collect_charts(&members, "word/charts/", config.output_error_to_console);
    if wants_images {
        attachments.extend(collect_media(&members, "word/media/"));
    }

    let mut metadata = DocumentMetadata::default();
    apply_core_properties(&members, &mut metadata);
    metadata.style_map = styles.style_map();

    Ok(Ast {
        file_type: FileType::Docx,
        metadata,
        content: nodes,
        attachments,
        newline_delimiter: config.newline_delimiter.clone(),
    })
}

/// The main document part named by the package relationships.
fn main_document_part(members: &Members) -> String {
    members
        .text("_rels/.rels")
        .and_then(|content| super::parse_relationships(&content, "_rels/.rels", "").ok())
        .and_then(|rels| {
            rels.into_values()
                .find(|r| r.is_type(OFFICE_DOCUMENT_REL) && !r.external)
                .map(|r| r.target)
        })
        .filter(|target| members.contains(target))
        .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string())
}

#[allow(clippy::too_many_arguments)]
fn load_notes(
    members: &Members,
    part: &str,
    note_type: NoteType,
    config: &ParseConfig,
    styles: &WordStyles,
    numbering: &Numbering,
    counters: &mut ListCounters,
    notes: &mut IndexMap<(NoteType, String), ContentNode>,
) {
    let Some(source) = members.text(part) else {
        return;
    };
    let doc = match xml::parse_document(&source, part) {
        Ok(doc) => doc,
        Err(e) => {
            if config.output_error_to_console {
                tracing::warn!("skipping notes part: {e}");
            }
            return;
        }
    };

    // Notes cannot reference other notes.
    let mut scratch = IndexMap::new();
    let mut ctx = DocxContext {
        config,
        styles,
        numbering,
        rels: load_relationships(members, part),
        source: &source,
        counters,
        notes: &mut scratch,
        deferred_notes: Vec::new(),
    };

    for entry in xml::elements(doc.root_element()) {
        if !matches!(xml::local_name(entry), "footnote" | "endnote") {
            continue;
        }
        // Separators and continuation notices are layout, not notes.
        if xml::attr(entry, "type").is_some_and(|t| t != "normal") {
            continue;
        }
        let Some(id) = xml::attr(entry, "id") else { continue };

        let mut children = Vec::new();
        walk_blocks(&mut ctx, entry, &mut children);
        let note = ContentNode::block(NodeType::Note, children, ctx.delimiter())
            .with_metadata(NodeMetadata::Note(NoteMetadata {
                note_type,
                note_id: id.to_string(),
                slide_number: None,
            }))
            .with_raw_content(ctx.raw(entry));
        notes.insert((note_type, id.to_string()), note);
    }
}

// ============================================================================
// Blocks
// ============================================================================

fn walk_blocks(ctx: &mut DocxContext<'_>, parent: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    for child in xml::elements(parent) {
        match BLOCK_HANDLERS.get(xml::local_name(child)) {
            Some(handler) => handler(ctx, child, out),
            None => walk_blocks(ctx, child, out),
        }
    }
}

fn paragraph(ctx: &mut DocxContext<'_>, p: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    let ppr = xml::child(p, "pPr");
    let style_id = ppr
        .and_then(|n| xml::child(n, "pStyle"))
        .and_then(|n| xml::attr(n, "val"));
    let style = ctx.styles.paragraph(style_id);

    // `w:pPr/w:rPr` formats the paragraph mark only, not the runs.
    let state = RunState {
        formatting: ctx.styles.paragraph_formatting(style_id),
        link: None,
    };

    let mut runs = Vec::new();
    walk_runs(ctx, p, &state, &mut runs);
    let (inline_nodes, lifted): (Vec<_>, Vec<_>) = runs.into_iter().partition(|n| n.node_type.is_inline());

    let alignment = ppr.and_then(paragraph_alignment).or_else(|| style.and_then(|s| s.alignment));
    let heading_level = ppr.and_then(outline_level).or_else(|| style.and_then(|s| s.heading_level));
    let numbering = ppr
        .and_then(numbering_reference)
        .or_else(|| style.and_then(|s| s.numbering.clone()));
    let list_type = numbering
        .as_ref()
        .and_then(|(num_id, level)| ctx.numbering.list_type(num_id, *level).map(|t| (num_id.clone(), *level, t)));

    let node = if let Some(level) = heading_level {
        ContentNode::block(NodeType::Heading, inline_nodes, ctx.delimiter())
            .with_metadata(NodeMetadata::Heading(HeadingMetadata { level, alignment }))
            .with_raw_content(ctx.raw(p))
    } else {
        let paragraph = ContentNode::block(NodeType::Paragraph, inline_nodes, ctx.delimiter())
            .with_metadata(NodeMetadata::Paragraph(ParagraphMetadata {
                style: style_id.map(str::to_string),
                alignment,
                drop_cap: ppr
                    .and_then(|n| xml::child(n, "framePr"))
                    .and_then(|n| xml::attr(n, "dropCap"))
                    .filter(|v| *v != "none")
                    .map(|_| true),
            }))
            .with_raw_content(ctx.raw(p));
        match list_type {
            Some((num_id, level, list_type)) => {
                let item_index = ctx.counters.next_index(&num_id, level);
                ContentNode::block(NodeType::List, vec![paragraph], ctx.delimiter())
                    .with_metadata(NodeMetadata::List(ListMetadata {
                        list_type,
                        indentation: level,
                        item_index,
                        list_id: num_id,
                    }))
                    .with_raw_content(ctx.raw(p))
            }
            None => paragraph,
        }
    };

    out.push(node);
    out.extend(lifted);
}

fn table(ctx: &mut DocxContext<'_>, tbl: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    let mut rows: Vec<ContentNode> = Vec::new();
    // Column -> (row position, cell position) of the cell a vertical merge started in.
    let mut merge_origins: HashMap<usize, (usize, usize)> = HashMap::new();

    for (r, tr) in xml::children(tbl, "tr").enumerate() {
        let mut cells = Vec::new();
        let mut col = xml::path(tr, &["trPr", "gridBefore"])
            .and_then(|n| xml::attr_usize(n, "val"))
            .unwrap_or(0);

        for tc in xml::children(tr, "tc") {
            let tc_pr = xml::child(tc, "tcPr");
            let span = tc_pr
                .and_then(|n| xml::child(n, "gridSpan"))
                .and_then(|n| xml::attr_usize(n, "val"))
                .unwrap_or(1)
                .max(1);
            let v_merge = tc_pr.and_then(|n| xml::child(n, "vMerge"));

            match v_merge.map(|m| xml::attr(m, "val")) {
                // A continuation cell extends the merge above it.
                Some(None) | Some(Some("continue")) => {
                    if let Some(&(row_pos, cell_pos)) = merge_origins.get(&col)
                        && let Some(NodeMetadata::Cell(meta)) = rows
                            .get_mut(row_pos)
                            .and_then(|row| row.children.get_mut(cell_pos))
                            .and_then(|cell| cell.metadata.as_mut())
                    {
                        meta.row_span = Some(meta.row_span.unwrap_or(1) + 1);
                    }
                    col += span;
                    continue;
                }
                Some(Some(_)) => {
                    merge_origins.insert(col, (r, cells.len()));
                }
                None => {
                    merge_origins.remove(&col);
                }
            }

            let mut children = Vec::new();
            walk_blocks(ctx, tc, &mut children);
            let meta = CellMetadata {
                col_span: (span > 1).then_some(span),
                ..CellMetadata::at(r, col)
            };
            cells.push(
                ContentNode::block(NodeType::Cell, children, ctx.delimiter())
                    .with_metadata(NodeMetadata::Cell(meta))
                    .with_raw_content(ctx.raw(tc)),
            );
            col += span;
        }

        rows.push(ContentNode::block(NodeType::Row, cells, ctx.delimiter()).with_raw_content(ctx.raw(tr)));
    }

    out.push(ContentNode::block(NodeType::Table, rows, ctx.delimiter()).with_raw_content(ctx.raw(tbl)));
}

// ============================================================================
// Runs
// ============================================================================

fn walk_runs(ctx: &mut DocxContext<'_>, parent: Node<'_, '_>, state: &RunState, out: &mut Vec<ContentNode>) {
    for child in xml::elements(parent) {
        match RUN_HANDLERS.get(xml::local_name(child)) {
            Some(handler) => handler(ctx, child, state, out),
            None => walk_runs(ctx, child, state, out),
        }
    }
}

fn push_text(text: String, state: &RunState, out: &mut Vec<ContentNode>) {
    if text.is_empty() {
        return;
    }
    let mut node = ContentNode::text_run(text, &state.formatting);
    if let Some(link) = &state.link {
        node.metadata = Some(NodeMetadata::Text(TextMetadata::for_link(link)));
    }
    out.push(node);
}

fn run(ctx: &mut DocxContext<'_>, r: Node<'_, '_>, state: &RunState, out: &mut Vec<ContentNode>) {
    let mut formatting = state.formatting.clone();
    if let Some(rpr) = xml::child(r, "rPr") {
        if let Some(char_style) = xml::child(rpr, "rStyle").and_then(|n| xml::attr(n, "val")) {
            let styled = ctx.styles.formatting(Some(char_style));
            formatting = formatting.merge(&styled);
        }
        formatting = formatting.merge(&word_run_formatting(rpr));
    }
    let scoped = RunState {
        formatting,
        link: state.link.clone(),
    };

    let mut text = String::new();
    let flush = |text: &mut String, out: &mut Vec<ContentNode>| push_text(std::mem::take(text), &scoped, out);

    for child in xml::elements(r) {
        match xml::local_name(child) {
            "t" => text.push_str(child.text().unwrap_or_default()),
            "tab" | "ptab" => text.push('\t'),
            "br" | "cr" => {
                if xml::attr(child, "type") != Some("page") {
                    text.push('\n');
                }
            }
            "noBreakHyphen" => text.push('-'),
            "sym" => {
                if let Some(c) = xml::attr(child, "char")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .map(symbol_char)
                    .and_then(char::from_u32)
                {
                    text.push(c);
                }
            }
            "drawing" => {
                flush(&mut text, out);
                drawing(ctx, child, out);
            }
            "pict" | "object" => {
                flush(&mut text, out);
                vml_picture(ctx, child, out);
            }
            "AlternateContent" => {
                flush(&mut text, out);
                let branch = xml::child(child, "Choice").or_else(|| xml::child(child, "Fallback"));
                if let Some(branch) = branch {
                    for inner in xml::elements(branch) {
                        match xml::local_name(inner) {
                            "drawing" => drawing(ctx, inner, out),
                            "pict" => vml_picture(ctx, inner, out),
                            _ => {}
                        }
                    }
                }
            }
            "footnoteReference" | "endnoteReference" => {
                flush(&mut text, out);
                note_reference(ctx, child, &scoped, out);
            }
            _ => {}
        }
    }
    flush(&mut text, out);
}

/// Symbol fonts map their glyphs into the private-use area at U+F000.
fn symbol_char(code: u32) -> u32 {
    if (0xF000..=0xF0FF).contains(&code) { code - 0xF000 } else { code }
}

fn hyperlink(ctx: &mut DocxContext<'_>, node: Node<'_, '_>, state: &RunState, out: &mut Vec<ContentNode>) {
    let target = xml::rel_attr(node, "id")
        .and_then(|id| ctx.rels.get(id))
        .map(|rel| rel.target.clone())
        .or_else(|| xml::attr(node, "anchor").map(|a| format!("#{a}")));
    let scoped = RunState {
        formatting: state.formatting.clone(),
        link: target.or_else(|| state.link.clone()),
    };
    walk_runs(ctx, node, &scoped, out);
}

fn note_reference(ctx: &mut DocxContext<'_>, node: Node<'_, '_>, _: &RunState, out: &mut Vec<ContentNode>) {
    if ctx.config.ignore_notes {
        return;
    }
    let note_type = if xml::local_name(node) == "endnoteReference" {
        NoteType::Endnote
    } else {
        NoteType::Footnote
    };
    let Some(id) = xml::attr(node, "id") else { return };
    let Some(note) = ctx.notes.shift_remove(&(note_type, id.to_string())) else {
        return;
    };
    if ctx.config.put_notes_at_last {
        ctx.deferred_notes.push(note);
    } else {
        out.push(note);
    }
}

/// Alt text of a DrawingML object: `descr`, then `title`.
fn drawing_alt_text(node: Node<'_, '_>) -> Option<String> {
    let doc_pr = xml::descendant(node, "docPr")?;
    xml::attr(doc_pr, "descr")
        .filter(|s| !s.trim().is_empty())
        .or_else(|| xml::attr(doc_pr, "title").filter(|s| !s.trim().is_empty()))
        .map(|s| s.trim().to_string())
}

fn relationship_name(ctx: &DocxContext<'_>, id: &str) -> Option<String> {
    ctx.rels.get(id).filter(|r| !r.external).map(|r| basename(&r.target).to_string())
}

fn drawing(ctx: &mut DocxContext<'_>, node: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    let alt_text = drawing_alt_text(node);

    if let Some(id) = xml::descendant(node, "blip").and_then(|b| xml::rel_attr(b, "embed")) {
        out.push(ContentNode::new(NodeType::Image).with_metadata(NodeMetadata::Image(ImageMetadata {
            attachment_name: relationship_name(ctx, id),
            alt_text: alt_text.clone(),
        })));
    } else if let Some(id) = xml::descendant(node, "chart").and_then(|c| xml::rel_attr(c, "id")) {
        out.push(ContentNode::new(NodeType::Chart).with_metadata(NodeMetadata::Chart(ChartMetadata {
            attachment_name: relationship_name(ctx, id),
            chart_data: None,
        })));
    }

    for text_box in xml::descendants(node, "txbxContent") {
        walk_blocks(ctx, text_box, out);
    }
}

fn vml_picture(ctx: &mut DocxContext<'_>, node: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    if let Some(image) = xml::descendant(node, "imagedata")
        && let Some(id) = xml::rel_attr(image, "id")
    {
        let alt_text = xml::attr(image, "title")
            .or_else(|| xml::descendant(node, "shape").and_then(|s| xml::attr(s, "alt")))
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);
        out.push(ContentNode::new(NodeType::Image).with_metadata(NodeMetadata::Image(ImageMetadata {
            attachment_name: relationship_name(ctx, id),
            alt_text,
        })));
    }
    for text_box in xml::descendants(node, "txbxContent") {
        walk_blocks(ctx, text_box, out);
    }
}
