//! Block-level ODF content: paragraphs, headings, lists, tables, slides.

use once_cell::sync::Lazy;
use roxmltree::Node;
use std::collections::HashMap;
use std::ops::Range;

use super::OdfContext;
use super::inline::{self, InlineState};
use super::styles::ListLevelKind;
use crate::extraction::xml;
use crate::types::{
    CellMetadata, ContentNode, HeadingMetadata, ListMetadata, NodeMetadata, NodeType, NoteMetadata, NoteType,
    ParagraphMetadata, SheetMetadata, SlideMetadata,
};

type BlockHandler = fn(&mut OdfContext<'_>, Node<'_, '_>, &mut Vec<ContentNode>);

static BLOCK_HANDLERS: Lazy<HashMap<&'static str, BlockHandler>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, BlockHandler> = HashMap::new();
    m.insert("p", paragraph);
    m.insert("h", heading);
    m.insert("list", list);
    m.insert("table", table);
    m.insert("frame", frame);
    m.insert("page", slide);
    for skipped in [
        "sequence-decls",
        "variable-decls",
        "user-field-decls",
        "tracked-changes",
        "forms",
        "soft-page-break",
        "notes",
        "page-thumbnail",
        "table-of-content-source",
        "alphabetical-index-source",
        "illustration-index-source",
        "bibliography-source",
        "table-columns",
        "table-column",
        "named-expressions",
        "database-ranges",
        "calculation-settings",
        "content-validations",
        "annotation",
    ] {
        m.insert(skipped, skip);
    }
    m
});

/// Walk the element children of `parent` as block content.
///
/// Elements without a handler (`text:section`, `draw:g`, `draw:custom-shape`,
/// index bodies, ...) are containers: their children are walked in place.
pub(crate) fn walk_blocks(ctx: &mut OdfContext<'_>, parent: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    for child in xml::elements(parent) {
        match BLOCK_HANDLERS.get(xml::local_name(child)) {
            Some(handler) => handler(ctx, child, out),
            None => walk_blocks(ctx, child, out),
        }
    }
}

fn skip(_: &mut OdfContext<'_>, _: Node<'_, '_>, _: &mut Vec<ContentNode>) {}

fn inline_children(ctx: &mut OdfContext<'_>, node: Node<'_, '_>) -> Vec<ContentNode> {
    let state = InlineState {
        formatting: ctx.styles.formatting(xml::attr(node, "style-name")),
        link: None,
    };
    let mut children = Vec::new();
    inline::walk_inline(ctx, node, &state, &mut children);
    children
}

/// Frames, text boxes and notes nested in a paragraph are blocks; lift them out
/// so the paragraph keeps only inline content.
fn split_inline(children: Vec<ContentNode>) -> (Vec<ContentNode>, Vec<ContentNode>) {
    children.into_iter().partition(|c| c.node_type.is_inline())
}

fn paragraph(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    let style_name = xml::attr(node, "style-name");
    let style = style_name.and_then(|n| ctx.styles.get(n));
    let meta = ParagraphMetadata {
        style: style_name.map(str::to_string),
        alignment: style.and_then(|s| s.alignment),
        drop_cap: style.filter(|s| s.drop_cap).map(|_| true),
    };

    let (inline_nodes, lifted) = split_inline(inline_children(ctx, node));
    out.push(
        ContentNode::block(NodeType::Paragraph, inline_nodes, &ctx.config.newline_delimiter)
            .with_metadata(NodeMetadata::Paragraph(meta))
            .with_raw_content(ctx.raw(node)),
    );
    out.extend(lifted);
}

fn heading(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    let level = xml::attr_usize(node, "outline-level").unwrap_or(1).clamp(1, u8::MAX as usize) as u8;
    let alignment = xml::attr(node, "style-name")
        .and_then(|n| ctx.styles.get(n))
        .and_then(|s| s.alignment);

    let (inline_nodes, lifted) = split_inline(inline_children(ctx, node));
    out.push(
        ContentNode::block(NodeType::Heading, inline_nodes, &ctx.config.newline_delimiter)
            .with_metadata(NodeMetadata::Heading(HeadingMetadata { level, alignment }))
            .with_raw_content(ctx.raw(node)),
    );
    out.extend(lifted);
}

fn frame(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    inline::frame(ctx, node, &InlineState::default(), out);
}

// ============================================================================
// Lists
// ============================================================================

/// The list a `text:list` element numbers into.
#[derive(Debug, Clone)]
struct ListScope {
    list_id: String,
    style: Option<String>,
    depth: usize,
}

fn list(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    let list_id = match xml::attr(node, "continue-list") {
        Some(previous) => previous.to_string(),
        None if xml::attr(node, "continue-numbering") == Some("true") => {
            ctx.last_list_id.clone().unwrap_or_else(|| ctx.next_list_id())
        }
        None => {
            let id = xml::attr(node, "id").map(str::to_string).unwrap_or_else(|| ctx.next_list_id());
            ctx.counters.restart(&id);
            id
        }
    };
    ctx.last_list_id = Some(list_id.clone());

    let scope = ListScope {
        list_id,
        style: xml::attr(node, "style-name").map(str::to_string),
        depth: 0,
    };
    list_items(ctx, node, &scope, out);
}

fn list_items(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, scope: &ListScope, out: &mut Vec<ContentNode>) {
    let kind = ctx.styles.list_level(scope.style.as_deref(), scope.depth);

    for item in xml::elements(node) {
        if !matches!(xml::local_name(item), "list-item" | "list-header") {
            continue;
        }
        // An item wrapping only a nested list is a structural level, not an item.
        let has_own_content = xml::elements(item).any(|c| !xml::is(c, "list"));
        let item_index = match kind {
            ListLevelKind::Visible(_) if has_own_content => Some(ctx.counters.next_index(&scope.list_id, scope.depth)),
            _ => None,
        };

        let mut content = Vec::new();
        let mut nested = Vec::new();
        for child in xml::elements(item) {
            if xml::is(child, "list") {
                let inner = ListScope {
                    list_id: scope.list_id.clone(),
                    style: xml::attr(child, "style-name").map(str::to_string).or_else(|| scope.style.clone()),
                    depth: scope.depth + 1,
                };
                list_items(ctx, child, &inner, &mut nested);
            } else {
                match BLOCK_HANDLERS.get(xml::local_name(child)) {
                    Some(handler) => handler(ctx, child, &mut content),
                    None => walk_blocks(ctx, child, &mut content),
                }
            }
        }

        match (kind, item_index) {
            (ListLevelKind::Visible(list_type), Some(item_index)) => {
                out.push(
                    ContentNode::block(NodeType::List, content, &ctx.config.newline_delimiter)
                        .with_metadata(NodeMetadata::List(ListMetadata {
                            list_type,
                            indentation: scope.depth,
                            item_index,
                            list_id: scope.list_id.clone(),
                        }))
                        .with_raw_content(ctx.raw(item)),
                );
            }
            _ => out.extend(content),
        }
        out.extend(nested);
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Materialised rows and any shapes anchored in the table.
struct TableBody {
    rows: Vec<ContentNode>,
    shapes: Vec<ContentNode>,
}

fn table(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    let body = table_body(ctx, node, false);
    out.push(
        ContentNode::block(NodeType::Table, body.rows, &ctx.config.newline_delimiter).with_raw_content(ctx.raw(node)),
    );
    out.extend(body.shapes);
}

/// A top-level `table:table` of a spreadsheet.
pub(crate) fn sheet(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, sheet_index: usize) -> ContentNode {
    let body = table_body(ctx, node, true);
    let mut children = body.rows;
    children.extend(body.shapes);
    ContentNode::block(NodeType::Sheet, children, &ctx.config.newline_delimiter)
        .with_metadata(NodeMetadata::Sheet(SheetMetadata {
            sheet_name: xml::attr(node, "name")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Sheet{}", sheet_index + 1)),
            sheet_index,
        }))
        .with_raw_content(ctx.raw(node))
}

/// Row elements in document order, through header/row groups.
fn row_elements<'a, 'i>(node: Node<'a, 'i>, rows: &mut Vec<Node<'a, 'i>>) {
    for child in xml::elements(node) {
        match xml::local_name(child) {
            "table-row" => rows.push(child),
            "table-header-rows" | "table-rows" | "table-row-group" => row_elements(child, rows),
            _ => {}
        }
    }
}

/// Build the rows of a table, expanding repeats.
///
/// With `skip_trailing_empty`, empty cells and rows are held back and only
/// materialised once non-empty content follows them.
fn table_body(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, skip_trailing_empty: bool) -> TableBody {
    let mut shapes = Vec::new();
    if let Some(shapes_node) = xml::child(node, "shapes") {
        walk_blocks(ctx, shapes_node, &mut shapes);
    }

    let mut row_nodes = Vec::new();
    row_elements(node, &mut row_nodes);

    let mut rows = Vec::new();
    let mut pending: Vec<(ContentNode, usize, usize)> = Vec::new();
    let mut r = 0;
    for row_node in row_nodes {
        let repeat = xml::attr_usize(row_node, "number-rows-repeated").unwrap_or(1).max(1);
        let cells = row_cells(ctx, row_node, r, skip_trailing_empty);
        let template = ContentNode::block(NodeType::Row, cells, &ctx.config.newline_delimiter)
            .with_raw_content(ctx.raw(row_node));

        if skip_trailing_empty && template.children.is_empty() {
            pending.push((template, r, repeat));
            r = r.saturating_add(repeat);
            continue;
        }
        for (held, start, count) in pending.drain(..) {
            for index in positions(start, count, MAX_ROWS) {
                rows.push(relocate_row(&held, index));
            }
        }
        for index in positions(r, repeat, MAX_ROWS) {
            rows.push(relocate_row(&template, index));
        }
        r = r.saturating_add(repeat);
    }

    TableBody { rows, shapes }
}

fn row_cells(ctx: &mut OdfContext<'_>, row_node: Node<'_, '_>, row: usize, skip_trailing_empty: bool) -> Vec<ContentNode> {
    let mut cells = Vec::new();
    let mut pending: Vec<(ContentNode, usize, usize)> = Vec::new();
    let mut c: usize = 0;

    for cell_node in xml::elements(row_node) {
        let repeat = xml::attr_usize(cell_node, "number-columns-repeated").unwrap_or(1).max(1);
        match xml::local_name(cell_node) {
            "covered-table-cell" => {
                c = c.saturating_add(repeat);
                continue;
            }
            "table-cell" => {}
            _ => continue,
        }

        let template = cell(ctx, cell_node, row, c);
        if skip_trailing_empty && is_empty_cell(&template) {
            pending.push((template, c, repeat));
            c = c.saturating_add(repeat);
            continue;
        }
        for (held, start, count) in pending.drain(..) {
            for index in positions(start, count, MAX_COLUMNS) {
                cells.push(relocate_cell(&held, row, index));
            }
        }
        for index in positions(c, repeat, MAX_COLUMNS) {
            cells.push(relocate_cell(&template, row, index));
        }
        c = c.saturating_add(repeat);
    }

    cells
}

fn cell(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, row: usize, col: usize) -> ContentNode {
    let mut children = Vec::new();
    walk_blocks(ctx, node, &mut children);
    let meta = CellMetadata {
        col_span: xml::attr_usize(node, "number-columns-spanned").filter(|s| *s > 1),
        row_span: xml::attr_usize(node, "number-rows-spanned").filter(|s| *s > 1),
        ..CellMetadata::at(row, col)
    };
    ContentNode::block(NodeType::Cell, children, &ctx.config.newline_delimiter)
        .with_metadata(NodeMetadata::Cell(meta))
        .with_raw_content(ctx.raw(node))
}

fn is_empty_cell(cell: &ContentNode) -> bool {
    cell.text.trim().is_empty() && !cell.descendants().any(|n| n.attachment_name().is_some())
}

/// Spreadsheet grid size; repeated rows and cells past it are dropped.
const MAX_ROWS: usize = 1 << 20;
const MAX_COLUMNS: usize = 1 << 14;

/// Indices `start..start + count`, cut off at `limit`.
fn positions(start: usize, count: usize, limit: usize) -> Range<usize> {
    start.min(limit)..start.saturating_add(count).min(limit)
}

/// Independent copy of `cell` at new coordinates.
fn relocate_cell(cell: &ContentNode, row: usize, col: usize) -> ContentNode {
    let mut copy = cell.clone();
    if let Some(NodeMetadata::Cell(meta)) = &mut copy.metadata {
        meta.row = row;
        meta.col = col;
    }
    copy
}

/// Independent copy of `row` with every cell moved to row index `row_index`.
fn relocate_row(row: &ContentNode, row_index: usize) -> ContentNode {
    let mut copy = row.clone();
    for cell in &mut copy.children {
        if let Some(NodeMetadata::Cell(meta)) = &mut cell.metadata {
            meta.row = row_index;
        }
    }
    copy
}

// ============================================================================
// Presentations
// ============================================================================

/// `draw:page`: a slide followed (or not, see `put_notes_at_last`) by its speaker notes.
fn slide(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, out: &mut Vec<ContentNode>) {
    ctx.slide_count += 1;
    let slide_number = ctx.slide_count;

    let mut children = Vec::new();
    walk_blocks(ctx, node, &mut children);
    out.push(
        ContentNode::block(NodeType::Slide, children, &ctx.config.newline_delimiter)
            .with_metadata(NodeMetadata::Slide(SlideMetadata {
                slide_number,
                name: xml::attr(node, "name").map(str::to_string),
            }))
            .with_raw_content(ctx.raw(node)),
    );

    if ctx.config.ignore_notes {
        return;
    }
    let Some(notes) = xml::child(node, "notes") else {
        return;
    };
    let mut note_children = Vec::new();
    walk_blocks(ctx, notes, &mut note_children);
    let note = ContentNode::block(NodeType::Note, note_children, &ctx.config.newline_delimiter)
        .with_metadata(NodeMetadata::Note(NoteMetadata {
            note_type: NoteType::SlideNotes,
            note_id: format!("slide{slide_number}-notes"),
            slide_number: Some(slide_number),
        }))
        .with_raw_content(ctx.raw(notes));
    if note.text.trim().is_empty() {
        return;
    }
    if ctx.config.put_notes_at_last {
        ctx.deferred_notes.push(note);
    } else {
        out.push(note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextFormatting;

    fn text_cell(text: &str, row: usize, col: usize) -> ContentNode {
        ContentNode::block(
            NodeType::Cell,
            vec![ContentNode::text_run(text, &TextFormatting::default())],
            "\n",
        )
        .with_metadata(NodeMetadata::Cell(CellMetadata::at(row, col)))
    }

    #[test]
    fn test_relocate_cell_copies() {
        let cell = text_cell("x", 0, 0);
        let moved = relocate_cell(&cell, 3, 4);
        assert_eq!(moved.cell_position(), Some((3, 4)));
        assert_eq!(cell.cell_position(), Some((0, 0)));
    }

    #[test]
    fn test_relocate_row_moves_every_cell() {
        let row = ContentNode::block(NodeType::Row, vec![text_cell("a", 0, 0), text_cell("b", 0, 1)], "\n");
        let moved = relocate_row(&row, 7);
        let positions: Vec<_> = moved.children.iter().filter_map(|c| c.cell_position()).collect();
        assert_eq!(positions, vec![(7, 0), (7, 1)]);
    }

    #[test]
    fn test_positions_stop_at_grid_limit() {
        assert_eq!(positions(2, 3, MAX_ROWS), 2..5);
        assert_eq!(positions(MAX_COLUMNS - 1, usize::MAX, MAX_COLUMNS), MAX_COLUMNS - 1..MAX_COLUMNS);
        assert!(positions(usize::MAX, usize::MAX, MAX_ROWS).is_empty());
    }

    #[test]
    fn test_is_empty_cell() {
        assert!(is_empty_cell(&text_cell(" ", 0, 0)));
        assert!(!is_empty_cell(&text_cell("1", 0, 0)));
    }
}
