//! Inline content of ODF paragraphs.
//!
//! Elements are dispatched through a tag-name table; anything without a handler
//! is descended into with the current state, so unknown wrappers (`text:meta`,
//! `text:date`, field elements, ...) still contribute their text.

use once_cell::sync::Lazy;
use roxmltree::Node;
use std::collections::HashMap;

use super::OdfContext;
use super::blocks;
use crate::extraction::archive::basename;
use crate::extraction::xml;
use crate::types::{
    ChartMetadata, ContentNode, HeadingMetadata, ImageMetadata, NodeMetadata, NodeType, NoteMetadata, NoteType,
    TextFormatting, TextMetadata,
};

/// Formatting and hyperlink in scope for the runs being built.
#[derive(Debug, Clone, Default)]
pub(crate) struct InlineState {
    pub formatting: TextFormatting,
    pub link: Option<String>,
}

type InlineHandler = fn(&mut OdfContext<'_>, Node<'_, '_>, &InlineState, &mut Vec<ContentNode>);

static INLINE_HANDLERS: Lazy<HashMap<&'static str, InlineHandler>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, InlineHandler> = HashMap::new();
    m.insert("s", spaces);
    m.insert("tab", tab);
    m.insert("line-break", line_break);
    m.insert("span", span);
    m.insert("a", hyperlink);
    m.insert("note", note);
    m.insert("frame", frame);
    m.insert("annotation", skip);
    m.insert("note-citation", skip);
    m.insert("bookmark", skip);
    m.insert("bookmark-start", skip);
    m.insert("bookmark-end", skip);
    m.insert("soft-page-break", skip);
    m.insert("reference-mark-start", skip);
    m.insert("reference-mark-end", skip);
    m
});

/// Walk the children of `parent`, appending inline nodes to `out`.
pub(crate) fn walk_inline(ctx: &mut OdfContext<'_>, parent: Node<'_, '_>, state: &InlineState, out: &mut Vec<ContentNode>) {
    for child in parent.children() {
        if child.is_text() {
            let text = collapse_whitespace(child.text().unwrap_or_default());
            push_text(text, state, out);
        } else if child.is_element() {
            match INLINE_HANDLERS.get(xml::local_name(child)) {
                Some(handler) => handler(ctx, child, state, out),
                None => walk_inline(ctx, child, state, out),
            }
        }
    }
}

fn push_text(text: String, state: &InlineState, out: &mut Vec<ContentNode>) {
    if text.is_empty() {
        return;
    }
    let mut node = ContentNode::text_run(text, &state.formatting);
    if let Some(link) = &state.link {
        node.metadata = Some(NodeMetadata::Text(TextMetadata::for_link(link)));
    }
    out.push(node);
}

/// XML whitespace runs collapse to one space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r') {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn skip(_: &mut OdfContext<'_>, _: Node<'_, '_>, _: &InlineState, _: &mut Vec<ContentNode>) {}

fn spaces(_: &mut OdfContext<'_>, node: Node<'_, '_>, state: &InlineState, out: &mut Vec<ContentNode>) {
    let count = xml::attr_usize(node, "c").unwrap_or(1);
    push_text(" ".repeat(count), state, out);
}

fn tab(_: &mut OdfContext<'_>, _: Node<'_, '_>, state: &InlineState, out: &mut Vec<ContentNode>) {
    push_text("\t".to_string(), state, out);
}

fn line_break(_: &mut OdfContext<'_>, _: Node<'_, '_>, state: &InlineState, out: &mut Vec<ContentNode>) {
    push_text("\n".to_string(), state, out);
}

fn span(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, state: &InlineState, out: &mut Vec<ContentNode>) {
    let own = ctx.styles.formatting(xml::attr(node, "style-name"));
    let scoped = InlineState {
        formatting: state.formatting.merge(&own),
        link: state.link.clone(),
    };
    walk_inline(ctx, node, &scoped, out);
}

fn hyperlink(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, state: &InlineState, out: &mut Vec<ContentNode>) {
    let own = ctx.styles.formatting(xml::attr(node, "style-name"));
    let scoped = InlineState {
        formatting: state.formatting.merge(&own),
        link: xml::attr(node, "href").map(str::to_string).or_else(|| state.link.clone()),
    };
    walk_inline(ctx, node, &scoped, out);
}

fn note(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, _: &InlineState, out: &mut Vec<ContentNode>) {
    if ctx.config.ignore_notes {
        return;
    }
    let note_type = match xml::attr(node, "note-class") {
        Some("endnote") => NoteType::Endnote,
        _ => NoteType::Footnote,
    };
    let note_id = xml::attr(node, "id")
        .map(str::to_string)
        .unwrap_or_else(|| ctx.next_note_id());

    let mut children = Vec::new();
    if let Some(body) = xml::child(node, "note-body") {
        blocks::walk_blocks(ctx, body, &mut children);
    }

    let note = ContentNode::block(NodeType::Note, children, &ctx.config.newline_delimiter)
        .with_metadata(NodeMetadata::Note(NoteMetadata {
            note_type,
            note_id,
            slide_number: None,
        }))
        .with_raw_content(ctx.raw(node));

    if ctx.config.put_notes_at_last {
        ctx.deferred_notes.push(note);
    } else {
        out.push(note);
    }
}

/// `draw:frame`: an image, an embedded chart object or a text box.
pub(crate) fn frame(ctx: &mut OdfContext<'_>, node: Node<'_, '_>, state: &InlineState, out: &mut Vec<ContentNode>) {
    let alt_text = ["title", "desc"]
        .iter()
        .filter_map(|name| xml::child(node, name))
        .map(xml::text_content)
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty());
    let class = xml::attr(node, "class");

    for child in xml::elements(node) {
        match xml::local_name(child) {
            "image" => {
                let Some(href) = xml::attr(child, "href") else { continue };
                out.push(ContentNode::new(NodeType::Image).with_metadata(NodeMetadata::Image(ImageMetadata {
                    attachment_name: Some(basename(href).to_string()),
                    alt_text: alt_text.clone(),
                })));
                // Later draw:image siblings are fallback renditions of the same picture.
                break;
            }
            "object" => {
                let Some(href) = xml::attr(child, "href") else { continue };
                let name = href.trim_start_matches("./").trim_end_matches('/');
                if ctx.chart_objects.contains(name) {
                    out.push(ContentNode::new(NodeType::Chart).with_metadata(NodeMetadata::Chart(ChartMetadata {
                        attachment_name: Some(name.to_string()),
                        chart_data: None,
                    })));
                }
                break;
            }
            "text-box" => {
                let mut blocks_out = Vec::new();
                blocks::walk_blocks(ctx, child, &mut blocks_out);
                if let Some(level) = title_level(class) {
                    blocks_out = blocks_out.into_iter().map(|b| promote_to_heading(b, level)).collect();
                }
                if let Some(link) = &state.link {
                    blocks_out.iter_mut().for_each(|b| inherit_link(b, link));
                }
                out.extend(blocks_out);
            }
            _ => {}
        }
    }
}

/// Unlinked text runs under `node` take the enclosing hyperlink.
fn inherit_link(node: &mut ContentNode, link: &str) {
    if node.node_type == NodeType::Text && node.metadata.is_none() {
        node.metadata = Some(NodeMetadata::Text(TextMetadata::for_link(link)));
    }
    for child in &mut node.children {
        inherit_link(child, link);
    }
}

/// Heading level of presentation placeholder classes.
fn title_level(class: Option<&str>) -> Option<u8> {
    match class {
        Some("title") => Some(1),
        Some("subtitle") => Some(2),
        _ => None,
    }
}

fn promote_to_heading(mut node: ContentNode, level: u8) -> ContentNode {
    if node.node_type == NodeType::Paragraph {
        let alignment = match &node.metadata {
            Some(NodeMetadata::Paragraph(p)) => p.alignment,
            _ => None,
        };
        node.node_type = NodeType::Heading;
        node.metadata = Some(NodeMetadata::Heading(HeadingMetadata { level, alignment }));
    }
    node
}
