//! Phase 2: group tree to content nodes.
//!
//! The walk keeps an explicit frame stack mirroring the group nesting. Entering a
//! group saves the character and paragraph state, leaving it restores them, which
//! is how RTF scopes formatting. Footnote groups open a nested content sink whose
//! paragraphs become the note body.

use once_cell::sync::Lazy;
use regex::Regex;

use super::header::Header;
use super::tokenizer::{GroupId, GroupTree, Item};
use crate::core::config::ParseConfig;
use crate::extraction::lists::ListCounters;
use crate::extraction::ooxml::styles::heading_level_from_name;
use crate::types::{
    Alignment, CellMetadata, ContentNode, HeadingMetadata, ListMetadata, ListType, NodeMetadata, NodeType,
    NoteMetadata, NoteType, ParagraphMetadata, TextFormatting, TextMetadata,
};

static HYPERLINK_INSTRUCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"HYPERLINK\s+(\\l\s+)?"([^"]+)""#).expect("Hyperlink instruction regex pattern is valid and should compile")
});

static ORDERED_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\(?[0-9A-Za-z]{1,4}[.)]").expect("Ordered list marker regex pattern is valid and should compile")
});

/// Destinations whose content is never document text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "fldinst",
    "header",
    "headerf",
    "headerl",
    "headerr",
    "footer",
    "footerf",
    "footerl",
    "footerr",
    "xe",
    "comment",
];

/// Ignorable (`\*`) destinations that still carry document text.
const KNOWN_IGNORABLE: &[&str] = &["ud"];

#[derive(Debug, Clone)]
struct CharState {
    bold: bool,
    italic: bool,
    underline: bool,
    strike: bool,
    superscript: bool,
    subscript: bool,
    font: Option<i32>,
    /// Half-points
    size: Option<i32>,
    color: Option<i32>,
    background: Option<i32>,
    link: Option<String>,
    unicode_skip: usize,
}

impl Default for CharState {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            strike: false,
            superscript: false,
            subscript: false,
            font: None,
            size: None,
            color: None,
            background: None,
            link: None,
            unicode_skip: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ParaState {
    alignment: Option<Alignment>,
    in_table: bool,
    list: Option<i32>,
    level: usize,
    outline: Option<u8>,
    style: Option<i32>,
}

#[derive(Debug, Default)]
struct TableBuilder {
    rows: Vec<ContentNode>,
    cells: Vec<ContentNode>,
    cell_blocks: Vec<ContentNode>,
}

/// Where finished paragraphs go: the body, or the body of an open note.
#[derive(Debug, Default)]
struct Sink {
    blocks: Vec<ContentNode>,
    runs: Vec<ContentNode>,
    /// `\listtext` / `\pntext` marker of the open paragraph
    marker: Option<String>,
    table: Option<TableBuilder>,
    /// Notes referenced from the open paragraph, placed after it
    lifted: Vec<ContentNode>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FrameKind {
    Plain,
    Note(NoteType),
    Marker,
}

struct Frame {
    group: GroupId,
    next: usize,
    kind: FrameKind,
    saved_chars: CharState,
    saved_para: ParaState,
}

pub struct Walker<'a> {
    tree: &'a GroupTree,
    header: &'a Header,
    config: &'a ParseConfig,
    chars: CharState,
    para: ParaState,
    sinks: Vec<Sink>,
    /// Text bytes not yet decoded through the code page
    pending: Vec<u8>,
    /// Fallback bytes still to drop after a `\u`
    skip: usize,
    high_surrogate: Option<u16>,
    marker: Option<String>,
    counters: ListCounters,
    deferred_notes: Vec<ContentNode>,
    note_count: usize,
}

impl<'a> Walker<'a> {
    pub fn new(tree: &'a GroupTree, header: &'a Header, config: &'a ParseConfig) -> Self {
        let chars = CharState {
            font: header.default_font,
            ..Default::default()
        };
        Self {
            tree,
            header,
            config,
            chars,
            para: ParaState::default(),
            sinks: vec![Sink::default()],
            pending: Vec::new(),
            skip: 0,
            high_surrogate: None,
            marker: None,
            counters: ListCounters::new(),
            deferred_notes: Vec::new(),
            note_count: 0,
        }
    }

    /// Walk the group `doc` and return the document's block nodes.
    pub fn run(mut self, doc: GroupId) -> Vec<ContentNode> {
        let tree = self.tree;
        let mut stack = vec![Frame {
            group: doc,
            next: 0,
            kind: FrameKind::Plain,
            saved_chars: self.chars.clone(),
            saved_para: self.para.clone(),
        }];

        while let Some(top) = stack.len().checked_sub(1) {
            let frame = &mut stack[top];
            let item = tree.group(frame.group).items.get(frame.next);
            frame.next += 1;

            match item {
                None => {
                    self.flush_pending();
                    if let Some(frame) = stack.pop() {
                        self.leave(&frame);
                        self.chars = frame.saved_chars;
                        self.para = frame.saved_para;
                    }
                }
                Some(Item::Group(id)) => {
                    self.flush_pending();
                    self.skip = 0;
                    if let Some((group, kind)) = self.enter(*id) {
                        stack.push(Frame {
                            group,
                            next: 0,
                            kind,
                            saved_chars: self.chars.clone(),
                            saved_para: self.para.clone(),
                        });
                        if let Some(link) = self.field_link(*id) {
                            self.chars.link = Some(link);
                        }
                    }
                }
                Some(Item::Text(bytes)) => self.bytes(bytes),
                Some(Item::Hex(byte)) => self.bytes(std::slice::from_ref(byte)),
                Some(Item::Control { word, param }) => {
                    self.flush_pending();
                    self.control(word, *param);
                }
            }
        }

        self.finish_paragraph();
        let mut body = self.sinks.pop().unwrap_or_default();
        close_table(&mut body, &self.config.newline_delimiter);
        body.blocks.append(&mut self.deferred_notes);
        body.blocks
    }

    /// Decide how to walk a child group; `None` skips it.
    fn enter(&mut self, id: GroupId) -> Option<(GroupId, FrameKind)> {
        let tree = self.tree;
        let group = tree.group(id);
        let Some(destination) = group.destination.as_deref() else {
            return Some((id, FrameKind::Plain));
        };
        if SKIPPED_DESTINATIONS.contains(&destination)
            || (group.ignorable && !KNOWN_IGNORABLE.contains(&destination))
        {
            return None;
        }

        match destination {
            "footnote" => {
                if self.config.ignore_notes {
                    return None;
                }
                let is_endnote = self.header.note_mode == 1 || group.controls().any(|(w, _)| w == "ftnalt");
                let note_type = if is_endnote { NoteType::Endnote } else { NoteType::Footnote };
                self.sinks.push(Sink::default());
                Some((id, FrameKind::Note(note_type)))
            }
            "listtext" | "pntext" => {
                self.marker = Some(String::new());
                Some((id, FrameKind::Marker))
            }
            // `\upr` pairs an ANSI rendition with a Unicode one in `\ud`.
            "upr" => tree
                .subgroups(id)
                .find(|(_, g)| g.destination.as_deref() == Some("ud"))
                .map(|(ud, _)| (ud, FrameKind::Plain)),
            _ => Some((id, FrameKind::Plain)),
        }
    }

    fn leave(&mut self, frame: &Frame) {
        match frame.kind {
            FrameKind::Plain => {}
            FrameKind::Marker => {
                let marker = self.marker.take().map(|m| m.trim().to_string());
                if let Some(sink) = self.sinks.last_mut() {
                    sink.marker = marker;
                }
            }
            FrameKind::Note(note_type) => {
                self.finish_paragraph();
                let Some(mut sink) = self.sinks.pop() else {
                    return;
                };
                let delimiter = self.config.newline_delimiter.as_str();
                close_table(&mut sink, delimiter);
                self.note_count += 1;
                let note = ContentNode::block(NodeType::Note, sink.blocks, delimiter).with_metadata(NodeMetadata::Note(
                    NoteMetadata {
                        note_type,
                        note_id: self.note_count.to_string(),
                        slide_number: None,
                    },
                ));
                if self.config.put_notes_at_last {
                    self.deferred_notes.push(note);
                } else if let Some(sink) = self.sinks.last_mut() {
                    sink.lifted.push(note);
                }
            }
        }
    }

    /// Hyperlink target of a `\field` group, from its `HYPERLINK` instruction.
    fn field_link(&self, id: GroupId) -> Option<String> {
        let group = self.tree.group(id);
        if group.destination.as_deref() != Some("field") {
            return None;
        }
        let (instruction, _) = self
            .tree
            .subgroups(id)
            .find(|(_, g)| g.destination.as_deref() == Some("fldinst"))?;
        let text = self.header.decode(&self.tree.text_bytes(instruction));
        let caps = HYPERLINK_INSTRUCTION.captures(&text)?;
        let target = caps.get(2)?.as_str();
        Some(if caps.get(1).is_some() {
            format!("#{target}")
        } else {
            target.to_string()
        })
    }

    fn bytes(&mut self, bytes: &[u8]) {
        let dropped = self.skip.min(bytes.len());
        self.skip -= dropped;
        self.pending.extend_from_slice(&bytes[dropped..]);
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let bytes = std::mem::take(&mut self.pending);
        let text = self.header.decode(&bytes);
        self.push_text(&text);
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(marker) = self.marker.as_mut() {
            marker.push_str(text);
            return;
        }

        let formatting = self.formatting();
        let mut run = ContentNode::text_run(text, &formatting);
        if let Some(link) = &self.chars.link {
            run.metadata = Some(NodeMetadata::Text(TextMetadata::for_link(link)));
        }
        let Some(sink) = self.sinks.last_mut() else {
            return;
        };
        match sink.runs.last_mut() {
            Some(last) if last.formatting == run.formatting && last.metadata == run.metadata => {
                last.text.push_str(text);
            }
            _ => sink.runs.push(run),
        }
    }

    fn formatting(&self) -> TextFormatting {
        let c = &self.chars;
        TextFormatting {
            bold: c.bold.then_some(true),
            italic: c.italic.then_some(true),
            underline: c.underline.then_some(true),
            strikethrough: c.strike.then_some(true),
            superscript: c.superscript.then_some(true),
            subscript: c.subscript.then_some(true),
            font: c.font.and_then(|f| self.header.fonts.get(&f).cloned()),
            size: c.size.map(|half_points| half_points as f32 / 2.0),
            color: c.color.and_then(|i| self.header.color(i)),
            background_color: c.background.and_then(|i| self.header.color(i)),
        }
    }

    fn control(&mut self, word: &str, param: Option<i32>) {
        let on = param != Some(0);
        let c = &mut self.chars;
        match word {
            "b" => c.bold = on,
            "i" => c.italic = on,
            "ul" | "uld" | "uldb" | "ulw" | "uldash" | "ulwave" | "ulth" => c.underline = on,
            "ulnone" => c.underline = false,
            "strike" | "striked" => c.strike = on,
            "super" => (c.superscript, c.subscript) = (on, false),
            "sub" => (c.subscript, c.superscript) = (on, false),
            "nosupersub" => (c.subscript, c.superscript) = (false, false),
            "f" => c.font = param,
            "fs" => c.size = param,
            "cf" => c.color = param,
            "cb" | "highlight" => c.background = param.filter(|p| *p > 0),
            "uc" => c.unicode_skip = param.and_then(|p| usize::try_from(p).ok()).unwrap_or(1),
            "plain" => {
                *c = CharState {
                    font: self.header.default_font,
                    link: c.link.take(),
                    unicode_skip: c.unicode_skip,
                    ..Default::default()
                }
            }

            "pard" => self.para = ParaState::default(),
            "ql" => self.para.alignment = Some(Alignment::Left),
            "qr" => self.para.alignment = Some(Alignment::Right),
            "qc" => self.para.alignment = Some(Alignment::Center),
            "qj" => self.para.alignment = Some(Alignment::Justify),
            "intbl" => self.para.in_table = true,
            "ls" => self.para.list = param,
            "ilvl" => self.para.level = param.and_then(|p| usize::try_from(p).ok()).unwrap_or(0),
            "outlinelevel" => {
                self.para.outline = param.and_then(|p| u8::try_from(p).ok()).filter(|p| *p < 9).map(|p| p + 1)
            }
            "s" => self.para.style = param,

            "par" => self.finish_paragraph(),
            "cell" => self.end_cell(),
            "row" => self.end_row(),
            "line" => self.push_text("\n"),
            "tab" => self.push_text("\t"),
            "emdash" => self.push_text("\u{2014}"),
            "endash" => self.push_text("\u{2013}"),
            "emspace" | "enspace" | "qmspace" => self.push_text(" "),
            "lquote" => self.push_text("\u{2018}"),
            "rquote" => self.push_text("\u{2019}"),
            "ldblquote" => self.push_text("\u{201C}"),
            "rdblquote" => self.push_text("\u{201D}"),
            "bullet" => self.push_text("\u{2022}"),
            "~" => self.push_text("\u{00A0}"),
            "_" => self.push_text("\u{2011}"),
            "u" => {
                if let Some(code) = param {
                    self.unicode(code);
                    self.skip = self.chars.unicode_skip;
                }
            }
            _ => {}
        }
    }

    fn unicode(&mut self, code: i32) {
        // Parameters above 32767 are written as negative 16-bit values.
        let unit = if code < 0 { (code + 65536) as u16 } else { code as u16 };
        if (0xD800..0xDC00).contains(&unit) {
            self.high_surrogate = Some(unit);
            return;
        }
        let decoded = match self.high_surrogate.take() {
            Some(high) if (0xDC00..0xE000).contains(&unit) => char::decode_utf16([high, unit]).next(),
            _ => char::decode_utf16([unit]).next(),
        };
        if let Some(Ok(ch)) = decoded {
            self.push_text(ch.encode_utf8(&mut [0; 4]));
        }
    }

    /// Close the open paragraph into the current sink (or table cell).
    fn finish_paragraph(&mut self) {
        self.flush_pending();
        let delimiter = self.config.newline_delimiter.clone();
        let node = self.build_paragraph(&delimiter);
        let in_table = self.para.in_table;
        let Some(sink) = self.sinks.last_mut() else {
            return;
        };
        let lifted: Vec<ContentNode> = sink.lifted.drain(..).collect();

        if in_table {
            let table = sink.table.get_or_insert_with(TableBuilder::default);
            table.cell_blocks.extend(node);
            table.cell_blocks.extend(lifted);
        } else {
            if node.is_some() {
                close_table(sink, &delimiter);
            }
            sink.blocks.extend(node);
            sink.blocks.extend(lifted);
        }
    }

    fn build_paragraph(&mut self, delimiter: &str) -> Option<ContentNode> {
        let sink = self.sinks.last_mut()?;
        let runs = std::mem::take(&mut sink.runs);
        let marker = sink.marker.take();
        if runs.iter().all(|r| r.text.trim().is_empty()) {
            return None;
        }

        let style_name = self.para.style.and_then(|s| self.header.styles.get(&s));
        let heading_level = self.para.outline.or_else(|| style_name.and_then(|n| heading_level_from_name(n)));
        if let Some(level) = heading_level {
            return Some(ContentNode::block(NodeType::Heading, runs, delimiter).with_metadata(NodeMetadata::Heading(
                HeadingMetadata {
                    level,
                    alignment: self.para.alignment,
                },
            )));
        }

        let paragraph = ContentNode::block(NodeType::Paragraph, runs, delimiter).with_metadata(NodeMetadata::Paragraph(
            ParagraphMetadata {
                style: style_name.cloned(),
                alignment: self.para.alignment,
                drop_cap: None,
            },
        ));
        if self.para.list.is_none() && marker.is_none() {
            return Some(paragraph);
        }

        let list_id = self.para.list.map_or_else(|| "pn".to_string(), |ls| format!("ls{ls}"));
        let level = self.para.level;
        let list_type = match marker.as_deref() {
            Some(m) if ORDERED_MARKER.is_match(m) => ListType::Ordered,
            _ => ListType::Unordered,
        };
        Some(
            ContentNode::block(NodeType::List, vec![paragraph], delimiter).with_metadata(NodeMetadata::List(
                ListMetadata {
                    list_type,
                    indentation: level,
                    item_index: self.counters.next_index(&list_id, level),
                    list_id,
                },
            )),
        )
    }

    fn end_cell(&mut self) {
        self.para.in_table = true;
        self.finish_paragraph();
        let delimiter = self.config.newline_delimiter.clone();
        let Some(sink) = self.sinks.last_mut() else {
            return;
        };
        let table = sink.table.get_or_insert_with(TableBuilder::default);
        let blocks = std::mem::take(&mut table.cell_blocks);
        let (row, col) = (table.rows.len(), table.cells.len());
        table.cells.push(
            ContentNode::block(NodeType::Cell, blocks, &delimiter).with_metadata(NodeMetadata::Cell(CellMetadata::at(row, col))),
        );
    }

    fn end_row(&mut self) {
        self.flush_pending();
        let has_open_cell = self
            .sinks
            .last()
            .is_some_and(|s| !s.runs.is_empty() || s.table.as_ref().is_some_and(|t| !t.cell_blocks.is_empty()));
        if has_open_cell {
            self.end_cell();
        }
        let delimiter = self.config.newline_delimiter.clone();
        if let Some(table) = self.sinks.last_mut().and_then(|s| s.table.as_mut()) {
            let cells = std::mem::take(&mut table.cells);
            table.rows.push(ContentNode::block(NodeType::Row, cells, &delimiter));
        }
    }
}

/// Emit the sink's open table, if any, as a block.
fn close_table(sink: &mut Sink, delimiter: &str) {
    let Some(mut table) = sink.table.take() else {
        return;
    };
    if !table.cells.is_empty() {
        let cells = std::mem::take(&mut table.cells);
        table.rows.push(ContentNode::block(NodeType::Row, cells, delimiter));
    }
    if !table.rows.is_empty() {
        sink.blocks.push(ContentNode::block(NodeType::Table, table.rows, delimiter));
    }
}
