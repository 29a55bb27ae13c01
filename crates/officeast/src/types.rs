use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::text;

// ============================================================================
// Document
// ============================================================================

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Docx,
    Xlsx,
    Pptx,
    Odt,
    Odp,
    Ods,
    Rtf,
    Pdf,
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Docx => "docx",
            FileType::Xlsx => "xlsx",
            FileType::Pptx => "pptx",
            FileType::Odt => "odt",
            FileType::Odp => "odp",
            FileType::Ods => "ods",
            FileType::Rtf => "rtf",
            FileType::Pdf => "pdf",
        }
    }

    /// True for the ODF family.
    pub fn is_odf(&self) -> bool {
        matches!(self, FileType::Odt | FileType::Odp | FileType::Ods)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// The parsed document: content tree, document metadata and attachments.
///
/// [`Ast::to_text`] is derived from `content` on every call and never cached,
/// so editing `content` and calling it again reflects the edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ast {
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub metadata: DocumentMetadata,
    pub content: Vec<ContentNode>,
    pub attachments: Vec<OfficeAttachment>,
    #[serde(skip, default = "default_newline")]
    pub newline_delimiter: String,
}

fn default_newline() -> String {
    "\n".to_string()
}

impl Ast {
    /// Linearise the content tree into plain text.
    pub fn to_text(&self) -> String {
        text::project_nodes(&self.content, &self.newline_delimiter)
    }

    /// Serialize the AST (without the `toText` projection) as pretty JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Document-level properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,

    /// Creation timestamp as stored by the producer (usually ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,

    /// Page, slide or sheet count when the format records one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,

    /// Named styles resolved to flat formatting records.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub style_map: IndexMap<String, TextFormatting>,

    /// Format-specific extras.
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

// ============================================================================
// Content nodes
// ============================================================================

/// Closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Text,
    Paragraph,
    Heading,
    List,
    Table,
    Row,
    Cell,
    Image,
    Chart,
    Note,
    Slide,
    Sheet,
    Page,
}

impl NodeType {
    /// Inline nodes concatenate with their inline siblings without a delimiter.
    pub fn is_inline(&self) -> bool {
        matches!(self, NodeType::Text | NodeType::Image | NodeType::Chart)
    }
}

/// The universal AST unit.
///
/// `Clone` is a full structural copy: children, formatting and metadata are
/// owned values, so a clone never aliases the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatting: Option<TextFormatting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NodeMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

impl ContentNode {
    /// An empty node of the given kind.
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            text: String::new(),
            children: Vec::new(),
            formatting: None,
            metadata: None,
            raw_content: None,
        }
    }

    /// A text run. Empty formatting records are dropped.
    pub fn text_run(text: impl Into<String>, formatting: &TextFormatting) -> Self {
        let mut node = Self::new(NodeType::Text);
        node.text = text.into();
        if !formatting.is_empty() {
            node.formatting = Some(formatting.clone());
        }
        node
    }

    /// A non-leaf node whose `text` is projected from `children`.
    pub fn block(node_type: NodeType, children: Vec<ContentNode>, delimiter: &str) -> Self {
        let mut node = Self::new(node_type);
        node.text = text::project_nodes(&children, delimiter);
        node.children = children;
        node
    }

    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_raw_content(mut self, raw: Option<String>) -> Self {
        self.raw_content = raw;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Attachment name carried by image and chart nodes.
    pub fn attachment_name(&self) -> Option<&str> {
        match &self.metadata {
            Some(NodeMetadata::Image(m)) => m.attachment_name.as_deref(),
            Some(NodeMetadata::Chart(m)) => m.attachment_name.as_deref(),
            _ => None,
        }
    }

    /// Cell coordinates, if this is a cell node.
    pub fn cell_position(&self) -> Option<(usize, usize)> {
        match &self.metadata {
            Some(NodeMetadata::Cell(m)) => Some((m.row, m.col)),
            _ => None,
        }
    }

    /// Depth-first iterator over this node and its descendants.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Pre-order traversal produced by [`ContentNode::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a ContentNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a ContentNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Flat formatting record for text runs.
///
/// Inheritance is resolved when a node is built, via [`TextFormatting::merge`];
/// a finished node never looks anything up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFormatting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    /// Font size in points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscript: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superscript: Option<bool>,
}

impl TextFormatting {
    /// `{...self, ...overrides}`: every field set in `overrides` wins.
    pub fn merge(&self, overrides: &TextFormatting) -> TextFormatting {
        TextFormatting {
            bold: overrides.bold.or(self.bold),
            italic: overrides.italic.or(self.italic),
            underline: overrides.underline.or(self.underline),
            strikethrough: overrides.strikethrough.or(self.strikethrough),
            color: overrides.color.clone().or_else(|| self.color.clone()),
            background_color: overrides
                .background_color
                .clone()
                .or_else(|| self.background_color.clone()),
            font: overrides.font.clone().or_else(|| self.font.clone()),
            size: overrides.size.or(self.size),
            subscript: overrides.subscript.or(self.subscript),
            superscript: overrides.superscript.or(self.superscript),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TextFormatting::default()
    }
}

// ============================================================================
// Node metadata
// ============================================================================

/// Per-kind node metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeMetadata {
    Text(TextMetadata),
    Paragraph(ParagraphMetadata),
    Heading(HeadingMetadata),
    List(ListMetadata),
    Cell(CellMetadata),
    Image(ImageMetadata),
    Chart(ChartMetadata),
    Note(NoteMetadata),
    Slide(SlideMetadata),
    Sheet(SheetMetadata),
    Page(PageMetadata),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkType {
    Internal,
    External,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_type: Option<LinkType>,
}

impl TextMetadata {
    /// Classify a hyperlink target: `#anchor` targets are internal.
    pub fn for_link(target: &str) -> Self {
        let link_type = if target.starts_with('#') {
            LinkType::Internal
        } else {
            LinkType::External
        };
        Self {
            link: Some(target.to_string()),
            link_type: Some(link_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    /// Map the alignment keywords used by Word (`w:jc`), DrawingML (`algn`) and ODF (`fo:text-align`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "left" | "start" | "l" => Some(Alignment::Left),
            "center" | "ctr" => Some(Alignment::Center),
            "right" | "end" | "r" => Some(Alignment::Right),
            "both" | "justify" | "distribute" | "just" | "dist" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_cap: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingMetadata {
    pub level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Ordered,
    Unordered,
}

/// One list item. `item_index` is 0-based within its list and level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMetadata {
    pub list_type: ListType,
    pub indentation: usize,
    pub item_index: usize,
    pub list_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellMetadata {
    pub row: usize,
    pub col: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col_span: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_span: Option<usize>,
}

impl CellMetadata {
    pub fn at(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            col_span: None,
            row_span: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<ChartData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteType {
    Footnote,
    Endnote,
    /// Speaker notes attached to a presentation slide
    SlideNotes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMetadata {
    pub note_type: NoteType,
    pub note_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_number: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideMetadata {
    pub slide_number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetMetadata {
    pub sheet_name: String,
    pub sheet_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub page_number: usize,
}

// ============================================================================
// Charts and attachments
// ============================================================================

/// Format-agnostic chart content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_axis_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis_title: Option<String>,
    pub data_sets: Vec<ChartDataSet>,
    pub labels: Vec<String>,
    pub raw_texts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub values: Vec<String>,
    pub point_labels: Vec<String>,
}

impl ChartData {
    /// Rebuild `raw_texts` as title, series names, labels, values.
    pub fn rebuild_raw_texts(&mut self) {
        let mut raw = Vec::new();
        raw.extend(self.title.iter().cloned());
        raw.extend(self.data_sets.iter().filter_map(|s| s.name.clone()));
        raw.extend(self.labels.iter().cloned());
        for set in &self.data_sets {
            raw.extend(set.values.iter().cloned());
        }
        raw.retain(|t| !t.trim().is_empty());
        self.raw_texts = raw;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    Image,
    Chart,
}

/// Binary payload embedded in the document, referenced from nodes by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeAttachment {
    #[serde(rename = "type")]
    pub attachment_type: AttachmentType,
    pub mime_type: String,
    /// Base64 (standard alphabet) encoded bytes
    pub data: String,
    pub name: String,
    pub extension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<ChartData>,
}

impl OfficeAttachment {
    /// Build an attachment from raw bytes, deriving extension and MIME type from `name`.
    pub fn from_bytes(attachment_type: AttachmentType, name: &str, bytes: &[u8]) -> Self {
        use base64::Engine;

        let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).unwrap_or_default();
        let mime_type = mime_guess::from_ext(&extension)
            .first()
            .map(|m| m.essence_str().to_string())
            .or_else(|| infer::get(bytes).map(|t| t.mime_type().to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Self {
            attachment_type,
            mime_type,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            name: name.to_string(),
            extension,
            ocr_text: None,
            chart_data: None,
        }
    }

    /// Decode `data` back into bytes.
    pub fn bytes(&self) -> crate::Result<Vec<u8>> {
        use base64::Engine;

        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| crate::OfficeError::parsing_with_source(format!("invalid attachment data for {}", self.name), e))
    }
}
