//! OpenDocument text, presentation and spreadsheet parsing.
//!
//! One parser serves all three document kinds; the kind comes from the
//! `mimetype` member and only changes what the office body is walked as.

mod blocks;
mod inline;
pub mod references;
pub mod styles;

use roxmltree::Node;
use std::collections::HashSet;

use crate::Result;
use crate::core::config::ParseConfig;
use crate::extraction::archive::{Members, basename};
use crate::extraction::chart;
use crate::extraction::lists::ListCounters;
use crate::extraction::office_metadata::apply_odf_properties;
use crate::extraction::xml;
use crate::types::{
    AttachmentType, Ast, ChartData, ContentNode, DocumentMetadata, FileType, NodeMetadata, OfficeAttachment,
};
use references::{placeholder_reference, resolve_in_sheets};
use styles::OdfStyles;

const MIME_PRESENTATION: &str = "application/vnd.oasis.opendocument.presentation";
const MIME_SPREADSHEET: &str = "application/vnd.oasis.opendocument.spreadsheet";
const MIME_ODF_CHART: &str = "application/vnd.oasis.opendocument.chart";

/// Parse-scoped state threaded through the block and inline walkers.
pub(crate) struct OdfContext<'a> {
    pub config: &'a ParseConfig,
    pub styles: &'a OdfStyles,
    pub source: &'a str,
    pub chart_objects: &'a HashSet<String>,
    pub counters: ListCounters,
    pub deferred_notes: Vec<ContentNode>,
    pub last_list_id: Option<String>,
    pub slide_count: usize,
    generated_lists: usize,
    generated_notes: usize,
}

impl<'a> OdfContext<'a> {
    fn new(config: &'a ParseConfig, styles: &'a OdfStyles, source: &'a str, chart_objects: &'a HashSet<String>) -> Self {
        Self {
            config,
            styles,
            source,
            chart_objects,
            counters: ListCounters::new(),
            deferred_notes: Vec::new(),
            last_list_id: None,
            slide_count: 0,
            generated_lists: 0,
            generated_notes: 0,
        }
    }

    pub fn raw(&self, node: Node<'_, '_>) -> Option<String> {
        xml::raw_if(self.config.include_raw_content, self.source, node)
    }

    pub fn next_list_id(&mut self) -> String {
        self.generated_lists += 1;
        format!("list{}", self.generated_lists)
    }

    pub fn next_note_id(&mut self) -> String {
        self.generated_notes += 1;
        format!("note{}", self.generated_notes)
    }
}

/// Document kind declared by the `mimetype` member; text is the fallback.
pub fn detect_file_type(mimetype: Option<&str>) -> FileType {
    match mimetype.map(str::trim) {
        Some(m) if m.starts_with(MIME_PRESENTATION) => FileType::Odp,
        Some(m) if m.starts_with(MIME_SPREADSHEET) => FileType::Ods,
        _ => FileType::Odt,
    }
}

/// Embedded object directory (`Object 1`) of an object content member.
fn object_dir(path: &str) -> Option<&str> {
    let dir = path.strip_suffix("/content.xml")?;
    (!dir.is_empty() && !dir.contains('/')).then_some(dir)
}

/// Parse an ODT, ODP or ODS container.
///
/// # Errors
///
/// `Corrupted` when the archive is unreadable or `content.xml` is missing or malformed.
pub fn parse(bytes: &[u8], config: &ParseConfig) -> Result<Ast> {
    let wants_images = config.wants_images();
    let members = Members::extract(bytes, |path| {
        matches!(path, "mimetype" | "content.xml" | "styles.xml" | "meta.xml")
            || (wants_images && path.starts_with("Pictures/"))
            || object_dir(path).is_some()
    })?;

    let file_type = detect_file_type(members.text("mimetype").as_deref());
    tracing::debug!(%file_type, "parsing OpenDocument container");

    let content = members.require_text("content.xml")?;
    let doc = xml::parse_document(&content, "content.xml")?;
    let styles = OdfStyles::load(members.text("styles.xml").as_deref(), &doc);

    let mut attachments = Vec::new();
    let mut chart_objects = HashSet::new();
    for (path, data) in members.iter() {
        let Some(dir) = object_dir(path) else { continue };
        if memchr::memmem::find(data, b"office:chart").is_none() {
            continue;
        }
        if let Some(mut attachment) = chart::chart_attachment(dir, data, config.output_error_to_console) {
            attachment.mime_type = MIME_ODF_CHART.to_string();
            chart_objects.insert(dir.to_string());
            attachments.push(attachment);
        }
    }
    if wants_images {
        attachments.extend(
            members
                .iter()
                .filter(|(path, _)| path.starts_with("Pictures/"))
                .map(|(path, data)| OfficeAttachment::from_bytes(AttachmentType::Image, basename(path), data)),
        );
    }

    let mut ctx = OdfContext::new(config, &styles, &content, &chart_objects);
    let mut nodes = Vec::new();
    if let Some(body) = xml::child(doc.root_element(), "body") {
        for kind in xml::elements(body) {
            match xml::local_name(kind) {
                "spreadsheet" => {
                    let mut sheet_index = 0;
                    for child in xml::elements(kind) {
                        if xml::is(child, "table") {
                            nodes.push(blocks::sheet(&mut ctx, child, sheet_index));
                            sheet_index += 1;
                        }
                    }
                }
                _ => blocks::walk_blocks(&mut ctx, kind, &mut nodes),
            }
        }
    }
    nodes.append(&mut ctx.deferred_notes);

    if file_type == FileType::Ods {
        resolve_chart_references(&mut attachments, &nodes);
    }

    let mut metadata = DocumentMetadata::default();
    apply_odf_properties(&members, &mut metadata);
    metadata.style_map = styles.style_map();

    Ok(Ast {
        file_type,
        metadata,
        content: nodes,
        attachments,
        newline_delimiter: config.newline_delimiter.clone(),
    })
}

/// Replace cell-range placeholders in chart attachments with the referenced sheet cells.
fn resolve_chart_references(attachments: &mut [OfficeAttachment], content: &[ContentNode]) {
    let sheets = sheet_nodes(content);
    for attachment in attachments.iter_mut() {
        if let Some(chart) = attachment.chart_data.as_mut() {
            resolve_chart_data(chart, &sheets);
        }
    }
}

/// Resolve every placeholder in `chart` that names cells of `sheets`; others stay literal.
pub fn resolve_chart_data(chart: &mut ChartData, sheets: &[&ContentNode]) {
    let resolve = |value: &str| placeholder_reference(value).and_then(|r| resolve_in_sheets(r, sheets));

    if chart.labels.len() == 1
        && let Some(labels) = resolve(&chart.labels[0])
    {
        chart.labels = labels;
    }
    for set in &mut chart.data_sets {
        if set.values.len() == 1
            && let Some(values) = resolve(&set.values[0])
        {
            set.values = values;
        }
        if let Some(name) = set.name.as_deref()
            && let Some(parts) = resolve(name)
        {
            set.name = Some(parts.join(" ")).filter(|n| !n.trim().is_empty());
        }
    }
    chart.rebuild_raw_texts();
}

fn sheet_nodes(content: &[ContentNode]) -> Vec<&ContentNode> {
    content
        .iter()
        .filter(|n| matches!(n.metadata, Some(NodeMetadata::Sheet(_))))
        .collect()
}
