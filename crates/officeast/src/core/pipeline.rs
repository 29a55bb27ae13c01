//! Post-parse attachment pass.
//!
//! Runs after a format parser has produced its tree:
//!
//! 1. OCR every image attachment (when enabled), one image at a time
//! 2. Link image and chart nodes to their attachments by name, copying OCR text
//!    and flattened chart text into the nodes
//! 3. Recompute the denormalised `text` of every ancestor
//! 4. Drop the attachments the caller did not ask for
//!
//! OCR failures only lose that image's text.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::Result;
use crate::core::config::ParseConfig;
use crate::text;
use crate::types::{Ast, AttachmentType, ContentNode, NodeMetadata, NodeType, OfficeAttachment};

/// Run the attachment pass over a freshly parsed document.
pub async fn run_pipeline(mut ast: Ast, config: &ParseConfig) -> Result<Ast> {
    if config.ocr {
        recognize_images(&mut ast.attachments, config).await;
    }

    link_attachments(&mut ast.content, &ast.attachments, &config.newline_delimiter);
    for node in &mut ast.content {
        text::refresh_text(node, &config.newline_delimiter);
    }

    if !config.extract_attachments && !config.ocr {
        ast.attachments.clear();
    }
    Ok(ast)
}

async fn recognize_images(attachments: &mut [OfficeAttachment], config: &ParseConfig) {
    let Some(backend) = config.ocr_backend.as_ref().map(|handle| handle.0.clone()) else {
        return;
    };
    if !backend.supports_language(&config.ocr_language) {
        if config.output_error_to_console {
            tracing::warn!(
                backend = backend.name(),
                language = %config.ocr_language,
                "OCR backend does not support the requested language"
            );
        }
        return;
    }
    if let Err(err) = backend.initialize() {
        if config.output_error_to_console {
            tracing::warn!(backend = backend.name(), error = %err, "OCR backend failed to initialize");
        }
        return;
    }

    for attachment in attachments
        .iter_mut()
        .filter(|a| a.attachment_type == AttachmentType::Image)
    {
        let result = match attachment.bytes() {
            Ok(bytes) => backend.recognize(&bytes, &config.ocr_language).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(text) => {
                tracing::debug!(attachment = %attachment.name, chars = text.len(), "OCR complete");
                attachment.ocr_text = Some(text.trim().to_string());
            }
            Err(err) => {
                if config.output_error_to_console {
                    tracing::warn!(attachment = %attachment.name, error = %err, "OCR failed");
                }
            }
        }
    }
}

struct Linker<'a> {
    by_name: HashMap<&'a str, &'a OfficeAttachment>,
    /// Image attachments no node refers to, in attachment order
    unused_images: VecDeque<&'a OfficeAttachment>,
    delimiter: &'a str,
}

/// Copy attachment-derived text into the image and chart nodes under `nodes`.
///
/// Image nodes without an attachment name are given the first image attachment
/// that no node references, in order, while any remain.
pub fn link_attachments(nodes: &mut [ContentNode], attachments: &[OfficeAttachment], delimiter: &str) {
    if attachments.is_empty() {
        return;
    }

    let referenced: HashSet<String> = nodes
        .iter()
        .flat_map(|n| n.descendants())
        .filter_map(ContentNode::attachment_name)
        .map(str::to_string)
        .collect();

    let mut linker = Linker {
        by_name: attachments.iter().map(|a| (a.name.as_str(), a)).collect(),
        unused_images: attachments
            .iter()
            .filter(|a| a.attachment_type == AttachmentType::Image && !referenced.contains(&a.name))
            .collect(),
        delimiter,
    };
    for node in nodes {
        linker.visit(node);
    }
}

impl Linker<'_> {
    fn visit(&mut self, node: &mut ContentNode) {
        for child in &mut node.children {
            self.visit(child);
        }
        match node.node_type {
            NodeType::Image => self.link_image(node),
            NodeType::Chart => self.link_chart(node),
            _ => {}
        }
    }

    fn link_image(&mut self, node: &mut ContentNode) {
        let Some(NodeMetadata::Image(meta)) = &mut node.metadata else {
            return;
        };
        let attachment = match meta.attachment_name.as_deref() {
            Some(name) => self.by_name.get(name).copied(),
            None => {
                let fallback = self.unused_images.pop_front();
                if let Some(attachment) = fallback {
                    tracing::debug!(attachment = %attachment.name, "assigned unreferenced image to unnamed node");
                    meta.attachment_name = Some(attachment.name.clone());
                }
                fallback
            }
        };
        if let Some(ocr_text) = attachment.and_then(|a| a.ocr_text.as_ref()) {
            node.text = ocr_text.clone();
        }
    }

    fn link_chart(&mut self, node: &mut ContentNode) {
        let Some(NodeMetadata::Chart(meta)) = &mut node.metadata else {
            return;
        };
        let Some(chart_data) = meta
            .attachment_name
            .as_deref()
            .and_then(|name| self.by_name.get(name))
            .and_then(|a| a.chart_data.as_ref())
        else {
            return;
        };
        node.text = chart_data.raw_texts.join(self.delimiter);
        if meta.chart_data.is_none() {
            meta.chart_data = Some(chart_data.clone());
        }
    }
}
