//! Portable Document Format (`.pdf`).
//!
//! Page content streams are interpreted just far enough to know where text lands:
//! the text matrix is tracked through the positioning operators, and a new line
//! starts whenever the vertical coordinate of a shown string differs from the
//! previous one. Image XObjects painted with `Do` become image nodes appended to
//! their page.

mod fonts;
mod images;
mod metadata;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

use crate::Result;
use crate::core::config::ParseConfig;
use crate::types::{
    Ast, AttachmentType, ContentNode, DocumentMetadata, FileType, ImageMetadata, NodeMetadata, NodeType,
    OfficeAttachment, PageMetadata, TextFormatting,
};
use fonts::FontDecoder;

/// Two baselines closer than this are the same line.
const SAME_LINE_EPSILON: f64 = 0.01;

/// `TJ` adjustments below this many thousandths of an em read as a word gap.
const TJ_SPACE_THRESHOLD: f64 = -200.0;

/// Follow a reference chain for at most `depth` hops.
///
/// `None` when the chain is broken or longer than allowed.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object, depth: usize) -> Option<&'a Object> {
    let mut current = object;
    for _ in 0..=depth {
        match current {
            Object::Reference(id) => current = doc.objects.get(id)?,
            other => return Some(other),
        }
    }
    None
}

/// Stream bytes with filters applied; unfiltered streams are returned as stored.
pub(crate) fn stream_data(stream: &Stream) -> Vec<u8> {
    if stream.dict.has(b"Filter") {
        match stream.decompressed_content() {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(error = %err, "failed to decompress PDF stream");
                Vec::new()
            }
        }
    } else {
        stream.content.clone()
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    for (slot, operand) in out.iter_mut().zip(operands.get(..N)?) {
        *slot = number(operand)?;
    }
    Some(out)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(self, tx: f64, ty: f64) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        Matrix([a, b, c, d, tx * a + ty * c + e, tx * b + ty * d + f])
    }

    fn y(&self) -> f64 {
        self.0[5]
    }
}

/// Resources of a page, inherited from the page tree when the page has none.
fn page_resources(doc: &Document, page_id: ObjectId, depth: usize) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..=depth {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(doc, resources, depth)?.as_dict().ok();
        }
        node = resolve(doc, node.get(b"Parent").ok()?, depth)?.as_dict().ok()?;
    }
    None
}

/// Look up `name` in the `category` sub-dictionary of `resources`.
fn resource<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    category: &[u8],
    name: &[u8],
    depth: usize,
) -> Option<&'a Object> {
    let entries = resolve(doc, resources?.get(category).ok()?, depth)?.as_dict().ok()?;
    resolve(doc, entries.get(name).ok()?, depth)
}

struct PageWalker<'a> {
    doc: &'a Document,
    config: &'a ParseConfig,
    page_number: usize,
    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f64,
    font: FontDecoder,
    lines: Vec<(f64, String)>,
    images: Vec<ContentNode>,
    attachments: Vec<OfficeAttachment>,
}

impl<'a> PageWalker<'a> {
    fn new(doc: &'a Document, config: &'a ParseConfig, page_number: usize) -> Self {
        Self {
            doc,
            config,
            page_number,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            leading: 0.0,
            font: FontDecoder::simple(),
            lines: Vec::new(),
            images: Vec::new(),
            attachments: Vec::new(),
        }
    }

    fn depth(&self) -> usize {
        self.config.pdf_image_resolve_depth
    }

    /// Run one content stream; `forms` counts enclosing form XObjects.
    fn interpret(&mut self, data: &[u8], resources: Option<&'a Dictionary>, forms: usize) {
        let content = match Content::decode(data) {
            Ok(content) => content,
            Err(err) => {
                tracing::debug!(page = self.page_number, error = %err, "undecodable content stream");
                return;
            }
        };
        // Font names are scoped to this stream's resource dictionary.
        let mut fonts: HashMap<Vec<u8>, FontDecoder> = HashMap::new();

        for op in &content.operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "BT" => {
                    self.text_matrix = Matrix::IDENTITY;
                    self.line_matrix = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        let (doc, depth) = (self.doc, self.depth());
                        self.font = fonts
                            .entry(name.to_vec())
                            .or_insert_with(|| {
                                resource(doc, resources, b"Font", name, depth)
                                    .and_then(|f| f.as_dict().ok())
                                    .map_or_else(FontDecoder::simple, |f| FontDecoder::load(doc, f, depth))
                            })
                            .clone();
                    }
                }
                "Tm" => {
                    if let Some(m) = numbers::<6>(operands) {
                        self.text_matrix = Matrix(m);
                        self.line_matrix = Matrix(m);
                    }
                }
                "Td" => {
                    if let Some([tx, ty]) = numbers::<2>(operands) {
                        self.move_line(tx, ty);
                    }
                }
                "TD" => {
                    if let Some([tx, ty]) = numbers::<2>(operands) {
                        self.leading = -ty;
                        self.move_line(tx, ty);
                    }
                }
                "TL" => {
                    if let Some([leading]) = numbers::<1>(operands) {
                        self.leading = leading;
                    }
                }
                "T*" => self.next_line(),
                "Tj" => {
                    if let Some(text) = operands.first().and_then(|o| self.decode(o)) {
                        self.show(&text);
                    }
                }
                "'" => {
                    self.next_line();
                    if let Some(text) = operands.first().and_then(|o| self.decode(o)) {
                        self.show(&text);
                    }
                }
                "\"" => {
                    self.next_line();
                    if let Some(text) = operands.get(2).and_then(|o| self.decode(o)) {
                        self.show(&text);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let mut text = String::new();
                        for item in items {
                            match number(item) {
                                Some(adjust) if adjust < TJ_SPACE_THRESHOLD => text.push(' '),
                                Some(_) => {}
                                None => text.extend(self.decode(item)),
                            }
                        }
                        self.show(&text);
                    }
                }
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.paint(name, resources, forms);
                    }
                }
                _ => {}
            }
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = self.line_matrix.translate(tx, ty);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn decode(&self, object: &Object) -> Option<String> {
        let Object::String(bytes, _) = object else {
            return None;
        };
        Some(self.font.decode(bytes))
    }

    fn show(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let y = self.text_matrix.y();
        match self.lines.last_mut() {
            Some((line_y, line)) if (*line_y - y).abs() < SAME_LINE_EPSILON => line.push_str(text),
            _ => self.lines.push((y, text.to_string())),
        }
    }

    fn paint(&mut self, name: &[u8], resources: Option<&'a Dictionary>, forms: usize) {
        let Some(stream) = resource(self.doc, resources, b"XObject", name, self.depth()).and_then(|o| o.as_stream().ok())
        else {
            tracing::debug!(
                page = self.page_number,
                name = %String::from_utf8_lossy(name),
                "XObject not found"
            );
            return;
        };

        match stream.dict.get(b"Subtype").ok().and_then(|s| s.as_name().ok()) {
            Some(b"Image") => self.image(stream),
            Some(b"Form") if forms < self.depth() => {
                let inner = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve(self.doc, r, self.depth()))
                    .and_then(|r| r.as_dict().ok())
                    .or(resources);
                // `Do` runs the form inside its own graphics state.
                let font = self.font.clone();
                self.interpret(&stream_data(stream), inner, forms + 1);
                self.font = font;
            }
            _ => {}
        }
    }

    fn image(&mut self, stream: &Stream) {
        let base = format!("page{}-image{}", self.page_number, self.images.len() + 1);
        let name = if self.config.wants_images() {
            let Some(encoded) = images::encode(self.doc, stream, self.depth()) else {
                tracing::debug!(page = self.page_number, "skipping image with unsupported encoding");
                return;
            };
            let name = format!("{base}.{}", encoded.extension);
            self.attachments
                .push(OfficeAttachment::from_bytes(AttachmentType::Image, &name, &encoded.bytes));
            name
        } else {
            format!("{base}.{}", images::extension_for(stream))
        };

        self.images
            .push(ContentNode::new(NodeType::Image).with_metadata(NodeMetadata::Image(ImageMetadata {
                attachment_name: Some(name),
                alt_text: None,
            })));
    }

    fn finish(self) -> (ContentNode, Vec<OfficeAttachment>) {
        let config = self.config;
        let delimiter = &config.newline_delimiter;
        let plain = TextFormatting::default();
        let mut children: Vec<ContentNode> = self
            .lines
            .into_iter()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(_, line)| {
                ContentNode::block(NodeType::Paragraph, vec![ContentNode::text_run(line, &plain)], delimiter)
            })
            .collect();
        children.extend(self.images);

        let page = ContentNode::block(NodeType::Page, children, delimiter).with_metadata(NodeMetadata::Page(PageMetadata {
            page_number: self.page_number,
        }));
        (page, self.attachments)
    }
}

/// Parse a PDF document.
///
/// # Errors
///
/// `Parsing` ("invalid PDF") when the file structure cannot be loaded; the
/// entry point upgrades it to `Corrupted`.
pub fn parse(bytes: &[u8], config: &ParseConfig) -> Result<Ast> {
    let doc = Document::load_mem(bytes)?;
    let pages = doc.get_pages();
    tracing::debug!(pages = pages.len(), "parsing PDF document");

    let mut content = Vec::with_capacity(pages.len());
    let mut attachments = Vec::new();
    for (index, page_id) in pages.values().enumerate() {
        let page_number = index + 1;
        let data = match doc.get_page_content(*page_id) {
            Ok(data) => data,
            Err(err) => {
                if config.output_error_to_console {
                    tracing::warn!(page = page_number, error = %err, "failed to read page content");
                }
                Vec::new()
            }
        };

        let mut walker = PageWalker::new(&doc, config, page_number);
        let resources = page_resources(&doc, *page_id, config.pdf_image_resolve_depth);
        walker.interpret(&data, resources, 0);
        let (page, page_attachments) = walker.finish();
        content.push(page);
        attachments.extend(page_attachments);
    }

    let mut metadata = DocumentMetadata::default();
    metadata::read_info(&doc, config.pdf_image_resolve_depth, &mut metadata);
    metadata.pages = Some(pages.len());

    Ok(Ast {
        file_type: FileType::Pdf,
        metadata,
        content,
        attachments,
        newline_delimiter: config.newline_delimiter.clone(),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Document, Object, Stream, dictionary};

    /// A PDF whose pages each run one operation list against shared resources.
    ///
    /// `resources` may add indirect objects (streams must be indirect) before
    /// returning the resource dictionary.
    pub fn pdf_bytes(pages: Vec<Vec<Operation>>, resources: impl FnOnce(&mut Document) -> Dictionary) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let resources = resources(&mut doc);
        let resources_id = doc.add_object(resources);

        let mut kids: Vec<Object> = Vec::new();
        for operations in pages {
            let data = Content { operations }.encode().unwrap();
            let content_id = doc.add_object(Stream::new(dictionary! {}, data));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    pub fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }
}
