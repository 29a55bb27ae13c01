//! Format detection.
//!
//! Paths are classified by extension. Byte buffers are sniffed: `infer` recognises
//! most containers by magic bytes, RTF is matched on its `{\rtf` header, and ZIP
//! archives that `infer` cannot place are classified by their members.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;

use crate::extraction::{archive, odf};
use crate::types::FileType;
use crate::{OfficeError, Result};

pub const DOCX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const PPTX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const ODT_MIME_TYPE: &str = "application/vnd.oasis.opendocument.text";
pub const ODP_MIME_TYPE: &str = "application/vnd.oasis.opendocument.presentation";
pub const ODS_MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";
pub const RTF_MIME_TYPE: &str = "application/rtf";
pub const PDF_MIME_TYPE: &str = "application/pdf";

static EXT_TO_FILE_TYPE: Lazy<HashMap<&'static str, FileType>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("docx", FileType::Docx);
    m.insert("xlsx", FileType::Xlsx);
    m.insert("pptx", FileType::Pptx);
    m.insert("odt", FileType::Odt);
    m.insert("odp", FileType::Odp);
    m.insert("ods", FileType::Ods);
    m.insert("rtf", FileType::Rtf);
    m.insert("pdf", FileType::Pdf);
    m
});

static MIME_TO_FILE_TYPE: Lazy<HashMap<&'static str, FileType>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(DOCX_MIME_TYPE, FileType::Docx);
    m.insert(XLSX_MIME_TYPE, FileType::Xlsx);
    m.insert(PPTX_MIME_TYPE, FileType::Pptx);
    m.insert(ODT_MIME_TYPE, FileType::Odt);
    m.insert(ODP_MIME_TYPE, FileType::Odp);
    m.insert(ODS_MIME_TYPE, FileType::Ods);
    m.insert(RTF_MIME_TYPE, FileType::Rtf);
    m.insert("text/rtf", FileType::Rtf);
    m.insert(PDF_MIME_TYPE, FileType::Pdf);
    m
});

/// MIME type of a supported format.
pub fn mime_type(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Docx => DOCX_MIME_TYPE,
        FileType::Xlsx => XLSX_MIME_TYPE,
        FileType::Pptx => PPTX_MIME_TYPE,
        FileType::Odt => ODT_MIME_TYPE,
        FileType::Odp => ODP_MIME_TYPE,
        FileType::Ods => ODS_MIME_TYPE,
        FileType::Rtf => RTF_MIME_TYPE,
        FileType::Pdf => PDF_MIME_TYPE,
    }
}

/// Supported format for an extension (case-insensitive, with or without the dot).
pub fn file_type_from_extension(extension: &str) -> Option<FileType> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    EXT_TO_FILE_TYPE.get(ext.as_str()).copied()
}

/// Classify a path by its extension.
///
/// Returns `Ok(None)` when the path has no extension, so the caller can fall back
/// to sniffing the content.
///
/// # Errors
///
/// `UnsupportedExtension` when the extension is present but not supported.
pub fn detect_from_path(path: impl AsRef<Path>) -> Result<Option<FileType>> {
    let Some(ext) = path.as_ref().extension().and_then(|ext| ext.to_str()) else {
        return Ok(None);
    };
    file_type_from_extension(ext)
        .map(Some)
        .ok_or_else(|| OfficeError::UnsupportedExtension(ext.to_ascii_lowercase()))
}

/// Classify a byte buffer by its content.
///
/// # Errors
///
/// - `InvalidInput` for an empty buffer
/// - `UnsupportedExtension` when the content is recognised but not a supported format
/// - `UnknownBufferType` when nothing matches
pub fn detect_from_bytes(bytes: &[u8]) -> Result<FileType> {
    if bytes.is_empty() {
        return Err(OfficeError::InvalidInput("buffer is empty".to_string()));
    }

    let trimmed = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(bytes, |start| &bytes[start..]);
    if trimmed.starts_with(b"{\\rtf") {
        return Ok(FileType::Rtf);
    }

    let inferred = infer::get(bytes);
    if let Some(kind) = inferred
        && let Some(file_type) = MIME_TO_FILE_TYPE.get(kind.mime_type())
    {
        return Ok(*file_type);
    }

    if bytes.starts_with(b"PK\x03\x04")
        && let Some(file_type) = detect_zip_members(bytes)
    {
        return Ok(file_type);
    }

    match inferred {
        Some(kind) => Err(OfficeError::UnsupportedExtension(kind.extension().to_string())),
        None => Err(OfficeError::UnknownBufferType),
    }
}

fn detect_zip_members(bytes: &[u8]) -> Option<FileType> {
    let members = archive::list_files(bytes).ok()?;
    let has = |name: &str| members.iter().any(|m| m == name);

    if has("mimetype") {
        let mimetype = archive::extract_files(bytes, |p| p == "mimetype")
            .ok()?
            .into_iter()
            .next()
            .map(|entry| archive::decode_text(&entry.content));
        return Some(odf::detect_file_type(mimetype.as_deref()));
    }
    if has("word/document.xml") {
        Some(FileType::Docx)
    } else if has("xl/workbook.xml") {
        Some(FileType::Xlsx)
    } else if has("ppt/presentation.xml") {
        Some(FileType::Pptx)
    } else if has("content.xml") {
        Some(FileType::Odt)
    } else {
        None
    }
}
