//! ZIP container access.
//!
//! The only operation the format parsers need from the archive layer is
//! `(bytes, path predicate) -> [{path, bytes}]`. [`Members`] wraps the result in
//! a path-indexed map with the decoding helpers every OOXML/ODF parser uses.

use encoding_rs::{Encoding, UTF_8};
use indexmap::IndexMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::error::{OfficeError, Result};

/// A single member file read from an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Member path within the archive, as stored (forward slashes)
    pub path: String,
    pub content: Vec<u8>,
}

/// Read every non-directory member whose path satisfies `filter`, in archive order.
///
/// # Errors
///
/// Returns a `Parsing` error carrying the zip failure message; the corruption
/// heuristic upgrades it to `Corrupted`.
pub fn extract_files<F>(bytes: &[u8], filter: F) -> Result<Vec<ArchiveEntry>>
where
    F: Fn(&str) -> bool,
{
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let path = file.name().to_string();
        if !filter(&path) {
            continue;
        }
        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)
            .map_err(|e| OfficeError::parsing_with_source(format!("invalid zip member {path}"), e))?;
        entries.push(ArchiveEntry { path, content });
    }

    tracing::debug!(count = entries.len(), "extracted archive members");
    Ok(entries)
}

/// List member paths without reading their contents.
pub fn list_files(bytes: &[u8]) -> Result<Vec<String>> {
    let archive = ZipArchive::new(Cursor::new(bytes))?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Members extracted from an office container, keyed by path.
#[derive(Debug, Default)]
pub struct Members {
    entries: IndexMap<String, Vec<u8>>,
}

impl Members {
    pub fn extract<F>(bytes: &[u8], filter: F) -> Result<Self>
    where
        F: Fn(&str) -> bool,
    {
        let entries = extract_files(bytes, filter)?
            .into_iter()
            .map(|e| (e.path, e.content))
            .collect();
        Ok(Self { entries })
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Decode a member as text (BOM stripped, invalid UTF-8 replaced).
    pub fn text(&self, path: &str) -> Option<String> {
        self.get(path).map(decode_text)
    }

    /// Decode a mandatory member.
    ///
    /// # Errors
    ///
    /// `Corrupted` naming `path` when the member is absent.
    pub fn require_text(&self, path: &str) -> Result<String> {
        self.text(path)
            .ok_or_else(|| OfficeError::corrupted("missing mandatory member", Some(path)))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Decode a text member. A byte-order mark selects UTF-8 or UTF-16 and is dropped;
/// without one the bytes are read as UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    let encoding = Encoding::for_bom(bytes).map_or(UTF_8, |(encoding, _)| encoding);
    let (text, _) = encoding.decode_with_bom_removal(bytes);
    text.into_owned()
}

/// Final path segment (`word/media/image1.png` -> `image1.png`).
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
