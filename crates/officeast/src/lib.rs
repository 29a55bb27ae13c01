//! officeast - a unified document AST for office formats.
//!
//! Parses DOCX, XLSX, PPTX, ODT, ODP, ODS, RTF and PDF into one tree of
//! [`ContentNode`]s: paragraphs, headings, lists, tables, notes, slides, sheets and
//! pages, with per-run formatting, plus the embedded images and charts as
//! [`OfficeAttachment`]s.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use officeast::{parse_office_sync, ParseConfig};
//!
//! # fn main() -> officeast::Result<()> {
//! let config = ParseConfig::default();
//! let ast = parse_office_sync("slides.pptx", &config)?;
//! println!("{}", ast.to_text());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Core** (`core`): entry points, format detection, configuration, attachment pass
//! - **Extraction** (`extraction`): one parser per format family plus the ZIP and XML layers
//! - **Plugins** (`plugins`): collaborator traits such as [`plugins::OcrBackend`]
//! - **Types** (`types`): the AST and its metadata records
//!
//! # Features
//!
//! - `pdf` (default): PDF text and image extraction through `lopdf`

#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod extraction;
pub mod plugins;
pub mod text;
pub mod types;

pub use error::{OfficeError, Result};
pub use types::*;

pub use core::config::ParseConfig;
pub use core::io::OfficeInput;
pub use core::mime::{
    DOCX_MIME_TYPE, ODP_MIME_TYPE, ODS_MIME_TYPE, ODT_MIME_TYPE, PDF_MIME_TYPE, PPTX_MIME_TYPE, RTF_MIME_TYPE,
    XLSX_MIME_TYPE, detect_from_bytes, detect_from_path,
};
pub use core::parser::{parse_office, parse_office_sync};
