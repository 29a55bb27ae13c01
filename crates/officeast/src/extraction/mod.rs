//! Format parsers and the container/XML layers they share.
//!
//! Each format module exposes a synchronous `parse(bytes, config) -> Result<Ast>`.
//! [`crate::core::parser`] picks one by detected format and runs it off the async
//! executor.

pub mod archive;
pub mod cells;
pub mod chart;
pub mod lists;
pub mod odf;
pub mod office_metadata;
pub mod ooxml;
pub mod rtf;
pub mod xml;

#[cfg(feature = "pdf")]
pub mod pdf;

pub use archive::{ArchiveEntry, extract_files, list_files};
pub use chart::parse_chart;
