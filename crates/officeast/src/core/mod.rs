//! Parse orchestration.
//!
//! - **Entry points**: [`parse_office`] and [`parse_office_sync`]
//! - **Format detection**: extension table and content sniffing ([`mime`])
//! - **Input handling**: paths and buffers ([`io`])
//! - **Pipeline**: OCR and attachment linking after a format parser ran ([`pipeline`])
//! - **Configuration**: [`ParseConfig`] and its file loaders ([`config`])

pub mod config;
pub mod io;
pub mod mime;
pub mod parser;
pub mod pipeline;

pub use config::ParseConfig;
pub use io::OfficeInput;
pub use parser::{parse_bytes, parse_office, parse_office_sync};
