//! Collaborator plugins.
//!
//! The parser depends on external services only through these traits. The one
//! consumed today is [`OcrBackend`], which turns image bytes plus a language tag
//! into recognised text. Backends are shared as `Arc<dyn OcrBackend>` and set on
//! [`ParseConfig::ocr_backend`](crate::ParseConfig::ocr_backend).

pub mod ocr;
pub mod traits;

pub use ocr::OcrBackend;
pub use traits::Plugin;
