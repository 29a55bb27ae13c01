//! Main entry points.
//!
//! [`parse_office`] loads the input, detects its format, runs the matching format
//! parser on a blocking worker thread, and finishes with the attachment pass in
//! [`crate::core::pipeline`]. Every error leaving this module has been through
//! [`OfficeError::into_corruption_heuristic`].

use once_cell::sync::Lazy;

use crate::core::config::ParseConfig;
use crate::core::io::{self, OfficeInput};
use crate::core::pipeline;
use crate::extraction::{odf, ooxml, rtf};
use crate::types::{Ast, FileType};
use crate::{OfficeError, Result};

/// Global Tokio runtime for the synchronous wrapper.
///
/// Created on first use and shared by every [`parse_office_sync`] call.
static GLOBAL_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create global Tokio runtime - system may be out of resources")
});

/// Parse an office document into an [`Ast`].
///
/// `input` is a path (classified by extension, sniffed when it has none) or a
/// byte buffer (always sniffed).
///
/// # Errors
///
/// - `FileNotFound`, `IsDirectory`, `Io` for unreadable paths
/// - `InvalidInput`, `UnknownBufferType`, `UnsupportedExtension` when the format cannot be determined
/// - `MissingDependency` when OCR is requested without a backend
/// - `Corrupted` when a mandatory part is missing or inconsistent
///
/// # Example
///
/// ```rust,no_run
/// use officeast::{parse_office, ParseConfig};
///
/// # async fn example() -> officeast::Result<()> {
/// let ast = parse_office("report.docx", &ParseConfig::default()).await?;
/// println!("{}", ast.to_text());
/// # Ok(())
/// # }
/// ```
#[tracing::instrument(skip_all, fields(input = tracing::field::Empty))]
pub async fn parse_office(input: impl Into<OfficeInput>, config: &ParseConfig) -> Result<Ast> {
    let input = input.into();
    tracing::Span::current().record("input", input.describe().as_str());

    let result = parse_input(input, config)
        .await
        .map_err(OfficeError::into_corruption_heuristic);
    if let Err(err) = &result
        && config.output_error_to_console
    {
        tracing::error!(error = %err, "failed to parse document");
    }
    result
}

/// Synchronous wrapper for [`parse_office`].
///
/// Runs on a process-wide runtime; must not be called from inside an async context.
pub fn parse_office_sync(input: impl Into<OfficeInput>, config: &ParseConfig) -> Result<Ast> {
    GLOBAL_RUNTIME.block_on(parse_office(input, config))
}

async fn parse_input(input: OfficeInput, config: &ParseConfig) -> Result<Ast> {
    config.validate()?;
    let (bytes, file_type) = io::load(input).await?;
    tracing::debug!(%file_type, size = bytes.len(), "detected document format");

    let worker_config = config.clone();
    let span = tracing::Span::current();
    let ast = tokio::task::spawn_blocking(move || {
        let _guard = span.entered();
        parse_bytes(&bytes, file_type, &worker_config)
    })
    .await
    .map_err(|e| OfficeError::parsing(format!("parser task failed: {e}")))??;

    pipeline::run_pipeline(ast, config).await
}

/// Run the format parser for `file_type` without the attachment pass.
///
/// # Errors
///
/// Whatever the format parser reports; `MissingDependency` for PDF input when the
/// crate was built without the `pdf` feature.
pub fn parse_bytes(bytes: &[u8], file_type: FileType, config: &ParseConfig) -> Result<Ast> {
    match file_type {
        FileType::Docx => ooxml::docx::parse(bytes, config),
        FileType::Xlsx => ooxml::xlsx::parse(bytes, config),
        FileType::Pptx => ooxml::pptx::parse(bytes, config),
        FileType::Odt | FileType::Odp | FileType::Ods => odf::parse(bytes, config),
        FileType::Rtf => rtf::parse(bytes, config),
        #[cfg(feature = "pdf")]
        FileType::Pdf => crate::extraction::pdf::parse(bytes, config),
        #[cfg(not(feature = "pdf"))]
        FileType::Pdf => Err(OfficeError::MissingDependency(
            "PDF support requires the `pdf` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::archive::test_support::zip_bytes;

    const DOCUMENT: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:body></w:document>"#;

    #[tokio::test]
    async fn test_parse_docx_bytes() {
        let bytes = zip_bytes(&[("word/document.xml", DOCUMENT.as_bytes())]);
        let ast = parse_office(bytes, &ParseConfig::default()).await.unwrap();
        assert_eq!(ast.file_type, FileType::Docx);
        assert_eq!(ast.to_text(), "Hello");
    }

    #[tokio::test]
    async fn test_broken_zip_is_corrupted() {
        let mut bytes = zip_bytes(&[("word/document.xml", DOCUMENT.as_bytes())]);
        bytes.truncate(bytes.len() - 10);
        let err = parse_bytes(&bytes, FileType::Docx, &ParseConfig::default()).unwrap_err();
        assert!(!err.is_corrupted());
        assert!(err.into_corruption_heuristic().is_corrupted());

        let err = parse_office(OfficeInput::Bytes(zip_bytes(&[("other.txt", b"x")])), &ParseConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OfficeError::UnknownBufferType | OfficeError::UnsupportedExtension(_)));
    }

    #[tokio::test]
    async fn test_ocr_without_backend_fails_fast() {
        let config = ParseConfig {
            ocr: true,
            ..Default::default()
        };
        let err = parse_office(br"{\rtf1 x}", &config).await.unwrap_err();
        assert!(matches!(err, OfficeError::MissingDependency(_)));
    }

    #[test]
    fn test_sync_wrapper() {
        let ast = parse_office_sync(br"{\rtf1 Plain text\par}", &ParseConfig::default()).unwrap();
        assert_eq!(ast.file_type, FileType::Rtf);
        assert_eq!(ast.to_text(), "Plain text");
    }
}
