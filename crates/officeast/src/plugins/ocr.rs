//! OCR backend plugin trait.

use async_trait::async_trait;

use crate::Result;
use crate::plugins::Plugin;

/// Raster OCR collaborator: image bytes plus a language tag in, text out.
///
/// The attachment pass calls [`OcrBackend::recognize`] once per image,
/// sequentially. A failure only drops that image's OCR text.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use officeast::plugins::{OcrBackend, Plugin};
/// use officeast::Result;
///
/// struct Fixed;
///
/// impl Plugin for Fixed {
///     fn name(&self) -> &str { "fixed" }
///     fn version(&self) -> String { "1.0.0".to_string() }
/// }
///
/// #[async_trait]
/// impl OcrBackend for Fixed {
///     async fn recognize(&self, _image: &[u8], _language: &str) -> Result<String> {
///         Ok("recognised".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait OcrBackend: Plugin {
    /// Recognise text in an encoded raster image (PNG, JPEG, ...).
    ///
    /// `language` is a Tesseract-style tag such as `"eng"` or `"eng+deu"`.
    ///
    /// # Errors
    ///
    /// Backends report failures as `OfficeError::Ocr`.
    async fn recognize(&self, image_bytes: &[u8], language: &str) -> Result<String>;

    /// Whether the backend can handle `language`. Unsupported languages are skipped with a warning.
    fn supports_language(&self, _language: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OfficeError;

    struct Echo;

    impl Plugin for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn version(&self) -> String {
            "1.0.0".to_string()
        }
    }

    #[async_trait]
    impl OcrBackend for Echo {
        async fn recognize(&self, image_bytes: &[u8], language: &str) -> Result<String> {
            if image_bytes.is_empty() {
                return Err(OfficeError::ocr("empty image"));
            }
            Ok(format!("{language}:{}", image_bytes.len()))
        }
    }

    #[tokio::test]
    async fn test_recognize_through_trait_object() {
        let backend: std::sync::Arc<dyn OcrBackend> = std::sync::Arc::new(Echo);
        assert_eq!(backend.recognize(&[1, 2, 3], "eng").await.unwrap(), "eng:3");
        assert!(backend.recognize(&[], "eng").await.is_err());
        assert!(backend.supports_language("deu"));
    }
}
