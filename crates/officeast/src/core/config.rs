//! Parse configuration.
//!
//! Keys are accepted in snake_case (config files) and camelCase (CLI flags and
//! JSON produced by other tooling).

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::plugins::OcrBackend;
use crate::{OfficeError, Result};

/// Options for a single parse call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Drop footnotes, endnotes and speaker notes entirely
    #[serde(default, alias = "ignoreNotes")]
    pub ignore_notes: bool,

    /// Separator between block-level siblings in text projections
    #[serde(default = "default_newline", alias = "newlineDelimiter")]
    pub newline_delimiter: String,

    /// Collect every note after the main content instead of at its reference point
    #[serde(default, alias = "putNotesAtLast")]
    pub put_notes_at_last: bool,

    /// Log errors and per-item warnings through `tracing` before returning them
    #[serde(default, alias = "outputErrorToConsole")]
    pub output_error_to_console: bool,

    /// Return embedded images and charts in `Ast::attachments`
    #[serde(default, alias = "extractAttachments")]
    pub extract_attachments: bool,

    /// Run OCR over image attachments (requires `ocr_backend`)
    #[serde(default)]
    pub ocr: bool,

    #[serde(default = "default_eng", alias = "ocrLanguage")]
    pub ocr_language: String,

    /// Keep the verbatim XML source of block nodes in `raw_content`
    #[serde(default, alias = "includeRawContent")]
    pub include_raw_content: bool,

    /// Maximum reference hops followed when resolving a PDF image object
    #[serde(
        default = "default_resolve_depth",
        alias = "pdfImageResolveDepth",
        deserialize_with = "lenient_usize"
    )]
    pub pdf_image_resolve_depth: usize,

    #[serde(skip)]
    pub ocr_backend: Option<OcrHandle>,
}

/// Shared OCR backend handle.
#[derive(Clone)]
pub struct OcrHandle(pub Arc<dyn OcrBackend>);

impl std::fmt::Debug for OcrHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("OcrHandle").field(&self.0.name()).finish()
    }
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            ignore_notes: false,
            newline_delimiter: default_newline(),
            put_notes_at_last: false,
            output_error_to_console: false,
            extract_attachments: false,
            ocr: false,
            ocr_language: default_eng(),
            include_raw_content: false,
            pdf_image_resolve_depth: default_resolve_depth(),
            ocr_backend: None,
        }
    }
}

fn default_newline() -> String {
    "\n".to_string()
}

fn default_eng() -> String {
    "eng".to_string()
}

fn default_resolve_depth() -> usize {
    16
}

fn lenient_usize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(usize),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl ParseConfig {
    /// Attach an OCR backend.
    pub fn with_ocr_backend(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.ocr_backend = Some(OcrHandle(backend));
        self
    }

    /// Images are collected when they are returned or OCR'd.
    pub fn wants_images(&self) -> bool {
        self.extract_attachments || self.ocr
    }

    /// Reject combinations that cannot run.
    ///
    /// # Errors
    ///
    /// `MissingDependency` when OCR is requested without a backend.
    pub fn validate(&self) -> Result<()> {
        if self.ocr && self.ocr_backend.is_none() {
            return Err(OfficeError::MissingDependency(
                "OCR was requested but no OCR backend is configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        toml::from_str(&content)
            .map_err(|e| OfficeError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| OfficeError::validation(format!("Invalid YAML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_json::from_str(&content)
            .map_err(|e| OfficeError::validation(format!("Invalid JSON in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration, picking the loader from the file extension (TOML by default).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::from_json_file(path),
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Discover `officeast.toml` in the current directory or its parents.
    ///
    /// # Returns
    ///
    /// - `Some(config)` if found
    /// - `None` if no config file found
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir().map_err(OfficeError::Io)?;

        loop {
            let candidate = current.join("officeast.toml");
            if candidate.exists() {
                return Ok(Some(Self::from_toml_file(candidate)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| OfficeError::validation(format!("Failed to read config file {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ParseConfig::default();
        assert!(!config.ignore_notes);
        assert_eq!(config.newline_delimiter, "\n");
        assert_eq!(config.ocr_language, "eng");
        assert!(!config.wants_images());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("officeast.toml");
        fs::write(
            &config_path,
            r#"
ignore_notes = true
newline_delimiter = " | "
        "#,
        )
        .unwrap();

        let config = ParseConfig::from_toml_file(&config_path).unwrap();
        assert!(config.ignore_notes);
        assert_eq!(config.newline_delimiter, " | ");
        assert!(!config.put_notes_at_last);
    }

    #[test]
    fn test_camel_case_json() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(
            &config_path,
            r#"{"putNotesAtLast": true, "ocrLanguage": "deu", "pdfImageResolveDepth": "4"}"#,
        )
        .unwrap();

        let config = ParseConfig::from_file(&config_path).unwrap();
        assert!(config.put_notes_at_last);
        assert_eq!(config.ocr_language, "deu");
        assert_eq!(config.pdf_image_resolve_depth, 4);
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, "extract_attachments: true\n").unwrap();

        let config = ParseConfig::from_file(&config_path).unwrap();
        assert!(config.extract_attachments);
        assert!(config.wants_images());
    }

    #[test]
    fn test_invalid_toml_is_validation_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("officeast.toml");
        fs::write(&config_path, "ignore_notes = [").unwrap();

        let err = ParseConfig::from_toml_file(&config_path).unwrap_err();
        assert!(matches!(err, OfficeError::Validation { .. }));
    }

    #[test]
    fn test_ocr_without_backend_is_rejected() {
        let config = ParseConfig {
            ocr: true,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(OfficeError::MissingDependency(_))));
    }
}
