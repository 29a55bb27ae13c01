//! Error types for officeast.
//!
//! Every fallible operation in the crate returns [`OfficeError`]. The enum follows
//! a few rules:
//!
//! - `thiserror` derives `Error` and `Display`
//! - causes are preserved through `#[source]` boxed errors
//! - messages carry the offending member path when one is known
//!
//! # Error Handling Philosophy
//!
//! **System errors bubble up unchanged:**
//! - `OfficeError::Io` (from `std::io::Error`) surfaces permission and device failures as-is
//!
//! **Structural failures abort the parse:**
//! - `Corrupted` covers missing mandatory members (main document, slides, sheets)
//!   and cross-reference inconsistencies such as an out-of-range shared-string index
//! - low-level archive and XML failures are raised as `Parsing` and upgraded to
//!   `Corrupted` by [`OfficeError::into_corruption_heuristic`] before reaching callers
//!
//! **Enrichment failures never abort:**
//! - `Ocr` and chart/object `Parsing` errors are logged and the item is dropped
//!
//! Every message starts with the `[officeast]` tag so embedding applications can
//! recognise the origin of an error string.
//!
//! # Example
//!
//! ```rust
//! use officeast::{OfficeError, Result};
//!
//! fn first_sheet(names: &[String]) -> Result<&str> {
//!     names
//!         .first()
//!         .map(String::as_str)
//!         .ok_or_else(|| OfficeError::corrupted("workbook has no sheets", Some("xl/workbook.xml")))
//! }
//! ```
use thiserror::Error;

/// Result type alias using `OfficeError`.
pub type Result<T> = std::result::Result<T, OfficeError>;

/// Fixed tag that prefixes every error message.
pub const ERROR_TAG: &str = "[officeast]";

/// Main error type for all officeast operations.
///
/// # Variants
///
/// - `Io` - file system and I/O errors (always bubble up)
/// - `UnsupportedExtension` - neither the extension nor the magic bytes name a supported format
/// - `Corrupted` - a mandatory member is missing or internally inconsistent
/// - `FileNotFound` / `IsDirectory` - the input path cannot be read as a file
/// - `InvalidInput` - the input value itself is unusable (e.g. an empty buffer)
/// - `UnknownBufferType` - a byte buffer could not be sniffed
/// - `MissingDependency` - a required external worker (OCR backend) is not configured
/// - `Parsing` - low-level parse failure, not yet classified
/// - `Ocr` - OCR backend failure
/// - `Validation` - invalid configuration
/// - `Serialization` - JSON conversion failure
#[derive(Debug, Error)]
pub enum OfficeError {
    #[error("[officeast]: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[officeast]: unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("[officeast]: file corrupted: {message}{}", path_suffix(.path))]
    Corrupted { message: String, path: Option<String> },

    #[error("[officeast]: file not found: {0}")]
    FileNotFound(String),

    #[error("[officeast]: path is a directory: {0}")]
    IsDirectory(String),

    #[error("[officeast]: invalid input: {0}")]
    InvalidInput(String),

    #[error("[officeast]: could not determine the type of the input buffer")]
    UnknownBufferType,

    #[error("[officeast]: missing dependency: {0}")]
    MissingDependency(String),

    #[error("[officeast]: parsing error: {message}")]
    Parsing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[officeast]: OCR error: {message}")]
    Ocr {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[officeast]: validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[officeast]: serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

fn path_suffix(path: &Option<String>) -> String {
    match path {
        Some(p) => format!(" ({p})"),
        None => String::new(),
    }
}

impl From<serde_json::Error> for OfficeError {
    fn from(err: serde_json::Error) -> Self {
        OfficeError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<zip::result::ZipError> for OfficeError {
    fn from(err: zip::result::ZipError) -> Self {
        OfficeError::Parsing {
            message: format!("invalid zip archive: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "pdf")]
impl From<lopdf::Error> for OfficeError {
    fn from(err: lopdf::Error) -> Self {
        OfficeError::Parsing {
            message: format!("invalid PDF: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

/// Message fragments produced by the archive and XML layers that indicate a
/// structurally broken input rather than a bug.
const CORRUPTION_MARKERS: &[&str] = &[
    "end of central directory",
    "invalid zip",
    "invalid xml",
    "unexpected end of stream",
    "unknown token",
    "invalid pdf",
    "could not find central directory",
];

impl OfficeError {
    error_constructor!(parsing, Parsing);
    error_constructor!(ocr, Ocr);
    error_constructor!(validation, Validation);
    error_constructor!(serialization, Serialization);

    /// Create a `Corrupted` error, optionally naming the offending member.
    pub fn corrupted<S: Into<String>>(message: S, path: Option<&str>) -> Self {
        Self::Corrupted {
            message: message.into(),
            path: path.map(str::to_string),
        }
    }

    /// Upgrade low-level archive/XML failures into `Corrupted`.
    ///
    /// Other variants pass through untouched.
    pub fn into_corruption_heuristic(self) -> Self {
        match self {
            OfficeError::Parsing { message, source } => {
                let lowered = message.to_ascii_lowercase();
                if CORRUPTION_MARKERS.iter().any(|m| lowered.contains(m)) {
                    OfficeError::Corrupted { message, path: None }
                } else {
                    OfficeError::Parsing { message, source }
                }
            }
            other => other,
        }
    }

    /// True for the "file corrupted" kind.
    pub fn is_corrupted(&self) -> bool {
        matches!(self, OfficeError::Corrupted { .. })
    }
}
