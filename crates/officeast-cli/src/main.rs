//! officeast CLI - print the text (or JSON AST) of an office document.
//!
//! ```text
//! officeast [--option=value]... <filePath>
//! ```
//!
//! Options are the camelCase configuration keys. `true`/`false` values become
//! booleans, anything else is passed through as a string.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use officeast::{OfficeError, ParseConfig};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "officeast", version, about = "Extract text and structure from office documents")]
struct Cli {
    /// Document to parse (.docx, .xlsx, .pptx, .odt, .odp, .ods, .rtf, .pdf)
    #[arg(value_name = "filePath")]
    file_path: PathBuf,

    /// Configuration file (TOML, YAML or JSON); flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the AST as JSON instead of plain text
    #[arg(long)]
    json: bool,

    #[arg(long = "ignoreNotes", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    ignore_notes: Option<String>,

    #[arg(long = "newlineDelimiter", value_name = "STRING", require_equals = true)]
    newline_delimiter: Option<String>,

    #[arg(long = "putNotesAtLast", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    put_notes_at_last: Option<String>,

    #[arg(long = "outputErrorToConsole", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    output_error_to_console: Option<String>,

    #[arg(long = "extractAttachments", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    extract_attachments: Option<String>,

    /// OCR image attachments (needs an OCR backend; the CLI ships none)
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    ocr: Option<String>,

    #[arg(long = "ocrLanguage", value_name = "LANG", require_equals = true)]
    ocr_language: Option<String>,

    #[arg(long = "includeRawContent", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    include_raw_content: Option<String>,

    #[arg(long = "pdfImageResolveDepth", value_name = "N", require_equals = true)]
    pdf_image_resolve_depth: Option<String>,
}

impl Cli {
    /// Flag values keyed by their configuration field name.
    fn overrides(&self) -> Vec<(&'static str, &str)> {
        [
            ("ignore_notes", &self.ignore_notes),
            ("newline_delimiter", &self.newline_delimiter),
            ("put_notes_at_last", &self.put_notes_at_last),
            ("output_error_to_console", &self.output_error_to_console),
            ("extract_attachments", &self.extract_attachments),
            ("ocr", &self.ocr),
            ("ocr_language", &self.ocr_language),
            ("include_raw_content", &self.include_raw_content),
            ("pdf_image_resolve_depth", &self.pdf_image_resolve_depth),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect()
    }
}

/// `"true"`/`"false"` become booleans; everything else stays a string.
fn coerce(value: &str) -> Value {
    match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::String(other.to_string()),
    }
}

fn build_config(cli: &Cli) -> Result<ParseConfig> {
    let base = match &cli.config {
        Some(path) => ParseConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => ParseConfig::discover()?.unwrap_or_default(),
    };

    let overrides = cli.overrides();
    if overrides.is_empty() {
        return Ok(base);
    }

    let mut fields: Map<String, Value> = match serde_json::to_value(&base)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in overrides {
        fields.insert(key.to_string(), coerce(value));
    }
    serde_json::from_value(Value::Object(fields)).context("invalid option value")
}

async fn run(cli: &Cli) -> Result<()> {
    let config = build_config(cli)?;
    tracing::debug!(path = %cli.file_path.display(), json = cli.json, "parsing document");
    let ast = officeast::parse_office(cli.file_path.as_path(), &config).await?;
    if cli.json {
        println!("{}", ast.to_json()?);
    } else {
        println!("{}", ast.to_text());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            if matches!(err.downcast_ref::<OfficeError>(), Some(OfficeError::UnsupportedExtension(_))) {
                eprintln!("{}", Cli::command().render_usage());
                return ExitCode::from(2);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_in_any_order() {
        let cli = Cli::try_parse_from(["officeast", "--ignoreNotes=true", "doc.docx", "--ocrLanguage=deu"]).unwrap();
        assert_eq!(cli.file_path, PathBuf::from("doc.docx"));
        assert_eq!(cli.overrides(), vec![("ignore_notes", "true"), ("ocr_language", "deu")]);
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce("true"), Value::Bool(true));
        assert_eq!(coerce("false"), Value::Bool(false));
        assert_eq!(coerce("True"), Value::String("True".into()));
    }

    #[test]
    fn test_build_config_applies_overrides() {
        let cli = Cli::try_parse_from([
            "officeast",
            "--putNotesAtLast",
            "--newlineDelimiter= | ",
            "--pdfImageResolveDepth=3",
            "x.pptx",
        ])
        .unwrap();
        let config = build_config(&cli).unwrap();
        assert!(config.put_notes_at_last);
        assert_eq!(config.newline_delimiter, " | ");
        assert_eq!(config.pdf_image_resolve_depth, 3);
        assert!(!config.ignore_notes);
    }

    #[test]
    fn test_non_boolean_flag_value_is_rejected() {
        let cli = Cli::try_parse_from(["officeast", "--ignoreNotes=yes", "x.docx"]).unwrap();
        assert!(build_config(&cli).is_err());
    }
}
