//! Integration tests for the `officeast` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::{SimpleFileOptions, ZipWriter};

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_officeast"))
}

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        for (path, content) in files {
            zip.start_file(*path, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer
}

const SLIDE: &str = r#"<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>Slide text</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;
const NOTES: &str = r#"<p:notes xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:cSld><p:spTree><p:sp><p:nvSpPr><p:cNvPr id="3" name="Notes"/><p:cNvSpPr/><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>Speaker note</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:notes>"#;

fn pptx_with_notes() -> Vec<u8> {
    zip_bytes(&[
        ("ppt/presentation.xml", r#"<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#),
        ("ppt/slides/slide1.xml", SLIDE),
        ("ppt/notesSlides/notesSlide1.xml", NOTES),
    ])
}

#[test]
fn test_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("filePath"))
        .stdout(predicate::str::contains("--putNotesAtLast"));
}

#[test]
fn test_prints_rtf_text() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "letter.rtf", br"{\rtf1\ansi First line\par Second line\par}");

    cli()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("First line\nSecond line"));
}

#[test]
fn test_newline_delimiter_option() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "letter.rtf", br"{\rtf1\ansi One\par Two\par}");

    cli()
        .arg("--newlineDelimiter= | ")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("One | Two"));
}

#[test]
fn test_json_output() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "letter.rtf", br"{\rtf1\ansi Hello\par}");

    let output = cli().arg("--json").arg(&path).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["type"], "rtf");
    assert!(json["content"].as_array().is_some_and(|c| !c.is_empty()));
}

#[test]
fn test_notes_options() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "deck.pptx", &pptx_with_notes());

    cli()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Slide text"))
        .stdout(predicate::str::contains("Speaker note"));

    cli()
        .arg(&path)
        .arg("--ignoreNotes")
        .assert()
        .success()
        .stdout(predicate::str::contains("Slide text"))
        .stdout(predicate::str::contains("Speaker note").not());
}

#[test]
fn test_unsupported_extension_prints_usage() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "data.xyz", b"whatever");

    cli()
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("xyz"))
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_missing_file_fails() {
    cli()
        .arg("/definitely/not/here.docx")
        .assert()
        .failure()
        .stderr(predicate::str::contains("here.docx"));
}

#[test]
fn test_invalid_boolean_value_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "letter.rtf", br"{\rtf1 x}");

    cli()
        .arg("--ignoreNotes=maybe")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid option value"));
}

#[test]
fn test_ocr_without_backend_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "letter.rtf", br"{\rtf1 x}");

    cli().arg("--ocr").arg(&path).assert().failure();
}
