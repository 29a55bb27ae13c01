//! Rich Text Format (`.rtf`).
//!
//! Parsing runs in two phases: [`tokenizer`] turns the byte stream into a tree of
//! groups, and the semantic walker applies control-word meaning to that tree.
//! Embedded pictures are device-dependent metafile data and are not turned into
//! attachments. Formatting always comes from the control words in scope.

mod header;
mod semantic;
pub mod tokenizer;

use crate::Result;
use crate::core::config::ParseConfig;
use crate::types::{Ast, DocumentMetadata, FileType};
use header::Header;
use tokenizer::ROOT;

/// Parse an RTF document.
///
/// # Errors
///
/// `Corrupted` when the input lacks the `{\rtf` header.
pub fn parse(bytes: &[u8], config: &ParseConfig) -> Result<Ast> {
    let tree = tokenizer::tokenize(bytes)?;
    let Some((doc, _)) = tree.subgroups(ROOT).next() else {
        return Err(crate::OfficeError::corrupted("RTF document group is empty", None));
    };

    let header = Header::read(&tree, doc);
    let mut metadata = DocumentMetadata::default();
    header::read_info(&tree, doc, &header, &mut metadata);

    let content = semantic::Walker::new(&tree, &header, config).run(doc);

    Ok(Ast {
        file_type: FileType::Rtf,
        metadata,
        content,
        attachments: Vec::new(),
        newline_delimiter: config.newline_delimiter.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentNode, ListType, NodeMetadata, NodeType, NoteType};

    fn parse_str(rtf: &str) -> Ast {
        parse(rtf.as_bytes(), &ParseConfig::default()).unwrap()
    }

    fn note_types(nodes: &[ContentNode]) -> Vec<NoteType> {
        nodes
            .iter()
            .filter_map(|n| match &n.metadata {
                Some(NodeMetadata::Note(meta)) => Some(meta.note_type),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_paragraphs_and_formatting() {
        let ast = parse_str(
            r"{\rtf1\ansi{\fonttbl{\f0 Arial;}}{\colortbl;\red255\green0\blue0;}\f0\fs24 Plain {\b bold} {\cf1 red}\par Second\par}",
        );
        assert_eq!(ast.to_text(), "Plain bold red\nSecond");
        let first = &ast.content[0];
        let bold = first.children.iter().find(|r| r.text == "bold").unwrap();
        let fmt = bold.formatting.as_ref().unwrap();
        assert_eq!(fmt.bold, Some(true));
        assert_eq!(fmt.size, Some(12.0));
        assert_eq!(fmt.font.as_deref(), Some("Arial"));
        let red = first.children.iter().find(|r| r.text == "red").unwrap();
        assert_eq!(red.formatting.as_ref().and_then(|f| f.color.as_deref()), Some("#FF0000"));
        assert_eq!(red.formatting.as_ref().and_then(|f| f.bold), None);
    }

    #[test]
    fn test_code_page_and_unicode_escapes() {
        let ast = parse_str(r"{\rtf1\ansi\ansicpg1252 caf\'e9 \u8364? \uc2\u8212\'97\'97 end\par}");
        assert_eq!(ast.to_text(), "café € \u{2014} end");
    }

    #[test]
    fn test_footnotes_follow_their_paragraph() {
        let rtf = r"{\rtf1 Body{\footnote\pard Foot text.}\par Next\par}";
        let ast = parse_str(rtf);
        let kinds: Vec<_> = ast.content.iter().map(|n| n.node_type).collect();
        assert_eq!(kinds, vec![NodeType::Paragraph, NodeType::Note, NodeType::Paragraph]);
        assert_eq!(ast.content[1].text, "Foot text.");
        assert_eq!(ast.content[0].text, "Body");

        let at_last = parse(
            rtf.as_bytes(),
            &ParseConfig {
                put_notes_at_last: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(at_last.content.last().map(|n| n.node_type), Some(NodeType::Note));

        let ignored = parse(
            rtf.as_bytes(),
            &ParseConfig {
                ignore_notes: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ignored.to_text(), "Body\nNext");
    }

    #[test]
    fn test_note_type_follows_fet() {
        let both = parse_str(r"{\rtf1\fet2 A{\footnote one}\par B{\footnote\ftnalt two}\par}");
        assert_eq!(note_types(&both.content), vec![NoteType::Footnote, NoteType::Endnote]);

        let endnotes = parse_str(r"{\rtf1\fet1 A{\footnote one}\par}");
        assert_eq!(note_types(&endnotes.content), vec![NoteType::Endnote]);
    }

    #[test]
    fn test_tables() {
        let ast = parse_str(r"{\rtf1\trowd\cellx1000\cellx2000\intbl a\cell b\cell\row\trowd\intbl c\cell d\cell\row\pard After\par}");
        assert_eq!(ast.content[0].node_type, NodeType::Table);
        let table = &ast.content[0];
        assert_eq!(table.children.len(), 2);
        assert_eq!(table.children[1].children[1].cell_position(), Some((1, 1)));
        assert_eq!(table.children[1].children[1].text, "d");
        assert_eq!(ast.content[1].text, "After");
    }

    #[test]
    fn test_lists_from_markers() {
        let ast = parse_str(
            r"{\rtf1{\listtext 1.\tab}\ls1\ilvl0 one\par{\listtext 2.\tab}\ls1\ilvl0 two\par\pard{\pntext\'b7\tab}bullet\par}",
        );
        let items: Vec<_> = ast
            .content
            .iter()
            .filter_map(|n| match &n.metadata {
                Some(NodeMetadata::List(meta)) => Some((n.text.as_str(), meta.list_type, meta.item_index)),
                _ => None,
            })
            .collect();
        assert_eq!(
            items,
            vec![
                ("one", ListType::Ordered, 0),
                ("two", ListType::Ordered, 1),
                ("bullet", ListType::Unordered, 0),
            ]
        );
    }

    #[test]
    fn test_headings_and_hyperlinks() {
        let ast = parse_str(
            r#"{\rtf1{\stylesheet{\s1 heading 1;}}\pard\s1 Title\par\pard\outlinelevel1 Sub\par\pard See {\field{\*\fldinst HYPERLINK "https://example.com"}{\fldrslt site}}\par}"#,
        );
        let levels: Vec<_> = ast
            .content
            .iter()
            .filter_map(|n| match &n.metadata {
                Some(NodeMetadata::Heading(meta)) => Some(meta.level),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![1, 2]);
        let link = ast.content[2].children.iter().find(|r| r.text == "site").unwrap();
        assert!(matches!(&link.metadata, Some(NodeMetadata::Text(m)) if m.link.as_deref() == Some("https://example.com")));
        assert_eq!(ast.to_text(), "Title\nSub\nSee site");
    }

    #[test]
    fn test_skipped_destinations_and_info() {
        let ast = parse_str(
            r"{\rtf1{\info{\title Doc}}{\header Head}{\*\generator Writer;}{\pict\pngblip 89504e47}Body\par}",
        );
        assert_eq!(ast.to_text(), "Body");
        assert_eq!(ast.metadata.title.as_deref(), Some("Doc"));
        assert!(ast.attachments.is_empty());
    }

    #[test]
    fn test_not_rtf_is_corrupted() {
        let err = parse(b"hello", &ParseConfig::default()).unwrap_err();
        assert!(err.is_corrupted());
    }
}
