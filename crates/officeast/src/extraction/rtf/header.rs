//! Document-level tables read before the body walk: fonts, colours, styles, info.

use encoding_rs::{Encoding, WINDOWS_1252};
use std::collections::HashMap;

use super::tokenizer::{GroupId, GroupTree, Item};
use crate::types::DocumentMetadata;

#[derive(Debug)]
pub struct Header {
    pub encoding: &'static Encoding,
    /// `\fet`: 0 footnotes, 1 endnotes, 2 both
    pub note_mode: i32,
    pub default_font: Option<i32>,
    pub fonts: HashMap<i32, String>,
    /// Colour table entries; `None` is the "auto" colour
    pub colors: Vec<Option<String>>,
    pub styles: HashMap<i32, String>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            encoding: WINDOWS_1252,
            note_mode: 0,
            default_font: None,
            fonts: HashMap::new(),
            colors: Vec::new(),
            styles: HashMap::new(),
        }
    }
}

impl Header {
    /// Read the header of the document group `doc`.
    pub fn read(tree: &GroupTree, doc: GroupId) -> Self {
        let mut header = Header::default();
        for (word, param) in tree.group(doc).controls() {
            match (word, param) {
                ("ansicpg", Some(cp)) => header.encoding = code_page_encoding(cp),
                ("mac", _) => header.encoding = encoding_rs::MACINTOSH,
                ("pc", _) => header.encoding = encoding_rs::IBM866,
                ("fet", Some(mode)) => header.note_mode = mode,
                ("deff", Some(font)) => header.default_font = Some(font),
                _ => {}
            }
        }

        for (id, group) in tree.subgroups(doc) {
            match group.destination.as_deref() {
                Some("fonttbl") => header.read_fonts(tree, id),
                Some("colortbl") => header.read_colors(tree, id),
                Some("stylesheet") => header.read_styles(tree, id),
                _ => {}
            }
        }
        tracing::debug!(
            fonts = header.fonts.len(),
            colors = header.colors.len(),
            styles = header.styles.len(),
            "read RTF header"
        );
        header
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _, _) = self.encoding.decode(bytes);
        text.into_owned()
    }

    pub fn color(&self, index: i32) -> Option<String> {
        usize::try_from(index).ok().and_then(|i| self.colors.get(i).cloned().flatten())
    }

    fn read_fonts(&mut self, tree: &GroupTree, table: GroupId) {
        // Entries are usually one group each, but a flat table is also valid.
        self.read_font_entries(tree, table);
        for (id, group) in tree.subgroups(table) {
            if !group.ignorable {
                self.read_font_entries(tree, id);
            }
        }
    }

    fn read_font_entries(&mut self, tree: &GroupTree, id: GroupId) {
        let mut number = None;
        let mut name = Vec::new();
        for item in &tree.group(id).items {
            match item {
                Item::Control { word, param } if word == "f" => number = *param,
                Item::Text(bytes) => {
                    for &byte in bytes {
                        if byte == b';' {
                            if let Some(n) = number.take() {
                                let decoded = self.decode(&name).trim().to_string();
                                self.fonts.insert(n, decoded);
                            }
                            name.clear();
                        } else {
                            name.push(byte);
                        }
                    }
                }
                Item::Hex(byte) => name.push(*byte),
                _ => {}
            }
        }
        if let Some(n) = number
            && !name.is_empty()
        {
            let decoded = self.decode(&name).trim().to_string();
            self.fonts.insert(n, decoded);
        }
    }

    fn read_colors(&mut self, tree: &GroupTree, table: GroupId) {
        let mut rgb: [Option<i32>; 3] = [None; 3];
        for item in &tree.group(table).items {
            match item {
                Item::Control { word, param } => match word.as_str() {
                    "red" => rgb[0] = *param,
                    "green" => rgb[1] = *param,
                    "blue" => rgb[2] = *param,
                    _ => {}
                },
                Item::Text(bytes) => {
                    for _ in bytes.iter().filter(|b| **b == b';') {
                        let color = match rgb {
                            [None, None, None] => None,
                            [r, g, b] => Some(format!(
                                "#{:02X}{:02X}{:02X}",
                                r.unwrap_or(0).clamp(0, 255),
                                g.unwrap_or(0).clamp(0, 255),
                                b.unwrap_or(0).clamp(0, 255)
                            )),
                        };
                        self.colors.push(color);
                        rgb = [None; 3];
                    }
                }
                _ => {}
            }
        }
    }

    fn read_styles(&mut self, tree: &GroupTree, table: GroupId) {
        for (_, group) in tree.subgroups(table) {
            // Character (`\cs`) and section (`\ds`) styles do not name paragraphs.
            if group.ignorable || group.controls().any(|(w, _)| w == "cs" || w == "ds" || w == "ts") {
                continue;
            }
            let number = group
                .controls()
                .find_map(|(w, p)| (w == "s").then_some(p.unwrap_or(0)))
                .unwrap_or(0);
            let mut bytes = Vec::new();
            for item in &group.items {
                match item {
                    Item::Text(text) => bytes.extend_from_slice(text),
                    Item::Hex(byte) => bytes.push(*byte),
                    _ => {}
                }
            }
            let name = self.decode(&bytes);
            let name = name.trim().trim_end_matches(';').trim();
            if !name.is_empty() {
                self.styles.insert(number, name.to_string());
            }
        }
    }
}

/// Fill document metadata from the `\info` group of `doc`.
pub fn read_info(tree: &GroupTree, doc: GroupId, header: &Header, metadata: &mut DocumentMetadata) {
    let Some((info, _)) = tree
        .subgroups(doc)
        .find(|(_, g)| g.destination.as_deref() == Some("info"))
    else {
        return;
    };

    for (word, param) in tree.group(info).controls() {
        if word == "nofpages"
            && let Some(pages) = param.and_then(|p| usize::try_from(p).ok())
        {
            metadata.pages = Some(pages);
        }
    }

    for (id, group) in tree.subgroups(info) {
        let text = || {
            let value = header.decode(&tree.text_bytes(id));
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        match group.destination.as_deref() {
            Some("title") => metadata.title = text(),
            Some("subject") => metadata.subject = text(),
            Some("author") => metadata.author = text(),
            Some("keywords") => metadata.keywords = text(),
            Some("doccomm") => metadata.description = text(),
            Some("operator") => metadata.last_modified_by = text(),
            Some("creatim") => metadata.created = info_time(tree, id),
            Some("revtim") => metadata.modified = info_time(tree, id),
            _ => {}
        }
    }
}

/// `{\creatim\yr2024\mo3\dy5\hr9\min30}` -> `2024-03-05T09:30:00Z`
fn info_time(tree: &GroupTree, id: GroupId) -> Option<String> {
    let mut parts: HashMap<&str, i32> = HashMap::new();
    for (word, param) in tree.group(id).controls() {
        if let Some(value) = param {
            parts.insert(word, value);
        }
    }
    let year = *parts.get("yr")?;
    let field = |name: &str, default: i32, min: i32| parts.get(name).copied().unwrap_or(default).max(min);
    Some(format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:00Z",
        year,
        field("mo", 1, 1),
        field("dy", 1, 1),
        field("hr", 0, 0),
        field("min", 0, 0)
    ))
}

/// Windows code page number to an encoding; unknown pages fall back to Windows-1252.
pub fn code_page_encoding(code_page: i32) -> &'static Encoding {
    let label = match code_page {
        437 | 850 | 1252 => return WINDOWS_1252,
        65001 => return encoding_rs::UTF_8,
        866 => "ibm866".to_string(),
        874 => "windows-874".to_string(),
        932 => "shift_jis".to_string(),
        936 => "gbk".to_string(),
        949 => "euc-kr".to_string(),
        950 => "big5".to_string(),
        1250..=1258 => format!("windows-{code_page}"),
        10000 => "macintosh".to_string(),
        _ => return WINDOWS_1252,
    };
    Encoding::for_label(label.as_bytes()).unwrap_or(WINDOWS_1252)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::rtf::tokenizer::{ROOT, tokenize};

    fn header(rtf: &[u8]) -> (GroupTree, Header) {
        let tree = tokenize(rtf).unwrap();
        let doc = tree.subgroups(ROOT).next().unwrap().0;
        let header = Header::read(&tree, doc);
        (tree, header)
    }

    #[test]
    fn test_font_and_color_tables() {
        let (_, header) = header(
            br"{\rtf1\ansi\ansicpg1251\deff0{\fonttbl{\f0\froman Times New Roman;}{\f1\fswiss{\*\panose 00}Arial;}}{\colortbl;\red255\green0\blue0;\red0\green128\blue0;}}",
        );
        assert_eq!(header.fonts.get(&0).map(String::as_str), Some("Times New Roman"));
        assert_eq!(header.fonts.get(&1).map(String::as_str), Some("Arial"));
        assert_eq!(header.colors, vec![None, Some("#FF0000".into()), Some("#008000".into())]);
        assert_eq!(header.color(0), None);
        assert_eq!(header.encoding.name(), "windows-1251");
    }

    #[test]
    fn test_stylesheet_names() {
        let (_, header) = header(br"{\rtf1{\stylesheet{\s0 Normal;}{\s1\b heading 1;}{\*\cs10 Default Paragraph Font;}}}");
        assert_eq!(header.styles.get(&1).map(String::as_str), Some("heading 1"));
        assert_eq!(header.styles.len(), 2);
    }

    #[test]
    fn test_info_group() {
        let rtf = br"{\rtf1{\info{\title Report}{\author Ada}{\creatim\yr2024\mo3\dy5\hr9\min30}\nofpages4}}";
        let (tree, header) = header(rtf);
        let doc = tree.subgroups(ROOT).next().unwrap().0;
        let mut metadata = DocumentMetadata::default();
        read_info(&tree, doc, &header, &mut metadata);
        assert_eq!(metadata.title.as_deref(), Some("Report"));
        assert_eq!(metadata.author.as_deref(), Some("Ada"));
        assert_eq!(metadata.created.as_deref(), Some("2024-03-05T09:30:00Z"));
        assert_eq!(metadata.pages, Some(4));
    }

    #[test]
    fn test_code_page_encoding() {
        assert_eq!(code_page_encoding(1252).name(), "windows-1252");
        assert_eq!(code_page_encoding(932).name(), "Shift_JIS");
        assert_eq!(code_page_encoding(12345).name(), "windows-1252");
    }
}
