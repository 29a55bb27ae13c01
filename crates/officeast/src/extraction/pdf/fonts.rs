//! Font-aware string decoding: `/ToUnicode` CMaps with byte-encoding fallbacks.

use lopdf::{Dictionary, Document};
use std::collections::HashMap;

use super::{resolve, stream_data};

/// How to turn the bytes of a shown string into text for one font.
#[derive(Debug, Clone, Default)]
pub struct FontDecoder {
    /// Code width in bytes: 2 for composite (`Type0`) fonts or two-byte codespaces
    code_width: usize,
    to_unicode: Option<HashMap<u32, String>>,
}

impl FontDecoder {
    pub fn simple() -> Self {
        Self {
            code_width: 1,
            to_unicode: None,
        }
    }

    /// Build the decoder for a font dictionary.
    pub fn load(doc: &Document, font: &Dictionary, depth: usize) -> Self {
        let composite = font
            .get(b"Subtype")
            .ok()
            .and_then(|s| s.as_name().ok())
            .is_some_and(|name| name == b"Type0");

        let cmap = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| resolve(doc, obj, depth))
            .and_then(|obj| obj.as_stream().ok())
            .map(|stream| parse_cmap(&stream_data(stream)));

        let code_width = match &cmap {
            Some(cmap) if cmap.code_width > 0 => cmap.code_width,
            _ if composite => 2,
            _ => 1,
        };
        Self {
            code_width,
            to_unicode: cmap.map(|c| c.map),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        if let Some(map) = &self.to_unicode {
            let mut out = String::new();
            for code in bytes.chunks(self.code_width) {
                let key = code.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                match map.get(&key) {
                    Some(text) => out.push_str(text),
                    None if self.code_width == 1 => out.push(char::from(code[0])),
                    None => {}
                }
            }
            return out;
        }
        if self.code_width == 2 {
            return utf16_be(bytes);
        }
        decode_text_string(bytes)
    }
}

/// PDF text string: UTF-16BE with a byte-order mark, otherwise a single-byte encoding.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return utf16_be(rest);
    }
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    text.into_owned()
}

fn utf16_be(bytes: &[u8]) -> String {
    let (text, _) = encoding_rs::UTF_16BE.decode_without_bom_handling(bytes);
    text.into_owned()
}

#[derive(Debug, Default)]
struct CMap {
    code_width: usize,
    map: HashMap<u32, String>,
}

#[derive(Debug, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(String),
}

fn tokens(data: &[u8]) -> Vec<Token> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        match data[pos] {
            b'%' => {
                while pos < data.len() && data[pos] != b'\n' && data[pos] != b'\r' {
                    pos += 1;
                }
            }
            b'<' if data.get(pos + 1) == Some(&b'<') => {
                out.push(Token::Word("<<".into()));
                pos += 2;
            }
            b'<' => {
                let end = data[pos..].iter().position(|b| *b == b'>').map_or(data.len(), |i| pos + i);
                let digits: Vec<u8> = data[pos + 1..end]
                    .iter()
                    .copied()
                    .filter(u8::is_ascii_hexdigit)
                    .collect();
                let bytes = digits
                    .chunks(2)
                    .filter_map(|pair| {
                        let pair = if pair.len() == 1 { vec![pair[0], b'0'] } else { pair.to_vec() };
                        std::str::from_utf8(&pair).ok().and_then(|h| u8::from_str_radix(h, 16).ok())
                    })
                    .collect();
                out.push(Token::Hex(bytes));
                pos = end + 1;
            }
            b'[' => {
                out.push(Token::Open);
                pos += 1;
            }
            b']' => {
                out.push(Token::Close);
                pos += 1;
            }
            b if b.is_ascii_whitespace() => pos += 1,
            _ => {
                let start = pos;
                while pos < data.len() && !data[pos].is_ascii_whitespace() && !b"<>[]%".contains(&data[pos]) {
                    pos += 1;
                }
                if pos == start {
                    pos += 1;
                    continue;
                }
                out.push(Token::Word(String::from_utf8_lossy(&data[start..pos]).into_owned()));
            }
        }
    }
    out
}

fn code(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

/// Parse the `codespacerange`, `bfchar` and `bfrange` sections of a CMap.
fn parse_cmap(data: &[u8]) -> CMap {
    let tokens = tokens(data);
    let mut cmap = CMap::default();
    let mut section = "";
    let mut i = 0;

    while i < tokens.len() {
        match (&tokens[i], section) {
            (Token::Word(w), _) if w.starts_with("begin") => {
                section = match w.as_str() {
                    "begincodespacerange" => "codespace",
                    "beginbfchar" => "bfchar",
                    "beginbfrange" => "bfrange",
                    _ => "",
                };
                i += 1;
            }
            (Token::Word(w), _) if w.starts_with("end") => {
                section = "";
                i += 1;
            }
            (Token::Hex(lo), "codespace") => {
                cmap.code_width = cmap.code_width.max(lo.len());
                i += 2;
            }
            (Token::Hex(src), "bfchar") => {
                if let Some(Token::Hex(dst)) = tokens.get(i + 1) {
                    cmap.map.insert(code(src), utf16_be(dst));
                }
                i += 2;
            }
            (Token::Hex(lo), "bfrange") => {
                let (Some(Token::Hex(hi)), Some(dst)) = (tokens.get(i + 1), tokens.get(i + 2)) else {
                    break;
                };
                let (lo, hi) = (code(lo), code(hi));
                match dst {
                    Token::Hex(start) => {
                        let base = code(start);
                        for (offset, src) in (lo..=hi.min(lo.saturating_add(0xFFFF))).enumerate() {
                            let value = base.saturating_add(offset as u32);
                            if let Some(ch) = char::from_u32(value) {
                                cmap.map.insert(src, ch.to_string());
                            }
                        }
                        i += 3;
                    }
                    Token::Open => {
                        let mut j = i + 3;
                        let mut src = lo;
                        while let Some(Token::Hex(dst)) = tokens.get(j) {
                            if src <= hi {
                                cmap.map.insert(src, utf16_be(dst));
                            }
                            src = src.saturating_add(1);
                            j += 1;
                        }
                        i = j + 1;
                    }
                    _ => i += 3,
                }
            }
            _ => i += 1,
        }
    }
    cmap
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMAP: &[u8] = b"/CIDInit /ProcSet findresource begin\n\
        begincmap\n\
        1 begincodespacerange <0000> <FFFF> endcodespacerange\n\
        2 beginbfchar\n<0001> <0048>\n<0002> <0069>\nendbfchar\n\
        2 beginbfrange\n<0010> <0012> <0041>\n<0020> <0021> [<00660069> <006C>]\nendbfrange\n\
        endcmap";

    #[test]
    fn test_parse_cmap_sections() {
        let cmap = parse_cmap(CMAP);
        assert_eq!(cmap.code_width, 2);
        assert_eq!(cmap.map.get(&1).map(String::as_str), Some("H"));
        assert_eq!(cmap.map.get(&0x12).map(String::as_str), Some("C"));
        assert_eq!(cmap.map.get(&0x20).map(String::as_str), Some("fi"));
        assert_eq!(cmap.map.get(&0x21).map(String::as_str), Some("l"));
    }

    #[test]
    fn test_decoder_uses_code_width() {
        let cmap = parse_cmap(CMAP);
        let decoder = FontDecoder {
            code_width: cmap.code_width,
            to_unicode: Some(cmap.map),
        };
        assert_eq!(decoder.decode(&[0, 1, 0, 2, 0, 0x10]), "HiA");
    }

    #[test]
    fn test_text_string_fallbacks() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x41, 0x20, 0xAC]), "A\u{20ac}");
        assert_eq!(decode_text_string(b"caf\xe9"), "caf\u{e9}");
        assert_eq!(FontDecoder::simple().decode(b"plain"), "plain");
    }
}
