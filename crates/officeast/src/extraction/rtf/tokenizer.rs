//! Phase 1: bytes to a group tree.
//!
//! Groups live in a flat arena and refer to their children by index. Nesting is
//! tracked with an explicit stack of open group ids, so brace depth is bounded by
//! memory rather than by the call stack.

use crate::{OfficeError, Result};

/// Index of a group in [`GroupTree::groups`].
pub type GroupId = usize;

/// Root group holding everything outside the outermost braces.
pub const ROOT: GroupId = 0;

/// Control words that name what their group contains when they open it.
const DESTINATIONS: &[&str] = &[
    "author",
    "buptim",
    "colortbl",
    "comment",
    "creatim",
    "doccomm",
    "field",
    "fldinst",
    "fldrslt",
    "fonttbl",
    "footer",
    "footerf",
    "footerl",
    "footerr",
    "footnote",
    "header",
    "headerf",
    "headerl",
    "headerr",
    "info",
    "keywords",
    "listtext",
    "object",
    "operator",
    "pict",
    "pntext",
    "printim",
    "result",
    "revtim",
    "stylesheet",
    "subject",
    "title",
    "ud",
    "upr",
    "xe",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// `\word` or `\wordN`; control symbols (`\~`, `\_`, `\-`) keep their symbol as the word
    Control { word: String, param: Option<i32> },
    /// Literal text bytes, still in the document code page
    Text(Vec<u8>),
    /// `\'hh` escape
    Hex(u8),
    Group(GroupId),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    /// Destination named by the group's leading control word
    pub destination: Option<String>,
    /// Opened with `\*`: readers that do not know the destination skip the group
    pub ignorable: bool,
    pub items: Vec<Item>,
}

impl Group {
    fn push_text(&mut self, byte: u8) {
        match self.items.last_mut() {
            Some(Item::Text(text)) => text.push(byte),
            _ => self.items.push(Item::Text(vec![byte])),
        }
    }

    /// Controls directly inside this group, skipping nested groups.
    pub fn controls(&self) -> impl Iterator<Item = (&str, Option<i32>)> {
        self.items.iter().filter_map(|item| match item {
            Item::Control { word, param } => Some((word.as_str(), *param)),
            _ => None,
        })
    }
}

/// All groups of a document; `groups[ROOT]` is the implicit outer group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTree {
    pub groups: Vec<Group>,
}

impl GroupTree {
    pub fn root(&self) -> &Group {
        &self.groups[ROOT]
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id]
    }

    /// Direct child groups of `id`.
    pub fn subgroups(&self, id: GroupId) -> impl Iterator<Item = (GroupId, &Group)> {
        self.groups[id].items.iter().filter_map(|item| match item {
            Item::Group(child) => Some((*child, &self.groups[*child])),
            _ => None,
        })
    }

    /// All text bytes under `id`, nested groups included, in document order.
    pub fn text_bytes(&self, id: GroupId) -> Vec<u8> {
        let mut out = Vec::new();
        let mut stack = vec![(id, 0usize)];
        while let Some((group, next)) = stack.pop() {
            let Some(item) = self.groups[group].items.get(next) else {
                continue;
            };
            stack.push((group, next + 1));
            match item {
                Item::Text(bytes) => out.extend_from_slice(bytes),
                Item::Hex(byte) => out.push(*byte),
                Item::Group(child) => stack.push((*child, 0)),
                Item::Control { .. } => {}
            }
        }
        out
    }
}

/// Tokenize an RTF document.
///
/// Unbalanced braces are tolerated: stray closing braces are ignored and groups
/// still open at the end of input are closed.
///
/// # Errors
///
/// `Corrupted` when the input does not start with the `{\rtf` header.
pub fn tokenize(input: &[u8]) -> Result<GroupTree> {
    let start = input
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(input.len());
    if !input[start..].starts_with(b"{\\rtf") {
        return Err(OfficeError::corrupted("missing {\\rtf header", None));
    }

    let mut groups = vec![Group::default()];
    let mut open: Vec<GroupId> = vec![ROOT];
    let mut pending_ignorable = false;
    let mut pos = start;

    while pos < input.len() {
        let current = *open.last().unwrap_or(&ROOT);
        match input[pos] {
            b'{' => {
                let id = groups.len();
                groups.push(Group::default());
                groups[current].items.push(Item::Group(id));
                open.push(id);
                pos += 1;
            }
            b'}' => {
                if open.len() > 1 {
                    open.pop();
                }
                pos += 1;
            }
            b'\\' => {
                pos = control(input, pos + 1, &mut groups[current], &mut pending_ignorable);
            }
            b'\r' | b'\n' => pos += 1,
            byte => {
                groups[current].push_text(byte);
                pos += 1;
            }
        }
    }

    tracing::debug!(groups = groups.len(), "tokenized RTF");
    Ok(GroupTree { groups })
}

/// Read one control word or control symbol starting after its backslash.
fn control(input: &[u8], mut pos: usize, group: &mut Group, pending_ignorable: &mut bool) -> usize {
    let Some(&first) = input.get(pos) else {
        return pos;
    };

    if !first.is_ascii_alphabetic() {
        pos += 1;
        match first {
            b'\\' | b'{' | b'}' => group.push_text(first),
            b'\'' => {
                let byte = input
                    .get(pos..pos + 2)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(byte) = byte {
                    group.items.push(Item::Hex(byte));
                    pos += 2;
                }
            }
            b'*' => *pending_ignorable = true,
            b'\r' | b'\n' => push_control(group, "par", None, pending_ignorable),
            b'\t' => push_control(group, "tab", None, pending_ignorable),
            symbol => push_control(group, &(symbol as char).to_string(), None, pending_ignorable),
        }
        return pos;
    }

    let word_start = pos;
    while input.get(pos).is_some_and(u8::is_ascii_alphabetic) {
        pos += 1;
    }
    let word = String::from_utf8_lossy(&input[word_start..pos]).into_owned();

    let param_start = pos;
    if input.get(pos) == Some(&b'-') {
        pos += 1;
    }
    while input.get(pos).is_some_and(u8::is_ascii_digit) {
        pos += 1;
    }
    let param = std::str::from_utf8(&input[param_start..pos])
        .ok()
        .and_then(|p| p.parse::<i32>().ok());
    if param.is_none() {
        pos = param_start;
    }
    if input.get(pos) == Some(&b' ') {
        pos += 1;
    }

    // Binary payloads are opaque.
    if word == "bin" {
        return pos.saturating_add(param.unwrap_or(0).max(0) as usize).min(input.len());
    }

    push_control(group, &word, param, pending_ignorable);
    pos
}

fn push_control(group: &mut Group, word: &str, param: Option<i32>, pending_ignorable: &mut bool) {
    let opens_group = group.items.is_empty() && group.destination.is_none();
    if opens_group && (*pending_ignorable || DESTINATIONS.contains(&word)) {
        group.destination = Some(word.to_string());
        group.ignorable = *pending_ignorable;
    }
    *pending_ignorable = false;
    group.items.push(Item::Control {
        word: word.to_string(),
        param,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_and_destinations() {
        let tree = tokenize(br"{\rtf1{\fonttbl{\f0 Arial;}}{\*\generator x;}Hello}").unwrap();
        let doc = tree.subgroups(ROOT).next().unwrap().0;
        let destinations: Vec<_> = tree
            .subgroups(doc)
            .map(|(_, g)| (g.destination.as_deref(), g.ignorable))
            .collect();
        assert_eq!(destinations, vec![(Some("fonttbl"), false), (Some("generator"), true)]);
        assert!(tree.group(doc).items.contains(&Item::Text(b"Hello".to_vec())));
    }

    #[test]
    fn test_control_words_and_symbols() {
        let tree = tokenize(br"{\rtf1\b0 x\'e9\~\{y}").unwrap();
        let doc = tree.group(1);
        assert_eq!(
            doc.items,
            vec![
                Item::Control { word: "rtf".into(), param: Some(1) },
                Item::Control { word: "b".into(), param: Some(0) },
                Item::Text(b"x".to_vec()),
                Item::Hex(0xE9),
                Item::Control { word: "~".into(), param: None },
                Item::Text(b"{y".to_vec()),
            ]
        );
    }

    #[test]
    fn test_negative_param_and_bin_skip() {
        let tree = tokenize(br"{\rtf1\u-3913?\bin2 {}a}").unwrap();
        let doc = tree.group(1);
        assert_eq!(doc.items[1], Item::Control { word: "u".into(), param: Some(-3913) });
        assert_eq!(doc.items[2], Item::Text(b"?a".to_vec()));
    }

    #[test]
    fn test_deep_nesting_does_not_recurse() {
        let mut input = b"{\\rtf1".to_vec();
        input.extend(std::iter::repeat_n(b'{', 100_000));
        input.extend(b"deep");
        input.extend(std::iter::repeat_n(b'}', 100_000));
        input.push(b'}');
        let tree = tokenize(&input).unwrap();
        assert_eq!(tree.text_bytes(ROOT), b"deep");
    }

    #[test]
    fn test_unbalanced_braces_tolerated() {
        let tree = tokenize(br"{\rtf1 a}}{b").unwrap();
        assert_eq!(tree.text_bytes(ROOT), b"ab");
    }

    #[test]
    fn test_missing_header_is_corrupted() {
        assert!(tokenize(b"plain text").unwrap_err().is_corrupted());
    }
}
