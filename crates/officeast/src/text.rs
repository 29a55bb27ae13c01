//! Plain-text projection of the content tree.
//!
//! The projection of a leaf is its own `text`. The projection of a list of siblings
//! joins their non-empty projections: two adjacent inline nodes (text, image, chart)
//! are concatenated directly, and any boundary touching a block node gets the
//! newline delimiter. Builders use the same function to fill the denormalised
//! `text` of non-leaf nodes, so `node.text == project(node)` holds everywhere.

use crate::types::ContentNode;

/// Project a single node.
pub fn project_node(node: &ContentNode, delimiter: &str) -> String {
    if node.is_leaf() {
        node.text.clone()
    } else {
        project_nodes(&node.children, delimiter)
    }
}

/// Project a sequence of sibling nodes.
pub fn project_nodes(nodes: &[ContentNode], delimiter: &str) -> String {
    let mut out = String::new();
    let mut previous_inline: Option<bool> = None;

    for node in nodes {
        let text = project_node(node, delimiter);
        if text.is_empty() {
            continue;
        }
        let inline = node.node_type.is_inline();
        if let Some(prev) = previous_inline
            && !(prev && inline)
        {
            out.push_str(delimiter);
        }
        out.push_str(&text);
        previous_inline = Some(inline);
    }

    out
}

/// Recompute `text` bottom-up for every non-leaf node under (and including) `node`.
pub fn refresh_text(node: &mut ContentNode, delimiter: &str) {
    if node.is_leaf() {
        return;
    }
    for child in &mut node.children {
        refresh_text(child, delimiter);
    }
    node.text = project_nodes(&node.children, delimiter);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeType, TextFormatting};

    fn run(text: &str) -> ContentNode {
        ContentNode::text_run(text, &TextFormatting::default())
    }

    #[test]
    fn test_runs_concatenate_without_delimiter() {
        let para = ContentNode::block(NodeType::Paragraph, vec![run("Hello, "), run("world")], "\n");
        assert_eq!(para.text, "Hello, world");
    }

    #[test]
    fn test_blocks_use_delimiter() {
        let a = ContentNode::block(NodeType::Paragraph, vec![run("one")], "\n");
        let b = ContentNode::block(NodeType::Paragraph, vec![run("two")], "\n");
        assert_eq!(project_nodes(&[a, b], "\n"), "one\ntwo");
    }

    #[test]
    fn test_empty_projections_are_skipped() {
        let a = ContentNode::block(NodeType::Paragraph, vec![run("one")], "|");
        let empty = ContentNode::new(NodeType::Paragraph);
        let b = ContentNode::block(NodeType::Paragraph, vec![run("two")], "|");
        assert_eq!(project_nodes(&[a, empty, b], "|"), "one|two");
    }

    #[test]
    fn test_inline_next_to_block_gets_delimiter() {
        let para = ContentNode::block(NodeType::Paragraph, vec![run("body")], "\n");
        let note = ContentNode::block(NodeType::Note, vec![para.clone()], "\n");
        let mixed = ContentNode::block(NodeType::Paragraph, vec![run("see"), note], "\n");
        assert_eq!(mixed.text, "see\nbody");
    }

    #[test]
    fn test_refresh_text_follows_leaf_edits() {
        let mut para = ContentNode::block(NodeType::Paragraph, vec![run("old")], "\n");
        para.children[0].text = "new".to_string();
        refresh_text(&mut para, "\n");
        assert_eq!(para.text, "new");
    }
}
