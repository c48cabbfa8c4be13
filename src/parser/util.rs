//! Tree-walking helpers shared by every extractor, ported from
//! `original_source/internal/core/treesitter/util.go`.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::model::{CommentInput, Range};

/// Converts a node's 0-based tree-sitter position into the 1-based
/// `Range` the rest of the crate works with, matching `nodeRange1Based`:
/// columns floor at 1, and an end position sitting at column 0 on a line
/// past the start collapses onto the previous line (tree-sitter reports
/// the end of a node ending in a newline as the start of the next line).
pub fn node_range_1_based(n: Node) -> Range {
    let sp = n.start_position();
    let ep = n.end_position();

    let sl = sp.row as i64 + 1;
    let mut sc = sp.column as i64 + 1;
    let mut el = ep.row as i64 + 1;
    let ec = ep.column as i64 + 1;

    if sc <= 0 {
        sc = 1;
    }
    if ep.column == 0 && el > sl {
        el -= 1;
    }
    if el < sl {
        el = sl;
    }

    Range::new(sl, sc, el, ec.max(1))
}

pub fn is_comment_kind(kind: &str) -> bool {
    let kind = kind.trim();
    !kind.is_empty() && kind.contains("comment")
}

pub fn trim_node_text<'a>(n: Option<Node<'a>>, src: &'a [u8]) -> String {
    match n {
        Some(n) => n.utf8_text(src).unwrap_or("").trim().to_string(),
        None => String::new(),
    }
}

/// Depth-first search for the first named descendant whose kind is in
/// `want`, searching `n`'s named children before recursing.
pub fn first_descendant_kind<'a>(n: Node<'a>, want: &HashSet<&str>) -> Option<Node<'a>> {
    let mut cursor = n.walk();
    for child in n.named_children(&mut cursor) {
        if want.contains(child.kind()) {
            return Some(child);
        }
    }
    let mut cursor = n.walk();
    for child in n.named_children(&mut cursor) {
        if let Some(found) = first_descendant_kind(child, want) {
            return Some(found);
        }
    }
    None
}

/// Walks up from `n` through its ancestors, returning the name of the
/// first one whose kind is in `type_kinds`.
pub fn enclosing_type_name(n: Node, src: &[u8], type_kinds: &HashSet<&str>) -> String {
    let mut cur = n.parent();
    while let Some(node) = cur {
        if type_kinds.contains(node.kind()) {
            let name = trim_node_text(node.child_by_field_name("name"), src);
            if !name.is_empty() {
                return name;
            }
            let id_kinds: HashSet<&str> =
                ["identifier", "type_identifier", "property_identifier"].into_iter().collect();
            if let Some(id) = first_descendant_kind(node, &id_kinds) {
                let name = id.utf8_text(src).unwrap_or("").trim().to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }
        cur = node.parent();
    }
    String::new()
}

/// Builds a `CommentInput` from a comment node, shared by every extractor
/// except Go's (which this crate's `go` module ports identically), per
/// `comment.go`.
pub fn make_comment(n: Node, src: &[u8], lang: &str) -> CommentInput {
    let text = n.utf8_text(src).unwrap_or("");
    let trimmed = text.trim();
    let kind = if trimmed.starts_with("//") || trimmed.starts_with('#') {
        "line"
    } else if trimmed.starts_with("/*") {
        "block"
    } else {
        "comment"
    };
    let range = node_range_1_based(n);
    CommentInput {
        kind: kind.to_string(),
        text: text.trim_end_matches(['\r', '\n']).to_string(),
        sl: range.sl,
        sc: range.sc,
        el: range.el,
        ec: range.ec,
        lang: lang.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(lang: tree_sitter::Language, src: &str) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&lang).unwrap();
        parser.parse(src, None).unwrap()
    }

    #[test]
    fn node_range_collapses_trailing_newline_end() {
        let tree = parse(tree_sitter_go::LANGUAGE.into(), "package main\n\nfunc f() {}\n");
        let root = tree.root_node();
        let range = node_range_1_based(root);
        assert_eq!(range.sl, 1);
        assert_eq!(range.el, 3);
    }

    #[test]
    fn is_comment_kind_matches_any_comment_variant() {
        assert!(is_comment_kind("comment"));
        assert!(is_comment_kind("line_comment"));
        assert!(!is_comment_kind("identifier"));
    }
}
