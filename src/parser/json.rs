//! JSON key extraction (treats object keys as searchable symbols), ported
//! from `original_source/internal/core/treesitter/json_extract.go`.

use tree_sitter::Node;

use crate::error::Result;
use crate::model::{CommentInput, SymbolInput};
use crate::parser::util::{is_comment_kind, make_comment, node_range_1_based, trim_node_text};

pub fn extract(src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_json::LANGUAGE.into())?;
    let tree = parser
        .parse(src, None)
        .ok_or_else(|| crate::error::Error::ParseError("json: parse returned no tree".into()))?;

    let mut syms = Vec::new();
    let mut comms = Vec::new();
    walk(tree.root_node(), src, &mut syms, &mut comms);
    Ok((syms, comms))
}

fn walk(n: Node, src: &[u8], syms: &mut Vec<SymbolInput>, comms: &mut Vec<CommentInput>) {
    let k = n.kind();
    if is_comment_kind(k) {
        comms.push(make_comment(n, src, "json"));
    }

    if k == "pair" {
        if let Some(sym) = make_json_pair(n, src) {
            syms.push(sym);
        }
    }

    let mut cursor = n.walk();
    for child in n.named_children(&mut cursor) {
        walk(child, src, syms, comms);
    }
}

fn make_json_pair(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let raw = trim_node_text(n.child_by_field_name("key"), src);
    let name = json_unquote_key(&raw);
    if name.is_empty() {
        return None;
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        signature: name.clone(),
        kind: "key".into(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: "json".into(),
    })
}

fn json_unquote_key(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return raw[1..raw.len() - 1].trim().to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_keys() {
        let src = br#"{"name": "otter", "nested": {"depth": 1}}"#;
        let (syms, _comms) = extract(src).unwrap();
        assert!(syms.iter().any(|s| s.kind == "key" && s.name == "name"));
        assert!(syms.iter().any(|s| s.kind == "key" && s.name == "nested"));
        assert!(syms.iter().any(|s| s.kind == "key" && s.name == "depth"));
    }
}
