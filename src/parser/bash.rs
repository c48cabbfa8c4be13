//! Bash function/comment extraction, ported from
//! `original_source/internal/core/treesitter/bash_extract.go`.

use tree_sitter::Node;

use crate::error::Result;
use crate::model::{CommentInput, SymbolInput};
use crate::parser::util::{is_comment_kind, make_comment, node_range_1_based, trim_node_text};

pub fn extract(src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_bash::LANGUAGE.into())?;
    let tree = parser
        .parse(src, None)
        .ok_or_else(|| crate::error::Error::ParseError("bash: parse returned no tree".into()))?;

    let mut syms = Vec::new();
    let mut comms = Vec::new();
    walk(tree.root_node(), src, &mut syms, &mut comms);
    Ok((syms, comms))
}

fn walk(n: Node, src: &[u8], syms: &mut Vec<SymbolInput>, comms: &mut Vec<CommentInput>) {
    let k = n.kind();
    if is_comment_kind(k) {
        comms.push(make_comment(n, src, "bash"));
    }

    if k == "function_definition" {
        if let Some(sym) = make_bash_function(n, src) {
            syms.push(sym);
        }
    }

    let mut cursor = n.walk();
    for child in n.named_children(&mut cursor) {
        walk(child, src, syms, comms);
    }
}

fn make_bash_function(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        return None;
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        signature: name.clone(),
        kind: "function".into(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: "bash".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_function_definitions() {
        let src = b"#!/bin/bash\n# greets the world\ngreet() {\n  echo hi\n}\n";
        let (syms, comms) = extract(src).unwrap();
        assert!(syms.iter().any(|s| s.kind == "function" && s.name == "greet"));
        assert!(comms.iter().any(|c| c.text.contains("greets the world")));
    }
}
