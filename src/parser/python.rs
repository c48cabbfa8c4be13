//! Python symbol/comment extraction, ported from
//! `original_source/internal/core/treesitter/python_extract.go`.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::error::Result;
use crate::model::{CommentInput, SymbolInput};
use crate::parser::util::{enclosing_type_name, is_comment_kind, make_comment, node_range_1_based, trim_node_text};

fn python_type_kinds() -> HashSet<&'static str> {
    ["class_definition"].into_iter().collect()
}

pub fn extract(src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
    let tree = parser
        .parse(src, None)
        .ok_or_else(|| crate::error::Error::ParseError("python: parse returned no tree".into()))?;

    let mut syms = Vec::new();
    let mut comms = Vec::new();
    walk(tree.root_node(), src, &mut syms, &mut comms);
    Ok((syms, comms))
}

fn walk(n: Node, src: &[u8], syms: &mut Vec<SymbolInput>, comms: &mut Vec<CommentInput>) {
    let k = n.kind();
    if is_comment_kind(k) {
        comms.push(make_comment(n, src, "python"));
    }

    match k {
        "class_definition" => {
            if let Some(sym) = make_python_class(n, src) {
                syms.push(sym);
            }
        }
        "function_definition" => {
            if let Some(sym) = make_python_function(n, src) {
                syms.push(sym);
            }
        }
        _ => {}
    }

    let mut cursor = n.walk();
    for child in n.named_children(&mut cursor) {
        walk(child, src, syms, comms);
    }
}

fn make_python_class(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        return None;
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        signature: format!("class {name}"),
        kind: "class".into(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: "python".into(),
    })
}

fn make_python_function(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        return None;
    }
    let container = enclosing_type_name(n, src, &python_type_kinds());
    let sig = if container.is_empty() {
        format!("def {name}")
    } else {
        format!("{container}.{name}")
    };
    let r = node_range_1_based(n);
    Some(SymbolInput {
        kind: "function".into(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container,
        lang: "python".into(),
        signature: sig,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_classes_and_methods() {
        let src = b"class Greeter:\n    def greet(self):\n        pass\n\ndef standalone():\n    pass\n";
        let (syms, _comms) = extract(src).unwrap();
        assert!(syms.iter().any(|s| s.kind == "class" && s.name == "Greeter"));
        assert!(syms
            .iter()
            .any(|s| s.kind == "function" && s.name == "greet" && s.container == "Greeter"));
        assert!(syms
            .iter()
            .any(|s| s.kind == "function" && s.name == "standalone" && s.container.is_empty()));
    }
}
