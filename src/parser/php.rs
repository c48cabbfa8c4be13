//! PHP symbol/comment extraction, ported from
//! `original_source/internal/core/treesitter/php_extract.go`.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::error::Result;
use crate::model::{CommentInput, SymbolInput};
use crate::parser::util::{enclosing_type_name, is_comment_kind, make_comment, node_range_1_based, trim_node_text};

fn php_type_kinds() -> HashSet<&'static str> {
    ["class_declaration", "interface_declaration", "trait_declaration", "enum_declaration"]
        .into_iter()
        .collect()
}

pub fn extract(src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_php::LANGUAGE_PHP.into())?;
    let tree = parser
        .parse(src, None)
        .ok_or_else(|| crate::error::Error::ParseError("php: parse returned no tree".into()))?;

    let mut syms = Vec::new();
    let mut comms = Vec::new();
    walk(tree.root_node(), src, &mut syms, &mut comms);
    Ok((syms, comms))
}

fn walk(n: Node, src: &[u8], syms: &mut Vec<SymbolInput>, comms: &mut Vec<CommentInput>) {
    let k = n.kind();
    if is_comment_kind(k) {
        comms.push(make_comment(n, src, "php"));
    }

    match k {
        "namespace_definition" => {
            if let Some(sym) = make_php_namespace(n, src) {
                syms.push(sym);
            }
        }
        "class_declaration" => {
            if let Some(sym) = make_php_type(n, src, "class") {
                syms.push(sym);
            }
        }
        "interface_declaration" => {
            if let Some(sym) = make_php_type(n, src, "interface") {
                syms.push(sym);
            }
        }
        "trait_declaration" => {
            if let Some(sym) = make_php_type(n, src, "trait") {
                syms.push(sym);
            }
        }
        "enum_declaration" => {
            if let Some(sym) = make_php_type(n, src, "enum") {
                syms.push(sym);
            }
        }
        "function_definition" => {
            if let Some(sym) = make_php_function(n, src) {
                syms.push(sym);
            }
        }
        "method_declaration" => {
            if let Some(sym) = make_php_method(n, src) {
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

fn make_php_namespace(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        return None;
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        signature: format!("namespace {name}"),
        kind: "namespace".into(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: "php".into(),
    })
}

fn make_php_type(n: Node, src: &[u8], kind: &str) -> Option<SymbolInput> {
    let name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        return None;
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        signature: format!("{} {name}", kind.trim()),
        kind: kind.trim().to_string(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: "php".into(),
    })
}

fn make_php_function(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        return None;
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        signature: format!("function {name}"),
        kind: "function".into(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: "php".into(),
    })
}

fn make_php_method(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        return None;
    }
    let container = enclosing_type_name(n, src, &php_type_kinds());
    let sig = if container.is_empty() {
        name.clone()
    } else {
        format!("{container}.{name}")
    };
    let r = node_range_1_based(n);
    Some(SymbolInput {
        kind: "method".into(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container,
        lang: "php".into(),
        signature: sig,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_namespace_class_and_methods() {
        let src = b"<?php\nnamespace App;\nclass Greeter {\n  function greet() {}\n}\nfunction standalone() {}\n";
        let (syms, _comms) = extract(src).unwrap();
        assert!(syms.iter().any(|s| s.kind == "namespace" && s.name == "App"));
        assert!(syms.iter().any(|s| s.kind == "class" && s.name == "Greeter"));
        assert!(syms
            .iter()
            .any(|s| s.kind == "method" && s.name == "greet" && s.container == "Greeter"));
        assert!(syms.iter().any(|s| s.kind == "function" && s.name == "standalone"));
    }
}
