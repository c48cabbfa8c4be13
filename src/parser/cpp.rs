//! C++ symbol/comment extraction, ported from
//! `original_source/internal/core/treesitter/cpp_extract.go`.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::error::Result;
use crate::model::{CommentInput, SymbolInput};
use crate::parser::util::{
    enclosing_type_name, first_descendant_kind, is_comment_kind, make_comment, node_range_1_based,
    trim_node_text,
};

fn cpp_type_kinds() -> HashSet<&'static str> {
    ["class_specifier", "struct_specifier"].into_iter().collect()
}

pub fn extract(src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_cpp::LANGUAGE.into())?;
    let tree = parser
        .parse(src, None)
        .ok_or_else(|| crate::error::Error::ParseError("cpp: parse returned no tree".into()))?;

    let mut syms = Vec::new();
    let mut comms = Vec::new();
    walk(tree.root_node(), src, &mut syms, &mut comms);
    Ok((syms, comms))
}

fn walk(n: Node, src: &[u8], syms: &mut Vec<SymbolInput>, comms: &mut Vec<CommentInput>) {
    let k = n.kind();
    if is_comment_kind(k) {
        comms.push(make_comment(n, src, "cpp"));
    }

    match k {
        "namespace_definition" => {
            if let Some(sym) = make_cpp_namespace(n, src) {
                syms.push(sym);
            }
        }
        "class_specifier" => {
            if let Some(sym) = make_cpp_type(n, src, "class") {
                syms.push(sym);
            }
        }
        "struct_specifier" => {
            if let Some(sym) = make_cpp_type(n, src, "struct") {
                syms.push(sym);
            }
        }
        "function_definition" => {
            if let Some(sym) = make_cpp_function(n, src) {
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

fn make_cpp_type(n: Node, src: &[u8], kind: &str) -> Option<SymbolInput> {
    let mut name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        let want = ["type_identifier", "identifier"].into_iter().collect();
        if let Some(id) = first_descendant_kind(n, &want) {
            name = id.utf8_text(src).unwrap_or("").trim().to_string();
        }
    }
    if name.is_empty() {
        return None;
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        signature: format!("{kind} {name}"),
        kind: kind.to_string(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: "cpp".into(),
    })
}

fn make_cpp_namespace(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let mut name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        let want = ["namespace_identifier", "identifier"].into_iter().collect();
        if let Some(id) = first_descendant_kind(n, &want) {
            name = id.utf8_text(src).unwrap_or("").trim().to_string();
        }
    }
    if name.is_empty() {
        return None;
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        kind: "namespace".into(),
        signature: format!("namespace {name}"),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: "cpp".into(),
    })
}

fn make_cpp_function(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let decl = n.child_by_field_name("declarator")?;
    let primary = [
        "identifier",
        "field_identifier",
        "destructor_name",
        "operator_name",
        "qualified_identifier",
    ]
    .into_iter()
    .collect();
    let id = first_descendant_kind(decl, &primary).or_else(|| {
        let fallback = ["identifier"].into_iter().collect();
        first_descendant_kind(decl, &fallback)
    })?;
    let name = id.utf8_text(src).ok()?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    let container = enclosing_type_name(n, src, &cpp_type_kinds());
    let sig = if container.is_empty() {
        name.clone()
    } else {
        format!("{container}::{name}")
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
        lang: "cpp".into(),
        signature: sig,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_namespaces_classes_and_methods() {
        let src = b"namespace app {\nclass Widget {\npublic:\n  void Render() {}\n};\n}\n";
        let (syms, _comms) = extract(src).unwrap();
        assert!(syms.iter().any(|s| s.kind == "namespace" && s.name == "app"));
        assert!(syms.iter().any(|s| s.kind == "class" && s.name == "Widget"));
        assert!(syms
            .iter()
            .any(|s| s.kind == "function" && s.name == "Render" && s.container == "Widget"));
    }
}
