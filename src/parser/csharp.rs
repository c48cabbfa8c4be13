//! C# symbol/comment extraction, ported from
//! `original_source/internal/core/treesitter/csharp_extract.go`.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::error::Result;
use crate::model::{CommentInput, SymbolInput};
use crate::parser::util::{enclosing_type_name, is_comment_kind, make_comment, node_range_1_based, trim_node_text};

fn csharp_type_kinds() -> HashSet<&'static str> {
    [
        "class_declaration",
        "interface_declaration",
        "struct_declaration",
        "record_declaration",
        "enum_declaration",
    ]
    .into_iter()
    .collect()
}

pub fn extract(src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_c_sharp::LANGUAGE.into())?;
    let tree = parser
        .parse(src, None)
        .ok_or_else(|| crate::error::Error::ParseError("csharp: parse returned no tree".into()))?;

    let mut syms = Vec::new();
    let mut comms = Vec::new();
    walk(tree.root_node(), src, &mut syms, &mut comms);
    Ok((syms, comms))
}

fn walk(n: Node, src: &[u8], syms: &mut Vec<SymbolInput>, comms: &mut Vec<CommentInput>) {
    let k = n.kind();
    if is_comment_kind(k) {
        comms.push(make_comment(n, src, "csharp"));
    }

    match k {
        "file_scoped_namespace_declaration" | "namespace_declaration" => {
            if let Some(sym) = make_csharp_namespace(n, src) {
                syms.push(sym);
            }
        }
        "class_declaration" => extend(syms, make_csharp_type(n, src, "class")),
        "interface_declaration" => extend(syms, make_csharp_type(n, src, "interface")),
        "struct_declaration" => extend(syms, make_csharp_type(n, src, "struct")),
        "record_declaration" => extend(syms, make_csharp_type(n, src, "record")),
        "enum_declaration" => extend(syms, make_csharp_type(n, src, "enum")),
        "method_declaration" => extend(syms, make_csharp_member(n, src, "method")),
        "constructor_declaration" => extend(syms, make_csharp_member(n, src, "constructor")),
        _ => {}
    }

    let mut cursor = n.walk();
    for child in n.named_children(&mut cursor) {
        walk(child, src, syms, comms);
    }
}

fn extend(syms: &mut Vec<SymbolInput>, sym: Option<SymbolInput>) {
    if let Some(sym) = sym {
        syms.push(sym);
    }
}

fn make_csharp_namespace(n: Node, src: &[u8]) -> Option<SymbolInput> {
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
        lang: "csharp".into(),
    })
}

fn make_csharp_type(n: Node, src: &[u8], kind: &str) -> Option<SymbolInput> {
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
        lang: "csharp".into(),
    })
}

fn make_csharp_member(n: Node, src: &[u8], kind: &str) -> Option<SymbolInput> {
    let name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        return None;
    }
    let container = enclosing_type_name(n, src, &csharp_type_kinds());
    let sig = if container.is_empty() {
        name.clone()
    } else {
        format!("{container}.{name}")
    };
    let r = node_range_1_based(n);
    Some(SymbolInput {
        kind: kind.to_string(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container,
        lang: "csharp".into(),
        signature: sig,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_namespace_class_constructor_and_methods() {
        let src = b"namespace App {\n  class Greeter {\n    public Greeter() {}\n    public void Greet() {}\n  }\n}\n";
        let (syms, _comms) = extract(src).unwrap();
        assert!(syms.iter().any(|s| s.kind == "namespace" && s.name == "App"));
        assert!(syms.iter().any(|s| s.kind == "class" && s.name == "Greeter"));
        assert!(syms
            .iter()
            .any(|s| s.kind == "constructor" && s.name == "Greeter" && s.container == "Greeter"));
        assert!(syms
            .iter()
            .any(|s| s.kind == "method" && s.name == "Greet" && s.container == "Greeter"));
    }
}
