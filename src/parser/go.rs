//! Go symbol/comment extraction, ported from
//! `original_source/internal/core/treesitter/go_extract.go`.

use tree_sitter::Node;

use crate::error::Result;
use crate::model::{CommentInput, SymbolInput};
use crate::parser::util::{first_descendant_kind, node_range_1_based};

pub fn extract(src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
    let tree = parser
        .parse(src, None)
        .ok_or_else(|| crate::error::Error::ParseError("go: parse returned no tree".into()))?;

    let mut syms = Vec::new();
    let mut comms = Vec::new();
    walk(tree.root_node(), src, &mut syms, &mut comms);
    Ok((syms, comms))
}

fn walk(n: Node, src: &[u8], syms: &mut Vec<SymbolInput>, comms: &mut Vec<CommentInput>) {
    match n.kind() {
        "comment" => comms.push(make_go_comment(n, src)),
        "function_declaration" => {
            if let Some(sym) = make_go_function(n, src) {
                syms.push(sym);
            }
        }
        "method_declaration" => {
            if let Some(sym) = make_go_method(n, src) {
                syms.push(sym);
            }
        }
        "type_spec" => {
            if let Some(sym) = make_go_type_spec(n, src) {
                syms.push(sym);
            }
        }
        _ => {}
    }

    let mut cursor = n.walk();
    for child in n.children(&mut cursor) {
        walk(child, src, syms, comms);
    }
}

fn make_go_function(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let name = n.child_by_field_name("name")?.utf8_text(src).ok()?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        kind: "function".into(),
        signature: format!("func {name}"),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: "go".into(),
    })
}

fn make_go_method(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let name = n.child_by_field_name("name")?.utf8_text(src).ok()?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let container = go_method_receiver_type(n, src);
    let sig = if container.is_empty() {
        format!("func {name}")
    } else {
        format!("func ({container}) {name}")
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
        lang: "go".into(),
        signature: sig,
    })
}

fn make_go_type_spec(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let name = n.child_by_field_name("name")?.utf8_text(src).ok()?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let mut kind = "type".to_string();
    if let Some(type_node) = n.child_by_field_name("type") {
        let inner = go_unwrap_type(type_node);
        kind = match inner.map(|t| t.kind()) {
            Some("struct_type") => "struct".into(),
            Some("interface_type") => "interface".into(),
            _ => "type".into(),
        };
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        signature: format!("{kind} {name}"),
        kind,
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: "go".into(),
    })
}

fn make_go_comment(n: Node, src: &[u8]) -> CommentInput {
    let text = n.utf8_text(src).unwrap_or("");
    let trimmed = text.trim();
    let kind = if trimmed.starts_with("//") {
        "line"
    } else if trimmed.starts_with("/*") {
        "block"
    } else {
        "comment"
    };
    let r = node_range_1_based(n);
    CommentInput {
        kind: kind.into(),
        text: text.trim_end_matches(['\r', '\n']).to_string(),
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        lang: "go".into(),
    }
}

fn go_method_receiver_type(m: Node, src: &[u8]) -> String {
    let Some(recv) = m.child_by_field_name("receiver") else {
        return String::new();
    };
    let mut cursor = recv.walk();
    let decl = recv.named_children(&mut cursor).find(|ch| {
        matches!(ch.kind(), "parameter_declaration" | "variadic_parameter_declaration")
    });
    let Some(decl) = decl else {
        return String::new();
    };
    let Some(typ) = decl.child_by_field_name("type") else {
        return String::new();
    };
    go_base_type_name(typ, src)
}

fn go_unwrap_type(mut typ: Node) -> Option<Node> {
    loop {
        match typ.kind() {
            "parenthesized_type" | "pointer_type" | "negated_type" => {
                if typ.named_child_count() == 0 {
                    return Some(typ);
                }
                typ = typ.named_child(0)?;
            }
            "generic_type" => {
                if let Some(inner) = typ.child_by_field_name("type") {
                    typ = inner;
                } else {
                    return Some(typ);
                }
            }
            _ => return Some(typ),
        }
    }
}

fn go_base_type_name(typ: Node, src: &[u8]) -> String {
    let Some(typ) = go_unwrap_type(typ) else {
        return String::new();
    };
    match typ.kind() {
        "qualified_type" => {
            if let Some(n) = typ.child_by_field_name("name") {
                return n.utf8_text(src).unwrap_or("").trim().to_string();
            }
        }
        "type_identifier" | "identifier" => {
            return typ.utf8_text(src).unwrap_or("").trim().to_string();
        }
        _ => {}
    }
    let want = ["type_identifier", "identifier"].into_iter().collect();
    if let Some(n) = first_descendant_kind(typ, &want) {
        return n.utf8_text(src).unwrap_or("").trim().to_string();
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_functions_methods_types_and_comments() {
        let src = br#"package main

// Doer does things.
type Doer struct {
	Name string
}

func (d *Doer) Do() {}

func Helper() {}
"#;
        let (syms, comms) = extract(src).unwrap();
        assert!(syms.iter().any(|s| s.kind == "struct" && s.name == "Doer"));
        assert!(syms.iter().any(|s| s.kind == "method" && s.name == "Do" && s.container == "Doer"));
        assert!(syms.iter().any(|s| s.kind == "function" && s.name == "Helper"));
        assert!(comms.iter().any(|c| c.text.contains("Doer does things")));
    }
}
