//! C symbol/comment extraction, ported from
//! `original_source/internal/core/treesitter/c_extract.go`.

use tree_sitter::Node;

use crate::error::Result;
use crate::model::{CommentInput, SymbolInput};
use crate::parser::util::{
    first_descendant_kind, is_comment_kind, make_comment, node_range_1_based, trim_node_text,
};

pub fn extract(src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_c::LANGUAGE.into())?;
    let tree = parser
        .parse(src, None)
        .ok_or_else(|| crate::error::Error::ParseError("c: parse returned no tree".into()))?;

    let mut syms = Vec::new();
    let mut comms = Vec::new();
    walk(tree.root_node(), src, &mut syms, &mut comms);
    Ok((syms, comms))
}

fn walk(n: Node, src: &[u8], syms: &mut Vec<SymbolInput>, comms: &mut Vec<CommentInput>) {
    let k = n.kind();
    if is_comment_kind(k) {
        comms.push(make_comment(n, src, "c"));
    }

    match k {
        "function_definition" => {
            if let Some(sym) = make_c_function(n, src) {
                syms.push(sym);
            }
        }
        "struct_specifier" => {
            if let Some(sym) = make_c_type(n, src, "struct") {
                syms.push(sym);
            }
        }
        "enum_specifier" => {
            if let Some(sym) = make_c_type(n, src, "enum") {
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

fn make_c_function(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let decl = n.child_by_field_name("declarator")?;
    let want = ["identifier"].into_iter().collect();
    let id = first_descendant_kind(decl, &want)?;
    let name = id.utf8_text(src).ok()?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        kind: "function".into(),
        signature: name.clone(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: "c".into(),
    })
}

fn make_c_type(n: Node, src: &[u8], kind: &str) -> Option<SymbolInput> {
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
        lang: "c".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_functions_and_structs() {
        let src = b"struct Point { int x; int y; };\n\nint add(int a, int b) { return a + b; }\n";
        let (syms, _comms) = extract(src).unwrap();
        assert!(syms.iter().any(|s| s.kind == "struct" && s.name == "Point"));
        assert!(syms.iter().any(|s| s.kind == "function" && s.name == "add"));
    }
}
