//! JavaScript symbol/comment extraction (covers `.js`/`.jsx`/`.mjs`/`.cjs`),
//! ported from `original_source/internal/core/treesitter/javascript_extract.go`.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::error::Result;
use crate::model::{CommentInput, SymbolInput};
use crate::parser::util::{
    enclosing_type_name, first_descendant_kind, is_comment_kind, make_comment, node_range_1_based,
    trim_node_text,
};

fn js_type_kinds() -> HashSet<&'static str> {
    ["class_declaration"].into_iter().collect()
}

pub fn extract(src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_javascript::LANGUAGE.into())?;
    let tree = parser
        .parse(src, None)
        .ok_or_else(|| crate::error::Error::ParseError("javascript: parse returned no tree".into()))?;

    let mut syms = Vec::new();
    let mut comms = Vec::new();
    walk(tree.root_node(), src, &mut syms, &mut comms);
    Ok((syms, comms))
}

fn walk(n: Node, src: &[u8], syms: &mut Vec<SymbolInput>, comms: &mut Vec<CommentInput>) {
    let k = n.kind();
    if is_comment_kind(k) {
        comms.push(make_comment(n, src, "javascript"));
    }

    match k {
        "class_declaration" => {
            if let Some(sym) = make_js_class(n, src) {
                syms.push(sym);
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            if let Some(sym) = make_js_function(n, src) {
                syms.push(sym);
            }
        }
        "method_definition" => {
            if let Some(sym) = make_js_method(n, src) {
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

fn make_js_class(n: Node, src: &[u8]) -> Option<SymbolInput> {
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
        lang: "javascript".into(),
    })
}

fn make_js_function(n: Node, src: &[u8]) -> Option<SymbolInput> {
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
        lang: "javascript".into(),
    })
}

pub(crate) fn make_js_method(n: Node, src: &[u8]) -> Option<SymbolInput> {
    let mut name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        let want = ["property_identifier", "identifier"].into_iter().collect();
        if let Some(id) = first_descendant_kind(n, &want) {
            name = id.utf8_text(src).unwrap_or("").trim().to_string();
        }
    }
    if name.is_empty() {
        return None;
    }
    let container = enclosing_type_name(n, src, &js_type_kinds());
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
        lang: "javascript".into(),
        signature: sig,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_classes_functions_and_methods() {
        let src = b"class Widget {\n  render() {}\n}\n\nfunction helper() {}\n";
        let (syms, _comms) = extract(src).unwrap();
        assert!(syms.iter().any(|s| s.kind == "class" && s.name == "Widget"));
        assert!(syms
            .iter()
            .any(|s| s.kind == "method" && s.name == "render" && s.container == "Widget"));
        assert!(syms.iter().any(|s| s.kind == "function" && s.name == "helper"));
    }
}
