//! TypeScript/TSX symbol/comment extraction, ported from
//! `original_source/internal/core/treesitter/typescript_extract.go`.
//! Both dialects share one walker, distinguished only by which grammar is
//! loaded and the `lang` tag stamped onto each symbol/comment, matching
//! the original's `extractTypeScriptWithLang`.

use std::collections::HashSet;

use tree_sitter::{Language, Node};

use crate::error::Result;
use crate::model::{CommentInput, SymbolInput};
use crate::parser::util::{
    enclosing_type_name, first_descendant_kind, is_comment_kind, make_comment, node_range_1_based,
    trim_node_text,
};

fn ts_type_kinds() -> HashSet<&'static str> {
    ["class_declaration"].into_iter().collect()
}

pub fn extract_typescript(src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    extract_with_lang(src, tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(), "typescript")
}

pub fn extract_tsx(src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    extract_with_lang(src, tree_sitter_typescript::LANGUAGE_TSX.into(), "tsx")
}

fn extract_with_lang(
    src: &[u8],
    lang: Language,
    lang_name: &str,
) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&lang)?;
    let tree = parser.parse(src, None).ok_or_else(|| {
        crate::error::Error::ParseError(format!("{lang_name}: parse returned no tree"))
    })?;

    let mut syms = Vec::new();
    let mut comms = Vec::new();
    walk(tree.root_node(), src, lang_name, &mut syms, &mut comms);
    Ok((syms, comms))
}

fn walk(n: Node, src: &[u8], lang: &str, syms: &mut Vec<SymbolInput>, comms: &mut Vec<CommentInput>) {
    let k = n.kind();
    if is_comment_kind(k) {
        comms.push(make_comment(n, src, lang));
    }

    match k {
        "class_declaration" => {
            if let Some(sym) = make_ts_class(n, src, lang) {
                syms.push(sym);
            }
        }
        "interface_declaration" => {
            if let Some(sym) = make_ts_named_decl(n, src, "interface", "interface", lang) {
                syms.push(sym);
            }
        }
        "type_alias_declaration" => {
            if let Some(sym) = make_ts_named_decl(n, src, "type", "type", lang) {
                syms.push(sym);
            }
        }
        "enum_declaration" => {
            if let Some(sym) = make_ts_named_decl(n, src, "enum", "enum", lang) {
                syms.push(sym);
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            if let Some(sym) = make_ts_function(n, src, lang) {
                syms.push(sym);
            }
        }
        "method_definition" => {
            if let Some(sym) = make_ts_method(n, src, lang) {
                syms.push(sym);
            }
        }
        _ => {}
    }

    let mut cursor = n.walk();
    for child in n.named_children(&mut cursor) {
        walk(child, src, lang, syms, comms);
    }
}

fn make_ts_class(n: Node, src: &[u8], lang: &str) -> Option<SymbolInput> {
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
        lang: lang.to_string(),
    })
}

fn make_ts_named_decl(
    n: Node,
    src: &[u8],
    kind: &str,
    sig_prefix: &str,
    lang: &str,
) -> Option<SymbolInput> {
    let name = trim_node_text(n.child_by_field_name("name"), src);
    if name.is_empty() {
        return None;
    }
    let r = node_range_1_based(n);
    Some(SymbolInput {
        signature: format!("{} {name}", sig_prefix.trim()),
        kind: kind.to_string(),
        name,
        sl: r.sl,
        sc: r.sc,
        el: r.el,
        ec: r.ec,
        container: String::new(),
        lang: lang.to_string(),
    })
}

fn make_ts_function(n: Node, src: &[u8], lang: &str) -> Option<SymbolInput> {
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
        lang: lang.to_string(),
    })
}

fn make_ts_method(n: Node, src: &[u8], lang: &str) -> Option<SymbolInput> {
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
    let container = enclosing_type_name(n, src, &ts_type_kinds());
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
        lang: lang.to_string(),
        signature: sig,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_interfaces_types_and_enums() {
        let src = b"interface Shape {}\ntype Id = string;\nenum Color { Red, Blue }\nclass Box implements Shape {\n  area(): number { return 0; }\n}\n";
        let (syms, _comms) = extract_typescript(src).unwrap();
        assert!(syms.iter().any(|s| s.kind == "interface" && s.name == "Shape"));
        assert!(syms.iter().any(|s| s.kind == "type" && s.name == "Id"));
        assert!(syms.iter().any(|s| s.kind == "enum" && s.name == "Color"));
        assert!(syms.iter().any(|s| s.kind == "class" && s.name == "Box"));
        assert!(syms
            .iter()
            .any(|s| s.kind == "method" && s.name == "area" && s.container == "Box"));
    }

    #[test]
    fn extracts_tsx_with_tsx_lang_tag() {
        let src = b"function App() { return null; }\n";
        let (syms, _comms) = extract_tsx(src).unwrap();
        let sym = syms.iter().find(|s| s.name == "App").unwrap();
        assert_eq!(sym.lang, "tsx");
    }
}
