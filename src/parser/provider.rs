//! Extension-to-extractor dispatch (§6.2), ported from
//! `original_source/internal/core/treesitter/provider.go`.

use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{CommentInput, SymbolInput};
use crate::parser::{bash, c, cpp, csharp, go, java, javascript, json, php, python, typescript};

/// Multi-language extractor: dispatches on file extension, returning the
/// symbols and comments tree-sitter found in `src`. Unsupported
/// extensions are reported via `Error::ParseUnsupported`, which callers
/// (notably the indexer) treat as "skip this file, don't fail the build".
#[derive(Debug, Default, Clone, Copy)]
pub struct Provider;

impl Provider {
    pub fn new() -> Self {
        Provider
    }

    pub fn extract(&self, path: &str, src: &[u8]) -> Result<(Vec<SymbolInput>, Vec<CommentInput>)> {
        let ext = Path::new(path.trim())
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "go" => go::extract(src),
            "java" => java::extract(src),
            "py" => python::extract(src),
            "js" | "jsx" | "mjs" | "cjs" => javascript::extract(src),
            "ts" => typescript::extract_typescript(src),
            "tsx" => typescript::extract_tsx(src),
            "php" => php::extract(src),
            "cs" | "csx" => csharp::extract(src),
            "json" | "jsonc" => json::extract(src),
            "sh" | "bash" => bash::extract(src),
            "c" => c::extract(src),
            "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => cpp::extract(src),
            // Headers are ambiguous between C and C++; prefer the C++
            // grammar since it parses plain C too.
            "h" => cpp::extract(src),
            other => Err(Error::ParseUnsupported(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_by_extension() {
        let p = Provider::new();
        let (syms, _) = p.extract("main.go", b"package main\nfunc main() {}\n").unwrap();
        assert!(syms.iter().any(|s| s.name == "main"));
    }

    #[test]
    fn unsupported_extension_is_reported_not_panicked() {
        let p = Provider::new();
        let err = p.extract("image.png", b"\x89PNG").unwrap_err();
        assert!(matches!(err, Error::ParseUnsupported(_)));
    }
}
