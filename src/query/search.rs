//! First-occurrence-per-line keyword search over raw text (§4.6, step 5).

use crate::model::Match;

/// Returns, for each line of `text`, the first occurrence of `keyword`
/// (case-folded if `case_insensitive`), 1-based line/column.
pub fn find_in_text(text: &str, keyword: &str, case_insensitive: bool) -> Vec<Match> {
    if keyword.is_empty() {
        return Vec::new();
    }
    let needle = if case_insensitive {
        keyword.to_lowercase()
    } else {
        keyword.to_string()
    };

    let mut out = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        let hay = if case_insensitive {
            line.to_lowercase()
        } else {
            line.to_string()
        };
        if let Some(byte_idx) = hay.find(&needle) {
            let col = hay[..byte_idx].chars().count() as i64 + 1;
            out.push(Match {
                line: (i + 1) as i64,
                col,
                text: line.to_string(),
            });
        }
    }
    out
}

/// Splits a query into `[A-Za-z0-9_]+` token runs (used for both the FTS
/// query form and the multi-token match expansion in §4.6 step 5).
pub fn extract_query_terms(q: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut cur = String::new();
    for ch in q.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            cur.push(ch);
        } else if !cur.is_empty() {
            terms.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        terms.push(cur);
    }
    terms
}

/// FTS5 query form: each token of length >= 2 becomes a prefix match.
pub fn fts_query_form(q: &str) -> String {
    let terms = extract_query_terms(q);
    if terms.is_empty() {
        return q.to_string();
    }
    terms
        .into_iter()
        .map(|t| if t.len() >= 2 { format!("{t}*") } else { t })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_match_per_line_only() {
        let text = "foo foo\nbar\nfoo";
        let matches = find_in_text(text, "foo", false);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].line, 1);
        assert_eq!(matches[0].col, 1);
        assert_eq!(matches[1].line, 3);
    }

    #[test]
    fn tokenizes_underscored_identifiers() {
        assert_eq!(extract_query_terms("hello_world!"), vec!["hello_world"]);
    }

    #[test]
    fn fts_form_appends_star_to_long_tokens() {
        assert_eq!(fts_query_form("hello_world!"), "hello_world*");
        assert_eq!(fts_query_form("ab cd"), "ab* cd*");
        assert_eq!(fts_query_form("a b"), "a b");
    }
}
