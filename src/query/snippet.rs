//! Snippet construction from a matched line (§4.6, snippet window rule).

use crate::query::search::extract_query_terms;

const WINDOW: usize = 80;

fn has_term_at(line: &str, col_byte: usize, term: &str, case_insensitive: bool) -> bool {
    let slice = line.get(col_byte..).unwrap_or("");
    if case_insensitive {
        slice.to_lowercase().starts_with(&term.to_lowercase())
    } else {
        slice.starts_with(term)
    }
}

/// Candidate terms sorted longest-first, then lexicographically.
fn snippet_candidates(q: &str) -> Vec<String> {
    let mut terms = extract_query_terms(q);
    terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    terms
}

fn windowed_highlight(line: &str, start: usize, end: usize) -> String {
    let bytes = line.as_bytes();
    let win_start = start.saturating_sub(WINDOW);
    let win_end = (end + WINDOW).min(bytes.len());

    let mut out = String::new();
    if win_start > 0 {
        out.push('\u{2026}');
    }
    out.push_str(&line[win_start..start]);
    out.push_str("<<");
    out.push_str(&line[start..end]);
    out.push_str(">>");
    out.push_str(&line[end..win_end]);
    if win_end < bytes.len() {
        out.push('\u{2026}');
    }
    out.trim().to_string()
}

fn char_to_byte(line: &str, char_idx: usize) -> usize {
    line.char_indices()
        .nth(char_idx)
        .map(|(b, _)| b)
        .unwrap_or(line.len())
}

/// Builds a snippet for a match at 1-based `col` on `line`, given the
/// original query `q`.
pub fn build_snippet_from_match_line(line: &str, col: i64, q: &str, case_insensitive: bool) -> String {
    let trimmed_trailing = line.trim_end();
    if trimmed_trailing.trim().is_empty() {
        return String::new();
    }

    let char_idx = (col - 1).max(0) as usize;
    let byte_idx = char_to_byte(trimmed_trailing, char_idx);

    for term in snippet_candidates(q) {
        if has_term_at(trimmed_trailing, byte_idx, &term, case_insensitive) {
            let end = (byte_idx + term.len()).min(trimmed_trailing.len());
            return windowed_highlight(trimmed_trailing, byte_idx, end);
        }
    }

    for term in snippet_candidates(q) {
        let hay = if case_insensitive {
            trimmed_trailing.to_lowercase()
        } else {
            trimmed_trailing.to_string()
        };
        let needle = if case_insensitive {
            term.to_lowercase()
        } else {
            term.clone()
        };
        if let Some(found) = hay.find(&needle) {
            return windowed_highlight(trimmed_trailing, found, found + needle.len());
        }
    }

    // Fallback: highlight the non-space run at the match column.
    if byte_idx >= trimmed_trailing.len() {
        return trimmed_trailing.to_string();
    }
    let bytes = trimmed_trailing.as_bytes();
    let mut start = byte_idx;
    while start > 0 && bytes[start - 1] != b' ' {
        start -= 1;
    }
    let mut end = byte_idx;
    while end < bytes.len() && bytes[end] != b' ' {
        end += 1;
    }
    if start >= end {
        return trimmed_trailing.to_string();
    }
    windowed_highlight(trimmed_trailing, start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_yields_empty_snippet() {
        assert_eq!(build_snippet_from_match_line("   ", 1, "x", false), "");
    }

    #[test]
    fn exact_term_match_is_highlighted() {
        let s = build_snippet_from_match_line("let hello = 1;", 5, "hello", false);
        assert!(s.contains("<<hello>>"));
    }

    #[test]
    fn falls_back_to_non_space_run() {
        let s = build_snippet_from_match_line("xxxhelloxxx rest", 1, "zzz", false);
        assert!(s.contains("<<xxxhelloxxx>>"));
    }
}
