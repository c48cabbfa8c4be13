//! Range refinement: line / block / file / minimum-enclosing-symbol (§4.8).

use crate::chunker::split_lines;
use crate::model::{Match, Range, SymbolItem};

pub fn line_count(text: &str) -> i64 {
    split_lines(text).len() as i64
}

fn clamp(v: i64, lo: i64, hi: i64) -> i64 {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

/// `match.line` ± `ctx`, clamped to `[1, total_lines]`.
pub fn line_range(text: &str, m: &Match, ctx: i64) -> Range {
    let total = line_count(text).max(1);
    let line = clamp(m.line, 1, total);
    let sl = clamp(line - ctx, 1, total);
    let el = clamp(line + ctx, 1, total);
    Range::new(sl, 1, el, 1)
}

pub fn file_range(text: &str) -> Range {
    let total = line_count(text).max(1);
    Range::new(1, 1, total, 1)
}

struct BracePos {
    line: i64,
}

struct ClosedPair {
    open: BracePos,
    close: BracePos,
}

fn block_range_by_braces(text: &str, m: &Match) -> Option<Range> {
    let mut stack: Vec<BracePos> = Vec::new();
    let mut pairs: Vec<ClosedPair> = Vec::new();
    let mut line: i64 = 1;

    for ch in text.chars() {
        match ch {
            '\n' => line += 1,
            '{' => stack.push(BracePos { line }),
            '}' => {
                if let Some(open) = stack.pop() {
                    pairs.push(ClosedPair {
                        open,
                        close: BracePos { line },
                    });
                }
            }
            _ => {}
        }
    }

    let mut best: Option<&ClosedPair> = None;
    for pair in &pairs {
        if pair.open.line <= m.line && m.line <= pair.close.line {
            let span = pair.close.line - pair.open.line;
            let better = match best {
                None => true,
                Some(b) => span < (b.close.line - b.open.line),
            };
            if better {
                best = Some(pair);
            }
        }
    }

    best.map(|p| Range::new(p.open.line, 1, p.close.line, 1))
}

fn block_range_by_blank_lines(text: &str, m: &Match) -> Option<Range> {
    let lines = split_lines(text);
    let total = lines.len() as i64;
    if m.line < 1 || m.line > total {
        return None;
    }
    let idx = (m.line - 1) as usize;
    if lines[idx].trim().is_empty() {
        return None;
    }

    let mut sl = m.line;
    while sl > 1 && !lines[(sl - 2) as usize].trim().is_empty() {
        sl -= 1;
    }
    let mut el = m.line;
    while el < total && !lines[el as usize].trim().is_empty() {
        el += 1;
    }
    Some(Range::new(sl, 1, el, 1))
}

/// Nearest enclosing brace pair; else a blank-line-delimited paragraph;
/// else the zero-context line range.
pub fn block_range(text: &str, m: &Match) -> Range {
    if let Some(r) = block_range_by_braces(text, m) {
        return r;
    }
    if let Some(r) = block_range_by_blank_lines(text, m) {
        return r;
    }
    line_range(text, m, 0)
}

/// Filters symbols whose `[sl, el]` brackets `line`, returns the smallest
/// span, earliest occurrence on ties.
pub fn min_enclosing_symbol_range(symbols: &[SymbolItem], line: i64) -> Option<Range> {
    let mut best: Option<&SymbolItem> = None;
    for sym in symbols {
        if sym.range.sl <= line && line <= sym.range.el {
            let better = match best {
                None => true,
                Some(b) => sym.range.span() < b.range.span(),
            };
            if better {
                best = Some(sym);
            }
        }
    }
    best.map(|s| s.range)
}

/// Clamps a symbol/chunk-derived range against the on-disk file length,
/// generalizing the original's symbol-only clamp (spec §9 open question a).
pub fn clamp_range_to_file(range: Range, total_lines: i64) -> Range {
    if total_lines <= 0 {
        return range;
    }
    let sl = clamp(range.sl, 1, total_lines);
    let el = clamp(range.el, sl, total_lines);
    Range::new(sl, range.sc, el, range.ec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(line: i64) -> Match {
        Match {
            line,
            col: 1,
            text: String::new(),
        }
    }

    #[test]
    fn scenario_block_unit() {
        let text = "fn a() {\n  if ok {\n    // KEY\n  }\n}\n";
        let r = block_range(text, &m(3));
        assert_eq!((r.sl, r.el), (2, 4));
    }

    #[test]
    fn block_falls_back_to_paragraph_when_no_braces() {
        let text = "a\nb\n\nc\nKEY\nd\n\ne\n";
        let r = block_range(text, &m(5));
        assert_eq!((r.sl, r.el), (4, 6));
    }

    #[test]
    fn block_falls_back_to_line_range_on_blank_match_line() {
        let text = "a\n\nb\n";
        let r = block_range(text, &m(2));
        assert_eq!((r.sl, r.el), (2, 2));
    }

    #[test]
    fn line_range_clamps_to_bounds() {
        let text = "a\nb\nc\n";
        let r = line_range(text, &m(1), 5);
        assert_eq!((r.sl, r.el), (1, 3));
    }

    #[test]
    fn file_range_covers_whole_file() {
        let text = "a\nb\nc\n";
        let r = file_range(text);
        assert_eq!((r.sl, r.el), (1, 3));
    }

    #[test]
    fn min_enclosing_symbol_picks_smallest_span() {
        let syms = vec![
            SymbolItem {
                range: Range::new(1, 1, 100, 1),
                ..Default::default()
            },
            SymbolItem {
                range: Range::new(2, 1, 4, 1),
                ..Default::default()
            },
        ];
        let r = min_enclosing_symbol_range(&syms, 3).unwrap();
        assert_eq!((r.sl, r.el), (2, 4));
    }
}
