//! Line-window chunker (§4.3).

use crate::model::ChunkInput;

#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    pub chunk_lines: usize,
    pub overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        ChunkOptions {
            chunk_lines: 40,
            overlap: 0,
        }
    }
}

/// Splits `text` on `\n`, dropping a single trailing empty element produced
/// by a final newline.
pub fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<&str> = text.split('\n').collect();
    if let Some(last) = lines.last() {
        if last.is_empty() {
            lines.pop();
        }
    }
    lines
}

/// Splits `text` into overlapping line windows of `opts.chunk_lines` with
/// step `chunk_lines - overlap` (falling back to `chunk_lines` when the
/// overlap is invalid, i.e. `overlap >= chunk_lines`).
pub fn chunk_by_lines(text: &str, opts: ChunkOptions) -> Vec<ChunkInput> {
    let lines = split_lines(text);
    if lines.is_empty() || opts.chunk_lines == 0 {
        return Vec::new();
    }

    let step = if opts.overlap < opts.chunk_lines {
        opts.chunk_lines - opts.overlap
    } else {
        opts.chunk_lines
    };

    let total = lines.len();
    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + opts.chunk_lines).min(total);
        let body = lines[start..end].join("\n");
        out.push(ChunkInput {
            sl: (start + 1) as i64,
            el: end as i64,
            kind: "chunk".to_string(),
            title: String::new(),
            text: body,
        });
        if end >= total {
            break;
        }
        start += step;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> String {
        (1..=n)
            .map(|i| format!("line{i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn scenario_100_lines_40_window() {
        let text = lines(100);
        let chunks = chunk_by_lines(&text, ChunkOptions::default());
        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[0].sl, chunks[0].el), (1, 40));
        assert_eq!((chunks[1].sl, chunks[1].el), (41, 80));
        assert_eq!((chunks[2].sl, chunks[2].el), (81, 100));
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(chunk_by_lines("", ChunkOptions::default()).is_empty());
    }

    #[test]
    fn trailing_newline_does_not_add_empty_chunk() {
        let text = format!("{}\n", lines(40));
        let chunks = chunk_by_lines(&text, ChunkOptions::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].el, 40);
    }

    #[test]
    fn overlap_reduces_step() {
        let text = lines(10);
        let chunks = chunk_by_lines(
            &text,
            ChunkOptions {
                chunk_lines: 4,
                overlap: 2,
            },
        );
        // step = 2: [1-4],[3-6],[5-8],[7-10],[9-10]
        let ranges: Vec<(i64, i64)> = chunks.iter().map(|c| (c.sl, c.el)).collect();
        assert_eq!(
            ranges,
            vec![(1, 4), (3, 6), (5, 8), (7, 10), (9, 10)]
        );
    }

    #[test]
    fn invalid_overlap_falls_back_to_chunk_lines_as_step() {
        let text = lines(10);
        let chunks = chunk_by_lines(
            &text,
            ChunkOptions {
                chunk_lines: 4,
                overlap: 4,
            },
        );
        let ranges: Vec<(i64, i64)> = chunks.iter().map(|c| (c.sl, c.el)).collect();
        assert_eq!(ranges, vec![(1, 4), (5, 8), (9, 10)]);
    }
}
