//! Per-path top-N dedupe (§4.6 step 6), preserving original order.

use std::collections::HashMap;

use crate::model::ResultItem;

pub fn dedupe_by_path_top_n(items: Vec<ResultItem>, n: usize) -> Vec<ResultItem> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let count = counts.entry(item.path.clone()).or_insert(0);
        if *count >= n {
            continue;
        }
        *count += 1;
        out.push(item);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &str) -> ResultItem {
        ResultItem {
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn caps_per_path_preserving_order() {
        let items = vec![
            item("a"),
            item("a"),
            item("b"),
            item("a"),
            item("a"),
        ];
        let out = dedupe_by_path_top_n(items, 3);
        assert_eq!(out.len(), 4);
        assert_eq!(out.iter().filter(|i| i.path == "a").count(), 3);
    }
}
