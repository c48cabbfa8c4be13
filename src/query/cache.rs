//! Bounded LRU result cache (§4.6.1), grounded on `core/cache/lru.go`'s
//! map + recency-list shape, adapted to a single mutex-guarded structure.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::ResultItem;

#[derive(Debug, Clone, Default)]
pub struct CacheKey {
    pub workspace_id: String,
    pub version: i64,
    pub q_trim: String,
    pub unit: String,
    pub case_insensitive: bool,
    pub limit: i64,
    pub offset: i64,
    pub context_lines: i64,
    pub include_globs_csv: String,
    pub exclude_globs_csv: String,
    pub backend: String,
}

impl CacheKey {
    pub fn to_string_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.workspace_id,
            self.version,
            self.q_trim,
            self.unit,
            self.case_insensitive,
            self.limit,
            self.offset,
            self.context_lines,
            self.include_globs_csv,
            self.exclude_globs_csv,
            self.backend,
        )
    }
}

struct Entry {
    value: Vec<ResultItem>,
}

struct Inner {
    capacity: usize,
    map: HashMap<String, Entry>,
    /// Most-recently-used at the back.
    order: Vec<String>,
}

impl Inner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos);
            self.order.push(k);
        }
    }

    fn evict_if_needed(&mut self) {
        while self.map.len() > self.capacity {
            if self.order.is_empty() {
                break;
            }
            let oldest = self.order.remove(0);
            self.map.remove(&oldest);
        }
    }
}

/// Thread-safe LRU cache of query results, keyed by a stable string built
/// from normalized options. Values are deep-cloned on get/put so a caller
/// mutating a returned vector never affects the cached copy.
pub struct QueryCache {
    inner: Mutex<Inner>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        QueryCache {
            inner: Mutex::new(Inner {
                capacity: capacity.max(1),
                map: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<ResultItem>> {
        let k = key.to_string_key();
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.map.get(&k) {
            let cloned = entry.value.clone();
            inner.touch(&k);
            Some(cloned)
        } else {
            None
        }
    }

    pub fn put(&self, key: &CacheKey, value: Vec<ResultItem>) {
        let k = key.to_string_key();
        let mut inner = self.inner.lock().unwrap();
        inner.map.insert(k.clone(), Entry { value });
        if let Some(pos) = inner.order.iter().position(|x| x == &k) {
            inner.order.remove(pos);
        }
        inner.order.push(k);
        inner.evict_if_needed();
    }

    /// Runs `miss` on a cache miss, storing and returning its result;
    /// returns the cached deep copy on a hit.
    pub fn get_or_run<F>(&self, key: &CacheKey, miss: F) -> crate::error::Result<Vec<ResultItem>>
    where
        F: FnOnce() -> crate::error::Result<Vec<ResultItem>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let computed = miss()?;
        self.put(key, computed.clone());
        Ok(computed)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(q: &str, version: i64) -> CacheKey {
        CacheKey {
            workspace_id: "ws".into(),
            version,
            q_trim: q.into(),
            unit: "block".into(),
            ..Default::default()
        }
    }

    #[test]
    fn hit_returns_deep_copy() {
        let cache = QueryCache::new(4);
        let mut calls = 0;
        let k = key("hello", 1);
        let first = cache
            .get_or_run(&k, || {
                calls += 1;
                Ok(vec![ResultItem {
                    path: "a.go".into(),
                    ..Default::default()
                }])
            })
            .unwrap();
        let second = cache.get_or_run(&k, || unreachable!()).unwrap();
        assert_eq!(calls, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn version_bump_invalidates() {
        let cache = QueryCache::new(4);
        let mut calls = 0;
        let run = |calls: &mut i32| {
            *calls += 1;
            Ok(vec![])
        };
        cache.get_or_run(&key("q", 1), || run(&mut calls)).unwrap();
        cache.get_or_run(&key("q", 2), || run(&mut calls)).unwrap();
        assert_eq!(calls, 2);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = QueryCache::new(2);
        cache.put(&key("a", 1), vec![]);
        cache.put(&key("b", 1), vec![]);
        cache.get(&key("a", 1));
        cache.put(&key("c", 1), vec![]);
        assert!(cache.get(&key("b", 1)).is_none());
        assert!(cache.get(&key("a", 1)).is_some());
        assert!(cache.get(&key("c", 1)).is_some());
    }
}
