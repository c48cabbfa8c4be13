//! The document-index backend, grounded on
//! `original_source/internal/index/bleve/store.go`, reworked onto
//! `tantivy` (the document-search crate the wider corpus reaches for)
//! with a JSON-file metadata sidecar in place of the original's bbolt.

mod meta;

use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, QueryParser, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, SchemaBuilder, Value, FAST, INDEXED, STORED, STRING, TEXT,
};
use tantivy::{doc, Index, IndexReader, IndexWriter, TantivyDocument, Term};

use crate::error::{Error, Result};
use crate::model::{
    normalize_coord, normalize_kind, Chunk, File, FilePlan, SearchResult, SymbolItem, Workspace,
};
use crate::store::{BuildPragmaApplier, Store};

use meta::MetaStore;

const DOC_TYPE_CHUNK: &str = "chunk";
const DOC_TYPE_SYMBOL: &str = "symbol";
const DOC_TYPE_COMMENT: &str = "comment";

struct Fields {
    doc_id: Field,
    doc_type: Field,
    workspace_id: Field,
    path: Field,
    sl: Field,
    sc: Field,
    el: Field,
    ec: Field,
    kind: Field,
    title: Field,
    text: Field,
    name: Field,
    container: Field,
    lang: Field,
    signature: Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut builder: SchemaBuilder = Schema::builder();
    let doc_id = builder.add_text_field("doc_id", STRING | STORED);
    let doc_type = builder.add_text_field("doc_type", STRING | STORED | FAST);
    let workspace_id = builder.add_text_field("workspace_id", STRING | STORED | FAST);
    let path = builder.add_text_field("path", STRING | STORED | FAST);
    let sl = builder.add_i64_field("sl", INDEXED | STORED | FAST);
    let sc = builder.add_i64_field("sc", STORED);
    let el = builder.add_i64_field("el", INDEXED | STORED | FAST);
    let ec = builder.add_i64_field("ec", STORED);
    let kind = builder.add_text_field("kind", STRING | STORED);
    let title = builder.add_text_field("title", TEXT | STORED);
    let text = builder.add_text_field("text", TEXT | STORED);
    let name = builder.add_text_field("name", TEXT | STORED);
    let container = builder.add_text_field("container", TEXT | STORED);
    let lang = builder.add_text_field("lang", STRING | STORED);
    let signature = builder.add_text_field("signature", TEXT | STORED);
    let schema = builder.build();
    (
        schema,
        Fields {
            doc_id,
            doc_type,
            workspace_id,
            path,
            sl,
            sc,
            el,
            ec,
            kind,
            title,
            text,
            name,
            container,
            lang,
            signature,
        },
    )
}

fn escape_path(path: &str) -> String {
    path.replace('|', "_")
}

fn chunk_doc_id(workspace_id: &str, path: &str, idx: usize) -> String {
    format!("{DOC_TYPE_CHUNK}|{workspace_id}|{}|{idx}", escape_path(path))
}
fn symbol_doc_id(workspace_id: &str, path: &str, idx: usize) -> String {
    format!("{DOC_TYPE_SYMBOL}|{workspace_id}|{}|{idx}", escape_path(path))
}
fn comment_doc_id(workspace_id: &str, path: &str, idx: usize) -> String {
    format!("{DOC_TYPE_COMMENT}|{workspace_id}|{}|{idx}", escape_path(path))
}

pub struct TantivyStore {
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    fields: Fields,
    meta: MetaStore,
}

impl TantivyStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let (schema, fields) = build_schema();

        let index = if Index::exists(&tantivy::directory::MmapDirectory::open(path)?)? {
            Index::open_in_dir(path)?
        } else {
            Index::create_in_dir(path, schema)?
        };

        let writer = index.writer(50_000_000)?;
        let reader = index.reader()?;
        let meta = MetaStore::open(&path.join("otidx-meta.json"))?;

        Ok(TantivyStore {
            index,
            writer: Mutex::new(writer),
            reader,
            fields,
            meta,
        })
    }

    fn delete_by_doc_ids(&self, writer: &mut IndexWriter, ids: impl Iterator<Item = String>) {
        for id in ids {
            writer.delete_term(Term::from_field_text(self.fields.doc_id, &id));
        }
    }
}

impl Store for TantivyStore {
    fn close(&mut self) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writer.commit()?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "tantivy"
    }

    fn has_fts(&self) -> bool {
        true
    }

    fn fts_reason(&self) -> String {
        "tantivy".to_string()
    }

    fn ensure_workspace(&self, id: &str, root: &str) -> Result<()> {
        self.meta.ensure_workspace(id, root)
    }

    fn get_version(&self, id: &str) -> Result<i64> {
        self.meta.ensure_workspace(id, "")?;
        Ok(self.meta.get_version(id)?.unwrap_or(1))
    }

    fn bump_version(&self, id: &str) -> Result<i64> {
        self.meta.ensure_workspace(id, "")?;
        self.meta.bump_version(id)
    }

    fn get_workspace(&self, id: &str) -> Result<Workspace> {
        let wm = self
            .meta
            .get_workspace(id)?
            .ok_or_else(|| Error::NotFound(format!("workspace not found: {id}")))?;
        Ok(Workspace {
            id: wm.id,
            root: wm.root,
            created_at: wm.created_at,
            version: wm.version,
        })
    }

    fn upsert_file(&self, workspace_id: &str, path: &str, size: i64, mtime: i64) -> Result<()> {
        self.meta.ensure_workspace(workspace_id, "")?;
        self.meta.upsert_file(workspace_id, path, size, mtime)
    }

    fn get_file(&self, workspace_id: &str, path: &str) -> Result<File> {
        self.get_file_meta(workspace_id, path)?
            .ok_or_else(|| Error::NotFound(format!("file not found: {path}")))
    }

    fn get_file_meta(&self, workspace_id: &str, path: &str) -> Result<Option<File>> {
        self.meta.get_file_meta(workspace_id, path)
    }

    fn list_files_meta(&self, workspace_id: &str) -> Result<HashMap<String, File>> {
        self.meta.list_files_meta(workspace_id)
    }

    fn delete_file(&self, workspace_id: &str, path: &str) -> Result<()> {
        self.replace_files_batch(
            workspace_id,
            &[FilePlan {
                path: path.to_string(),
                delete: true,
                ..Default::default()
            }],
        )
    }

    fn get_files_stats(&self, workspace_id: &str) -> Result<(i64, i64)> {
        self.meta.get_files_stats(workspace_id)
    }

    fn replace_files_batch(&self, workspace_id: &str, plans: &[FilePlan]) -> Result<()> {
        if plans.is_empty() {
            return Ok(());
        }
        self.meta.ensure_workspace(workspace_id, "")?;

        let mut writer = self.writer.lock().unwrap();
        for plan in plans {
            let path = plan.path.trim();
            if path.is_empty() {
                return Err(Error::invalid("path is required"));
            }

            let (prior_chunks, prior_syms, prior_comms) =
                self.meta.get_doc_counts(workspace_id, path)?;
            self.delete_by_doc_ids(
                &mut writer,
                (0..prior_chunks).map(|i| chunk_doc_id(workspace_id, path, i)),
            );
            self.delete_by_doc_ids(
                &mut writer,
                (0..prior_syms).map(|i| symbol_doc_id(workspace_id, path, i)),
            );
            self.delete_by_doc_ids(
                &mut writer,
                (0..prior_comms).map(|i| comment_doc_id(workspace_id, path, i)),
            );

            if plan.delete {
                self.meta.remove_file(workspace_id, path)?;
                continue;
            }

            for (i, c) in plan.chunks.iter().enumerate() {
                let id = chunk_doc_id(workspace_id, path, i);
                let kind = normalize_kind(&c.kind, "chunk");
                writer.add_document(doc!(
                    self.fields.doc_id => id,
                    self.fields.doc_type => DOC_TYPE_CHUNK,
                    self.fields.workspace_id => workspace_id,
                    self.fields.path => path,
                    self.fields.sl => c.sl,
                    self.fields.el => c.el,
                    self.fields.kind => kind,
                    self.fields.title => c.title.clone(),
                    self.fields.text => c.text.clone(),
                ))?;
            }
            for (i, s) in plan.syms.iter().enumerate() {
                let id = symbol_doc_id(workspace_id, path, i);
                let kind = normalize_kind(&s.kind, "symbol");
                writer.add_document(doc!(
                    self.fields.doc_id => id,
                    self.fields.doc_type => DOC_TYPE_SYMBOL,
                    self.fields.workspace_id => workspace_id,
                    self.fields.path => path,
                    self.fields.sl => s.sl,
                    self.fields.sc => normalize_coord(s.sc),
                    self.fields.el => s.el,
                    self.fields.ec => normalize_coord(s.ec),
                    self.fields.kind => kind,
                    self.fields.name => s.name.clone(),
                    self.fields.container => s.container.clone(),
                    self.fields.lang => s.lang.clone(),
                    self.fields.signature => s.signature.clone(),
                ))?;
            }
            for (i, c) in plan.comms.iter().enumerate() {
                let id = comment_doc_id(workspace_id, path, i);
                let kind = normalize_kind(&c.kind, "comment");
                writer.add_document(doc!(
                    self.fields.doc_id => id,
                    self.fields.doc_type => DOC_TYPE_COMMENT,
                    self.fields.workspace_id => workspace_id,
                    self.fields.path => path,
                    self.fields.sl => c.sl,
                    self.fields.sc => normalize_coord(c.sc),
                    self.fields.el => c.el,
                    self.fields.ec => normalize_coord(c.ec),
                    self.fields.kind => kind,
                    self.fields.text => c.text.clone(),
                    self.fields.lang => c.lang.clone(),
                ))?;
            }

            self.meta.put_file_counts(
                workspace_id,
                path,
                plan.size,
                plan.mtime,
                plan.hash.trim(),
                plan.chunks.len(),
                plan.syms.len(),
                plan.comms.len(),
            )?;
        }

        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        self.meta.bump_version(workspace_id)?;
        Ok(())
    }

    fn search_chunks(
        &self,
        workspace_id: &str,
        keyword: &str,
        limit: usize,
        case_insensitive: bool,
    ) -> Result<SearchResult> {
        let _ = case_insensitive; // tantivy's default tokenizer lowercases
        let searcher = self.reader.searcher();

        let type_term = TermQuery::new(
            Term::from_field_text(self.fields.doc_type, DOC_TYPE_CHUNK),
            IndexRecordOption::Basic,
        );
        let ws_term = TermQuery::new(
            Term::from_field_text(self.fields.workspace_id, workspace_id),
            IndexRecordOption::Basic,
        );

        let parser = QueryParser::for_index(&self.index, vec![self.fields.text, self.fields.title]);
        let text_query = parser
            .parse_query(keyword)
            .map_err(|e| Error::Storage(e.to_string()))?;

        let combined = BooleanQuery::new(vec![
            (Occur::Must, Box::new(type_term)),
            (Occur::Must, Box::new(ws_term)),
            (Occur::Must, text_query),
        ]);

        let top_docs = searcher.search(&combined, &TopDocs::with_limit(limit.max(1)))?;
        let mut chunks = Vec::with_capacity(top_docs.len());
        for (_score, addr) in top_docs {
            let retrieved: TantivyDocument = searcher.doc(addr)?;
            chunks.push(Chunk {
                workspace_id: workspace_id.to_string(),
                path: get_text(&retrieved, self.fields.path),
                sl: get_i64(&retrieved, self.fields.sl),
                el: get_i64(&retrieved, self.fields.el),
                kind: get_text(&retrieved, self.fields.kind),
                title: get_text(&retrieved, self.fields.title),
                text: get_text(&retrieved, self.fields.text),
            });
        }

        Ok(SearchResult {
            chunks,
            match_case_insensitive: true,
            backend: "tantivy".to_string(),
        })
    }

    fn find_min_enclosing_symbols(
        &self,
        workspace_id: &str,
        path: &str,
        line: i64,
    ) -> Result<Vec<SymbolItem>> {
        if line <= 0 {
            return Err(Error::invalid("line must be >= 1"));
        }
        let searcher = self.reader.searcher();
        let type_term = TermQuery::new(
            Term::from_field_text(self.fields.doc_type, DOC_TYPE_SYMBOL),
            IndexRecordOption::Basic,
        );
        let ws_term = TermQuery::new(
            Term::from_field_text(self.fields.workspace_id, workspace_id),
            IndexRecordOption::Basic,
        );
        let path_term = TermQuery::new(
            Term::from_field_text(self.fields.path, path),
            IndexRecordOption::Basic,
        );
        let combined = BooleanQuery::new(vec![
            (Occur::Must, Box::new(type_term)),
            (Occur::Must, Box::new(ws_term)),
            (Occur::Must, Box::new(path_term)),
        ]);

        let top_docs = searcher.search(&combined, &TopDocs::with_limit(4096))?;
        let mut candidates = Vec::new();
        for (_score, addr) in top_docs {
            let retrieved: TantivyDocument = searcher.doc(addr)?;
            let sl = get_i64(&retrieved, self.fields.sl);
            let el = get_i64(&retrieved, self.fields.el);
            if sl <= line && line <= el {
                candidates.push(SymbolItem {
                    kind: get_text(&retrieved, self.fields.kind),
                    name: get_text(&retrieved, self.fields.name),
                    container: get_text(&retrieved, self.fields.container),
                    lang: get_text(&retrieved, self.fields.lang),
                    signature: get_text(&retrieved, self.fields.signature),
                    path: get_text(&retrieved, self.fields.path),
                    range: crate::model::Range::new(
                        sl,
                        get_i64(&retrieved, self.fields.sc),
                        el,
                        get_i64(&retrieved, self.fields.ec),
                    ),
                });
            }
        }
        candidates.sort_by_key(|s| (s.range.span(), s.range.sl, s.range.el));
        candidates.truncate(8);
        Ok(candidates)
    }

    fn count_chunks(&self, workspace_id: &str) -> Result<i64> {
        let searcher = self.reader.searcher();
        let type_term = TermQuery::new(
            Term::from_field_text(self.fields.doc_type, DOC_TYPE_CHUNK),
            IndexRecordOption::Basic,
        );
        let ws_term = TermQuery::new(
            Term::from_field_text(self.fields.workspace_id, workspace_id),
            IndexRecordOption::Basic,
        );
        let combined = BooleanQuery::new(vec![
            (Occur::Must, Box::new(type_term)),
            (Occur::Must, Box::new(ws_term)),
        ]);
        Ok(searcher.search(&combined, &tantivy::collector::Count)? as i64)
    }

    fn count_files(&self, workspace_id: &str) -> Result<i64> {
        self.meta.get_files_stats(workspace_id).map(|(count, _)| count)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl BuildPragmaApplier for TantivyStore {
    fn apply_build_pragmas(&self) -> Result<()> {
        Ok(())
    }
}

fn get_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn get_i64(doc: &TantivyDocument, field: Field) -> i64 {
    doc.get_first(field).and_then(|v| v.as_i64()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replace_and_search_round_trip() {
        let dir = tempdir().unwrap();
        let store = TantivyStore::open(dir.path()).unwrap();
        store.ensure_workspace("ws", "/root").unwrap();

        let plan = FilePlan {
            path: "a.go".into(),
            size: 10,
            mtime: 1,
            hash: "h".into(),
            chunks: vec![crate::model::ChunkInput {
                sl: 1,
                el: 2,
                kind: "chunk".into(),
                title: String::new(),
                text: "hello tantivy world".into(),
            }],
            ..Default::default()
        };
        store.replace_files_batch("ws", &[plan]).unwrap();

        let result = store.search_chunks("ws", "tantivy", 10, true).unwrap();
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].path, "a.go");
    }
}
