//! Search index module.
//!
//! Each logical index name maps to its own Tantivy index directory. Objects
//! are only ever written wholesale through [`SearchIndexClient::replace_all`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tokio::sync::{Mutex, RwLock};

use crate::errors::AppError;
use crate::models::IndexObject;

/// Single writer thread per index; objects arrive in one batch per resync.
const WRITER_THREADS: usize = 1;
const WRITER_MEMORY_BUDGET: usize = 20_000_000;

/// A stored object matched by a query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub object: IndexObject,
    pub score: f32,
}

#[async_trait]
pub trait SearchIndexClient: Send + Sync {
    /// Replace the entire content of `index_name` with `objects`.
    async fn replace_all(&self, index_name: &str, objects: Vec<IndexObject>)
        -> Result<(), AppError>;

    /// Every object currently stored in `index_name`, ordered by `objectID`.
    async fn all_objects(&self, index_name: &str) -> Result<Vec<IndexObject>, AppError>;

    async fn search(
        &self,
        index_name: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, AppError>;
}

/// Index schema fields.
struct IndexFields {
    object_id: Field,
    content: Field,
    source: Field,
}

struct NamedIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: IndexFields,
}

impl NamedIndex {
    fn open(path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(path)
            .map_err(|e| AppError::Index(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        schema_builder.add_text_field("object_id", STRING | STORED);
        schema_builder.add_text_field("content", TEXT);
        schema_builder.add_text_field("source", STORED);
        let schema = schema_builder.build();

        // Try to open existing index or create new one
        let index = Index::open_in_dir(path)
            .or_else(|_| Index::create_in_dir(path, schema))
            .map_err(|e| AppError::Index(format!("Failed to open/create index: {}", e)))?;

        let schema = index.schema();
        let fields = IndexFields {
            object_id: schema.get_field("object_id")?,
            content: schema.get_field("content")?,
            source: schema.get_field("source")?,
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Index(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer_with_num_threads(WRITER_THREADS, WRITER_MEMORY_BUDGET)
            .map_err(|e| AppError::Index(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        })
    }

    fn create_document(&self, object: &IndexObject) -> Result<TantivyDocument, AppError> {
        let mut content = Vec::new();
        for value in object.fields.values() {
            collect_text(value, &mut content);
        }

        Ok(doc!(
            self.fields.object_id => object.object_id.clone(),
            self.fields.content => content.join(" "),
            self.fields.source => serde_json::to_string(object)?
        ))
    }

    /// Replace every document and commit. Blocks the calling thread.
    fn rebuild(&self, objects: &[IndexObject]) -> Result<usize, AppError> {
        let mut writer = self.writer.blocking_lock();

        writer.delete_all_documents()?;
        for object in objects {
            writer.add_document(self.create_document(object)?)?;
        }
        writer.commit()?;

        self.reader.reload()?;
        Ok(objects.len())
    }

    fn object_from_doc(&self, doc: &TantivyDocument) -> Option<IndexObject> {
        let source = doc.get_first(self.fields.source)?.as_str()?;
        serde_json::from_str(source).ok()
    }
}

/// Tantivy-backed search index, one directory per index name under `root`.
pub struct TantivySearchIndex {
    root: PathBuf,
    indexes: RwLock<HashMap<String, Arc<NamedIndex>>>,
}

impl TantivySearchIndex {
    pub fn open(root: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(root)
            .map_err(|e| AppError::Index(format!("Failed to create index directory: {}", e)))?;

        Ok(Self {
            root: root.to_path_buf(),
            indexes: RwLock::new(HashMap::new()),
        })
    }

    async fn named(&self, index_name: &str) -> Result<Arc<NamedIndex>, AppError> {
        if !is_valid_index_name(index_name) {
            return Err(AppError::BadRequest(format!(
                "Invalid index name {:?}",
                index_name
            )));
        }

        if let Some(index) = self.indexes.read().await.get(index_name) {
            return Ok(index.clone());
        }

        let mut indexes = self.indexes.write().await;
        if let Some(index) = indexes.get(index_name) {
            return Ok(index.clone());
        }

        let index = Arc::new(NamedIndex::open(&self.root.join(index_name))?);
        indexes.insert(index_name.to_string(), index.clone());
        tracing::debug!("Opened search index {}", index_name);
        Ok(index)
    }
}

#[async_trait]
impl SearchIndexClient for TantivySearchIndex {
    async fn replace_all(
        &self,
        index_name: &str,
        objects: Vec<IndexObject>,
    ) -> Result<(), AppError> {
        let named = self.named(index_name).await?;
        let objects = last_per_object_id(objects);

        // Tantivy writes are synchronous; keep them off the async workers.
        let count = tokio::task::spawn_blocking(move || named.rebuild(&objects))
            .await
            .map_err(|e| AppError::Internal(format!("Index rebuild task failed: {}", e)))??;

        tracing::info!(
            "Search index {} replaced with {} objects",
            index_name,
            count
        );
        Ok(())
    }

    async fn all_objects(&self, index_name: &str) -> Result<Vec<IndexObject>, AppError> {
        let named = self.named(index_name).await?;
        let searcher = named.reader.searcher();

        let total = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX);
        if total == 0 {
            return Ok(Vec::new());
        }

        let top_docs = searcher.search(&AllQuery, &TopDocs::with_limit(total))?;

        let mut objects = Vec::with_capacity(top_docs.len());
        for (_, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(object) = named.object_from_doc(&doc) {
                objects.push(object);
            }
        }
        objects.sort_by(|a, b| a.object_id.cmp(&b.object_id));
        Ok(objects)
    }

    async fn search(
        &self,
        index_name: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, AppError> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let named = self.named(index_name).await?;
        let searcher = named.reader.searcher();

        let parser = QueryParser::for_index(&named.index, vec![named.fields.content]);
        let parsed = parser
            .parse_query(query)
            .map_err(|e| AppError::BadRequest(format!("Invalid search query: {}", e)))?;

        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(limit))
            .map_err(|e| AppError::Index(format!("Search failed: {}", e)))?;

        let hits = top_docs
            .into_iter()
            .filter_map(|(score, address)| {
                let doc: TantivyDocument = searcher.doc(address).ok()?;
                let object = named.object_from_doc(&doc)?;
                Some(SearchHit { object, score })
            })
            .collect();

        Ok(hits)
    }
}

fn is_valid_index_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Keep only the last object for each `objectID`, preserving input order.
fn last_per_object_id(objects: Vec<IndexObject>) -> Vec<IndexObject> {
    let mut seen = HashSet::new();
    let mut kept: Vec<IndexObject> = objects
        .into_iter()
        .rev()
        .filter(|o| seen.insert(o.object_id.clone()))
        .collect();
    kept.reverse();
    kept
}

fn collect_text(value: &JsonValue, out: &mut Vec<String>) {
    match value {
        JsonValue::String(s) => out.push(s.clone()),
        JsonValue::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        JsonValue::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}
