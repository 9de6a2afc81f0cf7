//! Shared fixtures for unit and integration tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tempfile::TempDir;

use crate::db::{init_database, DocumentStore, QueryHandle, SqliteDocumentStore};
use crate::errors::AppError;
use crate::models::{IndexObject, Record};
use crate::search::{SearchHit, SearchIndexClient, TantivySearchIndex};

/// SQLite store in a temporary directory.
pub struct TestStore {
    pub inner: SqliteDocumentStore,
    _temp_dir: TempDir,
}

impl TestStore {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("store.sqlite"))
            .await
            .expect("Failed to init DB");
        Self {
            inner: SqliteDocumentStore::new(pool),
            _temp_dir: temp_dir,
        }
    }

    pub fn shared(&self) -> Arc<dyn DocumentStore> {
        Arc::new(self.inner.clone())
    }
}

/// Write one JSON object document into the test store.
pub async fn seed(store: &TestStore, collection: &str, id: &str, value: Value) {
    let fields = match value {
        Value::Object(map) => map,
        other => panic!("seed value must be an object, got {}", other),
    };
    store
        .inner
        .set_document(collection, id, fields)
        .await
        .expect("Failed to seed document");
}

/// Tantivy index in a temporary directory that lives as long as the index.
pub struct TestIndex {
    pub inner: TantivySearchIndex,
    _temp_dir: TempDir,
}

impl TestIndex {
    pub fn new() -> Arc<Self> {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let inner = TantivySearchIndex::open(temp_dir.path()).expect("Failed to init search");
        Arc::new(Self {
            inner,
            _temp_dir: temp_dir,
        })
    }

    pub fn shared(self: &Arc<Self>) -> Arc<dyn SearchIndexClient> {
        self.clone()
    }
}

#[async_trait]
impl SearchIndexClient for TestIndex {
    async fn replace_all(
        &self,
        index_name: &str,
        objects: Vec<IndexObject>,
    ) -> Result<(), AppError> {
        self.inner.replace_all(index_name, objects).await
    }

    async fn all_objects(&self, index_name: &str) -> Result<Vec<IndexObject>, AppError> {
        self.inner.all_objects(index_name).await
    }

    async fn search(
        &self,
        index_name: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, AppError> {
        self.inner.search(index_name, query, limit).await
    }
}

/// Store decorator that counts calls and injects failures.
pub struct ObservedStore {
    inner: Arc<dyn DocumentStore>,
    get_all_calls: AtomicUsize,
    page_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    get_calls: AtomicUsize,
    set_calls: AtomicUsize,
    fail_page_after: Mutex<Option<usize>>,
    fail_delete_after: Mutex<Option<usize>>,
    fail_set: AtomicBool,
    deleted: Mutex<Vec<String>>,
}

impl ObservedStore {
    pub fn wrap(inner: Arc<dyn DocumentStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            get_all_calls: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            set_calls: AtomicUsize::new(0),
            fail_page_after: Mutex::new(None),
            fail_delete_after: Mutex::new(None),
            fail_set: AtomicBool::new(false),
            deleted: Mutex::new(Vec::new()),
        })
    }

    /// Let `n` page fetches succeed, then fail every later one.
    pub fn fail_page_after(&self, n: usize) {
        *self.fail_page_after.lock().unwrap() = Some(n);
    }

    /// Let `n` batch commits succeed, then fail every later one.
    pub fn fail_delete_after(&self, n: usize) {
        *self.fail_delete_after.lock().unwrap() = Some(n);
    }

    pub fn fail_set(&self) {
        self.fail_set.store(true, Ordering::SeqCst);
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.get_all_calls.load(Ordering::SeqCst)
            + self.page_calls()
            + self.delete_calls()
            + self.get_calls.load(Ordering::SeqCst)
            + self.set_calls()
    }

    /// Identifiers passed to successful batch commits.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

fn injected(op: &str) -> AppError {
    AppError::Store(format!("injected {} failure", op))
}

#[async_trait]
impl DocumentStore for ObservedStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<Record>, AppError> {
        self.get_all_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_all(collection).await
    }

    async fn page(
        &self,
        query: &QueryHandle,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>, AppError> {
        let call = self.page_calls.fetch_add(1, Ordering::SeqCst);
        let limit_reached = matches!(*self.fail_page_after.lock().unwrap(), Some(n) if call >= n);
        if limit_reached {
            return Err(injected("page"));
        }
        self.inner.page(query, cursor, limit).await
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<(), AppError> {
        let call = self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let limit_reached = matches!(*self.fail_delete_after.lock().unwrap(), Some(n) if call >= n);
        if limit_reached {
            return Err(injected("commit"));
        }
        self.inner.delete_many(collection, ids).await?;
        self.deleted.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Record>, AppError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_document(collection, id).await
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(injected("set"));
        }
        self.inner.set_document(collection, id, fields).await
    }
}

/// Index decorator that records replace calls and injects failures.
pub struct ObservedIndex {
    inner: Arc<dyn SearchIndexClient>,
    calls: AtomicUsize,
    replaced: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl ObservedIndex {
    pub fn wrap(inner: Arc<dyn SearchIndexClient>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
            replaced: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        })
    }

    /// Make every replace of `index_name` fail.
    pub fn fail_index(&self, index_name: &str) {
        self.failing.lock().unwrap().insert(index_name.to_string());
    }

    /// Index names passed to `replace_all`, in call order, including failed calls.
    pub fn replaced_indexes(&self) -> Vec<String> {
        self.replaced.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchIndexClient for ObservedIndex {
    async fn replace_all(
        &self,
        index_name: &str,
        objects: Vec<IndexObject>,
    ) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replaced.lock().unwrap().push(index_name.to_string());
        let failing = self.failing.lock().unwrap().contains(index_name);
        if failing {
            return Err(AppError::Index(format!(
                "injected failure replacing {}",
                index_name
            )));
        }
        self.inner.replace_all(index_name, objects).await
    }

    async fn all_objects(&self, index_name: &str) -> Result<Vec<IndexObject>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.all_objects(index_name).await
    }

    async fn search(
        &self,
        index_name: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.search(index_name, query, limit).await
    }
}
