//! In-memory document store.
//!
//! Keeps every collection in a `parking_lot` lock, keyed by the slash path of
//! the collection. Scans snapshot the matching documents and hand them out
//! through a stream that holds a cursor guard, so tests can observe both how
//! many scans ran and whether every cursor was released.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{Document, DocumentStore, DocumentStream, StoreQuery};
use crate::error::{DbError, DbResult};
use crate::sql::CollectionPath;
use crate::value::{Fields, Value};

type Collection = BTreeMap<String, Fields>;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<BTreeMap<String, Collection>>,
    scans: AtomicUsize,
    writes: AtomicUsize,
    open_cursors: Arc<AtomicUsize>,
    failing_key: RwLock<Option<String>>,
}

/// Counts an open scan for as long as it lives.
struct CursorGuard(Arc<AtomicUsize>);

impl CursorGuard {
    fn open(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a collection from `{ key: {fields} }` JSON.
    pub fn load_collection(&self, name: &str, documents: serde_json::Value) -> DbResult<usize> {
        let serde_json::Value::Object(entries) = documents else {
            return Err(DbError::InvalidDocument(format!(
                "collection '{}' must be an object of documents",
                name
            )));
        };

        let mut collections = self.collections.write();
        let collection = collections.entry(name.to_string()).or_default();
        let count = entries.len();
        for (key, fields) in entries {
            let doc = Document::from_json(key, fields)?;
            collection.insert(doc.key, doc.fields);
        }
        Ok(count)
    }

    /// Number of scans opened so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Number of document writes (set, add, update, delete) so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Scans that have not been dropped yet.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Makes every write to `key` fail with a store error.
    pub fn fail_writes_to(&self, key: impl Into<String>) {
        *self.failing_key.write() = Some(key.into());
    }

    pub fn collection_exists(&self, path: &CollectionPath) -> bool {
        self.collections.read().contains_key(&path.slash_path())
    }

    pub fn document_count(&self, path: &CollectionPath) -> usize {
        self.collections
            .read()
            .get(&path.slash_path())
            .map_or(0, |c| c.len())
    }

    fn check_write(&self, path: &CollectionPath, key: &str) -> DbResult<()> {
        if self.failing_key.read().as_deref() == Some(key) {
            return Err(DbError::store(path.child_path(key), "write rejected"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn snapshot(&self, path: &CollectionPath, query: &StoreQuery) -> Vec<Document> {
        let collections = self.collections.read();
        let Some(collection) = collections.get(&path.slash_path()) else {
            return Vec::new();
        };

        let mut docs: Vec<Document> = collection
            .iter()
            .filter(|(_, fields)| query.matches(fields))
            .map(|(key, fields)| Document::new(key.clone(), fields.clone()))
            .collect();

        if !query.order_by.is_empty() {
            docs.sort_by(|a, b| {
                query
                    .order_by
                    .iter()
                    .map(|sort| sort.compare(&a.fields, &b.fields))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        docs.into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &CollectionPath, key: &str) -> DbResult<Option<Document>> {
        Ok(self
            .collections
            .read()
            .get(&path.slash_path())
            .and_then(|c| c.get(key))
            .map(|fields| Document::new(key, fields.clone())))
    }

    async fn add(&self, path: &CollectionPath, fields: Fields) -> DbResult<String> {
        let key = Uuid::now_v7().to_string();
        self.check_write(path, &key)?;
        self.collections
            .write()
            .entry(path.slash_path())
            .or_default()
            .insert(key.clone(), fields);
        tracing::debug!("add: created {}", path.child_path(&key));
        Ok(key)
    }

    async fn set(&self, path: &CollectionPath, key: &str, fields: Fields) -> DbResult<()> {
        self.check_write(path, key)?;
        self.collections
            .write()
            .entry(path.slash_path())
            .or_default()
            .insert(key.to_string(), fields);
        Ok(())
    }

    async fn update(&self, path: &CollectionPath, key: &str, fields: Fields) -> DbResult<()> {
        let mut collections = self.collections.write();
        let doc = collections
            .get_mut(&path.slash_path())
            .and_then(|c| c.get_mut(key))
            .ok_or_else(|| DbError::DocumentNotFound(key.to_string()))?;
        self.check_write(path, key)?;
        for (field, value) in fields {
            Value::set_path(doc, &field, value);
        }
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, key: &str) -> DbResult<()> {
        let mut collections = self.collections.write();
        let collection = collections
            .get_mut(&path.slash_path())
            .filter(|c| c.contains_key(key))
            .ok_or_else(|| DbError::DocumentNotFound(key.to_string()))?;
        self.check_write(path, key)?;
        collection.remove(key);
        Ok(())
    }

    async fn delete_many(&self, path: &CollectionPath, keys: &[String]) -> DbResult<usize> {
        let mut collections = self.collections.write();
        let Some(collection) = collections.get_mut(&path.slash_path()) else {
            return Ok(0);
        };
        let mut removed = 0;
        for key in keys {
            if collection.remove(key).is_some() {
                removed += 1;
            }
        }
        self.writes.fetch_add(removed, Ordering::SeqCst);
        Ok(removed)
    }

    async fn create_collection(&self, path: &CollectionPath) -> DbResult<()> {
        self.collections.write().entry(path.slash_path()).or_default();
        Ok(())
    }

    fn query<'a>(&'a self, path: &'a CollectionPath, query: StoreQuery) -> DocumentStream<'a> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let guard = CursorGuard::open(self.open_cursors.clone());
        let docs = self.snapshot(path, &query);
        tracing::debug!("query {}: {} document(s) matched", path, docs.len());

        async_stream::stream! {
            let _guard = guard;
            for doc in docs {
                yield Ok::<_, DbError>(doc);
            }
        }
        .boxed()
    }
}
