//! Store-facing traits consumed by the backends.
//!
//! The production clients live behind these traits; the crate ships
//! in-memory implementations with the same observable semantics plus an HTTP
//! client for the rules document.

pub mod memory;
pub mod rules;
pub mod tree;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::{DbError, DbResult};
use crate::sql::{CollectionPath, Comparison, SortKey};
use crate::value::{Fields, Value};

pub use memory::MemoryDocumentStore;
pub use rules::{CollectionRules, HttpRulesStore, MemoryRulesStore, RuleSet, RulesStore};
pub use tree::{ChildOrder, MemoryTreeStore, TreeQuery, TreeStore};

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(key: impl Into<String>, fields: Fields) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    pub fn from_json(key: impl Into<String>, json: serde_json::Value) -> DbResult<Self> {
        let key = key.into();
        match Value::from(json) {
            Value::Map(fields) => Ok(Self { key, fields }),
            other => Err(DbError::InvalidDocument(format!(
                "document '{}' must be an object, got {}",
                key,
                other.type_name()
            ))),
        }
    }
}

/// Filters, ordering and paging pushed down to a document scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreQuery {
    pub filters: Vec<Comparison>,
    pub order_by: Vec<SortKey>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl StoreQuery {
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|f| f.matches(fields))
    }
}

/// A lazy document scan. Dropping it releases the underlying cursor.
pub type DocumentStream<'a> = BoxStream<'a, DbResult<Document>>;

/// Collection / document / query operations of a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &CollectionPath, key: &str) -> DbResult<Option<Document>>;

    /// Creates a document under a store-generated key and returns the key.
    async fn add(&self, path: &CollectionPath, fields: Fields) -> DbResult<String>;

    /// Creates or overwrites the document at `key`.
    async fn set(&self, path: &CollectionPath, key: &str, fields: Fields) -> DbResult<()>;

    /// Merges `fields` into an existing document; `DocumentNotFound` if absent.
    async fn update(&self, path: &CollectionPath, key: &str, fields: Fields) -> DbResult<()>;

    /// Deletes an existing document; `DocumentNotFound` if absent.
    async fn delete(&self, path: &CollectionPath, key: &str) -> DbResult<()>;

    /// Batched delete; missing keys are ignored. Returns the number removed.
    async fn delete_many(&self, path: &CollectionPath, keys: &[String]) -> DbResult<usize>;

    async fn create_collection(&self, path: &CollectionPath) -> DbResult<()>;

    fn query<'a>(&'a self, path: &'a CollectionPath, query: StoreQuery) -> DocumentStream<'a>;
}
