//! Statement handlers over a [`DocumentStore`].

use std::sync::Arc;

use async_trait::async_trait;
use docsql_core::{
    CreateTableStatement, DeleteStatement, DropTableStatement, InsertStatement, SelectStatement,
    UpdateStatement,
};
use futures::{StreamExt, TryStreamExt};

use super::{evaluate_assignments, prepare_insert, Backend};
use crate::error::{DbError, DbResult};
use crate::result::ExecResult;
use crate::rows::Rows;
use crate::sql::path::{self, CollectionPath};
use crate::sql::plan::plan_select;
use crate::sql::predicate::compile;
use crate::sql::{Evaluator, Predicate, Scope};
use crate::store::{Document, DocumentStore, StoreQuery};
use crate::value::Value;

/// Keys removed per `delete_many` call when dropping a collection.
const DROP_BATCH_SIZE: usize = 500;

pub struct DocumentBackend<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> DocumentBackend<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn filter_query(predicate: &Predicate) -> StoreQuery {
        StoreQuery {
            filters: predicate.comparison().cloned().into_iter().collect(),
            ..StoreQuery::default()
        }
    }

    /// Applies `apply` to every document matching `predicate`, stopping at
    /// the first failure.
    async fn for_each_match<F, Fut>(
        &self,
        path: &CollectionPath,
        predicate: &Predicate,
        apply: F,
    ) -> DbResult<u64>
    where
        F: Fn(String) -> Fut + Send + Sync,
        Fut: std::future::Future<Output = DbResult<()>> + Send,
    {
        let mut stream = self.store.query(path, Self::filter_query(predicate));
        let mut completed = 0u64;
        while let Some(doc) = stream.next().await {
            let doc = doc.map_err(|e| DbError::batch_aborted(path.to_string(), completed, e))?;
            if let Err(e) = apply(doc.key.clone()).await {
                tracing::warn!(
                    "batch on {} aborted at {} after {} document(s): {}",
                    path,
                    doc.key,
                    completed,
                    e
                );
                return Err(DbError::batch_aborted(doc.key, completed, e));
            }
            completed += 1;
        }
        Ok(completed)
    }
}

#[async_trait]
impl<S: DocumentStore + 'static> Backend for DocumentBackend<S> {
    fn name(&self) -> &'static str {
        "document"
    }

    async fn insert(&self, stmt: &InsertStatement, args: &[Value]) -> DbResult<ExecResult> {
        let mut eval = Evaluator::new(args);
        let (path, documents) = prepare_insert(stmt, &mut eval)?;

        let mut last_key = None;
        let mut created = 0u64;
        for doc in documents {
            let key = match doc.key {
                Some(key) => {
                    self.store.set(&path, &key, doc.fields).await?;
                    key
                }
                None => self.store.add(&path, doc.fields).await?,
            };
            created += 1;
            last_key = Some(key);
        }

        tracing::debug!("insert into {}: {} document(s)", path, created);
        Ok(ExecResult::inserted(created, last_key))
    }

    async fn update(&self, stmt: &UpdateStatement, args: &[Value]) -> DbResult<ExecResult> {
        let mut eval = Evaluator::new(args);
        let path = path::resolve(&stmt.table, &mut eval)?;
        let fields = evaluate_assignments(&stmt.assignments, &mut eval)?;
        let scope = Scope::new(path.name(), None);
        let predicate = compile(stmt.where_clause.as_ref(), &scope, &mut eval)?;

        let updated = match &predicate {
            Predicate::DocumentKey(key) => {
                self.store.update(&path, key, fields).await?;
                1
            }
            Predicate::Never => 0,
            Predicate::MatchAll | Predicate::Compare(_) => {
                let store = &self.store;
                let path_ref = &path;
                let fields = &fields;
                self.for_each_match(&path, &predicate, |key| async move {
                    store.update(path_ref, &key, fields.clone()).await
                })
                .await?
            }
        };

        tracing::debug!("update {}: {} document(s)", path, updated);
        Ok(ExecResult::affected(updated))
    }

    async fn delete(&self, stmt: &DeleteStatement, args: &[Value]) -> DbResult<ExecResult> {
        let mut eval = Evaluator::new(args);
        let path = path::resolve(&stmt.table, &mut eval)?;
        let scope = Scope::new(path.name(), None);
        let predicate = compile(stmt.where_clause.as_ref(), &scope, &mut eval)?;

        let deleted = match &predicate {
            Predicate::DocumentKey(key) => {
                self.store.delete(&path, key).await?;
                1
            }
            Predicate::Never => 0,
            Predicate::MatchAll | Predicate::Compare(_) => {
                let store = &self.store;
                let path_ref = &path;
                self.for_each_match(&path, &predicate, |key| async move {
                    store.delete(path_ref, &key).await
                })
                .await?
            }
        };

        tracing::debug!("delete from {}: {} document(s)", path, deleted);
        Ok(ExecResult::affected(deleted))
    }

    async fn select(&self, stmt: &SelectStatement, args: &[Value]) -> DbResult<Rows> {
        let mut eval = Evaluator::new(args);
        let plan = plan_select(stmt, &mut eval)?;

        let documents: Vec<Document> = match &plan.predicate {
            Predicate::DocumentKey(key) => self.store.get(&plan.path, key).await?.into_iter().collect(),
            Predicate::Never => return Ok(Rows::empty(&plan.projection)),
            Predicate::MatchAll | Predicate::Compare(_) => {
                let query = StoreQuery {
                    filters: plan.predicate.comparison().cloned().into_iter().collect(),
                    order_by: plan.order.clone(),
                    limit: plan.limit,
                    offset: plan.offset,
                };
                self.store.query(&plan.path, query).try_collect().await?
            }
        };

        tracing::debug!("select from {}: {} document(s)", plan.path, documents.len());
        Ok(Rows::materialize(documents, &plan.projection))
    }

    async fn create_table(&self, stmt: &CreateTableStatement) -> DbResult<ExecResult> {
        let path = CollectionPath::collection(&stmt.name);
        self.store.create_collection(&path).await?;
        tracing::info!("created collection {}", path);
        Ok(ExecResult::affected(1))
    }

    async fn drop_table(&self, stmt: &DropTableStatement) -> DbResult<ExecResult> {
        let path = CollectionPath::collection(&stmt.name);
        let keys: Vec<String> = self
            .store
            .query(&path, StoreQuery::default())
            .map_ok(|doc| doc.key)
            .try_collect()
            .await?;

        let mut removed = 0usize;
        for batch in keys.chunks(DROP_BATCH_SIZE) {
            removed += self.store.delete_many(&path, batch).await?;
        }

        tracing::info!("dropped collection {}: {} document(s) removed", path, removed);
        Ok(ExecResult::affected(removed as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use docsql_core::{parse, Statement};
    use serde_json::json;

    fn backend() -> (Arc<MemoryDocumentStore>, DocumentBackend<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .load_collection(
                "items",
                json!({
                    "a": {"a": 1, "name": "first"},
                    "b": {"a": 2, "name": "second"},
                    "c": {"a": 1, "name": "third"},
                }),
            )
            .unwrap();
        (store.clone(), DocumentBackend::new(store))
    }

    fn stmt(sql: &str) -> Statement {
        parse(sql).unwrap()
    }

    #[tokio::test]
    async fn test_update_by_predicate() {
        let (store, backend) = backend();
        let Statement::Update(update) = stmt("UPDATE items SET name = ? WHERE a = 1") else {
            panic!("expected UPDATE");
        };
        let result = backend.update(&update, &[Value::from("x")]).await.unwrap();
        assert_eq!(result.rows_affected(), 2);
        let doc = store
            .get(&CollectionPath::collection("items"), "c")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.fields["name"], Value::from("x"));
        assert_eq!(store.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_key() {
        let (_, backend) = backend();
        let Statement::Update(update) = stmt("UPDATE items SET name = 'x' WHERE id = 'zz'") else {
            panic!("expected UPDATE");
        };
        let err = backend.update(&update, &[]).await.unwrap_err();
        assert!(matches!(err, DbError::DocumentNotFound(key) if key == "zz"));
    }

    #[tokio::test]
    async fn test_update_batch_abort_reports_progress() {
        let (store, backend) = backend();
        store.fail_writes_to("c");
        let Statement::Update(update) = stmt("UPDATE items SET name = 'x' WHERE a = 1") else {
            panic!("expected UPDATE");
        };
        let err = backend.update(&update, &[]).await.unwrap_err();
        match err {
            DbError::BatchAborted { key, completed, source } => {
                assert_eq!(key, "c");
                assert_eq!(completed, 1);
                assert!(matches!(*source, DbError::StoreError { .. }));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let items = CollectionPath::collection("items");
        let first = store.get(&items, "a").await.unwrap().unwrap();
        assert_eq!(first.fields.get("name"), Some(&Value::from("x")));
        let failed = store.get(&items, "c").await.unwrap().unwrap();
        assert_eq!(failed.fields.get("name"), Some(&Value::from("third")));
        assert_eq!(store.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_delete_batch_abort_reports_progress() {
        let (store, backend) = backend();
        store.fail_writes_to("c");
        let Statement::Delete(delete) = stmt("DELETE FROM items WHERE a = 1") else {
            panic!("expected DELETE");
        };
        let err = backend.delete(&delete, &[]).await.unwrap_err();
        match err {
            DbError::BatchAborted { key, completed, .. } => {
                assert_eq!(key, "c");
                assert_eq!(completed, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(store.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_drop_table_counts_documents() {
        let (store, backend) = backend();
        let Statement::DropTable(drop) = stmt("DROP TABLE items") else {
            panic!("expected DROP TABLE");
        };
        let result = backend.drop_table(&drop).await.unwrap();
        assert_eq!(result.rows_affected(), 3);
        assert_eq!(store.document_count(&CollectionPath::collection("items")), 0);
    }

    #[tokio::test]
    async fn test_index_ddl_unsupported() {
        let (_, backend) = backend();
        let Statement::CreateIndex(create) = stmt("CREATE INDEX idx ON items (a)") else {
            panic!("expected CREATE INDEX");
        };
        let err = backend.create_index(&create).await.unwrap_err();
        assert!(matches!(err, DbError::Unsupported(_)));
    }
}
