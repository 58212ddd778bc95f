//! Statement handlers over a [`TreeStore`] plus its [`RulesStore`].
//!
//! A table is the node at the collection path; its rows are the node's
//! children. Child queries take one ordering and inclusive bounds, so WHERE
//! compiles to at most one `order_by_child` query and every result is
//! re-checked against the comparison.

use std::sync::Arc;

use async_trait::async_trait;
use docsql_core::{
    CreateIndexStatement, CreateTableStatement, DeleteStatement, DropIndexStatement,
    DropTableStatement, InsertStatement, SelectStatement, UpdateStatement,
};

use super::{evaluate_assignments, prepare_insert, Backend};
use crate::error::{DbError, DbResult};
use crate::result::ExecResult;
use crate::rows::Rows;
use crate::sql::path::{self, CollectionPath};
use crate::sql::plan::plan_select;
use crate::sql::predicate::compile;
use crate::sql::{CompareOp, Comparison, Direction, Evaluator, Predicate, Scope, SortKey};
use crate::store::{Document, RulesStore, TreeQuery, TreeStore};
use crate::value::{Fields, Value};

pub struct RealtimeBackend<T, R> {
    tree: Arc<T>,
    rules: Arc<R>,
}

/// A child query plus the comparison its results must still satisfy.
#[derive(Debug)]
struct ChildQuery {
    query: TreeQuery,
    recheck: Option<Comparison>,
    limit: Option<usize>,
}

impl ChildQuery {
    fn build(predicate: &Predicate, order: &[SortKey], limit: Option<usize>) -> DbResult<Self> {
        let order_field = match order {
            [] => None,
            [key] if key.direction == Direction::Ascending => Some(key.field.as_str()),
            [_] => {
                return Err(DbError::Unsupported(
                    "descending ORDER BY is not supported by the realtime database".to_string(),
                ))
            }
            _ => {
                return Err(DbError::Unsupported(
                    "ORDER BY supports a single column in the realtime database".to_string(),
                ))
            }
        };

        let Some(cmp) = predicate.comparison() else {
            let query = match order_field {
                Some(field) => TreeQuery::order_by_child(field),
                None => TreeQuery::order_by_key(),
            };
            return Ok(Self {
                query: Self::limited(query, limit),
                recheck: None,
                limit,
            });
        };

        if let Some(field) = order_field {
            if field != cmp.field {
                return Err(DbError::Unsupported(format!(
                    "ORDER BY {} must match the WHERE column {} in the realtime database",
                    field, cmp.field
                )));
            }
        }

        let query = TreeQuery::order_by_child(&cmp.field);
        let query = match cmp.op {
            CompareOp::Eq => query.equal_to(cmp.value.clone()),
            CompareOp::Gt | CompareOp::Gte => query.start_at(cmp.value.clone()),
            CompareOp::Lt | CompareOp::Lte => query.end_at(cmp.value.clone()),
        };
        // boundary rows of a strict bound and children missing the field
        // (sorted first under an upper bound) would use up the limit
        let query = match cmp.op {
            CompareOp::Eq | CompareOp::Gte => Self::limited(query, limit),
            _ => query,
        };

        Ok(Self {
            query,
            recheck: Some(cmp.clone()),
            limit,
        })
    }

    fn limited(query: TreeQuery, limit: Option<usize>) -> TreeQuery {
        match limit {
            Some(n) => query.limit_to_first(n),
            None => query,
        }
    }
}

/// Row view of a child: objects as is, anything else under a `value` field.
fn child_record(key: String, value: Value) -> Document {
    match value {
        Value::Map(fields) => Document::new(key, fields),
        other => {
            let mut fields = Fields::new();
            fields.insert("value".to_string(), other);
            Document::new(key, fields)
        }
    }
}

impl<T: TreeStore, R: RulesStore> RealtimeBackend<T, R> {
    pub fn new(tree: Arc<T>, rules: Arc<R>) -> Self {
        Self { tree, rules }
    }

    pub fn tree(&self) -> &Arc<T> {
        &self.tree
    }

    async fn children(
        &self,
        path: &CollectionPath,
        predicate: &Predicate,
        order: &[SortKey],
        limit: Option<usize>,
    ) -> DbResult<Vec<Document>> {
        let child_query = ChildQuery::build(predicate, order, limit)?;
        tracing::debug!("query {}: {:?}", path, child_query.query);

        let children = self.tree.query(&path.slash_path(), &child_query.query).await?;
        Ok(children
            .into_iter()
            .map(|(key, value)| child_record(key, value))
            .filter(|doc| {
                child_query
                    .recheck
                    .as_ref()
                    .map_or(true, |cmp| cmp.matches(&doc.fields))
            })
            .take(child_query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn require_child(&self, path: &CollectionPath, key: &str) -> DbResult<String> {
        let child_path = path.child_path(key);
        match self.tree.get(&child_path).await? {
            Some(_) => Ok(child_path),
            None => Err(DbError::DocumentNotFound(key.to_string())),
        }
    }
}

#[async_trait]
impl<T: TreeStore + 'static, R: RulesStore + 'static> Backend for RealtimeBackend<T, R> {
    fn name(&self) -> &'static str {
        "realtime"
    }

    async fn insert(&self, stmt: &InsertStatement, args: &[Value]) -> DbResult<ExecResult> {
        let mut eval = Evaluator::new(args);
        let (path, documents) = prepare_insert(stmt, &mut eval)?;

        let mut last_key = None;
        let mut created = 0u64;
        for doc in documents {
            let key = match doc.key {
                Some(key) => {
                    self.tree
                        .set(&path.child_path(&key), Value::Map(doc.fields))
                        .await?;
                    key
                }
                None => self.tree.push(&path.slash_path(), Value::Map(doc.fields)).await?,
            };
            created += 1;
            last_key = Some(key);
        }

        tracing::debug!("insert into {}: {} child(ren)", path, created);
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
                let child_path = self.require_child(&path, key).await?;
                self.tree.update(&child_path, fields).await?;
                1
            }
            Predicate::Never => 0,
            Predicate::MatchAll | Predicate::Compare(_) => {
                let mut completed = 0u64;
                for (key, value) in self.raw_children(&path, &predicate).await? {
                    if !matches!(value, Value::Map(_)) {
                        continue;
                    }
                    if let Err(e) = self.tree.update(&path.child_path(&key), fields.clone()).await {
                        tracing::warn!(
                            "update of {} aborted at {} after {} child(ren): {}",
                            path,
                            key,
                            completed,
                            e
                        );
                        return Err(DbError::batch_aborted(key, completed, e));
                    }
                    completed += 1;
                }
                completed
            }
        };

        tracing::debug!("update {}: {} child(ren)", path, updated);
        Ok(ExecResult::affected(updated))
    }

    async fn delete(&self, stmt: &DeleteStatement, args: &[Value]) -> DbResult<ExecResult> {
        let mut eval = Evaluator::new(args);
        let path = path::resolve(&stmt.table, &mut eval)?;
        let scope = Scope::new(path.name(), None);
        let predicate = compile(stmt.where_clause.as_ref(), &scope, &mut eval)?;

        let deleted = match &predicate {
            Predicate::DocumentKey(key) => {
                let child_path = self.require_child(&path, key).await?;
                self.tree.delete(&child_path).await?;
                1
            }
            Predicate::Never => 0,
            Predicate::MatchAll | Predicate::Compare(_) => {
                let mut completed = 0u64;
                for (key, _) in self.raw_children(&path, &predicate).await? {
                    if let Err(e) = self.tree.delete(&path.child_path(&key)).await {
                        tracing::warn!(
                            "delete from {} aborted at {} after {} child(ren): {}",
                            path,
                            key,
                            completed,
                            e
                        );
                        return Err(DbError::batch_aborted(key, completed, e));
                    }
                    completed += 1;
                }
                completed
            }
        };

        tracing::debug!("delete from {}: {} child(ren)", path, deleted);
        Ok(ExecResult::affected(deleted))
    }

    async fn select(&self, stmt: &SelectStatement, args: &[Value]) -> DbResult<Rows> {
        let mut eval = Evaluator::new(args);
        let plan = plan_select(stmt, &mut eval)?;
        if plan.offset.is_some() {
            return Err(DbError::Unsupported(
                "OFFSET is not supported by the realtime database".to_string(),
            ));
        }

        let documents = match &plan.predicate {
            Predicate::DocumentKey(key) => self
                .tree
                .get(&plan.path.child_path(key))
                .await?
                .map(|value| child_record(key.clone(), value))
                .into_iter()
                .collect(),
            Predicate::Never => return Ok(Rows::empty(&plan.projection)),
            Predicate::MatchAll | Predicate::Compare(_) => {
                self.children(&plan.path, &plan.predicate, &plan.order, plan.limit)
                    .await?
            }
        };

        tracing::debug!("select from {}: {} child(ren)", plan.path, documents.len());
        Ok(Rows::materialize(documents, &plan.projection))
    }

    async fn create_table(&self, stmt: &CreateTableStatement) -> DbResult<ExecResult> {
        if stmt.if_not_exists && self.tree.get(&stmt.name).await?.is_some() {
            return Ok(ExecResult::affected(0));
        }
        self.tree.set(&stmt.name, Value::Map(Fields::new())).await?;
        tracing::info!("created table {}", stmt.name);
        Ok(ExecResult::affected(1))
    }

    async fn drop_table(&self, stmt: &DropTableStatement) -> DbResult<ExecResult> {
        self.tree.delete(&stmt.name).await?;
        tracing::info!("dropped table {}", stmt.name);
        Ok(ExecResult::affected(1))
    }

    async fn create_index(&self, stmt: &CreateIndexStatement) -> DbResult<ExecResult> {
        tracing::warn!(
            "CREATE INDEX {} rewrites the rules document without a lock; concurrent rule edits may be lost",
            stmt.name
        );
        let mut rules = self.rules.load().await?;
        let added = rules.add_index(&stmt.table, &stmt.columns)?;
        self.rules.save(&rules).await?;
        tracing::info!(
            "index {} on {}: {} field(s) added to .indexOn",
            stmt.name,
            stmt.table,
            added
        );
        Ok(ExecResult::affected(added as u64))
    }

    async fn drop_index(&self, stmt: &DropIndexStatement) -> DbResult<ExecResult> {
        tracing::warn!(
            "DROP INDEX {} rewrites the rules document without a lock; concurrent rule edits may be lost",
            stmt.name
        );
        let mut rules = self.rules.load().await?;
        if !rules.remove_index(&stmt.table, &stmt.name)? {
            return Ok(ExecResult::affected(0));
        }
        self.rules.save(&rules).await?;
        tracing::info!("index {} dropped from {}", stmt.name, stmt.table);
        Ok(ExecResult::affected(1))
    }
}

impl<T: TreeStore, R: RulesStore> RealtimeBackend<T, R> {
    /// Children selected by a mutation's WHERE, as stored.
    async fn raw_children(
        &self,
        path: &CollectionPath,
        predicate: &Predicate,
    ) -> DbResult<Vec<(String, Value)>> {
        let child_query = ChildQuery::build(predicate, &[], None)?;
        let children = self.tree.query(&path.slash_path(), &child_query.query).await?;
        Ok(children
            .into_iter()
            .filter(|(key, value)| match &child_query.recheck {
                Some(cmp) => cmp.matches(&child_record(key.clone(), value.clone()).fields),
                None => true,
            })
            .collect())
    }
}
