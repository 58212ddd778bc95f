//! Statement handlers, one implementation per store family.
//!
//! Both backends run the same translation steps in the same order: resolve
//! the collection path, evaluate SET / VALUES, compile WHERE, then talk to
//! the store. Each execution owns one [`Evaluator`], so placeholders bind in
//! textual order across all of those steps.

pub mod document;
pub mod realtime;

use async_trait::async_trait;
use docsql_core::{
    CreateIndexStatement, CreateTableStatement, DeleteStatement, DropIndexStatement,
    DropTableStatement, Expr, InsertStatement, SelectStatement, UpdateStatement,
};

use crate::error::{DbError, DbResult};
use crate::result::ExecResult;
use crate::rows::Rows;
use crate::sql::identity::key_from_value;
use crate::sql::path::{self, CollectionPath};
use crate::sql::{is_identity_column, Evaluator};
use crate::value::{Fields, Value};

pub use document::DocumentBackend;
pub use realtime::RealtimeBackend;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn insert(&self, stmt: &InsertStatement, args: &[Value]) -> DbResult<ExecResult>;

    async fn update(&self, stmt: &UpdateStatement, args: &[Value]) -> DbResult<ExecResult>;

    async fn delete(&self, stmt: &DeleteStatement, args: &[Value]) -> DbResult<ExecResult>;

    async fn select(&self, stmt: &SelectStatement, args: &[Value]) -> DbResult<Rows>;

    async fn create_table(&self, stmt: &CreateTableStatement) -> DbResult<ExecResult> {
        Err(DbError::Unsupported(format!(
            "CREATE TABLE {} is not supported by the {} backend",
            stmt.name,
            self.name()
        )))
    }

    async fn drop_table(&self, stmt: &DropTableStatement) -> DbResult<ExecResult> {
        Err(DbError::Unsupported(format!(
            "DROP TABLE {} is not supported by the {} backend",
            stmt.name,
            self.name()
        )))
    }

    async fn create_index(&self, stmt: &CreateIndexStatement) -> DbResult<ExecResult> {
        Err(DbError::Unsupported(format!(
            "CREATE INDEX {} is not supported by the {} backend",
            stmt.name,
            self.name()
        )))
    }

    async fn drop_index(&self, stmt: &DropIndexStatement) -> DbResult<ExecResult> {
        Err(DbError::Unsupported(format!(
            "DROP INDEX {} is not supported by the {} backend",
            stmt.name,
            self.name()
        )))
    }
}

/// A document to create: explicit key (from the `id` column) or none.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NewDocument {
    pub key: Option<String>,
    pub fields: Fields,
}

/// Resolves the target path and evaluates every VALUES tuple.
///
/// The value list is validated as a whole before anything is evaluated, so a
/// malformed INSERT never reaches the store.
pub(crate) fn prepare_insert(
    stmt: &InsertStatement,
    eval: &mut Evaluator<'_>,
) -> DbResult<(CollectionPath, Vec<NewDocument>)> {
    let path = path::resolve(&stmt.table, eval)?;

    let columns = stmt.columns.as_deref().ok_or_else(|| {
        DbError::InvalidArgument("INSERT requires an explicit column list".to_string())
    })?;
    if columns.is_empty() {
        return Err(DbError::InvalidArgument(
            "INSERT requires an explicit column list".to_string(),
        ));
    }

    let values: Vec<&Expr> = stmt.values.iter().flatten().collect();
    if values.is_empty() || values.len() % columns.len() != 0 {
        return Err(DbError::InvalidArgument(format!(
            "INSERT has {} value(s) for {} column(s)",
            values.len(),
            columns.len()
        )));
    }

    let mut documents = Vec::with_capacity(values.len() / columns.len());
    for tuple in values.chunks(columns.len()) {
        let mut doc = NewDocument {
            key: None,
            fields: Fields::new(),
        };
        for (column, expr) in columns.iter().zip(tuple) {
            let value = eval.evaluate(expr)?;
            if is_identity_column(column) {
                if !value.is_null() {
                    doc.key = Some(key_from_value(&value)?);
                }
            } else {
                Value::set_path(&mut doc.fields, column, value);
            }
        }
        documents.push(doc);
    }

    Ok((path, documents))
}

/// Evaluates SET assignments. `id` entries are evaluated, to keep the
/// argument cursor aligned, and dropped.
pub(crate) fn evaluate_assignments(
    assignments: &[(String, Expr)],
    eval: &mut Evaluator<'_>,
) -> DbResult<Fields> {
    let mut fields = Fields::new();
    for (column, expr) in assignments {
        let value = eval.evaluate(expr)?;
        if is_identity_column(column) {
            continue;
        }
        fields.insert(column.clone(), value);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsql_core::{parse, Statement};

    fn insert(sql: &str) -> InsertStatement {
        match parse(sql).unwrap() {
            Statement::Insert(stmt) => stmt,
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_prepare_insert_splits_identity() {
        let stmt = insert("INSERT INTO users (id, name, address.city) VALUES ('k2', ?, 'Lyon'), (NULL, 'y', ?)");
        let args = [Value::from("x"), Value::from("Nice")];
        let mut eval = Evaluator::new(&args);
        let (path, docs) = prepare_insert(&stmt, &mut eval).unwrap();
        assert_eq!(path, CollectionPath::collection("users"));
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].key.as_deref(), Some("k2"));
        assert!(!docs[0].fields.contains_key("id"));
        assert_eq!(
            Value::lookup(&docs[0].fields, "address.city"),
            Some(&Value::from("Lyon"))
        );
        assert_eq!(docs[1].key, None);
        assert_eq!(eval.consumed(), 2);
    }

    #[test]
    fn test_prepare_insert_requires_columns() {
        let stmt = insert("INSERT INTO users VALUES ('a')");
        let err = prepare_insert(&stmt, &mut Evaluator::new(&[])).unwrap_err();
        assert!(err.to_string().contains("explicit column list"));
    }

    #[test]
    fn test_prepare_insert_checks_value_count_first() {
        let stmt = insert("INSERT INTO users (a, b) VALUES (?, ?, ?)");
        let args = [Value::Int(1), Value::Int(2), Value::Int(3)];
        let mut eval = Evaluator::new(&args);
        let err = prepare_insert(&stmt, &mut eval).unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument(_)));
        assert_eq!(eval.consumed(), 0);
    }

    #[test]
    fn test_assignments_drop_identity() {
        let args = [Value::from("ignored"), Value::Int(3)];
        let mut eval = Evaluator::new(&args);
        let assignments = vec![
            ("id".to_string(), Expr::Placeholder("?".to_string())),
            ("n".to_string(), Expr::Placeholder("?".to_string())),
        ];
        let fields = evaluate_assignments(&assignments, &mut eval).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["n"], Value::Int(3));
        assert_eq!(eval.consumed(), 2);
    }
}
