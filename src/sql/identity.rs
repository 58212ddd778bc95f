//! The reserved `id` pseudo-column.
//!
//! `id` is never stored as a field. On writes it names the document key; in
//! WHERE clauses `id = <operand>` addresses one document directly; in result
//! rows it is always filled from the key.

use docsql_core::{BinaryOp, Expr};

use crate::error::{DbError, DbResult};
use crate::value::Value;

pub const ID_COLUMN: &str = "id";

/// Case-sensitive: `ID` and `Id` are ordinary fields.
pub fn is_identity_column(name: &str) -> bool {
    name == ID_COLUMN
}

fn names_identity(expr: &Expr) -> bool {
    match expr {
        Expr::Column(name) => is_identity_column(name),
        Expr::QualifiedColumn { column, .. } => is_identity_column(column),
        _ => false,
    }
}

/// Returns the operand of a top-level `id = <operand>` filter.
///
/// Any other comparison operator on `id` is rejected, since the key can only
/// be matched exactly.
pub fn identity_operand(expr: &Expr) -> DbResult<Option<&Expr>> {
    let Expr::BinaryOp { left, op, right } = expr else {
        return Ok(None);
    };
    if !names_identity(left) {
        return Ok(None);
    }
    match op {
        BinaryOp::Eq if right.is_operand() => Ok(Some(right)),
        BinaryOp::Eq => Err(DbError::Unsupported(format!(
            "identity column {} must be compared with a literal or placeholder: {}",
            ID_COLUMN, expr
        ))),
        BinaryOp::And | BinaryOp::Or => Ok(None),
        other => Err(DbError::Unsupported(format!(
            "operator {} is not supported on identity column {}",
            other, ID_COLUMN
        ))),
    }
}

/// Renders an evaluated identity value as a document key.
pub fn key_from_value(value: &Value) -> DbResult<String> {
    let key = match value {
        Value::String(s) => s.clone(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => {
            return Err(DbError::InvalidArgument(format!(
                "document ID must be a scalar, got {}",
                other.type_name()
            )))
        }
    };
    if key.is_empty() {
        return Err(DbError::InvalidArgument(
            "document ID not provided or is empty".to_string(),
        ));
    }
    // a slash would address another node of the path
    if key.contains('/') {
        return Err(DbError::InvalidArgument(format!(
            "document ID must not contain '/': {}",
            key
        )));
    }
    Ok(key)
}
