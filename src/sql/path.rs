//! Resolves table selectors to collection paths.
//!
//! `orders` names a top-level collection; `orders[id = 'o1'].items` names the
//! `items` collection under document `o1`. One level of nesting is all the
//! translation supports.

use std::fmt;

use docsql_core::{Expr, TableSelector};

use crate::error::{DbError, DbResult};
use crate::sql::evaluator::{decode_literal, Evaluator};
use crate::sql::identity::{is_identity_column, key_from_value};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionPath {
    Collection(String),
    SubCollection {
        parent: String,
        key: String,
        child: String,
    },
}

impl CollectionPath {
    pub fn collection(name: impl Into<String>) -> Self {
        CollectionPath::Collection(name.into())
    }

    pub fn segments(&self) -> Vec<&str> {
        match self {
            CollectionPath::Collection(name) => vec![name.as_str()],
            CollectionPath::SubCollection { parent, key, child } => {
                vec![parent.as_str(), key.as_str(), child.as_str()]
            }
        }
    }

    /// Name of the addressed collection, used to strip column qualifiers.
    pub fn name(&self) -> &str {
        match self {
            CollectionPath::Collection(name) => name,
            CollectionPath::SubCollection { child, .. } => child,
        }
    }

    /// Slash-joined form used as a tree path or map key.
    pub fn slash_path(&self) -> String {
        self.segments().join("/")
    }

    pub fn child_path(&self, key: &str) -> String {
        format!("{}/{}", self.slash_path(), key)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slash_path())
    }
}

/// Resolves `selector`, claiming argument slots for placeholder keys.
///
/// Callers resolve the selector before evaluating any other clause, so path
/// placeholders always take the leading argument positions.
pub fn resolve(selector: &TableSelector, eval: &mut Evaluator<'_>) -> DbResult<CollectionPath> {
    let Some(key_selector) = &selector.key else {
        if selector.child.is_some() {
            return Err(DbError::InvalidArgument(format!(
                "document ID not provided or is empty in path {}",
                selector.name
            )));
        }
        return Ok(CollectionPath::Collection(selector.name.clone()));
    };

    if !is_identity_column(&key_selector.field) {
        return Err(DbError::Unsupported(format!(
            "unsupported field in path expression: {}",
            key_selector.field
        )));
    }

    let key = match &key_selector.value {
        Expr::Placeholder(_) => eval.next_arg()?,
        Expr::Literal(lit) => decode_literal(lit)?,
        other => {
            return Err(DbError::Unsupported(format!(
                "unsupported document ID expression in path: {}",
                other
            )))
        }
    };
    let key = key_from_value(&key)?;

    let child = selector
        .child
        .as_ref()
        .ok_or_else(|| DbError::InvalidArgument("subcollection not specified".to_string()))?;
    if child.key.is_some() || child.child.is_some() {
        return Err(DbError::Unsupported(
            "nested subcollections not supported".to_string(),
        ));
    }

    Ok(CollectionPath::SubCollection {
        parent: selector.name.clone(),
        key,
        child: child.name.clone(),
    })
}
