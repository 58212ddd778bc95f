//! Statement-to-store translation: operand evaluation, document identity,
//! collection paths, WHERE compilation and SELECT planning.

pub mod evaluator;
pub mod identity;
pub mod path;
pub mod plan;
pub mod predicate;
pub mod subquery;

pub use evaluator::Evaluator;
pub use identity::{is_identity_column, ID_COLUMN};
pub use path::CollectionPath;
pub use plan::SelectPlan;
pub use predicate::{CompareOp, Comparison, Direction, Predicate, SortKey};

use docsql_core::Expr;

/// Names a column qualifier may use to refer to the queried collection: its
/// name and any alias.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    names: Vec<String>,
}

impl Scope {
    pub fn new(name: &str, alias: Option<&str>) -> Self {
        let mut names = vec![name.to_string()];
        names.extend(alias.map(str::to_string));
        Self { names }
    }

    pub fn with_alias(mut self, alias: Option<&str>) -> Self {
        self.names.extend(alias.map(str::to_string));
        self
    }

    /// Drops a leading qualifier that names this scope; anything else is
    /// kept as a nested field path.
    pub fn field_path(&self, dotted: &str) -> String {
        match dotted.split_once('.') {
            Some((head, rest)) if self.names.iter().any(|n| n == head) => rest.to_string(),
            _ => dotted.to_string(),
        }
    }

    pub fn column_field(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Column(name) => Some(name.clone()),
            Expr::QualifiedColumn { table, column } => {
                Some(self.field_path(&format!("{}.{}", table, column)))
            }
            _ => None,
        }
    }
}
