//! Materializes fetched documents into a fixed column list and forward-only
//! rows.

use std::collections::VecDeque;

use docsql_core::SelectColumn;

use crate::error::{DbError, DbResult};
use crate::sql::{is_identity_column, Scope, ID_COLUMN};
use crate::store::Document;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedColumn {
    /// Field path inside the document (`address.city`).
    pub field: String,
    /// Column name reported to the caller.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `*`: the identity column followed by the first document's fields.
    Wildcard,
    Columns(Vec<ProjectedColumn>),
}

impl Projection {
    /// Builds the projection of a SELECT list. The identity column is
    /// appended when the list does not name it.
    pub fn from_columns(columns: &[SelectColumn], scope: &Scope) -> DbResult<Self> {
        if columns == [SelectColumn::Star] {
            return Ok(Projection::Wildcard);
        }

        let mut projected = Vec::with_capacity(columns.len() + 1);
        for column in columns {
            match column {
                SelectColumn::Column { name, alias } => {
                    let field = scope.field_path(name);
                    let label = alias.clone().unwrap_or_else(|| field.clone());
                    projected.push(ProjectedColumn { field, label });
                }
                SelectColumn::Star => {
                    return Err(DbError::Unsupported(
                        "* cannot be combined with other columns".to_string(),
                    ))
                }
                other => {
                    return Err(DbError::Unsupported(format!(
                        "unsupported projection: {}",
                        other
                    )))
                }
            }
        }

        if !projected.iter().any(|c| is_identity_column(&c.field)) {
            projected.push(ProjectedColumn {
                field: ID_COLUMN.to_string(),
                label: ID_COLUMN.to_string(),
            });
        }

        Ok(Projection::Columns(projected))
    }

    fn resolve(&self, documents: &[Document]) -> Vec<ProjectedColumn> {
        match self {
            Projection::Columns(columns) => columns.clone(),
            Projection::Wildcard => {
                let mut columns = vec![ProjectedColumn {
                    field: ID_COLUMN.to_string(),
                    label: ID_COLUMN.to_string(),
                }];
                if let Some(first) = documents.first() {
                    columns.extend(
                        first
                            .fields
                            .keys()
                            .filter(|name| !is_identity_column(name))
                            .map(|name| ProjectedColumn {
                                field: name.clone(),
                                label: name.clone(),
                            }),
                    );
                }
                columns
            }
        }
    }
}

/// Forward-only result set.
#[derive(Debug, Default)]
pub struct Rows {
    columns: Vec<String>,
    column_types: Vec<&'static str>,
    rows: VecDeque<Vec<Value>>,
}

impl Rows {
    pub fn materialize(documents: Vec<Document>, projection: &Projection) -> Self {
        let columns = projection.resolve(&documents);

        let rows: VecDeque<Vec<Value>> = documents
            .iter()
            .map(|doc| {
                columns
                    .iter()
                    .map(|column| {
                        if is_identity_column(&column.field) {
                            Value::String(doc.key.clone())
                        } else {
                            Value::lookup(&doc.fields, &column.field)
                                .cloned()
                                .unwrap_or(Value::Null)
                        }
                    })
                    .collect()
            })
            .collect();

        let column_types = rows
            .front()
            .map(|row| row.iter().map(Value::type_name).collect())
            .unwrap_or_default();

        Self {
            columns: columns.into_iter().map(|c| c.label).collect(),
            column_types,
            rows,
        }
    }

    pub fn empty(projection: &Projection) -> Self {
        Self::materialize(Vec::new(), projection)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Type of the first row's value in column `index`; `TEXT` when there is
    /// no row to inspect.
    pub fn column_type_name(&self, index: usize) -> &'static str {
        self.column_types.get(index).copied().unwrap_or("TEXT")
    }

    /// Rows not yet read.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn close(&mut self) {
        self.rows.clear();
    }
}

impl Iterator for Rows {
    type Item = Vec<Value>;

    /// Next row, or `None` at end of data. There is no rewind.
    fn next(&mut self) -> Option<Self::Item> {
        self.rows.pop_front()
    }
}
