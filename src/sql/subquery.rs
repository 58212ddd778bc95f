//! Flattens `SELECT … FROM (SELECT … FROM t) alias` onto the inner table.
//!
//! The outer query may only narrow or rename what the inner projection
//! exposes; anything it names must be visible through the inner list.

use docsql_core::SelectColumn;

use crate::error::{DbError, DbResult};

/// Name a column is visible under outside the query that projects it.
fn visible_name(column: &SelectColumn) -> DbResult<&str> {
    match column {
        SelectColumn::Column { name, alias } => Ok(alias.as_deref().unwrap_or(name)),
        SelectColumn::Function { alias: Some(alias), .. }
        | SelectColumn::Expression { alias: Some(alias), .. } => Ok(alias),
        SelectColumn::Function { alias: None, .. } | SelectColumn::Expression { alias: None, .. } => {
            Err(DbError::InvalidArgument(format!(
                "missing alias for inner query column: {}",
                column
            )))
        }
        SelectColumn::Star => Err(DbError::Unsupported(
            "* cannot be combined with other columns".to_string(),
        )),
    }
}

fn with_alias(column: &SelectColumn, label: Option<String>) -> SelectColumn {
    match column.clone() {
        SelectColumn::Column { name, alias } => SelectColumn::Column {
            name,
            alias: label.or(alias),
        },
        SelectColumn::Function { name, args, alias } => SelectColumn::Function {
            name,
            args,
            alias: label.or(alias),
        },
        SelectColumn::Expression { expr, alias } => SelectColumn::Expression {
            expr,
            alias: label.or(alias),
        },
        SelectColumn::Star => SelectColumn::Star,
    }
}

/// Rewrites the outer projection in terms of the inner query's columns.
pub fn remap_columns(outer: &[SelectColumn], inner: &[SelectColumn]) -> DbResult<Vec<SelectColumn>> {
    if inner == [SelectColumn::Star] {
        return Ok(outer.to_vec());
    }

    let mut whitelist = Vec::with_capacity(inner.len());
    for column in inner {
        whitelist.push((visible_name(column)?.to_string(), column));
    }

    if outer == [SelectColumn::Star] {
        return Ok(inner.to_vec());
    }

    let lookup = |name: &str| {
        whitelist
            .iter()
            .find(|(visible, _)| visible == name)
            .map(|(_, column)| *column)
    };

    outer
        .iter()
        .map(|column| {
            let invalid =
                || DbError::InvalidArgument(format!("invalid outer query column: {}", column));
            let SelectColumn::Column { name, alias } = column else {
                return Err(invalid());
            };
            let source = lookup(name)
                .or_else(|| name.split_once('.').and_then(|(_, rest)| lookup(rest)))
                .ok_or_else(invalid)?;
            Ok(with_alias(source, alias.clone()))
        })
        .collect()
}
