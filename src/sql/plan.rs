//! SELECT planning shared by both backends.
//!
//! Clauses are evaluated in the order their placeholders appear in the text:
//! path key, WHERE, LIMIT, OFFSET. For a sub-query source the inner clauses
//! come first; an inner clause overridden by the outer query still has its
//! placeholders skipped so later ones stay aligned.

use docsql_core::{Expr, SelectStatement, TableSource};

use crate::error::{DbError, DbResult};
use crate::rows::Projection;
use crate::sql::evaluator::Evaluator;
use crate::sql::path::{self, CollectionPath};
use crate::sql::predicate::{compile, compile_order, evaluate_count, Predicate, SortKey};
use crate::sql::subquery::remap_columns;
use crate::sql::Scope;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    pub path: CollectionPath,
    pub predicate: Predicate,
    pub order: Vec<SortKey>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub projection: Projection,
}

pub fn plan_select(stmt: &SelectStatement, eval: &mut Evaluator<'_>) -> DbResult<SelectPlan> {
    match &stmt.from {
        TableSource::Table { selector, alias } => {
            let path = path::resolve(selector, eval)?;
            let scope = Scope::new(path.name(), alias.as_deref());
            let predicate = compile(stmt.where_clause.as_ref(), &scope, eval)?;
            let limit = evaluate_count(stmt.limit.as_ref(), "LIMIT", eval)?;
            let offset = evaluate_count(stmt.offset.as_ref(), "OFFSET", eval)?;

            Ok(SelectPlan {
                order: compile_order(&stmt.order_by, &scope),
                projection: Projection::from_columns(&stmt.columns, &scope)?,
                path,
                predicate,
                limit,
                offset,
            })
        }
        TableSource::Subquery { query, alias } => plan_subquery(stmt, query, alias.as_deref(), eval),
    }
}

fn plan_subquery(
    outer: &SelectStatement,
    inner: &SelectStatement,
    outer_alias: Option<&str>,
    eval: &mut Evaluator<'_>,
) -> DbResult<SelectPlan> {
    let TableSource::Table { selector, alias } = &inner.from else {
        return Err(DbError::Unsupported(
            "nested subqueries not supported".to_string(),
        ));
    };

    let path = path::resolve(selector, eval)?;
    let scope = Scope::new(path.name(), alias.as_deref()).with_alias(outer_alias);

    let inner_predicate = match &outer.where_clause {
        Some(_) => {
            skip(inner.where_clause.as_ref(), eval)?;
            None
        }
        None => Some(compile(inner.where_clause.as_ref(), &scope, eval)?),
    };
    let inner_limit = count_unless_overridden(inner.limit.as_ref(), &outer.limit, "LIMIT", eval)?;
    let inner_offset =
        count_unless_overridden(inner.offset.as_ref(), &outer.offset, "OFFSET", eval)?;

    let predicate = match inner_predicate {
        Some(predicate) => predicate,
        None => compile(outer.where_clause.as_ref(), &scope, eval)?,
    };
    let limit = match &outer.limit {
        Some(expr) => evaluate_count(Some(expr), "LIMIT", eval)?,
        None => inner_limit,
    };
    let offset = match &outer.offset {
        Some(expr) => evaluate_count(Some(expr), "OFFSET", eval)?,
        None => inner_offset,
    };

    let order_by = if outer.order_by.is_empty() {
        &inner.order_by
    } else {
        &outer.order_by
    };
    let columns = remap_columns(&outer.columns, &inner.columns)?;

    Ok(SelectPlan {
        order: compile_order(order_by, &scope),
        projection: Projection::from_columns(&columns, &scope)?,
        path,
        predicate,
        limit,
        offset,
    })
}

fn skip(expr: Option<&Expr>, eval: &mut Evaluator<'_>) -> DbResult<()> {
    match expr {
        Some(expr) => eval.skip_placeholders(expr),
        None => Ok(()),
    }
}

fn count_unless_overridden(
    inner: Option<&Expr>,
    outer: &Option<Expr>,
    clause: &str,
    eval: &mut Evaluator<'_>,
) -> DbResult<Option<usize>> {
    if outer.is_some() {
        skip(inner, eval)?;
        return Ok(None);
    }
    evaluate_count(inner, clause, eval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{CompareOp, Comparison};
    use crate::value::Value;
    use docsql_core::{parse, Statement};

    fn plan(sql: &str, args: &[Value]) -> (DbResult<SelectPlan>, usize) {
        let Statement::Select(stmt) = parse(sql).unwrap() else {
            panic!("expected SELECT");
        };
        let mut eval = Evaluator::new(args);
        let result = plan_select(&stmt, &mut eval);
        (result, eval.consumed())
    }

    #[test]
    fn test_plain_select() {
        let args = [Value::Int(18), Value::Int(10), Value::Int(5)];
        let (plan, used) = plan(
            "SELECT name FROM users u WHERE u.age > ? ORDER BY age DESC LIMIT ? OFFSET ?",
            &args,
        );
        let plan = plan.unwrap();
        assert_eq!(used, 3);
        assert_eq!(plan.path, CollectionPath::collection("users"));
        assert_eq!(
            plan.predicate,
            Predicate::Compare(Comparison {
                field: "age".to_string(),
                op: CompareOp::Gt,
                value: Value::Int(18),
            })
        );
        assert_eq!(plan.order.len(), 1);
        assert_eq!(plan.limit, Some(10));
        assert_eq!(plan.offset, Some(5));
    }

    #[test]
    fn test_path_placeholder_binds_first() {
        let args = [Value::from("o1"), Value::Int(3)];
        let (plan, _) = plan("SELECT * FROM orders[id = ?].items WHERE qty = ?", &args);
        let plan = plan.unwrap();
        assert_eq!(plan.path.segments(), vec!["orders", "o1", "items"]);
        assert_eq!(
            plan.predicate.comparison().map(|c| c.value.clone()),
            Some(Value::Int(3))
        );
    }

    #[test]
    fn test_subquery_inner_clauses_apply() {
        let (plan, used) = plan(
            "SELECT name FROM (SELECT name, age FROM users WHERE age >= ? LIMIT 2) t",
            &[Value::Int(21)],
        );
        let plan = plan.unwrap();
        assert_eq!(used, 1);
        assert_eq!(plan.limit, Some(2));
        assert!(matches!(plan.predicate, Predicate::Compare(_)));
    }

    #[test]
    fn test_subquery_outer_where_wins() {
        let args = [Value::Int(1), Value::from("Bob")];
        let (plan, used) = plan(
            "SELECT * FROM (SELECT * FROM users WHERE age > ?) t WHERE t.name = ?",
            &args,
        );
        let plan = plan.unwrap();
        assert_eq!(used, 2);
        assert_eq!(
            plan.predicate,
            Predicate::Compare(Comparison {
                field: "name".to_string(),
                op: CompareOp::Eq,
                value: Value::from("Bob"),
            })
        );
    }

    #[test]
    fn test_nested_subquery_unsupported() {
        let (plan, _) = plan(
            "SELECT * FROM (SELECT * FROM (SELECT * FROM users) a) b",
            &[],
        );
        assert!(matches!(plan, Err(DbError::Unsupported(_))));
    }

    #[test]
    fn test_missing_argument() {
        let (plan, _) = plan("SELECT * FROM users WHERE age = ? LIMIT ?", &[Value::Int(1)]);
        assert!(matches!(
            plan,
            Err(DbError::InsufficientArguments {
                needed: 2,
                provided: 1
            })
        ));
    }
}
