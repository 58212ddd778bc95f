//! WHERE / ORDER BY / LIMIT / OFFSET compilation.
//!
//! The stores accept at most one field comparison per query, so the compiler
//! reduces a WHERE clause to one of four shapes and rejects everything else.

use std::cmp::Ordering;
use std::fmt;

use docsql_core::{BinaryOp, Expr, OrderByItem};

use crate::error::{DbError, DbResult};
use crate::sql::evaluator::{decode_literal, Evaluator};
use crate::sql::identity::{identity_operand, is_identity_column, key_from_value};
use crate::sql::Scope;
use crate::value::{Fields, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn from_binary(op: BinaryOp) -> Option<Self> {
        match op {
            BinaryOp::Eq => Some(CompareOp::Eq),
            BinaryOp::Gt => Some(CompareOp::Gt),
            BinaryOp::GtEq => Some(CompareOp::Gte),
            BinaryOp::Lt => Some(CompareOp::Lt),
            BinaryOp::LtEq => Some(CompareOp::Lte),
            _ => None,
        }
    }

    /// Whether a stored value ordered `ordering` against the operand passes.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }

    pub fn is_strict(self) -> bool {
        matches!(self, CompareOp::Gt | CompareOp::Lt)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "==",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Comparison {
    /// Documents without the field never match.
    pub fn matches(&self, fields: &Fields) -> bool {
        Value::lookup(fields, &self.field)
            .and_then(|stored| stored.compare(&self.value))
            .is_some_and(|ordering| self.op.accepts(ordering))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    MatchAll,
    /// `id = <key>`: address the document directly.
    DocumentKey(String),
    Compare(Comparison),
    /// Statically false; no store call is needed.
    Never,
}

impl Predicate {
    pub fn comparison(&self) -> Option<&Comparison> {
        match self {
            Predicate::Compare(c) => Some(c),
            _ => None,
        }
    }
}

pub fn compile(
    where_clause: Option<&Expr>,
    scope: &Scope,
    eval: &mut Evaluator<'_>,
) -> DbResult<Predicate> {
    let Some(expr) = where_clause else {
        return Ok(Predicate::MatchAll);
    };

    let mut terms = Vec::new();
    collect_conjuncts(expr, &mut terms);

    let mut remaining = Vec::new();
    for term in terms {
        match literal_equality(term)? {
            Some(false) => {
                tracing::debug!("WHERE clause is always false: {}", expr);
                eval.skip_placeholders(expr)?;
                return Ok(Predicate::Never);
            }
            Some(true) => {}
            None => remaining.push(term),
        }
    }

    match remaining.as_slice() {
        [] => Ok(Predicate::MatchAll),
        [term] => compile_term(term, scope, eval),
        _ => Err(DbError::Unsupported(format!(
            "unsupported WHERE clause: {}",
            expr
        ))),
    }
}

fn collect_conjuncts<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOp::And,
            right,
        } => {
            collect_conjuncts(left, out);
            collect_conjuncts(right, out);
        }
        other => out.push(other),
    }
}

/// `Some(equal)` for a literal-to-literal `=`, `None` for anything else.
fn literal_equality(expr: &Expr) -> DbResult<Option<bool>> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOp::Eq,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (Expr::Literal(a), Expr::Literal(b)) => {
                Ok(Some(decode_literal(a)?.loosely_equals(&decode_literal(b)?)))
            }
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

fn compile_term(term: &Expr, scope: &Scope, eval: &mut Evaluator<'_>) -> DbResult<Predicate> {
    if let Some(operand) = identity_operand(term)? {
        let key = key_from_value(&eval.evaluate(operand)?)?;
        return Ok(Predicate::DocumentKey(key));
    }

    let unsupported = || DbError::Unsupported(format!("unsupported WHERE clause: {}", term));

    let Expr::BinaryOp { left, op, right } = term else {
        return Err(unsupported());
    };
    let field = scope.column_field(left).ok_or_else(unsupported)?;
    let op = CompareOp::from_binary(*op).ok_or_else(|| {
        DbError::Unsupported(format!("unsupported operator in WHERE clause: {}", op))
    })?;
    if !right.is_operand() {
        return Err(unsupported());
    }

    let value = eval.evaluate(right)?;
    Ok(Predicate::Compare(Comparison { field, op, value }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn compare(&self, a: &Fields, b: &Fields) -> Ordering {
        let null = Value::Null;
        let left = Value::lookup(a, &self.field).unwrap_or(&null);
        let right = Value::lookup(b, &self.field).unwrap_or(&null);
        let ordering = left.sort_cmp(right);
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// ORDER BY columns in declaration order; the identity column is skipped.
pub fn compile_order(items: &[OrderByItem], scope: &Scope) -> Vec<SortKey> {
    items
        .iter()
        .map(|item| (scope.field_path(&item.column), item.descending))
        .filter(|(field, _)| !is_identity_column(field))
        .map(|(field, descending)| SortKey {
            field,
            direction: if descending {
                Direction::Descending
            } else {
                Direction::Ascending
            },
        })
        .collect()
}

/// Evaluates a LIMIT or OFFSET operand to a row count.
pub fn evaluate_count(
    expr: Option<&Expr>,
    clause: &str,
    eval: &mut Evaluator<'_>,
) -> DbResult<Option<usize>> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    match eval.evaluate(expr)? {
        Value::Int(n) if n >= 0 => Ok(Some(n as usize)),
        Value::Int(_) => Err(DbError::InvalidArgument(format!(
            "{} value must not be negative",
            clause
        ))),
        _ => Err(DbError::InvalidArgument(format!(
            "{} value is not an integer",
            clause
        ))),
    }
}
