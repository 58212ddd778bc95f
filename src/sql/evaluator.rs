//! Turns literal and placeholder operands into values.
//!
//! One `Evaluator` is built per execution and threaded through the whole
//! translation, so placeholders are bound strictly left to right no matter
//! which component consumes them.

use docsql_core::{Expr, Literal, LiteralKind};

use crate::error::{DbError, DbResult};
use crate::value::Value;

pub struct Evaluator<'a> {
    args: &'a [Value],
    position: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(args: &'a [Value]) -> Self {
        Self { args, position: 0 }
    }

    /// Claims the next argument slot.
    pub fn next_arg(&mut self) -> DbResult<Value> {
        let value = self
            .args
            .get(self.position)
            .cloned()
            .ok_or_else(|| DbError::InsufficientArguments {
                needed: self.position + 1,
                provided: self.args.len(),
            })?;
        self.position += 1;
        Ok(value)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DbResult<Value> {
        match expr {
            Expr::Literal(lit) => decode_literal(lit),
            Expr::Placeholder(_) => self.next_arg(),
            other => Err(DbError::Unsupported(format!(
                "unsupported expression: {}",
                other
            ))),
        }
    }

    /// Steps past every placeholder in `expr` without decoding the values.
    /// The skipped slots must still be bound.
    pub fn skip_placeholders(&mut self, expr: &Expr) -> DbResult<()> {
        for _ in 0..expr.placeholder_count() {
            self.next_arg()?;
        }
        Ok(())
    }

    pub fn consumed(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.args.len().saturating_sub(self.position)
    }
}

pub fn decode_literal(lit: &Literal) -> DbResult<Value> {
    match lit.kind {
        LiteralKind::String => Ok(Value::String(unquote(&lit.text))),
        LiteralKind::Integer => lit
            .text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| DbError::DecodeError(format!("invalid integer literal {}: {}", lit.text, e))),
        LiteralKind::Float => lit
            .text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| DbError::DecodeError(format!("invalid float literal {}: {}", lit.text, e))),
        LiteralKind::Boolean => match lit.text.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(DbError::DecodeError(format!(
                "invalid boolean literal {}",
                lit.text
            ))),
        },
        LiteralKind::Null => Ok(Value::Null),
    }
}

/// Strips one matching pair of surrounding quotes and undoes backslash
/// escapes and doubled quotes. Unquoted text is returned as is.
pub fn unquote(text: &str) -> String {
    let quote = match text.chars().next() {
        Some(q @ ('\'' | '"')) if text.len() >= 2 && text.ends_with(q) => q,
        _ => return text.to_string(),
    };
    let inner = &text[1..text.len() - 1];

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else if ch == quote && chars.peek() == Some(&quote) {
            chars.next();
            out.push(quote);
        } else {
            out.push(ch);
        }
    }
    out
}
