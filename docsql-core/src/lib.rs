//! docsql-core - storage-independent SQL front end for docsql.
//!
//! Turns a single SQL statement into an AST that the translation layer maps
//! onto document-store operations. Literals keep their source text; decoding
//! them is the caller's job.
//!
//! # Example
//!
//! ```rust
//! use docsql_core::{parse, Statement, StatementKind, count_placeholders};
//!
//! let sql = "SELECT name FROM orders[id = ?].items WHERE qty > ?";
//! assert_eq!(StatementKind::classify(sql), Some(StatementKind::Select));
//! assert_eq!(count_placeholders(sql), 2);
//!
//! let stmt = parse(sql).unwrap();
//! assert!(matches!(stmt, Statement::Select(_)));
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod statement;

pub use ast::{
    BinaryOp, CreateIndexStatement, CreateTableStatement, DeleteStatement, DropIndexStatement,
    DropTableStatement, Expr, InsertStatement, KeySelector, Literal, LiteralKind, OrderByItem,
    SelectColumn, SelectStatement, Statement, TableSelector, TableSource, UpdateStatement,
};
pub use error::{SqlError, SqlResult};
pub use lexer::{SqlLexer, Token};
pub use parser::SqlParser;
pub use statement::{count_placeholders, StatementKind};

/// Parses one statement.
pub fn parse(sql: &str) -> SqlResult<Statement> {
    SqlParser::new(sql)?.parse()
}
