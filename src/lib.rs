//! docsql - a relational SQL surface over schemaless document stores.
//!
//! Statements are parsed by `docsql-core`, translated by [`sql`] and run by a
//! [`backend`] against either a document store (collections of keyed
//! documents) or a realtime tree store (children under slash paths).
//!
//! ```rust,no_run
//! # async fn demo() -> docsql::DbResult<()> {
//! use docsql::Value;
//!
//! let conn = docsql::open("memory://document").await?;
//! conn.exec(
//!     "INSERT INTO users (id, name) VALUES (?, ?)",
//!     &[Value::from("k1"), Value::from("Alice")],
//! )
//! .await?;
//! let mut rows = conn.query("SELECT * FROM users WHERE id = 'k1'", &[]).await?;
//! assert_eq!(rows.columns(), ["id", "name"]);
//! assert!(rows.next().is_some());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod result;
pub mod rows;
pub mod sql;
pub mod store;
pub mod value;

pub use backend::{Backend, DocumentBackend, RealtimeBackend};
pub use config::{BackendKind, Config, CredentialCache};
pub use connection::{open, Connection, Driver, Statement, Transaction};
pub use error::{DbError, DbResult};
pub use result::ExecResult;
pub use rows::{Projection, Rows};
pub use store::{
    Document, DocumentStore, MemoryDocumentStore, MemoryRulesStore, MemoryTreeStore, RulesStore,
    TreeStore,
};
pub use value::{Fields, Value};
