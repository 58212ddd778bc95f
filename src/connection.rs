//! Generic connection surface: driver, connection, prepared statement and
//! the no-op transaction.

use std::fmt;
use std::sync::Arc;

use docsql_core::{count_placeholders, Statement as Ast, StatementKind};
use parking_lot::Mutex;

use crate::backend::{Backend, DocumentBackend, RealtimeBackend};
use crate::config::{BackendKind, Config, CredentialCache};
use crate::error::{DbError, DbResult};
use crate::result::ExecResult;
use crate::rows::Rows;
use crate::store::{
    DocumentStore, HttpRulesStore, MemoryDocumentStore, MemoryRulesStore, MemoryTreeStore,
    TreeStore,
};
use crate::value::Value;

/// Opens connections. Connections opened through one driver share its
/// credential cache.
#[derive(Clone, Default)]
pub struct Driver {
    credentials: Arc<CredentialCache>,
}

impl Driver {
    pub fn new(credentials: Arc<CredentialCache>) -> Self {
        Self { credentials }
    }

    async fn configure(&self, dsn: &str) -> DbResult<Config> {
        let mut config = Config::parse(dsn)?;
        config.resolve_secrets(&self.credentials).await?;
        Ok(config)
    }

    /// Opens an in-memory connection (`memory://document`,
    /// `memory://realtime`). Network DSNs need a store client; see
    /// [`Driver::connect_document`] and [`Driver::connect_realtime`].
    pub async fn open(&self, dsn: &str) -> DbResult<Connection> {
        let config = self.configure(dsn).await?;
        let backend: Arc<dyn Backend> = match config.kind {
            BackendKind::MemoryDocument => {
                Arc::new(DocumentBackend::new(Arc::new(MemoryDocumentStore::new())))
            }
            BackendKind::MemoryRealtime => Arc::new(RealtimeBackend::new(
                Arc::new(MemoryTreeStore::new()),
                Arc::new(MemoryRulesStore::new()),
            )),
            BackendKind::Firestore | BackendKind::Firebase => {
                return Err(DbError::ConfigError(format!(
                    "{} requires a store client; use connect_document or connect_realtime",
                    dsn
                )))
            }
        };
        Ok(Connection::new(config, backend))
    }

    /// Connects a document-store DSN to `store`.
    pub async fn connect_document<S>(&self, dsn: &str, store: Arc<S>) -> DbResult<Connection>
    where
        S: DocumentStore + 'static,
    {
        let config = self.configure(dsn).await?;
        if config.kind.is_realtime() {
            return Err(DbError::ConfigError(format!(
                "{} is not a document-store DSN",
                dsn
            )));
        }
        Ok(Connection::new(config, Arc::new(DocumentBackend::new(store))))
    }

    /// Connects a realtime DSN to `tree`. `firebase://` DSNs edit the rules
    /// document over HTTP; `memory://realtime` keeps it in memory.
    pub async fn connect_realtime<T>(&self, dsn: &str, tree: Arc<T>) -> DbResult<Connection>
    where
        T: TreeStore + 'static,
    {
        let config = self.configure(dsn).await?;
        let backend: Arc<dyn Backend> = match (&config.kind, &config.database_url) {
            (BackendKind::Firebase, Some(database_url)) => {
                let rules = HttpRulesStore::new(database_url, config.api_key.as_deref())?;
                Arc::new(RealtimeBackend::new(tree, Arc::new(rules)))
            }
            (BackendKind::MemoryRealtime, _) => {
                Arc::new(RealtimeBackend::new(tree, Arc::new(MemoryRulesStore::new())))
            }
            _ => {
                return Err(DbError::ConfigError(format!(
                    "{} is not a realtime DSN",
                    dsn
                )))
            }
        };
        Ok(Connection::new(config, backend))
    }
}

/// Opens an in-memory connection with a fresh driver.
pub async fn open(dsn: &str) -> DbResult<Connection> {
    Driver::default().open(dsn).await
}

struct ConnectionInner {
    config: Config,
    backend: Arc<dyn Backend>,
    closed: Mutex<bool>,
}

/// Cheap to clone; clones share the backend and the open/closed state.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("kind", &self.inner.config.kind)
            .field("backend", &self.inner.backend.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Self {
        tracing::debug!("opened {} connection", backend.name());
        Self {
            inner: Arc::new(ConnectionInner {
                config,
                backend,
                closed: Mutex::new(false),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.lock()
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.is_closed() {
            return Err(DbError::ConnectionClosed);
        }
        Ok(())
    }

    pub fn prepare(&self, sql: &str) -> DbResult<Statement> {
        self.ensure_open()?;
        Ok(Statement {
            sql: sql.to_string(),
            kind: StatementKind::classify(sql),
            num_input: count_placeholders(sql),
            backend: self.inner.backend.clone(),
        })
    }

    pub async fn exec(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        self.prepare(sql)?.exec(args).await
    }

    pub async fn query(&self, sql: &str, args: &[Value]) -> DbResult<Rows> {
        self.prepare(sql)?.query(args).await
    }

    pub fn ping(&self) -> DbResult<()> {
        self.ensure_open()
    }

    pub fn close(&self) -> DbResult<()> {
        let mut closed = self.inner.closed.lock();
        if *closed {
            return Err(DbError::ConnectionClosed);
        }
        *closed = true;
        Ok(())
    }

    /// Statements are not transactional; the returned handle only tracks
    /// that it is finished exactly once.
    pub fn begin(&self) -> DbResult<Transaction> {
        self.ensure_open()?;
        Ok(Transaction {
            done: Mutex::new(false),
        })
    }
}

/// A prepared statement. Immutable; each execution gets its own argument
/// cursor, so one statement can run concurrently.
#[derive(Clone)]
pub struct Statement {
    sql: String,
    kind: Option<StatementKind>,
    num_input: usize,
    backend: Arc<dyn Backend>,
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("kind", &self.kind)
            .field("num_input", &self.num_input)
            .finish()
    }
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> Option<StatementKind> {
        self.kind
    }

    /// Number of `?` / `$n` markers outside string literals.
    pub fn num_input(&self) -> usize {
        self.num_input
    }

    fn parse(&self) -> DbResult<Ast> {
        if self.kind.is_none() {
            return Err(DbError::Unsupported(format!(
                "unsupported statement: {}",
                self.sql
            )));
        }
        Ok(docsql_core::parse(&self.sql)?)
    }

    pub async fn exec(&self, args: &[Value]) -> DbResult<ExecResult> {
        let ast = self.parse()?;
        tracing::debug!(
            "exec {} with {} argument(s) on {}",
            self.kind.map_or_else(String::new, |k| k.to_string()),
            args.len(),
            self.backend.name()
        );

        match &ast {
            Ast::Insert(stmt) => self.backend.insert(stmt, args).await,
            Ast::Update(stmt) => self.backend.update(stmt, args).await,
            Ast::Delete(stmt) => self.backend.delete(stmt, args).await,
            Ast::CreateTable(stmt) => self.backend.create_table(stmt).await,
            Ast::DropTable(stmt) => self.backend.drop_table(stmt).await,
            Ast::CreateIndex(stmt) => self.backend.create_index(stmt).await,
            Ast::DropIndex(stmt) => self.backend.drop_index(stmt).await,
            Ast::Select(_) => Err(DbError::Unsupported(format!(
                "unsupported exec statement: {}",
                self.sql
            ))),
        }
    }

    pub async fn query(&self, args: &[Value]) -> DbResult<Rows> {
        let ast = self.parse()?;
        tracing::debug!(
            "query with {} argument(s) on {}",
            args.len(),
            self.backend.name()
        );

        match &ast {
            Ast::Select(stmt) => self.backend.select(stmt, args).await,
            _ => Err(DbError::Unsupported(format!(
                "unsupported query statement: {}",
                self.sql
            ))),
        }
    }
}

#[derive(Debug)]
pub struct Transaction {
    done: Mutex<bool>,
}

impl Transaction {
    fn finish(&self) -> DbResult<()> {
        let mut done = self.done.lock();
        if *done {
            return Err(DbError::ConnectionClosed);
        }
        *done = true;
        Ok(())
    }

    pub fn commit(&self) -> DbResult<()> {
        self.finish()
    }

    pub fn rollback(&self) -> DbResult<()> {
        self.finish()
    }
}
