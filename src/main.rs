use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use docsql::config::ENV_DSN;
use docsql::{BackendKind, Config, Connection, Driver, MemoryDocumentStore, MemoryTreeStore, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Document,
    Realtime,
}

#[derive(Parser, Debug)]
#[command(name = "docsql")]
#[command(about = "Run SQL statements against an in-memory document or realtime store", long_about = None)]
struct Args {
    /// JSON fixture seeding the store: { "collection": { "key": { fields } } }
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Store family, used when no DSN is given
    #[arg(long, value_enum, default_value_t = BackendArg::Document)]
    backend: BackendArg,

    /// memory:// DSN (falls back to DOCSQL_DSN)
    #[arg(long)]
    dsn: Option<String>,

    /// Statement to run; repeat for several
    #[arg(long = "exec", required = true)]
    statements: Vec<String>,

    /// JSON array of arguments for the statement at the same position
    #[arg(long = "args")]
    arguments: Vec<String>,
}

fn read_fixture(path: &PathBuf) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    match serde_json::from_str(&text)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => anyhow::bail!("fixture {} must be a JSON object", path.display()),
    }
}

async fn connect(args: &Args) -> anyhow::Result<Connection> {
    let dsn = args
        .dsn
        .clone()
        .or_else(|| std::env::var(ENV_DSN).ok())
        .unwrap_or_else(|| match args.backend {
            BackendArg::Document => "memory://document".to_string(),
            BackendArg::Realtime => "memory://realtime".to_string(),
        });
    let kind = Config::parse(&dsn)?.kind;
    let fixture = match &args.fixture {
        Some(path) => read_fixture(path)?,
        None => serde_json::Map::new(),
    };

    let driver = Driver::default();
    let conn = match kind {
        BackendKind::MemoryDocument => {
            let store = Arc::new(MemoryDocumentStore::new());
            for (collection, documents) in fixture {
                let count = store.load_collection(&collection, documents)?;
                tracing::info!("loaded {} document(s) into {}", count, collection);
            }
            driver.connect_document(&dsn, store).await?
        }
        BackendKind::MemoryRealtime => {
            let tree = Arc::new(MemoryTreeStore::new());
            tree.load(serde_json::Value::Object(fixture))?;
            driver.connect_realtime(&dsn, tree).await?
        }
        BackendKind::Firestore | BackendKind::Firebase => {
            anyhow::bail!("the CLI only runs against memory:// stores, got {}", dsn)
        }
    };
    Ok(conn)
}

fn parse_arguments(raw: Option<&String>) -> anyhow::Result<Vec<Value>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(raw).with_context(|| format!("parsing --args {}", raw))? {
        serde_json::Value::Array(items) => Ok(items.into_iter().map(Value::from).collect()),
        other => Ok(vec![Value::from(other)]),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docsql=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let conn = connect(&args).await?;

    for (i, sql) in args.statements.iter().enumerate() {
        let values = parse_arguments(args.arguments.get(i))?;
        let stmt = conn.prepare(sql)?;
        if values.len() < stmt.num_input() {
            tracing::warn!(
                "statement {} expects {} argument(s), got {}",
                i + 1,
                stmt.num_input(),
                values.len()
            );
        }

        if stmt.kind().is_some_and(|k| k.is_query()) {
            let mut rows = stmt.query(&values).await?;
            let columns = rows.columns().to_vec();
            while let Some(row) = rows.next() {
                let record: serde_json::Map<String, serde_json::Value> = columns
                    .iter()
                    .cloned()
                    .zip(row.into_iter().map(serde_json::Value::from))
                    .collect();
                println!("{}", serde_json::Value::Object(record));
            }
        } else {
            let result = stmt.exec(&values).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    conn.close()?;
    Ok(())
}
