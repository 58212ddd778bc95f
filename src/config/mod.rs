//! Connection configuration: DSN parsing and credential secrets.

pub mod credentials;
pub mod dsn;

pub use credentials::{CredentialCache, DefaultSecretLoader, SecretLoader, SecretResource};
pub use dsn::{BackendKind, Config, DEFAULT_APP, DEFAULT_LOCATION};

/// Environment variable the CLI reads its DSN from.
pub const ENV_DSN: &str = "DOCSQL_DSN";
