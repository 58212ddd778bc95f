//! DSN parsing.
//!
//! ```text
//! firestore://<project>[/<location>]?params
//! firebase://<database>?params
//! memory://document | memory://realtime
//! ```
//!
//! ## Parameters
//!
//! - `endpoint`, `ua`, `apiKey`, `app`, `quotaProject`
//! - `credID` - secret resource id, resolved through the credential cache
//! - `credJSON` - inline credentials, base64url when decodable
//! - `credURL`, `credKey` - secret location and key, base64url when decodable
//! - `scopes` - repeatable

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use url::Url;

use super::credentials::{CredentialCache, SecretResource};
use crate::error::{DbError, DbResult};

pub const DEFAULT_APP: &str = "docsql";
pub const DEFAULT_LOCATION: &str = "us";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Firestore,
    Firebase,
    MemoryDocument,
    MemoryRealtime,
}

impl BackendKind {
    /// Whether statements run against the key-path tree store.
    pub fn is_realtime(self) -> bool {
        matches!(self, BackendKind::Firebase | BackendKind::MemoryRealtime)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub kind: BackendKind,
    /// Firestore project id
    pub project_id: Option<String>,
    /// Firestore location, `us` unless given
    pub location: String,
    /// Realtime database root, `https://<database>.firebaseio.com`
    pub database_url: Option<String>,
    pub endpoint: Option<String>,
    pub user_agent: Option<String>,
    pub api_key: Option<String>,
    pub app: String,
    pub cred_id: Option<String>,
    pub credentials_json: Option<Vec<u8>>,
    pub credentials_url: Option<String>,
    pub credentials_key: Option<String>,
    pub quota_project: Option<String>,
    pub scopes: Vec<String>,
}

/// Decodes unpadded base64url when the text is valid base64url of UTF-8;
/// anything else is kept verbatim.
fn maybe_base64(text: String) -> String {
    URL_SAFE_NO_PAD
        .decode(text.as_bytes())
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .unwrap_or(text)
}

impl Config {
    pub fn parse(dsn: &str) -> DbResult<Self> {
        let url = Url::parse(dsn).map_err(|e| DbError::ConfigError(format!("invalid DSN: {}", e)))?;
        let host = url.host_str().unwrap_or_default().to_string();

        let mut config = Self::empty(BackendKind::MemoryDocument);
        match url.scheme() {
            "firestore" => {
                if host.is_empty() {
                    return Err(DbError::ConfigError(
                        "firestore DSN requires a project id".to_string(),
                    ));
                }
                config.kind = BackendKind::Firestore;
                config.project_id = Some(host);
                if let Some(location) = url.path().trim_matches('/').split('/').next() {
                    if !location.is_empty() {
                        config.location = location.to_string();
                    }
                }
            }
            "firebase" => {
                if host.is_empty() {
                    return Err(DbError::ConfigError(
                        "firebase DSN requires a database name".to_string(),
                    ));
                }
                config.kind = BackendKind::Firebase;
                config.database_url = Some(format!("https://{}.firebaseio.com", host));
            }
            "memory" => {
                config.kind = match host.as_str() {
                    "document" | "" => BackendKind::MemoryDocument,
                    "realtime" => BackendKind::MemoryRealtime,
                    other => {
                        return Err(DbError::ConfigError(format!(
                            "unknown in-memory backend: {}",
                            other
                        )))
                    }
                };
            }
            other => {
                return Err(DbError::ConfigError(format!(
                    "invalid DSN scheme, expected firestore, firebase or memory but got {}",
                    other
                )))
            }
        }

        for (name, value) in url.query_pairs() {
            let value = value.into_owned();
            match name.as_ref() {
                "endpoint" => config.endpoint = Some(value),
                "ua" => config.user_agent = Some(value),
                "apiKey" => config.api_key = Some(value),
                "app" if !value.is_empty() => config.app = value,
                "credID" => config.cred_id = Some(value),
                "credJSON" => config.credentials_json = Some(maybe_base64(value).into_bytes()),
                "credURL" => config.credentials_url = Some(maybe_base64(value)),
                "credKey" => config.credentials_key = Some(maybe_base64(value)),
                "quotaProject" => config.quota_project = Some(value),
                "scopes" => config.scopes.push(value),
                other => tracing::debug!("ignoring unknown DSN parameter {}", other),
            }
        }

        Ok(config)
    }

    fn empty(kind: BackendKind) -> Self {
        Self {
            kind,
            project_id: None,
            location: DEFAULT_LOCATION.to_string(),
            database_url: None,
            endpoint: None,
            user_agent: None,
            api_key: None,
            app: DEFAULT_APP.to_string(),
            cred_id: None,
            credentials_json: None,
            credentials_url: None,
            credentials_key: None,
            quota_project: None,
            scopes: Vec::new(),
        }
    }

    /// Without credentials the document backend uses ambient credentials and
    /// the realtime backend connects unauthenticated.
    pub fn has_credentials(&self) -> bool {
        self.cred_id.is_some()
            || self.credentials_json.as_ref().is_some_and(|j| !j.is_empty())
            || self.credentials_url.is_some()
    }

    /// Replaces `credID` / `credURL` references with the credentials JSON
    /// they point to.
    pub async fn resolve_secrets(&mut self, cache: &CredentialCache) -> DbResult<()> {
        if let Some(id) = &self.cred_id {
            let resource = cache.loader().lookup_resource(id).ok_or_else(|| {
                DbError::ConfigError(format!("failed to lookup secretID: {}", id))
            })?;
            self.credentials_json = Some(cache.lookup(&resource).await?.into_bytes());
        }

        if let Some(url) = &self.credentials_url {
            let resource = SecretResource {
                url: url.clone(),
                key: self.credentials_key.clone(),
            };
            self.credentials_json = Some(cache.lookup(&resource).await?.into_bytes());
        }
        Ok(())
    }
}
