//! Secret loading for DSN credential parameters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{DbError, DbResult};

/// Where a secret lives. `key` is handed to loaders that decrypt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretResource {
    pub url: String,
    pub key: Option<String>,
}

#[async_trait]
pub trait SecretLoader: Send + Sync {
    /// Maps a `credID` to its resource, if registered.
    fn lookup_resource(&self, id: &str) -> Option<SecretResource>;

    async fn load(&self, resource: &SecretResource) -> DbResult<String>;
}

/// Reads local files (plain paths or `file://` URLs) and fetches
/// `http(s)://` URLs.
#[derive(Default)]
pub struct DefaultSecretLoader {
    resources: HashMap<String, SecretResource>,
    client: reqwest::Client,
}

impl DefaultSecretLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, id: impl Into<String>, resource: SecretResource) -> Self {
        self.resources.insert(id.into(), resource);
        self
    }
}

#[async_trait]
impl SecretLoader for DefaultSecretLoader {
    fn lookup_resource(&self, id: &str) -> Option<SecretResource> {
        self.resources.get(id).cloned()
    }

    async fn load(&self, resource: &SecretResource) -> DbResult<String> {
        let url = resource.url.as_str();
        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(DbError::ConfigError(format!(
                    "failed to load secret from {}: status {}",
                    url, status
                )));
            }
            return Ok(response.text().await?);
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DbError::ConfigError(format!("failed to load secret from {}: {}", url, e)))
    }
}

/// Loaded secrets keyed by resource URL. One cache is shared by every
/// connection opened through the same driver.
pub struct CredentialCache {
    loader: Arc<dyn SecretLoader>,
    secrets: RwLock<HashMap<String, String>>,
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new(Arc::new(DefaultSecretLoader::new()))
    }
}

impl CredentialCache {
    pub fn new(loader: Arc<dyn SecretLoader>) -> Self {
        Self {
            loader,
            secrets: RwLock::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &dyn SecretLoader {
        self.loader.as_ref()
    }

    pub async fn lookup(&self, resource: &SecretResource) -> DbResult<String> {
        let cached = self.secrets.read().get(&resource.url).cloned();
        if let Some(secret) = cached {
            return Ok(secret);
        }

        let secret = self.loader.load(resource).await?;
        self.secrets
            .write()
            .insert(resource.url.clone(), secret.clone());
        tracing::debug!("cached secret from {}", resource.url);
        Ok(secret)
    }

    pub fn len(&self) -> usize {
        self.secrets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
