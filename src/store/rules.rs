//! The database rules document, the tree store's only index DDL surface.
//!
//! ```json
//! { "rules": { "users": { ".indexOn": ["age", "name"], ".read": true } } }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use url::Url;

use crate::error::{DbError, DbResult};

/// `.indexOn` accepts a single field or a list.
fn deserialize_index_on<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FieldOrFields {
        Single(String),
        Multiple(Vec<String>),
    }

    match FieldOrFields::deserialize(deserializer)? {
        FieldOrFields::Single(s) => Ok(vec![s]),
        FieldOrFields::Multiple(v) => Ok(v),
    }
}

/// Rules of one collection. Keys other than `.indexOn` are carried through
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionRules {
    #[serde(
        rename = ".indexOn",
        default,
        deserialize_with = "deserialize_index_on",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub index_on: Vec<String>,
    #[serde(flatten)]
    pub other: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    pub rules: Map<String, JsonValue>,
}

impl RuleSet {
    pub fn from_json(json: JsonValue) -> DbResult<Self> {
        match json {
            JsonValue::Object(mut doc) => match doc.remove("rules") {
                Some(JsonValue::Object(rules)) => Ok(Self { rules }),
                _ => Err(DbError::InvalidDocument("invalid rules format".to_string())),
            },
            _ => Err(DbError::InvalidDocument("invalid rules format".to_string())),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({ "rules": self.rules })
    }

    /// Rules of `table`; an absent entry reads as empty rules.
    pub fn collection(&self, table: &str) -> DbResult<CollectionRules> {
        match self.rules.get(table) {
            Some(entry) => Ok(serde_json::from_value(entry.clone())?),
            None => Ok(CollectionRules::default()),
        }
    }

    pub fn set_collection(&mut self, table: &str, rules: &CollectionRules) -> DbResult<()> {
        self.rules
            .insert(table.to_string(), serde_json::to_value(rules)?);
        Ok(())
    }

    /// Appends the fields not yet indexed, keeping existing order. Returns
    /// how many were added.
    pub fn add_index(&mut self, table: &str, fields: &[String]) -> DbResult<usize> {
        let mut rules = self.collection(table)?;
        let before = rules.index_on.len();
        for field in fields {
            if !rules.index_on.contains(field) {
                rules.index_on.push(field.clone());
            }
        }
        let added = rules.index_on.len() - before;
        self.set_collection(table, &rules)?;
        Ok(added)
    }

    /// Removes `field` from the index list; an emptied list is dropped.
    /// Returns whether anything was removed.
    pub fn remove_index(&mut self, table: &str, field: &str) -> DbResult<bool> {
        if !self.rules.contains_key(table) {
            return Ok(false);
        }
        let mut rules = self.collection(table)?;
        let before = rules.index_on.len();
        rules.index_on.retain(|f| f != field);
        if rules.index_on.len() == before {
            return Ok(false);
        }
        self.set_collection(table, &rules)?;
        Ok(true)
    }
}

#[async_trait]
pub trait RulesStore: Send + Sync {
    async fn load(&self) -> DbResult<RuleSet>;

    async fn save(&self, rules: &RuleSet) -> DbResult<()>;
}

/// Reads and writes `{database_url}/.settings/rules.json` over REST.
pub struct HttpRulesStore {
    client: reqwest::Client,
    url: Url,
}

impl HttpRulesStore {
    pub fn new(database_url: &str, auth: Option<&str>) -> DbResult<Self> {
        let raw = format!("{}/.settings/rules.json", database_url.trim_end_matches('/'));
        let mut url = Url::parse(&raw)
            .map_err(|e| DbError::ConfigError(format!("invalid database URL {}: {}", raw, e)))?;
        if let Some(token) = auth {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn check_status(&self, method: &str, status: reqwest::StatusCode) -> DbResult<()> {
        if status.is_success() {
            return Ok(());
        }
        Err(DbError::store(
            format!("{} {}", method, self.url.path()),
            format!("unexpected status {}", status),
        ))
    }
}

#[async_trait]
impl RulesStore for HttpRulesStore {
    async fn load(&self) -> DbResult<RuleSet> {
        let response = self.client.get(self.url.clone()).send().await?;
        self.check_status("GET", response.status())?;
        let body: JsonValue = response.json().await?;
        RuleSet::from_json(body)
    }

    async fn save(&self, rules: &RuleSet) -> DbResult<()> {
        let response = self
            .client
            .put(self.url.clone())
            .json(&rules.to_json())
            .send()
            .await?;
        self.check_status("PUT", response.status())
    }
}

#[derive(Default)]
pub struct MemoryRulesStore {
    rules: RwLock<RuleSet>,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryRulesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(json: JsonValue) -> DbResult<Self> {
        Ok(Self {
            rules: RwLock::new(RuleSet::from_json(json)?),
            ..Self::default()
        })
    }

    pub fn snapshot(&self) -> JsonValue {
        self.rules.read().to_json()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RulesStore for MemoryRulesStore {
    async fn load(&self) -> DbResult<RuleSet> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.rules.read().clone())
    }

    async fn save(&self, rules: &RuleSet) -> DbResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.rules.write() = rules.clone();
        Ok(())
    }
}
