//! Key-path tree store: the realtime-database half of the backends.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::value::{Fields, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildOrder {
    Key,
    Child(String),
}

/// Child query at one node. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeQuery {
    pub order: ChildOrder,
    pub equal_to: Option<Value>,
    pub start_at: Option<Value>,
    pub end_at: Option<Value>,
    pub limit_to_first: Option<usize>,
}

impl TreeQuery {
    pub fn order_by_key() -> Self {
        Self::with_order(ChildOrder::Key)
    }

    pub fn order_by_child(field: impl Into<String>) -> Self {
        Self::with_order(ChildOrder::Child(field.into()))
    }

    fn with_order(order: ChildOrder) -> Self {
        Self {
            order,
            equal_to: None,
            start_at: None,
            end_at: None,
            limit_to_first: None,
        }
    }

    pub fn equal_to(mut self, value: Value) -> Self {
        self.equal_to = Some(value);
        self
    }

    pub fn start_at(mut self, value: Value) -> Self {
        self.start_at = Some(value);
        self
    }

    pub fn end_at(mut self, value: Value) -> Self {
        self.end_at = Some(value);
        self
    }

    pub fn limit_to_first(mut self, limit: usize) -> Self {
        self.limit_to_first = Some(limit);
        self
    }

    /// Value a child is ordered and bounded by.
    fn sort_value(&self, key: &str, child: &Value) -> Value {
        match &self.order {
            ChildOrder::Key => Value::String(key.to_string()),
            ChildOrder::Child(field) => child
                .as_map()
                .and_then(|m| Value::lookup(m, field))
                .cloned()
                .unwrap_or(Value::Null),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        if let Some(eq) = &self.equal_to {
            if value.sort_cmp(eq).is_ne() {
                return false;
            }
        }
        if let Some(start) = &self.start_at {
            if value.sort_cmp(start).is_lt() {
                return false;
            }
        }
        if let Some(end) = &self.end_at {
            if value.sort_cmp(end).is_gt() {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait TreeStore: Send + Sync {
    async fn get(&self, path: &str) -> DbResult<Option<Value>>;

    async fn set(&self, path: &str, value: Value) -> DbResult<()>;

    /// Appends a child under a generated, time-ordered key.
    async fn push(&self, path: &str, value: Value) -> DbResult<String>;

    /// Merges `fields` into the node at `path`.
    async fn update(&self, path: &str, fields: Fields) -> DbResult<()>;

    async fn delete(&self, path: &str) -> DbResult<()>;

    /// Children of `path` that satisfy `query`, in query order.
    async fn query(&self, path: &str, query: &TreeQuery) -> DbResult<Vec<(String, Value)>>;
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[derive(Default)]
pub struct MemoryTreeStore {
    root: RwLock<Fields>,
    queries: AtomicUsize,
    failing_path: RwLock<Option<String>>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the tree from a JSON object.
    pub fn load(&self, json: serde_json::Value) -> DbResult<()> {
        match Value::from(json) {
            Value::Map(fields) => {
                *self.root.write() = fields;
                Ok(())
            }
            other => Err(DbError::InvalidDocument(format!(
                "tree root must be an object, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Makes every write at `path` (and below it) fail with a store error.
    pub fn fail_writes_to(&self, path: &str) {
        *self.failing_path.write() = Some(segments(path).join("/"));
    }

    fn check_write(&self, parts: &[&str]) -> DbResult<()> {
        let failing = self.failing_path.read();
        let Some(failing) = failing.as_deref() else {
            return Ok(());
        };
        let target = segments(failing);
        if parts.len() >= target.len() && parts[..target.len()] == target[..] {
            return Err(DbError::store(parts.join("/"), "write rejected"));
        }
        Ok(())
    }

    fn node_mut<'a>(root: &'a mut Fields, parents: &[&str]) -> &'a mut Fields {
        let mut current = root;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Map(Fields::new()));
            if !matches!(entry, Value::Map(_)) {
                *entry = Value::Map(Fields::new());
            }
            current = match entry {
                Value::Map(map) => map,
                _ => unreachable!("entry was just replaced with a map"),
            };
        }
        current
    }
}

#[async_trait]
impl TreeStore for MemoryTreeStore {
    async fn get(&self, path: &str) -> DbResult<Option<Value>> {
        let root = self.root.read();
        let mut parts = segments(path).into_iter();
        let Some(first) = parts.next() else {
            return Ok(Some(Value::Map(root.clone())));
        };
        let mut current = root.get(first);
        for segment in parts {
            current = current.and_then(|v| v.as_map()).and_then(|m| m.get(segment));
        }
        Ok(current.cloned())
    }

    async fn set(&self, path: &str, value: Value) -> DbResult<()> {
        let parts = segments(path);
        self.check_write(&parts)?;
        let mut root = self.root.write();
        match parts.split_last() {
            Some((last, parents)) => {
                Self::node_mut(&mut root, parents).insert(last.to_string(), value);
            }
            None => match value {
                Value::Map(fields) => *root = fields,
                other => {
                    return Err(DbError::InvalidDocument(format!(
                        "tree root must be an object, got {}",
                        other.type_name()
                    )))
                }
            },
        }
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> DbResult<String> {
        let key = Uuid::now_v7().simple().to_string();
        self.set(&format!("{}/{}", path, key), value).await?;
        Ok(key)
    }

    async fn update(&self, path: &str, fields: Fields) -> DbResult<()> {
        let parts = segments(path);
        self.check_write(&parts)?;
        let mut root = self.root.write();
        let node = Self::node_mut(&mut root, &parts);
        for (field, value) in fields {
            Value::set_path(node, &field, value);
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> DbResult<()> {
        let parts = segments(path);
        self.check_write(&parts)?;
        let mut root = self.root.write();
        match parts.split_last() {
            Some((last, parents)) => {
                let mut current: &mut Fields = &mut root;
                for segment in parents {
                    match current.get_mut(*segment) {
                        Some(Value::Map(map)) => current = map,
                        _ => return Ok(()),
                    }
                }
                current.remove(*last);
            }
            None => root.clear(),
        }
        Ok(())
    }

    async fn query(&self, path: &str, query: &TreeQuery) -> DbResult<Vec<(String, Value)>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let Some(Value::Map(children)) = self.get(path).await? else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<(Value, String, Value)> = children
            .into_iter()
            .map(|(key, child)| (query.sort_value(&key, &child), key, child))
            .filter(|(sort, _, _)| query.accepts(sort))
            .collect();
        matched.sort_by(|a, b| a.0.sort_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        Ok(matched
            .into_iter()
            .take(query.limit_to_first.unwrap_or(usize::MAX))
            .map(|(_, key, child)| (key, child))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> MemoryTreeStore {
        let store = MemoryTreeStore::new();
        store
            .load(json!({
                "users": {
                    "alice": {"name": "Alice", "age": 30},
                    "bob": {"name": "Bob", "age": 25},
                    "carol": {"name": "Carol", "age": 35},
                    "count": 3
                }
            }))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_get_set_delete() {
        let store = seeded();
        store.set("users/dave", Value::from(json!({"age": 40}))).await.unwrap();
        assert_eq!(
            store.get("users/dave/age").await.unwrap(),
            Some(Value::Int(40))
        );
        store.delete("users/dave").await.unwrap();
        assert_eq!(store.get("users/dave").await.unwrap(), None);
        store.delete("missing/deep/path").await.unwrap();
    }

    #[tokio::test]
    async fn test_push_and_update() {
        let store = MemoryTreeStore::new();
        let key = store.push("logs", Value::from(json!({"msg": "a"}))).await.unwrap();
        let mut fields = Fields::new();
        fields.insert("level".to_string(), Value::from("info"));
        store.update(&format!("logs/{}", key), fields).await.unwrap();
        let node = store.get(&format!("logs/{}", key)).await.unwrap().unwrap();
        assert_eq!(node, Value::from(json!({"msg": "a", "level": "info"})));
    }

    #[tokio::test]
    async fn test_query_by_child_range() {
        let store = seeded();
        let query = TreeQuery::order_by_child("age").start_at(Value::Int(26));
        let keys: Vec<String> = store
            .query("users", &query)
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["alice", "carol"]);
    }

    #[tokio::test]
    async fn test_query_equal_to_and_limit() {
        let store = seeded();
        let query = TreeQuery::order_by_child("name").equal_to(Value::from("Bob"));
        let found = store.query("users", &query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "bob");

        let query = TreeQuery::order_by_key().limit_to_first(2);
        let found = store.query("users", &query).await.unwrap();
        assert_eq!(
            found.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            vec!["alice", "bob"]
        );
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_end_at_includes_missing_child() {
        // children without the ordered field sort first, as null
        let store = seeded();
        let query = TreeQuery::order_by_child("age").end_at(Value::Int(26));
        let keys: Vec<String> = store
            .query("users", &query)
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["count", "bob"]);
    }
}
