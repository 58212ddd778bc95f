//! Common test utilities for the integration tests
//!
//! Provides seeded in-memory stores and connections over them, plus a helper
//! to drain query results into JSON objects.

#![allow(dead_code)]

use std::sync::Arc;

use docsql::{Connection, Driver, MemoryDocumentStore, MemoryTreeStore, Rows};
use serde_json::{json, Map, Value as Json};

pub fn seeded_document_store() -> Arc<MemoryDocumentStore> {
    let store = Arc::new(MemoryDocumentStore::new());
    store
        .load_collection(
            "users",
            json!({
                "alice": {"name": "Alice", "age": 30, "dept": "eng"},
                "bob": {"name": "Bob", "age": 25, "dept": "eng"},
                "carol": {"name": "Carol", "age": 35, "dept": "sales"},
            }),
        )
        .unwrap();
    store
        .load_collection(
            "items",
            json!({
                "i1": {"a": 1},
                "i2": {"a": 2},
                "i3": {"a": 1},
            }),
        )
        .unwrap();
    store
        .load_collection(
            "orders/o1/lines",
            json!({
                "l1": {"sku": "widget", "qty": 2},
                "l2": {"sku": "gadget", "qty": 5},
            }),
        )
        .unwrap();
    store
}

pub fn seeded_tree_store() -> Arc<MemoryTreeStore> {
    let tree = Arc::new(MemoryTreeStore::new());
    tree.load(json!({
        "players": {
            "p1": {"name": "Ann", "score": 10},
            "p2": {"name": "Ben", "score": 20},
            "p3": {"name": "Cid", "score": 30},
            "p4": {"name": "Dot"},
        }
    }))
    .unwrap();
    tree
}

pub async fn document_connection() -> (Arc<MemoryDocumentStore>, Connection) {
    let store = seeded_document_store();
    let conn = Driver::default()
        .connect_document("memory://document", store.clone())
        .await
        .expect("Failed to connect document store");
    (store, conn)
}

pub async fn realtime_connection() -> (Arc<MemoryTreeStore>, Connection) {
    let tree = seeded_tree_store();
    let conn = Driver::default()
        .connect_realtime("memory://realtime", tree.clone())
        .await
        .expect("Failed to connect tree store");
    (tree, conn)
}

/// Drains `rows` into one JSON object per row.
pub fn collect(mut rows: Rows) -> Vec<Json> {
    let columns = rows.columns().to_vec();
    let mut out = Vec::new();
    while let Some(row) = rows.next() {
        let record: Map<String, Json> = columns
            .iter()
            .cloned()
            .zip(row.into_iter().map(Json::from))
            .collect();
        out.push(Json::Object(record));
    }
    out
}
