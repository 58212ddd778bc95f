//! SQL statements against the in-memory document store.

mod common;

use common::{collect, document_connection};
use docsql::sql::CollectionPath;
use docsql::{DbError, DocumentStore, Value};
use serde_json::json;

#[tokio::test]
async fn test_select_by_id_skips_scan() {
    let (store, conn) = document_connection().await;
    let rows = conn
        .query("SELECT * FROM users WHERE id = 'alice'", &[])
        .await
        .unwrap();
    assert_eq!(
        collect(rows),
        vec![json!({"id": "alice", "age": 30, "dept": "eng", "name": "Alice"})]
    );
    assert_eq!(store.scan_count(), 0);
}

#[tokio::test]
async fn test_select_missing_id_is_empty() {
    let (store, conn) = document_connection().await;
    let rows = conn
        .query("SELECT name FROM users WHERE id = ?", &[Value::from("nobody")])
        .await
        .unwrap();
    assert!(collect(rows).is_empty());
    assert_eq!(store.scan_count(), 0);
}

#[tokio::test]
async fn test_always_false_where_skips_scan() {
    let (store, conn) = document_connection().await;
    for sql in [
        "SELECT * FROM users WHERE 1 = 0",
        "SELECT * FROM users WHERE 'a' = 'b'",
    ] {
        let rows = conn.query(sql, &[]).await.unwrap();
        assert_eq!(rows.remaining(), 0, "{}", sql);
    }
    assert_eq!(store.scan_count(), 0);

    let result = conn
        .exec("DELETE FROM users WHERE 1 = 0", &[])
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_insert_with_explicit_id() {
    let (store, conn) = document_connection().await;
    let result = conn
        .exec("INSERT INTO users (id, name) VALUES ('k2', 'x')", &[])
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 1);
    assert_eq!(result.last_insert_key(), Some("k2"));

    let doc = store
        .get(&CollectionPath::collection("users"), "k2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.fields.len(), 1);
    assert_eq!(doc.fields.get("name"), Some(&Value::from("x")));

    let rows = conn
        .query("SELECT * FROM users WHERE id = 'k2'", &[])
        .await
        .unwrap();
    assert_eq!(collect(rows), vec![json!({"id": "k2", "name": "x"})]);
}

#[tokio::test]
async fn test_insert_generates_keys() {
    let (store, conn) = document_connection().await;
    let result = conn
        .exec(
            "INSERT INTO items (a) VALUES (?), (?)",
            &[Value::Int(7), Value::Int(8)],
        )
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 2);
    let key = result.last_insert_key().unwrap().to_string();
    assert!(!key.is_empty());
    assert_eq!(store.document_count(&CollectionPath::collection("items")), 5);

    let doc = store
        .get(&CollectionPath::collection("items"), &key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.fields.get("a"), Some(&Value::Int(8)));
}

#[tokio::test]
async fn test_insert_bad_value_count_touches_nothing() {
    let (store, conn) = document_connection().await;
    let err = conn
        .exec("INSERT INTO users (id, name) VALUES ('a', 'b', 'c')", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.scan_count(), 0);
}

#[tokio::test]
async fn test_update_and_delete_by_predicate() {
    let (store, conn) = document_connection().await;
    let result = conn
        .exec("UPDATE items SET b = ? WHERE a = 1", &[Value::from("x")])
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 2);

    let rows = conn
        .query("SELECT b FROM items WHERE a = 1", &[])
        .await
        .unwrap();
    assert_eq!(
        collect(rows),
        vec![json!({"b": "x", "id": "i1"}), json!({"b": "x", "id": "i3"})]
    );

    let result = conn
        .exec("DELETE FROM items WHERE a = 1", &[])
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 2);
    assert_eq!(store.document_count(&CollectionPath::collection("items")), 1);
    assert_eq!(store.open_cursors(), 0);
}

#[tokio::test]
async fn test_update_by_id_missing_document() {
    let (_store, conn) = document_connection().await;
    let err = conn
        .exec("UPDATE users SET age = 1 WHERE id = 'ghost'", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::DocumentNotFound(_)));
}

#[tokio::test]
async fn test_order_limit_offset() {
    let (_store, conn) = document_connection().await;
    let rows = conn
        .query(
            "SELECT u.name FROM users u ORDER BY age DESC LIMIT ? OFFSET ?",
            &[Value::Int(2), Value::Int(1)],
        )
        .await
        .unwrap();
    assert_eq!(rows.columns(), ["name", "id"]);
    assert_eq!(
        collect(rows),
        vec![
            json!({"name": "Alice", "id": "alice"}),
            json!({"name": "Bob", "id": "bob"}),
        ]
    );
}

#[tokio::test]
async fn test_subcollection_paths() {
    let (store, conn) = document_connection().await;
    let rows = conn
        .query("SELECT sku FROM orders[id = 'o1'].lines WHERE qty > 3", &[])
        .await
        .unwrap();
    assert_eq!(collect(rows), vec![json!({"sku": "gadget", "id": "l2"})]);

    conn.exec(
        "INSERT INTO orders[id = ?].lines (id, sku) VALUES (?, ?)",
        &[Value::from("o1"), Value::from("l3"), Value::from("bolt")],
    )
    .await
    .unwrap();
    let lines = CollectionPath::SubCollection {
        parent: "orders".to_string(),
        key: "o1".to_string(),
        child: "lines".to_string(),
    };
    assert_eq!(store.document_count(&lines), 3);

    let err = conn
        .query("SELECT * FROM orders[id = 'o1'].lines[id = 'l1'].x", &[])
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unsupported: nested subcollections not supported"
    );
}

#[tokio::test]
async fn test_wildcard_columns_from_first_document() {
    let (_store, conn) = document_connection().await;
    conn.exec("INSERT INTO users (id, city) VALUES ('zed', 'Paris')", &[])
        .await
        .unwrap();
    let rows = conn.query("SELECT * FROM users", &[]).await.unwrap();
    assert_eq!(rows.columns(), ["id", "age", "dept", "name"]);
    let rows = collect(rows);
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[3],
        json!({"id": "zed", "age": null, "dept": null, "name": null})
    );
}

#[tokio::test]
async fn test_subquery_source() {
    let (_store, conn) = document_connection().await;
    let rows = conn
        .query(
            "SELECT n FROM (SELECT name AS n, age FROM users WHERE dept = ?) t",
            &[Value::from("eng")],
        )
        .await
        .unwrap();
    assert_eq!(
        collect(rows),
        vec![
            json!({"n": "Alice", "id": "alice"}),
            json!({"n": "Bob", "id": "bob"}),
        ]
    );
}

#[tokio::test]
async fn test_create_and_drop_collection() {
    let (store, conn) = document_connection().await;
    let result = conn.exec("CREATE TABLE audit", &[]).await.unwrap();
    assert_eq!(result.rows_affected(), 1);
    assert!(store.collection_exists(&CollectionPath::collection("audit")));

    let result = conn.exec("DROP TABLE users", &[]).await.unwrap();
    assert_eq!(result.rows_affected(), 3);
    assert_eq!(store.document_count(&CollectionPath::collection("users")), 0);
    assert_eq!(store.open_cursors(), 0);

    let err = conn
        .exec("CREATE INDEX by_age ON users (age)", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Unsupported(_)));
}
