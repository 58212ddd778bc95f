//! SQL statements against the in-memory realtime tree.

mod common;

use std::sync::Arc;

use common::{collect, realtime_connection, seeded_tree_store};
use docsql::{
    Config, Connection, DbError, MemoryRulesStore, RealtimeBackend, TreeStore, Value,
};
use serde_json::json;

#[tokio::test]
async fn test_select_by_id_reads_one_node() {
    let (tree, conn) = realtime_connection().await;
    let rows = conn
        .query("SELECT name FROM players WHERE id = ?", &[Value::from("p2")])
        .await
        .unwrap();
    assert_eq!(collect(rows), vec![json!({"name": "Ben", "id": "p2"})]);
    assert_eq!(tree.query_count(), 0);
}

#[tokio::test]
async fn test_range_queries() {
    let (_tree, conn) = realtime_connection().await;
    let rows = conn
        .query("SELECT name FROM players WHERE score >= 20", &[])
        .await
        .unwrap();
    assert_eq!(
        collect(rows),
        vec![
            json!({"name": "Ben", "id": "p2"}),
            json!({"name": "Cid", "id": "p3"}),
        ]
    );

    let rows = conn
        .query("SELECT name FROM players WHERE score < ? LIMIT 5", &[Value::Int(30)])
        .await
        .unwrap();
    assert_eq!(
        collect(rows),
        vec![
            json!({"name": "Ann", "id": "p1"}),
            json!({"name": "Ben", "id": "p2"}),
        ]
    );
}

#[tokio::test]
async fn test_insert_update_delete() {
    let (tree, conn) = realtime_connection().await;
    let result = conn
        .exec(
            "INSERT INTO players (id, name, score) VALUES ('p5', 'Eve', 40)",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(result.last_insert_key(), Some("p5"));
    assert_eq!(
        tree.get("players/p5/score").await.unwrap(),
        Some(Value::Int(40))
    );

    let result = conn
        .exec("INSERT INTO players (name) VALUES ('Fay')", &[])
        .await
        .unwrap();
    let pushed = result.last_insert_key().unwrap().to_string();
    assert_eq!(
        tree.get(&format!("players/{}/name", pushed)).await.unwrap(),
        Some(Value::from("Fay"))
    );

    let result = conn
        .exec("UPDATE players SET score = 0 WHERE score > 15", &[])
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 3);

    let result = conn
        .exec("DELETE FROM players WHERE id = 'p1'", &[])
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 1);
    assert_eq!(tree.get("players/p1").await.unwrap(), None);

    let err = conn
        .exec("DELETE FROM players WHERE id = 'p1'", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::DocumentNotFound(_)));
}

#[tokio::test]
async fn test_keys_cannot_address_other_nodes() {
    let (tree, conn) = realtime_connection().await;
    for key in ["/", "p1/name"] {
        let err = conn
            .exec("DELETE FROM players WHERE id = ?", &[Value::from(key)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument(_)), "{}", key);
    }
    assert!(tree.get("players/p1").await.unwrap().is_some());

    let err = conn
        .query("SELECT * FROM players WHERE id = 'p1/name'", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));

    let err = conn
        .exec("INSERT INTO players (id, name) VALUES ('x/y', 'Zed')", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
    assert_eq!(tree.get("players/x").await.unwrap(), None);
}

#[tokio::test]
async fn test_unsupported_shapes() {
    let (_tree, conn) = realtime_connection().await;
    for sql in [
        "SELECT * FROM players LIMIT 1 OFFSET 2",
        "SELECT * FROM players ORDER BY score DESC",
        "SELECT * FROM players WHERE score > 1 ORDER BY name",
    ] {
        let err = conn.query(sql, &[]).await.unwrap_err();
        assert!(matches!(err, DbError::Unsupported(_)), "{}", sql);
    }
}

#[tokio::test]
async fn test_index_ddl_edits_rules() {
    let tree = seeded_tree_store();
    let rules = Arc::new(MemoryRulesStore::new());
    let conn = Connection::new(
        Config::parse("memory://realtime").unwrap(),
        Arc::new(RealtimeBackend::new(tree, rules.clone())),
    );

    let result = conn
        .exec("CREATE INDEX by_score ON players (score)", &[])
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 1);
    assert_eq!(
        rules.snapshot(),
        json!({"rules": {"players": {".indexOn": ["score"]}}})
    );

    let result = conn
        .exec("DROP INDEX score ON players", &[])
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 1);
    assert_eq!(rules.snapshot(), json!({"rules": {"players": {}}}));
}

#[tokio::test]
async fn test_create_table_if_not_exists() {
    let (tree, conn) = realtime_connection().await;
    let result = conn
        .exec("CREATE TABLE IF NOT EXISTS players", &[])
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 0);
    assert!(tree.get("players/p1").await.unwrap().is_some());

    let result = conn.exec("DROP TABLE players", &[]).await.unwrap();
    assert_eq!(result.rows_affected(), 1);
    assert_eq!(tree.get("players").await.unwrap(), None);
}
