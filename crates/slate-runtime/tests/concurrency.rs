//! Reader/writer behavior on a file-backed WAL database.

use std::time::Duration;

use futures::future::join_all;
use slate_core::ast::window::count_all;
use slate_core::migrations::diff;
use slate_core::query::{Insert, Query};
use slate_core::schema::{integer, text, SchemaSnapshot, TableDescriptor};
use slate_runtime::{Database, DatabaseConfig};
use tempfile::TempDir;

async fn setup() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig::file(dir.path().join("app.db").to_str().unwrap());
    let schema = SchemaSnapshot::from_tables(vec![TableDescriptor::new("notes")
        .column(integer("id").primary_key())
        .column(text("body"))])
    .unwrap();
    let db = Database::connect(&config).await.unwrap().with_schema(schema);
    for statement in diff(db.schema(), None).statements() {
        sqlx::query(&statement).execute(db.pool()).await.unwrap();
    }
    (dir, db)
}

async fn note_count(db: &Database) -> i64 {
    let query = db
        .compile(&Query::from("notes").select("n", count_all()))
        .unwrap();
    db.fetch_optional(&query)
        .await
        .unwrap()
        .unwrap()
        .get("n")
        .unwrap()
}

fn insert_note(db: &Database, id: i64) -> slate_core::CompiledQuery {
    db.compile(&Insert::into("notes").value("id", id).value("body", "text"))
        .unwrap()
}

#[tokio::test]
async fn test_readers_see_committed_state_only() {
    let (_dir, db) = setup().await;
    let mut tx = db.begin().await.unwrap();
    tx.execute(&insert_note(&db, 1)).await.unwrap();

    assert_eq!(note_count(&db).await, 0);
    tx.commit().await.unwrap();
    assert_eq!(note_count(&db).await, 1);
}

#[tokio::test]
async fn test_writers_queue_behind_open_transaction() {
    let (_dir, db) = setup().await;
    let tx = db.begin().await.unwrap();

    let other = db.clone();
    let waiter = tokio::spawn(async move {
        let mut tx = other.begin().await.unwrap();
        tx.execute(&insert_note(&other, 2)).await.unwrap();
        tx.commit().await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(db.writer_stats().waiting, 1);
    tx.commit().await.unwrap();
    waiter.await.unwrap();

    let stats = db.writer_stats();
    assert_eq!(stats.acquisitions, 2);
    assert_eq!(stats.waiting, 0);
    assert!(stats.max_wait >= Duration::from_millis(40));
    assert_eq!(note_count(&db).await, 1);

    db.reset_writer_stats();
    assert_eq!(db.writer_stats().acquisitions, 0);
}

#[tokio::test]
async fn test_concurrent_writes_all_land() {
    let (_dir, db) = setup().await;
    let writes = (1..=8).map(|id| {
        let db = db.clone();
        async move { db.execute(&insert_note(&db, id)).await }
    });
    let affected: Vec<u64> = join_all(writes)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(affected, vec![1; 8]);
    assert_eq!(note_count(&db).await, 8);
    assert_eq!(db.writer_stats().acquisitions, 8);
}
