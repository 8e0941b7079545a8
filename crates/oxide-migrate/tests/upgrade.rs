//! Runs plans against a file-backed database across separate pools, the way
//! successive releases of an application would.

use std::path::Path;

use oxide_migrate::prelude::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

async fn open(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to open database file")
}

fn create_document(m: &mut MigrationBuilder) {
    m.create().table(
        TableSchema::new("document")
            .column(ColumnSchema::new("id", SqlType::Integer).identity(1000))
            .column(ColumnSchema::new("title", SqlType::Varchar(200)).not_null())
            .primary_key(PrimaryKeySchema::new("PK_document", &["id"]))
            .index("IX_document_title", &["title"]),
    );
}

fn add_published(m: &mut MigrationBuilder) {
    m.alter().table("document").add_column(
        ColumnSchema::new("published", SqlType::Boolean)
            .not_null()
            .default(DefaultValue::Bool(false)),
    );
}

fn reindex_title(m: &mut MigrationBuilder) {
    m.execute().code(|ctx| {
        let mut local = ctx.local_migration();
        for index in ctx.schema.index_names_on("document") {
            local.delete().index(index).on_table("document");
        }
        local.create().index(IndexSchema::new(
            "IX_document_title_published",
            "document",
            &["title", "published"],
        ));
        local.get_sql()
    });
}

fn first_release() -> MigrationPlan {
    let mut plan = MigrationPlan::new("docs");
    plan.add("1.0.0", "create_document", create_document).unwrap();
    plan
}

fn second_release() -> MigrationPlan {
    let mut plan = first_release();
    plan.add("1.1.0", "add_published", add_published).unwrap();
    plan.add("1.1.0", "reindex_title", reindex_title).unwrap();
    plan
}

#[tokio::test]
async fn upgrade_applies_only_new_steps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docs.sqlite3");

    {
        let pool = open(&path).await;
        let runner = MigrationRunner::new(pool.clone(), SqliteDialect::new());
        let report = runner.run(&first_release()).await.unwrap();
        assert_eq!(report.applied(), vec!["1.0.0/create_document"]);
        pool.close().await;
    }

    let pool = open(&path).await;
    let runner = MigrationRunner::new(pool.clone(), SqliteDialect::new());
    let report = runner.run(&second_release()).await.unwrap();
    assert_eq!(report.skipped(), vec!["1.0.0/create_document"]);
    assert_eq!(
        report.applied(),
        vec!["1.1.0/add_published", "1.1.0/reindex_title"]
    );

    let mut conn = pool.acquire().await.unwrap();
    let schema = conn.introspect().await.unwrap();
    assert!(schema.has_column("document", "published"));
    assert_eq!(
        schema.index_names_on("document"),
        vec!["IX_document_title_published"]
    );
    drop(conn);

    let last = runner.ledger().last_applied("docs").await.unwrap().unwrap();
    assert_eq!(last.step, "1.1.0/reindex_title");
}

#[tokio::test]
async fn identity_starts_at_seed() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open(&dir.path().join("seed.sqlite3")).await;
    let runner = MigrationRunner::new(pool.clone(), SqliteDialect::new());
    runner.run(&first_release()).await.unwrap();

    let (id,): (i64,) =
        sqlx::query_as("INSERT INTO document (title) VALUES ('Home') RETURNING id")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(id, 1000);
}

#[tokio::test]
async fn failed_upgrade_resumes_after_fix() {
    fn broken(m: &mut MigrationBuilder) {
        m.alter().table("document").add_column(ColumnSchema::new("slug", SqlType::Text));
        m.execute().sql("UPDATE document SET nonexistent = 1");
    }

    fn fixed(m: &mut MigrationBuilder) {
        m.alter().table("document").add_column(ColumnSchema::new("slug", SqlType::Text));
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resume.sqlite3");

    {
        let pool = open(&path).await;
        let runner = MigrationRunner::new(pool.clone(), SqliteDialect::new());
        let mut plan = first_release();
        plan.add("1.2.0", "add_slug", broken).unwrap();

        let err = runner.run(&plan).await.unwrap_err();
        assert_eq!(err.step(), Some("1.2.0/add_slug"));
        pool.close().await;
    }

    let pool = open(&path).await;
    let runner = MigrationRunner::new(pool, SqliteDialect::new());
    let mut plan = first_release();
    plan.add("1.2.0", "add_slug", fixed).unwrap();

    // The rolled-back column is gone, so the fixed step applies cleanly.
    let report = runner.run(&plan).await.unwrap();
    assert_eq!(report.applied(), vec!["1.2.0/add_slug"]);
    assert_eq!(runner.ledger().count("docs").await.unwrap(), 2);
}
