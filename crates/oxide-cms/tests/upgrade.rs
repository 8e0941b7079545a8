//! Opens file-backed databases the way successive releases would.

use std::path::Path;

use oxide_cms::migrations::{self, CreateContentTypeTable, CreateNodeTable, InsertRootNode};
use oxide_cms::prelude::*;
use oxide_migrate::prelude::{MigrateError, MigrationPlan};

fn url(path: &Path) -> String {
    format!("sqlite:{}", path.display())
}

fn release_8_0() -> MigrationPlan {
    let mut plan = MigrationPlan::new(migrations::PRODUCT);
    plan.register::<CreateNodeTable>()
        .unwrap()
        .register::<InsertRootNode>()
        .unwrap()
        .register::<CreateContentTypeTable>()
        .unwrap();
    plan
}

#[tokio::test]
async fn upgrade_from_8_0_keeps_content() {
    let dir = tempfile::tempdir().unwrap();
    let url = url(&dir.path().join("cms.sqlite3"));

    {
        let db = DatabaseConfig::new(&url)
            .run_migrations(false)
            .connect()
            .await
            .unwrap();
        let report = db.runner().run(&release_8_0()).await.unwrap();
        assert_eq!(report.applied().len(), 3);

        let mut uow = db.unit_of_work();
        let home = uow
            .nodes()
            .await
            .unwrap()
            .create(NewNode::under(ROOT_ID).text("Home"))
            .await
            .unwrap();
        assert_eq!(home.id, 1060);
        uow.commit().await.unwrap();
        db.close().await;
    }

    let db = DatabaseConfig::new(&url).connect().await.unwrap();
    let ledger = db.runner().ledger().clone();
    assert_eq!(ledger.count(migrations::PRODUCT).await.unwrap(), 5);
    assert_eq!(
        ledger
            .last_applied(migrations::PRODUCT)
            .await
            .unwrap()
            .unwrap()
            .step,
        "8.1.0/create_content_table"
    );

    let mut uow = db.unit_of_work();
    let home = uow.nodes().await.unwrap().get(1060).await.unwrap().unwrap();
    assert_eq!(home.text.as_deref(), Some("Home"));
    drop(uow);

    let members = db.content_types(ContentTypeKind::Member);
    let mut member = ContentType::new(ContentTypeKind::Member, "member", "Member")
        .with_description("Site members");
    assert_eq!(members.save(&mut member, 0).await.unwrap(), SaveOutcome::Saved);
    assert_eq!(member.id, 1061);

    let loaded = members.get_by_alias("member").await.unwrap().unwrap();
    assert_eq!(loaded.description.as_deref(), Some("Site members"));
}

#[tokio::test]
async fn startup_fails_fast_on_conflicting_schema() {
    let dir = tempfile::tempdir().unwrap();
    let url = url(&dir.path().join("conflict.sqlite3"));

    {
        let db = DatabaseConfig::new(&url)
            .run_migrations(false)
            .connect()
            .await
            .unwrap();
        sqlx::query(r#"CREATE TABLE "node" ("id" INTEGER PRIMARY KEY)"#)
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;
    }

    let err = DatabaseConfig::new(&url).connect().await.unwrap_err();
    match err {
        CmsError::Migrate(err) => {
            assert_eq!(err.step(), Some("8.0.0/create_node_table"));
            assert!(matches!(
                err,
                MigrateError::InStep { ref source, .. }
                    if matches!(**source, MigrateError::SchemaConflict { kind: "table", .. })
            ));
        }
        other => panic!("unexpected error: {other}"),
    }

    let db = DatabaseConfig::new(&url)
        .run_migrations(false)
        .connect()
        .await
        .unwrap();
    db.runner().init().await.unwrap();
    assert_eq!(
        db.runner().ledger().count(migrations::PRODUCT).await.unwrap(),
        0
    );
}
