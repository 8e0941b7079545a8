//! Content type repository.

use sqlx::{Connection, SqliteConnection};
use tracing::debug;
use uuid::Uuid;

use crate::content_type::{ContentType, ContentTypeKind, MAX_ALIAS_LENGTH};
use crate::error::{CmsError, Result};
use crate::node::{NewNode, ROOT_ID};
use crate::repository::node::NodeRepository;

const SELECT_CONTENT_TYPES: &str = r#"SELECT "id", "uniqueId", "text", "nodeUser", "nodeObjectType", "alias", "description"
FROM "contentType" JOIN "node" ON "node"."id" = "contentType"."nodeId""#;

/// Reads and writes content types.
#[derive(Debug)]
pub struct ContentTypeRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ContentTypeRepository<'c> {
    /// Creates a repository over `conn`.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Loads a type by id.
    pub async fn get(&mut self, id: i32) -> Result<Option<ContentType>> {
        let ct = sqlx::query_as::<_, ContentType>(&format!(
            r#"{} WHERE "nodeId" = ?"#,
            SELECT_CONTENT_TYPES
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(ct)
    }

    /// Loads a type by key.
    pub async fn get_by_key(&mut self, key: Uuid) -> Result<Option<ContentType>> {
        let ct = sqlx::query_as::<_, ContentType>(&format!(
            r#"{} WHERE "uniqueId" = ?"#,
            SELECT_CONTENT_TYPES
        ))
        .bind(key.to_string())
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(ct)
    }

    /// Loads a type by alias.
    pub async fn get_by_alias(&mut self, alias: &str) -> Result<Option<ContentType>> {
        let ct = sqlx::query_as::<_, ContentType>(&format!(
            r#"{} WHERE "alias" = ?"#,
            SELECT_CONTENT_TYPES
        ))
        .bind(alias)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(ct)
    }

    /// Loads the types of `kind` with the given ids, or all of them when
    /// `ids` is empty. Ordered by name.
    pub async fn get_all(&mut self, kind: ContentTypeKind, ids: &[i32]) -> Result<Vec<ContentType>> {
        let mut sql = format!(r#"{} WHERE "nodeObjectType" = ?"#, SELECT_CONTENT_TYPES);
        if !ids.is_empty() {
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(r#" AND "nodeId" IN ({})"#, placeholders));
        }
        sql.push_str(r#" ORDER BY "text", "nodeId""#);

        let mut query = sqlx::query_as::<_, ContentType>(&sql).bind(kind.object_type().to_string());
        for id in ids {
            query = query.bind(*id);
        }
        Ok(query.fetch_all(&mut *self.conn).await?)
    }

    /// Inserts or updates `ct`. A new type gets its id and a backing node
    /// under the root.
    pub async fn save(&mut self, ct: &mut ContentType) -> Result<()> {
        validate(ct)?;
        let mut tx = self.conn.begin().await?;

        if ct.is_new() {
            let node = NodeRepository::new(&mut tx)
                .create(
                    NewNode::under(ROOT_ID)
                        .text(ct.name.clone())
                        .object_type(ct.kind.object_type())
                        .unique_id(ct.key)
                        .user(ct.creator_id),
                )
                .await?;

            sqlx::query(r#"INSERT INTO "contentType" ("nodeId", "alias", "description") VALUES (?, ?, ?)"#)
                .bind(node.id)
                .bind(&ct.alias)
                .bind(ct.description.as_deref())
                .execute(&mut *tx)
                .await?;

            ct.id = node.id;
            debug!(id = ct.id, alias = %ct.alias, "Inserted content type");
        } else {
            let updated = sqlx::query(
                r#"UPDATE "contentType" SET "alias" = ?, "description" = ? WHERE "nodeId" = ?"#,
            )
            .bind(&ct.alias)
            .bind(ct.description.as_deref())
            .bind(ct.id)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                return Err(CmsError::ContentTypeNotFound(ct.alias.clone()));
            }

            sqlx::query(r#"UPDATE "node" SET "text" = ?, "nodeUser" = ? WHERE "id" = ?"#)
                .bind(&ct.name)
                .bind(ct.creator_id)
                .bind(ct.id)
                .execute(&mut *tx)
                .await?;

            debug!(id = ct.id, alias = %ct.alias, "Updated content type");
        }

        tx.commit().await?;
        Ok(())
    }

    /// Deletes a type and its backing node.
    pub async fn delete(&mut self, id: i32) -> Result<()> {
        let mut tx = self.conn.begin().await?;

        let deleted = sqlx::query(r#"DELETE FROM "contentType" WHERE "nodeId" = ?"#)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(CmsError::ContentTypeNotFound(id.to_string()));
        }
        NodeRepository::new(&mut tx).delete(id).await?;

        tx.commit().await?;
        debug!(id, "Deleted content type");
        Ok(())
    }
}

fn validate(ct: &ContentType) -> Result<()> {
    if ct.alias.trim().is_empty() {
        return Err(CmsError::Validation("content type alias is empty".to_string()));
    }
    if ct.alias.len() > MAX_ALIAS_LENGTH {
        return Err(CmsError::Validation(format!(
            "content type alias '{}' exceeds {} characters",
            ct.alias, MAX_ALIAS_LENGTH
        )));
    }
    if ct.name.trim().is_empty() {
        return Err(CmsError::Validation(format!(
            "content type '{}' has no name",
            ct.alias
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::migrated_pool;

    #[tokio::test]
    async fn test_insert_and_load() {
        let pool = migrated_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ContentTypeRepository::new(&mut conn);

        let mut ct = ContentType::new(ContentTypeKind::Member, "member", "Member")
            .with_description("Site members");
        ct.creator_id = 7;
        repo.save(&mut ct).await.unwrap();
        assert_eq!(ct.id, 1060);

        let loaded = repo.get(ct.id).await.unwrap().unwrap();
        assert_eq!(loaded, ct);
        assert_eq!(repo.get_by_key(ct.key).await.unwrap().unwrap().id, ct.id);
        assert_eq!(repo.get_by_alias("member").await.unwrap().unwrap().id, ct.id);
        assert!(repo.get_by_alias("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_changes_node_and_row() {
        let pool = migrated_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ContentTypeRepository::new(&mut conn);

        let mut ct = ContentType::new(ContentTypeKind::Document, "article", "Article");
        repo.save(&mut ct).await.unwrap();

        ct.alias = "post".to_string();
        ct.name = "Blog post".to_string();
        ct.description = None;
        repo.save(&mut ct).await.unwrap();

        let loaded = repo.get(ct.id).await.unwrap().unwrap();
        assert_eq!(loaded.alias, "post");
        assert_eq!(loaded.name, "Blog post");
    }

    #[tokio::test]
    async fn test_get_all_filters_by_kind_and_ids() {
        let pool = migrated_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ContentTypeRepository::new(&mut conn);

        let mut article = ContentType::new(ContentTypeKind::Document, "article", "Article");
        let mut page = ContentType::new(ContentTypeKind::Document, "page", "Page");
        let mut image = ContentType::new(ContentTypeKind::Media, "image", "Image");
        for ct in [&mut article, &mut page, &mut image] {
            repo.save(ct).await.unwrap();
        }

        let documents = repo.get_all(ContentTypeKind::Document, &[]).await.unwrap();
        let aliases: Vec<_> = documents.iter().map(|ct| ct.alias.as_str()).collect();
        assert_eq!(aliases, vec!["article", "page"]);

        let some = repo
            .get_all(ContentTypeKind::Document, &[page.id, image.id])
            .await
            .unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].alias, "page");
    }

    #[tokio::test]
    async fn test_duplicate_alias_rolls_back_node() {
        let pool = migrated_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ContentTypeRepository::new(&mut conn);

        let mut first = ContentType::new(ContentTypeKind::Document, "article", "Article");
        repo.save(&mut first).await.unwrap();
        let mut second = ContentType::new(ContentTypeKind::Document, "article", "Other");
        assert!(matches!(
            repo.save(&mut second).await.unwrap_err(),
            CmsError::Database(_)
        ));
        assert!(second.is_new());

        let (nodes,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "node""#)
            .fetch_one(&mut *repo.conn)
            .await
            .unwrap();
        assert_eq!(nodes, 2);
    }

    #[tokio::test]
    async fn test_validation() {
        let pool = migrated_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ContentTypeRepository::new(&mut conn);

        let mut ct = ContentType::new(ContentTypeKind::Document, " ", "Blank");
        assert!(matches!(
            repo.save(&mut ct).await.unwrap_err(),
            CmsError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_node() {
        let pool = migrated_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ContentTypeRepository::new(&mut conn);

        let mut ct = ContentType::new(ContentTypeKind::Media, "image", "Image");
        repo.save(&mut ct).await.unwrap();
        repo.delete(ct.id).await.unwrap();

        assert!(repo.get(ct.id).await.unwrap().is_none());
        assert!(NodeRepository::new(&mut *repo.conn)
            .get(ct.id)
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            repo.delete(ct.id).await.unwrap_err(),
            CmsError::ContentTypeNotFound(_)
        ));
    }
}
