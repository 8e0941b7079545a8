//! Content item repository.

use sqlx::{Connection, SqliteConnection};
use tracing::debug;

use crate::content::ContentItem;
use crate::content_type::ContentType;
use crate::error::{CmsError, Result};
use crate::node::{NewNode, NODE_COLUMNS};
use crate::repository::node::NodeRepository;

/// Reads and writes content items.
#[derive(Debug)]
pub struct ContentRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ContentRepository<'c> {
    /// Creates a repository over `conn`.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Creates an item of `content_type` at the node described by `new`.
    pub async fn create(&mut self, content_type: &ContentType, new: NewNode) -> Result<ContentItem> {
        if content_type.is_new() {
            return Err(CmsError::ContentTypeNotFound(content_type.alias.clone()));
        }

        let mut tx = self.conn.begin().await?;
        let node = NodeRepository::new(&mut tx)
            .create(new.object_type(content_type.kind.item_object_type()))
            .await?;

        sqlx::query(
            r#"INSERT INTO "content" ("nodeId", "contentTypeId", "contentTypeAlias") VALUES (?, ?, ?)"#,
        )
        .bind(node.id)
        .bind(content_type.id)
        .bind(&content_type.alias)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(id = node.id, content_type = %content_type.alias, "Created content item");
        Ok(ContentItem {
            node,
            content_type_id: content_type.id,
            content_type_alias: Some(content_type.alias.clone()),
        })
    }

    /// Loads an item by node id.
    pub async fn get(&mut self, id: i32) -> Result<Option<ContentItem>> {
        let item = sqlx::query_as::<_, ContentItem>(&format!(
            r#"SELECT {}, "contentTypeId", "contentTypeAlias" FROM "content" JOIN "node" ON "node"."id" = "content"."nodeId" WHERE "nodeId" = ?"#,
            NODE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(item)
    }

    /// Items of a content type, deepest first.
    pub async fn items_of_type(&mut self, content_type_id: i32) -> Result<Vec<ContentItem>> {
        let items = sqlx::query_as::<_, ContentItem>(&format!(
            r#"SELECT {}, "contentTypeId", "contentTypeAlias" FROM "content" JOIN "node" ON "node"."id" = "content"."nodeId"
               WHERE "contentTypeId" = ? ORDER BY "level" DESC, "sortOrder", "id""#,
            NODE_COLUMNS
        ))
        .bind(content_type_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(items)
    }

    /// Copies the current alias of a content type onto its items.
    pub async fn refresh_alias(&mut self, content_type_id: i32) -> Result<u64> {
        let result = sqlx::query(
            r#"UPDATE "content" SET "contentTypeAlias" =
                 (SELECT "alias" FROM "contentType" WHERE "contentType"."nodeId" = "content"."contentTypeId")
               WHERE "contentTypeId" = ?"#,
        )
        .bind(content_type_id)
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Deletes every item of a content type along with its node.
    ///
    /// Fails with [`CmsError::HasDescendants`], deleting nothing, when an
    /// item still has children of another type.
    pub async fn delete_of_type(&mut self, content_type_id: i32) -> Result<u64> {
        let items = self.items_of_type(content_type_id).await?;
        let mut tx = self.conn.begin().await?;

        sqlx::query(r#"DELETE FROM "content" WHERE "contentTypeId" = ?"#)
            .bind(content_type_id)
            .execute(&mut *tx)
            .await?;
        for item in &items {
            NodeRepository::new(&mut tx).delete(item.node.id).await?;
        }
        tx.commit().await?;

        debug!(content_type_id, count = items.len(), "Deleted content items");
        Ok(items.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_type::ContentTypeKind;
    use crate::node::ROOT_ID;
    use crate::repository::ContentTypeRepository;
    use crate::testing::migrated_pool;

    #[tokio::test]
    async fn test_create_and_list_items() {
        let pool = migrated_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let mut article = ContentType::new(ContentTypeKind::Document, "article", "Article");
        ContentTypeRepository::new(&mut conn)
            .save(&mut article)
            .await
            .unwrap();

        let mut repo = ContentRepository::new(&mut conn);
        let first = repo
            .create(&article, NewNode::under(ROOT_ID).text("Hello"))
            .await
            .unwrap();
        let reply = repo
            .create(&article, NewNode::under(first.node.id).text("Reply"))
            .await
            .unwrap();
        assert_eq!(
            first.node.object_type,
            Some(ContentTypeKind::Document.item_object_type())
        );

        let items = repo.items_of_type(article.id).await.unwrap();
        let ids: Vec<_> = items.iter().map(|item| item.node.id).collect();
        assert_eq!(ids, vec![reply.node.id, first.node.id]);

        let loaded = repo.get(first.node.id).await.unwrap().unwrap();
        assert_eq!(loaded.content_type_alias.as_deref(), Some("article"));
    }

    #[tokio::test]
    async fn test_delete_of_type_removes_nested_items() {
        let pool = migrated_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let mut article = ContentType::new(ContentTypeKind::Document, "article", "Article");
        ContentTypeRepository::new(&mut conn)
            .save(&mut article)
            .await
            .unwrap();

        let mut repo = ContentRepository::new(&mut conn);
        let first = repo
            .create(&article, NewNode::under(ROOT_ID))
            .await
            .unwrap();
        repo.create(&article, NewNode::under(first.node.id))
            .await
            .unwrap();

        assert_eq!(repo.delete_of_type(article.id).await.unwrap(), 2);
        assert!(repo.items_of_type(article.id).await.unwrap().is_empty());
        assert!(repo.get(first.node.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsaved_type_is_rejected() {
        let pool = migrated_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let article = ContentType::new(ContentTypeKind::Document, "article", "Article");

        let err = ContentRepository::new(&mut conn)
            .create(&article, NewNode::under(ROOT_ID))
            .await
            .unwrap_err();
        assert!(matches!(err, CmsError::ContentTypeNotFound(_)));
    }
}
