//! Node repository.

use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CmsError, Result};
use crate::node::{NewNode, Node, MAX_PATH_LENGTH, NODE_COLUMNS, ROOT_ID};

/// Reads and writes the content tree.
///
/// Every write that touches more than one row runs inside a nested
/// transaction (a savepoint when the connection is already in one), so a
/// failed call leaves the tree as it was.
#[derive(Debug)]
pub struct NodeRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> NodeRepository<'c> {
    /// Creates a repository over `conn`.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Loads a node by id.
    pub async fn get(&mut self, id: i32) -> Result<Option<Node>> {
        fetch(&mut *self.conn, id).await
    }

    /// Loads a node by its unique key.
    pub async fn get_by_key(&mut self, key: Uuid) -> Result<Option<Node>> {
        let node = sqlx::query_as::<_, Node>(&format!(
            r#"SELECT {} FROM "node" WHERE "uniqueId" = ?"#,
            NODE_COLUMNS
        ))
        .bind(key.to_string())
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(node)
    }

    /// Direct children of `id`, in sort order.
    pub async fn children(&mut self, id: i32) -> Result<Vec<Node>> {
        let nodes = sqlx::query_as::<_, Node>(&format!(
            r#"SELECT {} FROM "node" WHERE "parentId" = ? AND "id" <> "parentId" ORDER BY "sortOrder", "id""#,
            NODE_COLUMNS
        ))
        .bind(id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(nodes)
    }

    /// Every node below `id`, shallowest first.
    pub async fn descendants(&mut self, id: i32) -> Result<Vec<Node>> {
        let node = fetch(&mut *self.conn, id)
            .await?
            .ok_or(CmsError::NodeNotFound(id))?;

        let nodes = sqlx::query_as::<_, Node>(&format!(
            r#"SELECT {} FROM "node" WHERE "path" LIKE ? ORDER BY "level", "sortOrder", "id""#,
            NODE_COLUMNS
        ))
        .bind(subtree_pattern(&node.path))
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(nodes)
    }

    /// Creates a node as the last child of its parent.
    pub async fn create(&mut self, new: NewNode) -> Result<Node> {
        let mut tx = self.conn.begin().await?;

        let parent = fetch(&mut tx, new.parent_id)
            .await?
            .ok_or(CmsError::ParentNotFound(new.parent_id))?;
        let sort_order = next_sort_order(&mut tx, parent.id).await?;
        let unique_id = new.unique_id.unwrap_or_else(Uuid::new_v4);

        // The path needs the new id, so the row starts with its parent's path.
        let result = sqlx::query(
            r#"INSERT INTO "node" ("uniqueId", "parentId", "level", "path", "sortOrder", "nodeUser", "text", "nodeObjectType")
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(unique_id.to_string())
        .bind(parent.id)
        .bind(parent.level + 1)
        .bind(&parent.path)
        .bind(sort_order)
        .bind(new.user_id)
        .bind(new.text.as_deref())
        .bind(new.object_type.map(|t| t.to_string()))
        .execute(&mut *tx)
        .await?;

        let id = i32::try_from(result.last_insert_rowid())
            .map_err(|_| CmsError::Validation("node id out of range".to_string()))?;
        let path = format!("{},{}", parent.path, id);
        check_path_length(&path)?;

        sqlx::query(r#"UPDATE "node" SET "path" = ? WHERE "id" = ?"#)
            .bind(&path)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let node = fetch(&mut tx, id).await?.ok_or(CmsError::NodeNotFound(id))?;
        tx.commit().await?;

        debug!(id, path = %node.path, "Created node");
        Ok(node)
    }

    /// Moves `id` and its subtree to the end of `parent_id`'s children.
    pub async fn move_to(&mut self, id: i32, parent_id: i32) -> Result<Node> {
        let invalid = CmsError::InvalidMove {
            node: id,
            target: parent_id,
        };
        if id == ROOT_ID {
            return Err(invalid);
        }

        let mut tx = self.conn.begin().await?;

        let node = fetch(&mut tx, id).await?.ok_or(CmsError::NodeNotFound(id))?;
        let target = fetch(&mut tx, parent_id)
            .await?
            .ok_or(CmsError::ParentNotFound(parent_id))?;
        if target.id == node.id || node.is_ancestor_of(&target) {
            return Err(invalid);
        }

        let new_path = format!("{},{}", target.path, node.id);
        let new_level = target.level + 1;
        let pattern = subtree_pattern(&node.path);

        let (longest,): (i64,) =
            sqlx::query_as(r#"SELECT COALESCE(MAX(length("path")), 0) FROM "node" WHERE "path" LIKE ?"#)
                .bind(&pattern)
                .fetch_one(&mut *tx)
                .await?;
        check_path_length(&new_path)?;
        if longest > 0 {
            let longest = usize::try_from(longest).unwrap_or_default();
            check_path_length_of(longest - node.path.len() + new_path.len())?;
        }

        let sort_order = next_sort_order(&mut tx, target.id).await?;
        sqlx::query(
            r#"UPDATE "node" SET "parentId" = ?, "level" = ?, "path" = ?, "sortOrder" = ? WHERE "id" = ?"#,
        )
        .bind(target.id)
        .bind(new_level)
        .bind(&new_path)
        .bind(sort_order)
        .bind(node.id)
        .execute(&mut *tx)
        .await?;

        // substr() is 1-based: keep everything after the old path prefix.
        let moved = sqlx::query(
            r#"UPDATE "node" SET "path" = ? || substr("path", ?), "level" = "level" + ? WHERE "path" LIKE ?"#,
        )
        .bind(&new_path)
        .bind(i64::try_from(node.path.len() + 1).unwrap_or(i64::MAX))
        .bind(new_level - node.level)
        .bind(&pattern)
        .execute(&mut *tx)
        .await?;

        let updated = fetch(&mut tx, id).await?.ok_or(CmsError::NodeNotFound(id))?;
        tx.commit().await?;

        info!(
            id,
            from = %node.path,
            to = %new_path,
            descendants = moved.rows_affected(),
            "Moved node"
        );
        Ok(updated)
    }

    /// Sets the display text of a node.
    pub async fn rename(&mut self, id: i32, text: &str) -> Result<()> {
        let result = sqlx::query(r#"UPDATE "node" SET "text" = ? WHERE "id" = ?"#)
            .bind(text)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CmsError::NodeNotFound(id));
        }
        Ok(())
    }

    /// Sets the position of a node among its siblings.
    pub async fn set_sort_order(&mut self, id: i32, sort_order: i32) -> Result<()> {
        let result = sqlx::query(r#"UPDATE "node" SET "sortOrder" = ? WHERE "id" = ?"#)
            .bind(sort_order)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CmsError::NodeNotFound(id));
        }
        Ok(())
    }

    /// Flags a node and its whole subtree as trashed.
    ///
    /// Returns the number of nodes flagged.
    pub async fn trash(&mut self, id: i32) -> Result<u64> {
        if id == ROOT_ID {
            return Err(CmsError::Validation(
                "the root node cannot be trashed".to_string(),
            ));
        }

        let node = fetch(&mut *self.conn, id)
            .await?
            .ok_or(CmsError::NodeNotFound(id))?;
        let result =
            sqlx::query(r#"UPDATE "node" SET "trashed" = 1 WHERE "id" = ? OR "path" LIKE ?"#)
                .bind(id)
                .bind(subtree_pattern(&node.path))
                .execute(&mut *self.conn)
                .await?;

        info!(id, count = result.rows_affected(), "Trashed node");
        Ok(result.rows_affected())
    }

    /// Deletes a leaf node.
    pub async fn delete(&mut self, id: i32) -> Result<()> {
        if id == ROOT_ID {
            return Err(CmsError::Validation(
                "the root node cannot be deleted".to_string(),
            ));
        }

        let mut tx = self.conn.begin().await?;

        let (children,): (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM "node" WHERE "parentId" = ?"#)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if children > 0 {
            return Err(CmsError::HasDescendants(id));
        }

        let result = sqlx::query(r#"DELETE FROM "node" WHERE "id" = ?"#)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CmsError::NodeNotFound(id));
        }
        tx.commit().await?;

        debug!(id, "Deleted node");
        Ok(())
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: i32) -> Result<Option<Node>> {
    let node = sqlx::query_as::<_, Node>(&format!(
        r#"SELECT {} FROM "node" WHERE "id" = ?"#,
        NODE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(node)
}

async fn next_sort_order(conn: &mut SqliteConnection, parent_id: i32) -> Result<i32> {
    let (next,): (i32,) = sqlx::query_as(
        r#"SELECT COALESCE(MAX("sortOrder") + 1, 0) FROM "node" WHERE "parentId" = ? AND "id" <> "parentId""#,
    )
    .bind(parent_id)
    .fetch_one(conn)
    .await?;
    Ok(next)
}

fn subtree_pattern(path: &str) -> String {
    format!("{},%", path)
}

fn check_path_length(path: &str) -> Result<()> {
    check_path_length_of(path.len())
}

fn check_path_length_of(len: usize) -> Result<()> {
    if len > MAX_PATH_LENGTH {
        return Err(CmsError::Validation(format!(
            "node path would be {} characters, the limit is {}",
            len, MAX_PATH_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::migrated_pool;
    use sqlx::pool::PoolConnection;
    use sqlx::Sqlite;

    async fn conn() -> PoolConnection<Sqlite> {
        let pool = migrated_pool().await;
        pool.acquire().await.unwrap()
    }

    #[tokio::test]
    async fn test_root_exists() {
        let mut conn = conn().await;
        let mut repo = NodeRepository::new(&mut conn);

        let root = repo.get(ROOT_ID).await.unwrap().unwrap();
        assert!(root.is_root());
        assert_eq!(root.path, "-1");
        assert_eq!(root.level, 0);
        assert_eq!(root.parent_id, ROOT_ID);
    }

    #[tokio::test]
    async fn test_create_builds_path_and_level() {
        let mut conn = conn().await;
        let mut repo = NodeRepository::new(&mut conn);

        let home = repo.create(NewNode::under(ROOT_ID).text("Home")).await.unwrap();
        assert_eq!(home.id, 1060);
        assert_eq!(home.path, "-1,1060");
        assert_eq!(home.level, 1);
        assert_eq!(home.sort_order, 0);
        assert!(!home.trashed);

        let about = repo.create(NewNode::under(home.id).text("About")).await.unwrap();
        let blog = repo.create(NewNode::under(home.id).text("Blog")).await.unwrap();
        assert_eq!(about.path, "-1,1060,1061");
        assert_eq!(about.level, 2);
        assert_eq!(about.sort_order, 0);
        assert_eq!(blog.sort_order, 1);

        let children = repo.children(home.id).await.unwrap();
        let texts: Vec<_> = children.iter().filter_map(|n| n.text.as_deref()).collect();
        assert_eq!(texts, vec!["About", "Blog"]);

        let by_key = repo.get_by_key(blog.unique_id).await.unwrap().unwrap();
        assert_eq!(by_key.id, blog.id);
    }

    #[tokio::test]
    async fn test_create_under_missing_parent() {
        let mut conn = conn().await;
        let mut repo = NodeRepository::new(&mut conn);

        let err = repo.create(NewNode::under(4242)).await.unwrap_err();
        assert!(matches!(err, CmsError::ParentNotFound(4242)));
    }

    #[tokio::test]
    async fn test_dangling_parent_rejected_by_database() {
        let mut conn = conn().await;
        let result = sqlx::query(
            r#"INSERT INTO "node" ("uniqueId", "parentId", "level", "path", "sortOrder") VALUES (?, 4242, 1, '-1,4242', 0)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .execute(&mut *conn)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_move_rewrites_subtree() {
        let mut conn = conn().await;
        let mut repo = NodeRepository::new(&mut conn);

        let a = repo.create(NewNode::under(ROOT_ID).text("a")).await.unwrap();
        let b = repo.create(NewNode::under(ROOT_ID).text("b")).await.unwrap();
        let child = repo.create(NewNode::under(a.id)).await.unwrap();
        let grandchild = repo.create(NewNode::under(child.id)).await.unwrap();

        let moved = repo.move_to(a.id, b.id).await.unwrap();
        assert_eq!(moved.parent_id, b.id);
        assert_eq!(moved.level, 2);
        assert_eq!(moved.path, format!("-1,{},{}", b.id, a.id));

        let grandchild = repo.get(grandchild.id).await.unwrap().unwrap();
        assert_eq!(grandchild.level, 4);
        assert_eq!(
            grandchild.path,
            format!("-1,{},{},{},{}", b.id, a.id, child.id, grandchild.id)
        );

        let under_b = repo.descendants(b.id).await.unwrap();
        assert_eq!(under_b.len(), 3);
        assert_eq!(under_b[0].id, a.id);
    }

    #[tokio::test]
    async fn test_move_under_own_subtree_is_refused() {
        let mut conn = conn().await;
        let mut repo = NodeRepository::new(&mut conn);

        let a = repo.create(NewNode::under(ROOT_ID)).await.unwrap();
        let child = repo.create(NewNode::under(a.id)).await.unwrap();

        let err = repo.move_to(a.id, child.id).await.unwrap_err();
        assert!(matches!(err, CmsError::InvalidMove { .. }));
        let err = repo.move_to(a.id, a.id).await.unwrap_err();
        assert!(matches!(err, CmsError::InvalidMove { .. }));

        let child = repo.get(child.id).await.unwrap().unwrap();
        assert_eq!(child.path, format!("-1,{},{}", a.id, child.id));
    }

    #[tokio::test]
    async fn test_trash_flags_subtree() {
        let mut conn = conn().await;
        let mut repo = NodeRepository::new(&mut conn);

        let a = repo.create(NewNode::under(ROOT_ID)).await.unwrap();
        let child = repo.create(NewNode::under(a.id)).await.unwrap();
        let other = repo.create(NewNode::under(ROOT_ID)).await.unwrap();

        assert_eq!(repo.trash(a.id).await.unwrap(), 2);
        assert!(repo.get(child.id).await.unwrap().unwrap().trashed);
        assert!(!repo.get(other.id).await.unwrap().unwrap().trashed);
        assert!(repo.trash(ROOT_ID).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_requires_leaf() {
        let mut conn = conn().await;
        let mut repo = NodeRepository::new(&mut conn);

        let a = repo.create(NewNode::under(ROOT_ID)).await.unwrap();
        let child = repo.create(NewNode::under(a.id)).await.unwrap();

        let err = repo.delete(a.id).await.unwrap_err();
        assert!(matches!(err, CmsError::HasDescendants(id) if id == a.id));

        repo.delete(child.id).await.unwrap();
        repo.delete(a.id).await.unwrap();
        assert!(repo.get(a.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(a.id).await.unwrap_err(),
            CmsError::NodeNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_rename_and_sort_order() {
        let mut conn = conn().await;
        let mut repo = NodeRepository::new(&mut conn);

        let a = repo.create(NewNode::under(ROOT_ID).text("old")).await.unwrap();
        repo.rename(a.id, "new").await.unwrap();
        repo.set_sort_order(a.id, 7).await.unwrap();

        let a = repo.get(a.id).await.unwrap().unwrap();
        assert_eq!(a.text.as_deref(), Some("new"));
        assert_eq!(a.sort_order, 7);
        assert!(matches!(
            repo.rename(9999, "x").await.unwrap_err(),
            CmsError::NodeNotFound(9999)
        ));
    }

    #[tokio::test]
    async fn test_path_limit_rolls_back() {
        let mut conn = conn().await;
        let mut repo = NodeRepository::new(&mut conn);

        // Each level adds five characters (",1060"), so the limit hits
        // before thirty levels.
        let mut parent = ROOT_ID;
        let mut created = 0;
        let err = loop {
            match repo.create(NewNode::under(parent)).await {
                Ok(node) => {
                    parent = node.id;
                    created += 1;
                }
                Err(err) => break err,
            }
        };
        assert!(matches!(err, CmsError::Validation(_)));
        assert!(created > 20);

        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "node""#)
            .fetch_one(&mut *repo.conn)
            .await
            .unwrap();
        assert_eq!(count, created + 1);
    }
}
