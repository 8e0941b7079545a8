//! Unit of work over a lazily begun transaction.

use std::fmt;

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::Result;
use crate::repository::{ContentRepository, ContentTypeRepository, NodeRepository};

/// Groups repository calls into transactions.
///
/// No transaction is open until a repository or the connection is first
/// requested. [`commit`](Self::commit) closes the current transaction and may
/// be called any number of times: the next access opens a fresh one. Dropping
/// the unit of work rolls back whatever has not been committed.
pub struct UnitOfWork {
    pool: SqlitePool,
    tx: Option<Transaction<'static, Sqlite>>,
    commits: usize,
}

impl UnitOfWork {
    /// Creates a unit of work over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tx: None,
            commits: 0,
        }
    }

    /// The connection of the current transaction, opening one if needed.
    pub async fn connection(&mut self) -> Result<&mut SqliteConnection> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                debug!("Beginning unit of work transaction");
                self.pool.begin().await?
            }
        };
        Ok(&mut **self.tx.insert(tx))
    }

    /// Node repository bound to the current transaction.
    pub async fn nodes(&mut self) -> Result<NodeRepository<'_>> {
        Ok(NodeRepository::new(self.connection().await?))
    }

    /// Content type repository bound to the current transaction.
    pub async fn content_types(&mut self) -> Result<ContentTypeRepository<'_>> {
        Ok(ContentTypeRepository::new(self.connection().await?))
    }

    /// Content item repository bound to the current transaction.
    pub async fn contents(&mut self) -> Result<ContentRepository<'_>> {
        Ok(ContentRepository::new(self.connection().await?))
    }

    /// Commits the current transaction, if any.
    pub async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        self.commits += 1;
        debug!(commits = self.commits, "Committed unit of work");
        Ok(())
    }

    /// Rolls back the current transaction, if any.
    pub async fn rollback(mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }

    /// Returns true while a transaction is open.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.tx.is_some()
    }

    /// Number of times [`commit`](Self::commit) was called.
    #[must_use]
    pub const fn commits(&self) -> usize {
        self.commits
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("active", &self.is_active())
            .field("commits", &self.commits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NewNode, ROOT_ID};
    use crate::testing::migrated_pool;

    async fn node_count(pool: &SqlitePool) -> i64 {
        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "node""#)
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn test_lazy_begin() {
        let pool = migrated_pool().await;
        let mut uow = UnitOfWork::new(pool);
        assert!(!uow.is_active());

        uow.nodes().await.unwrap();
        assert!(uow.is_active());
    }

    #[tokio::test]
    async fn test_repeated_commits_open_fresh_transactions() {
        let pool = migrated_pool().await;
        let mut uow = UnitOfWork::new(pool.clone());

        uow.nodes()
            .await
            .unwrap()
            .create(NewNode::under(ROOT_ID))
            .await
            .unwrap();
        uow.commit().await.unwrap();
        assert!(!uow.is_active());

        uow.nodes()
            .await
            .unwrap()
            .create(NewNode::under(ROOT_ID))
            .await
            .unwrap();
        uow.commit().await.unwrap();
        assert_eq!(uow.commits(), 2);
        drop(uow);

        assert_eq!(node_count(&pool).await, 3);
    }

    #[tokio::test]
    async fn test_drop_rolls_back_uncommitted_work() {
        let pool = migrated_pool().await;
        let mut uow = UnitOfWork::new(pool.clone());

        uow.nodes()
            .await
            .unwrap()
            .create(NewNode::under(ROOT_ID))
            .await
            .unwrap();
        uow.commit().await.unwrap();
        uow.nodes()
            .await
            .unwrap()
            .create(NewNode::under(ROOT_ID))
            .await
            .unwrap();
        drop(uow);

        assert_eq!(node_count(&pool).await, 2);
    }

    #[tokio::test]
    async fn test_explicit_rollback() {
        let pool = migrated_pool().await;
        let mut uow = UnitOfWork::new(pool.clone());

        uow.nodes()
            .await
            .unwrap()
            .create(NewNode::under(ROOT_ID))
            .await
            .unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(node_count(&pool).await, 1);
    }
}
