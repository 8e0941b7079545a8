//! Structures derived from content types.
//!
//! Saving a type can invalidate data computed from it, and deleting a type
//! must first remove its items. [`StructureRebuilder`] is the seam the
//! content type service calls for both.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::Result;
use crate::repository::ContentRepository;

/// Maintains the data derived from content types.
///
/// Both methods run on the caller's connection, inside its open transaction.
#[allow(async_fn_in_trait)]
pub trait StructureRebuilder: Send + Sync {
    /// Rebuilds whatever is derived from the types in `type_ids`.
    async fn rebuild_structures(&self, conn: &mut SqliteConnection, type_ids: &[i32]) -> Result<()>;

    /// Deletes the items of a type. Returns how many were deleted.
    async fn delete_items_of_type(&self, conn: &mut SqliteConnection, type_id: i32) -> Result<u64>;
}

/// Rebuilds the alias cache of content items and deletes items through
/// [`ContentRepository`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentStructureRebuilder;

impl StructureRebuilder for ContentStructureRebuilder {
    async fn rebuild_structures(&self, conn: &mut SqliteConnection, type_ids: &[i32]) -> Result<()> {
        for type_id in type_ids {
            let count = ContentRepository::new(&mut *conn)
                .refresh_alias(*type_id)
                .await?;
            debug!(type_id, count, "Rebuilt content item structures");
        }
        Ok(())
    }

    async fn delete_items_of_type(&self, conn: &mut SqliteConnection, type_id: i32) -> Result<u64> {
        ContentRepository::new(conn).delete_of_type(type_id).await
    }
}
