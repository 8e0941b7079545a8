//! Per-kind write locks for content types.

use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::content_type::ContentTypeKind;

/// One reader/writer lock per content type kind.
///
/// Saving member types does not wait on a document type save. Clones share
/// the same locks, so every service handed a clone serializes against the
/// others. Tokio's lock is fair: a waiting writer is served before readers
/// that arrive after it.
#[derive(Debug, Clone, Default)]
pub struct TypeLocks {
    document: Arc<RwLock<()>>,
    media: Arc<RwLock<()>>,
    member: Arc<RwLock<()>>,
}

impl TypeLocks {
    /// Creates a fresh set of locks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, kind: ContentTypeKind) -> &Arc<RwLock<()>> {
        match kind {
            ContentTypeKind::Document => &self.document,
            ContentTypeKind::Media => &self.media,
            ContentTypeKind::Member => &self.member,
        }
    }

    /// Waits for shared access to `kind`.
    pub async fn read(&self, kind: ContentTypeKind) -> OwnedRwLockReadGuard<()> {
        Arc::clone(self.lock(kind)).read_owned().await
    }

    /// Waits for exclusive access to `kind`.
    pub async fn write(&self, kind: ContentTypeKind) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(self.lock(kind)).write_owned().await
    }

    /// Takes exclusive access to `kind` if nobody holds it.
    #[must_use]
    pub fn try_write(&self, kind: ContentTypeKind) -> Option<OwnedRwLockWriteGuard<()>> {
        Arc::clone(self.lock(kind)).try_write_owned().ok()
    }
}
