//! Content type service.
//!
//! Writes for one kind of content type are serialized through the kind's
//! write lock and announced through the [`EventDispatcher`]. A save commits
//! twice: once for the types themselves and once more after the derived
//! structures have been rebuilt. A failed rebuild therefore leaves the saved
//! types in place and only loses the rebuild.

use std::slice;

use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::content_type::{ContentType, ContentTypeKind};
use crate::error::{CmsError, Result};
use crate::events::{ContentTypeEvent, ContentTypeEventKind, EventDispatcher, NoopDispatcher};
use crate::locks::TypeLocks;
use crate::rebuild::{ContentStructureRebuilder, StructureRebuilder};
use crate::repository::ContentTypeRepository;
use crate::unit_of_work::UnitOfWork;

/// Result of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The types were saved.
    Saved,
    /// A `Saving` handler cancelled the save; nothing was written.
    Cancelled,
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The types and their items were deleted.
    Deleted,
    /// A `Deleting` handler cancelled the delete; nothing was written.
    Cancelled,
}

/// Reads and writes the content types of one kind.
#[derive(Debug, Clone)]
pub struct ContentTypeService<E = NoopDispatcher, R = ContentStructureRebuilder> {
    pool: SqlitePool,
    kind: ContentTypeKind,
    locks: TypeLocks,
    events: E,
    rebuilder: R,
}

impl ContentTypeService {
    /// Creates a service for `kind` with no event handlers.
    pub fn new(pool: SqlitePool, kind: ContentTypeKind, locks: TypeLocks) -> Self {
        Self {
            pool,
            kind,
            locks,
            events: NoopDispatcher,
            rebuilder: ContentStructureRebuilder,
        }
    }
}

impl<E: EventDispatcher, R: StructureRebuilder> ContentTypeService<E, R> {
    /// Replaces the event dispatcher.
    pub fn with_events<E2: EventDispatcher>(self, events: E2) -> ContentTypeService<E2, R> {
        ContentTypeService {
            pool: self.pool,
            kind: self.kind,
            locks: self.locks,
            events,
            rebuilder: self.rebuilder,
        }
    }

    /// Replaces the structure rebuilder.
    pub fn with_rebuilder<R2: StructureRebuilder>(self, rebuilder: R2) -> ContentTypeService<E, R2> {
        ContentTypeService {
            pool: self.pool,
            kind: self.kind,
            locks: self.locks,
            events: self.events,
            rebuilder,
        }
    }

    /// The kind served.
    #[must_use]
    pub const fn kind(&self) -> ContentTypeKind {
        self.kind
    }

    /// Loads a type by id.
    pub async fn get(&self, id: i32) -> Result<Option<ContentType>> {
        let _guard = self.locks.read(self.kind).await;
        let mut conn = self.pool.acquire().await?;
        let ct = ContentTypeRepository::new(&mut conn).get(id).await?;
        Ok(ct.filter(|ct| ct.kind == self.kind))
    }

    /// Loads a type by key.
    pub async fn get_by_key(&self, key: Uuid) -> Result<Option<ContentType>> {
        let _guard = self.locks.read(self.kind).await;
        let mut conn = self.pool.acquire().await?;
        let ct = ContentTypeRepository::new(&mut conn).get_by_key(key).await?;
        Ok(ct.filter(|ct| ct.kind == self.kind))
    }

    /// Loads a type by alias.
    pub async fn get_by_alias(&self, alias: &str) -> Result<Option<ContentType>> {
        let _guard = self.locks.read(self.kind).await;
        let mut conn = self.pool.acquire().await?;
        let ct = ContentTypeRepository::new(&mut conn)
            .get_by_alias(alias)
            .await?;
        Ok(ct.filter(|ct| ct.kind == self.kind))
    }

    /// Loads the types with the given ids, or every type when `ids` is
    /// empty.
    pub async fn get_all(&self, ids: &[i32]) -> Result<Vec<ContentType>> {
        let _guard = self.locks.read(self.kind).await;
        let mut conn = self.pool.acquire().await?;
        ContentTypeRepository::new(&mut conn)
            .get_all(self.kind, ids)
            .await
    }

    /// Saves one type on behalf of `user_id`.
    pub async fn save(&self, content_type: &mut ContentType, user_id: i32) -> Result<SaveOutcome> {
        self.save_many(slice::from_mut(content_type), user_id).await
    }

    /// Saves several types on behalf of `user_id`.
    ///
    /// New types get their ids assigned in place.
    pub async fn save_many(&self, types: &mut [ContentType], user_id: i32) -> Result<SaveOutcome> {
        self.check_kind(types)?;
        let _guard = self.locks.write(self.kind).await;
        let mut uow = UnitOfWork::new(self.pool.clone());

        let saving = ContentTypeEvent::new(ContentTypeEventKind::Saving, types);
        if self.events.dispatch_cancelable(&saving) {
            uow.commit().await?;
            info!(kind = %self.kind, count = types.len(), "Save cancelled");
            return Ok(SaveOutcome::Cancelled);
        }

        // Ids assigned by a batch that is later rolled back must not stick,
        // or the types look saved and can never be retried.
        let previous: Vec<(i32, i32)> = types.iter().map(|ct| (ct.id, ct.creator_id)).collect();
        let upserted = match upsert(&mut uow, types, user_id).await {
            Ok(()) => uow.commit().await,
            Err(err) => Err(err),
        };
        if let Err(err) = upserted {
            for (ct, (id, creator_id)) in types.iter_mut().zip(previous) {
                ct.id = id;
                ct.creator_id = creator_id;
            }
            warn!(kind = %self.kind, error = %err, "Could not save content types");
            return Err(err);
        }

        let ids: Vec<i32> = types.iter().map(|ct| ct.id).collect();
        let conn = uow.connection().await?;
        if let Err(err) = self.rebuilder.rebuild_structures(conn, &ids).await {
            warn!(kind = %self.kind, ?ids, error = %err, "Saved types but could not rebuild structures");
            return Err(err);
        }
        uow.commit().await?;

        self.events
            .dispatch(&ContentTypeEvent::new(ContentTypeEventKind::Saved, types));
        info!(kind = %self.kind, ?ids, user_id, "Saved content types");
        Ok(SaveOutcome::Saved)
    }

    /// Deletes one type and its items.
    pub async fn delete(&self, content_type: &ContentType) -> Result<DeleteOutcome> {
        self.delete_many(slice::from_ref(content_type)).await
    }

    /// Deletes several types and their items.
    pub async fn delete_many(&self, types: &[ContentType]) -> Result<DeleteOutcome> {
        self.check_kind(types)?;
        let _guard = self.locks.write(self.kind).await;

        let deleting = ContentTypeEvent::new(ContentTypeEventKind::Deleting, types);
        if self.events.dispatch_cancelable(&deleting) {
            info!(kind = %self.kind, count = types.len(), "Delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        let mut uow = UnitOfWork::new(self.pool.clone());
        for ct in types {
            if ct.is_new() {
                return Err(CmsError::ContentTypeNotFound(ct.alias.clone()));
            }
            let conn = uow.connection().await?;
            let count = self.rebuilder.delete_items_of_type(conn, ct.id).await?;
            debug!(alias = %ct.alias, count, "Deleted items of content type");
        }
        uow.commit().await?;

        {
            let mut repo = uow.content_types().await?;
            for ct in types {
                repo.delete(ct.id).await?;
            }
        }
        uow.commit().await?;

        self.events
            .dispatch(&ContentTypeEvent::new(ContentTypeEventKind::Deleted, types));
        info!(kind = %self.kind, count = types.len(), "Deleted content types");
        Ok(DeleteOutcome::Deleted)
    }

    fn check_kind(&self, types: &[ContentType]) -> Result<()> {
        match types.iter().find(|ct| ct.kind != self.kind) {
            Some(ct) => Err(CmsError::WrongKind {
                alias: ct.alias.clone(),
                expected: self.kind,
                found: ct.kind,
            }),
            None => Ok(()),
        }
    }
}

async fn upsert(uow: &mut UnitOfWork, types: &mut [ContentType], user_id: i32) -> Result<()> {
    let mut repo = uow.content_types().await?;
    for ct in types.iter_mut() {
        ct.creator_id = user_id;
        repo.save(ct).await?;
    }
    Ok(())
}
