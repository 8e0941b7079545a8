//! Content tree storage, content types and schema upgrades for a small CMS.
//!
//! - [`node`] - The content tree and the `node` table
//! - [`content_type`] / [`content`] - Content types and their items
//! - [`repository`] - Repositories over a borrowed connection
//! - [`unit_of_work`] - Lazily begun, repeatedly committable transactions
//! - [`service`] - Content type service with events and per-kind locks
//! - [`migrations`] - The built-in schema upgrade plan
//! - [`config`] - Database configuration and connection
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_cms::prelude::*;
//!
//! let db = DatabaseConfig::new("sqlite:cms.sqlite3").connect().await?;
//!
//! let members = db.content_types(ContentTypeKind::Member);
//! let mut member = ContentType::new(ContentTypeKind::Member, "member", "Member");
//! members.save(&mut member, 0).await?;
//! ```

pub mod config;
pub mod content;
pub mod content_type;
pub mod error;
pub mod events;
pub mod locks;
pub mod migrations;
pub mod node;
pub mod rebuild;
pub mod repository;
pub mod service;
pub mod unit_of_work;

pub use config::{Database, DatabaseConfig};
pub use error::{CmsError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{Database, DatabaseConfig};
    pub use crate::content::ContentItem;
    pub use crate::content_type::{ContentType, ContentTypeKind};
    pub use crate::error::{CmsError, Result};
    pub use crate::events::{ContentTypeEvent, ContentTypeEventKind, EventDispatcher, NoopDispatcher};
    pub use crate::locks::TypeLocks;
    pub use crate::node::{NewNode, Node, ROOT_ID};
    pub use crate::rebuild::{ContentStructureRebuilder, StructureRebuilder};
    pub use crate::repository::{ContentRepository, ContentTypeRepository, NodeRepository};
    pub use crate::service::{ContentTypeService, DeleteOutcome, SaveOutcome};
    pub use crate::unit_of_work::UnitOfWork;
}
