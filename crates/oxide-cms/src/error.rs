//! Error types for the content layer.

use oxide_migrate::MigrateError;

use crate::content_type::ContentTypeKind;

/// Errors raised by repositories and services.
#[derive(Debug, thiserror::Error)]
pub enum CmsError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration error.
    #[error("Migration error: {0}")]
    Migrate(#[from] MigrateError),

    /// The parent of a node being created or moved does not exist.
    #[error("Parent node {0} does not exist")]
    ParentNotFound(i32),

    /// The node does not exist.
    #[error("Node {0} does not exist")]
    NodeNotFound(i32),

    /// The node still has children and cannot be deleted.
    #[error("Node {0} has descendants")]
    HasDescendants(i32),

    /// A node cannot be moved under itself or one of its descendants.
    #[error("Cannot move node {node} under node {target}")]
    InvalidMove {
        /// Node being moved.
        node: i32,
        /// Requested new parent.
        target: i32,
    },

    /// The content type does not exist.
    #[error("Content type '{0}' does not exist")]
    ContentTypeNotFound(String),

    /// A content type of one kind was handed to the service of another.
    #[error("Content type '{alias}' is a {found} type, expected {expected}")]
    WrongKind {
        /// Alias of the offending type.
        alias: String,
        /// Kind served by the service.
        expected: ContentTypeKind,
        /// Kind of the type.
        found: ContentTypeKind,
    },

    /// Input rejected before reaching the database.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rebuilding derived structures failed.
    #[error("Structure rebuild failed: {0}")]
    Structure(String),
}

/// Result type for content operations.
pub type Result<T> = std::result::Result<T, CmsError>;
