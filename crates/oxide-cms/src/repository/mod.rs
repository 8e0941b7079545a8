//! Repositories over a borrowed connection.
//!
//! A repository never owns a pool. It borrows the connection of the
//! surrounding [`UnitOfWork`](crate::unit_of_work::UnitOfWork), or any other
//! `SqliteConnection`, so several repositories can share one transaction.
//!
//! - [`NodeRepository`] - The content tree
//! - [`ContentTypeRepository`] - Content types and their backing nodes
//! - [`ContentRepository`] - Content items of a type

pub mod content;
pub mod content_type;
pub mod node;

pub use content::ContentRepository;
pub use content_type::ContentTypeRepository;
pub use node::NodeRepository;
