//! Versioned schema migrations with swappable SQL dialects.
//!
//! `oxide-migrate` describes schema changes as data, renders them for a
//! database engine, and applies them exactly once, in order, across
//! upgrades:
//!
//! - **Schema** - Plain descriptors for tables, columns, keys and indexes
//! - **Dialect** - Engine-specific rendering (SQLite, PostgreSQL, SQL Server)
//! - **Introspection** - Snapshot of the live tables, indexes and constraints
//! - **Builder** - Fluent `create` / `alter` / `delete` / `execute` verbs
//! - **Runner** - Transactional execution, one ledger entry per step
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_migrate::prelude::*;
//!
//! fn create_tag_table(m: &mut MigrationBuilder) {
//!     m.create().table(
//!         TableSchema::new("tag")
//!             .column(ColumnSchema::new("id", SqlType::Integer).auto_increment())
//!             .column(ColumnSchema::new("text", SqlType::Varchar(200)).not_null())
//!             .primary_key(PrimaryKeySchema::new("PK_tag", &["id"]))
//!             .unique_index("IX_tag_text", &["text"]),
//!     );
//! }
//!
//! let mut plan = MigrationPlan::new("oxide-cms");
//! plan.add("8.2.0", "create_tag_table", create_tag_table)?;
//!
//! let runner = MigrationRunner::new(pool, SqliteDialect::new());
//! let report = runner.run(&plan).await?;
//! ```

pub mod builder;
pub mod composite;
pub mod context;
pub mod dialect;
pub mod error;
pub mod introspect;
pub mod ledger;
pub mod operations;
pub mod runner;
pub mod schema;
pub mod step;

pub use builder::MigrationBuilder;
pub use error::{MigrateError, Result};
pub use schema::{ColumnSchema, SqlType};
pub use step::Migration;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::builder::{join_statements, Expression, MigrationBuilder};
    pub use crate::context::{LocalMigration, MigrationContext};
    pub use crate::dialect::{
        DialectKind, MigrationDialect, PostgresDialect, SqlServerDialect, SqliteDialect,
    };
    pub use crate::error::{MigrateError, Result};
    pub use crate::introspect::{ConstraintDefinition, IndexDefinition, Introspect, SchemaSnapshot};
    pub use crate::ledger::{LedgerEntry, MigrationLedger};
    pub use crate::operations::MigrationOperation;
    pub use crate::runner::{MigrationRunner, RunReport, StepOutcome, StepState};
    pub use crate::schema::{
        ColumnSchema, DefaultValue, ForeignKeyAction, ForeignKeySchema, IndexKind, IndexSchema,
        PrimaryKeySchema, SqlType, TableSchema,
    };
    pub use crate::step::{Migration, MigrationPlan, MigrationStep};
}
