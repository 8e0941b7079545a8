//! Per-step migration context.

use std::ops::{Deref, DerefMut};

use crate::builder::MigrationBuilder;
use crate::dialect::MigrationDialect;
use crate::error::Result;
use crate::introspect::SchemaSnapshot;

/// What a step sees while it renders: the active dialect, the live schema
/// read inside the step's transaction, and the step identifier.
///
/// A context is built fresh for each step and never shared between steps.
pub struct MigrationContext<'a> {
    /// Dialect used for rendering.
    pub dialect: &'a dyn MigrationDialect,
    /// Schema as of the moment the context was built.
    pub schema: SchemaSnapshot,
    /// Identifier of the running step.
    pub step: &'a str,
}

impl<'a> MigrationContext<'a> {
    /// Creates a context.
    pub fn new(dialect: &'a dyn MigrationDialect, schema: SchemaSnapshot, step: &'a str) -> Self {
        Self {
            dialect,
            schema,
            step,
        }
    }

    /// Returns a fresh builder bound to this context.
    ///
    /// Composite operations fill it with primitive expressions and render it
    /// with [`LocalMigration::get_sql`].
    pub fn local_migration(&self) -> LocalMigration<'_, 'a> {
        LocalMigration {
            context: self,
            builder: MigrationBuilder::new(),
        }
    }
}

/// A [`MigrationBuilder`] that renders with its context's dialect and schema.
pub struct LocalMigration<'c, 'a> {
    context: &'c MigrationContext<'a>,
    builder: MigrationBuilder,
}

impl LocalMigration<'_, '_> {
    /// Renders the accumulated expressions to statements.
    pub fn statements(&self) -> Result<Vec<String>> {
        self.builder.statements(self.context)
    }

    /// Renders the accumulated expressions as one SQL text block.
    pub fn get_sql(&self) -> Result<String> {
        self.builder.get_sql(self.context)
    }
}

impl Deref for LocalMigration<'_, '_> {
    type Target = MigrationBuilder;

    fn deref(&self) -> &MigrationBuilder {
        &self.builder
    }
}

impl DerefMut for LocalMigration<'_, '_> {
    fn deref_mut(&mut self) -> &mut MigrationBuilder {
        &mut self.builder
    }
}
