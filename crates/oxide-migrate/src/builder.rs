//! Fluent builder for migration expressions.
//!
//! A step describes its schema changes through a [`MigrationBuilder`]:
//!
//! ```ignore
//! fn up(m: &mut MigrationBuilder) {
//!     m.create().table(node_table());
//!     m.alter().table("contentType").add_column(ColumnSchema::new("description", SqlType::Text));
//!     m.delete().index("IX_node_Trashed").on_table("node");
//!     m.execute().code(|ctx| {
//!         let mut local = ctx.local_migration();
//!         if ctx.schema.has_index("IX_old") {
//!             local.delete().index("IX_old").on_table("node");
//!         }
//!         local.get_sql()
//!     });
//! }
//! ```
//!
//! Nothing is executed here. Each finished chain appends exactly one
//! [`Expression`]; rendering to SQL happens later against a
//! [`MigrationContext`].

use std::fmt;

use crate::composite;
use crate::context::MigrationContext;
use crate::error::Result;
use crate::operations::MigrationOperation;
use crate::schema::{ColumnSchema, ForeignKeyAction, ForeignKeySchema, IndexSchema, PrimaryKeySchema, TableSchema};

/// Closure producing SQL from the live schema.
pub type CodeExpression = Box<dyn Fn(&MigrationContext<'_>) -> Result<String> + Send + Sync>;

/// One entry of a migration step.
pub enum Expression {
    /// A plain schema operation.
    Operation(MigrationOperation),
    /// SQL computed at run time from the live schema.
    Code(CodeExpression),
    /// Drop every index, foreign key and primary key of a table, or of all
    /// tables when `None`.
    DropKeysAndIndexes(Option<String>),
}

impl Expression {
    /// Renders the expression to statements.
    pub fn render(&self, ctx: &MigrationContext<'_>) -> Result<Vec<String>> {
        match self {
            Self::Operation(op) => ctx.dialect.generate_sql(op),
            Self::Code(code) => {
                let sql = code(ctx)?;
                if sql.trim().is_empty() {
                    Ok(Vec::new())
                } else {
                    Ok(vec![sql])
                }
            }
            Self::DropKeysAndIndexes(table) => composite::drop_keys_and_indexes(ctx, table.as_deref()),
        }
    }

    /// Returns true when rendering or running this expression depends on the
    /// live schema.
    #[must_use]
    pub fn needs_schema(&self) -> bool {
        match self {
            Self::Operation(op) => matches!(
                op,
                MigrationOperation::CreateTable { .. }
                    | MigrationOperation::AddColumn { .. }
                    | MigrationOperation::CreateIndex { .. }
                    | MigrationOperation::CreateForeignKey { .. }
                    | MigrationOperation::CreatePrimaryKey { .. }
            ),
            Self::Code(_) | Self::DropKeysAndIndexes(_) => true,
        }
    }

    /// Returns a human-readable description of this expression.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Operation(op) => op.description(),
            Self::Code(_) => "Execute code expression".to_string(),
            Self::DropKeysAndIndexes(Some(table)) => {
                format!("Drop keys and indexes of table '{}'", table)
            }
            Self::DropKeysAndIndexes(None) => "Drop all keys and indexes".to_string(),
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(op) => f.debug_tuple("Operation").field(op).finish(),
            Self::Code(_) => f.write_str("Code(..)"),
            Self::DropKeysAndIndexes(table) => {
                f.debug_tuple("DropKeysAndIndexes").field(table).finish()
            }
        }
    }
}

/// Ordered list of expressions making up one migration step.
#[derive(Debug, Default)]
pub struct MigrationBuilder {
    expressions: Vec<Expression>,
}

impl MigrationBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a `create` chain.
    pub fn create(&mut self) -> CreateBuilder<'_> {
        CreateBuilder { builder: self }
    }

    /// Starts an `alter` chain.
    pub fn alter(&mut self) -> AlterBuilder<'_> {
        AlterBuilder { builder: self }
    }

    /// Starts a `delete` chain.
    pub fn delete(&mut self) -> DeleteBuilder<'_> {
        DeleteBuilder { builder: self }
    }

    /// Starts an `execute` chain.
    pub fn execute(&mut self) -> ExecuteBuilder<'_> {
        ExecuteBuilder { builder: self }
    }

    /// Appends an operation directly.
    pub fn push(&mut self, operation: MigrationOperation) {
        self.expressions.push(Expression::Operation(operation));
    }

    /// The accumulated expressions, in order.
    #[must_use]
    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    /// Number of expressions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    /// Returns true when nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Renders all expressions to statements without executing them.
    pub fn statements(&self, ctx: &MigrationContext<'_>) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        for expression in &self.expressions {
            statements.extend(expression.render(ctx)?);
        }
        Ok(statements)
    }

    /// Renders all expressions as one SQL text block.
    pub fn get_sql(&self, ctx: &MigrationContext<'_>) -> Result<String> {
        Ok(join_statements(&self.statements(ctx)?))
    }
}

/// Joins statements with `";\n"` and terminates the last one.
#[must_use]
pub fn join_statements(statements: &[String]) -> String {
    if statements.is_empty() {
        String::new()
    } else {
        format!("{};", statements.join(";\n"))
    }
}

/// `create()` verbs.
pub struct CreateBuilder<'a> {
    builder: &'a mut MigrationBuilder,
}

impl<'a> CreateBuilder<'a> {
    /// Creates a table with its keys and indexes.
    pub fn table(self, table: TableSchema) {
        self.builder.push(MigrationOperation::create_table(table));
    }

    /// Creates a table, skipping it when it already exists.
    pub fn table_if_not_exists(self, table: TableSchema) {
        self.builder.push(MigrationOperation::CreateTable {
            table,
            if_not_exists: true,
        });
    }

    /// Creates an index.
    pub fn index(self, index: IndexSchema) {
        self.builder.push(MigrationOperation::create_index(index));
    }

    /// Creates an index, skipping it when it already exists.
    pub fn index_if_not_exists(self, index: IndexSchema) {
        self.builder.push(MigrationOperation::CreateIndex {
            index,
            if_not_exists: true,
        });
    }

    /// Adds a column to an existing table.
    pub fn column(self, column: ColumnSchema) -> CreateColumnBuilder<'a> {
        CreateColumnBuilder {
            builder: self.builder,
            column,
        }
    }

    /// Adds a foreign key to an existing table.
    pub fn foreign_key(self, name: impl Into<String>) -> CreateForeignKeyBuilder<'a> {
        CreateForeignKeyBuilder {
            builder: self.builder,
            name: name.into(),
        }
    }

    /// Adds a primary key to an existing table.
    pub fn primary_key(self, name: impl Into<String>) -> CreatePrimaryKeyBuilder<'a> {
        CreatePrimaryKeyBuilder {
            builder: self.builder,
            name: name.into(),
        }
    }
}

/// `create().column(c)`.
pub struct CreateColumnBuilder<'a> {
    builder: &'a mut MigrationBuilder,
    column: ColumnSchema,
}

impl CreateColumnBuilder<'_> {
    /// Names the table the column is added to.
    pub fn on_table(self, table: impl Into<String>) {
        self.builder.push(MigrationOperation::AddColumn {
            table: table.into(),
            column: self.column,
        });
    }
}

/// `create().foreign_key(name)`.
pub struct CreateForeignKeyBuilder<'a> {
    builder: &'a mut MigrationBuilder,
    name: String,
}

impl<'a> CreateForeignKeyBuilder<'a> {
    /// Names the referencing table.
    pub fn on_table(self, table: impl Into<String>) -> ForeignKeyColumnsBuilder<'a> {
        ForeignKeyColumnsBuilder {
            builder: self.builder,
            name: self.name,
            table: table.into(),
        }
    }
}

/// `create().foreign_key(name).on_table(t)`.
pub struct ForeignKeyColumnsBuilder<'a> {
    builder: &'a mut MigrationBuilder,
    name: String,
    table: String,
}

impl<'a> ForeignKeyColumnsBuilder<'a> {
    /// Names the referencing columns.
    pub fn columns(self, columns: &[&str]) -> ForeignKeyReferencesBuilder<'a> {
        ForeignKeyReferencesBuilder {
            builder: self.builder,
            name: self.name,
            table: self.table,
            columns: columns.iter().map(ToString::to_string).collect(),
            on_delete: ForeignKeyAction::NoAction,
        }
    }
}

/// `create().foreign_key(name).on_table(t).columns(..)`.
pub struct ForeignKeyReferencesBuilder<'a> {
    builder: &'a mut MigrationBuilder,
    name: String,
    table: String,
    columns: Vec<String>,
    on_delete: ForeignKeyAction,
}

impl ForeignKeyReferencesBuilder<'_> {
    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Names the referenced table and columns.
    pub fn references(self, table: impl Into<String>, columns: &[&str]) {
        let foreign_key = ForeignKeySchema {
            name: self.name,
            columns: self.columns,
            references_table: table.into(),
            references_columns: columns.iter().map(ToString::to_string).collect(),
            on_delete: self.on_delete,
            on_update: ForeignKeyAction::NoAction,
        };
        self.builder.push(MigrationOperation::CreateForeignKey {
            table: self.table,
            foreign_key,
        });
    }
}

/// `create().primary_key(name)`.
pub struct CreatePrimaryKeyBuilder<'a> {
    builder: &'a mut MigrationBuilder,
    name: String,
}

impl<'a> CreatePrimaryKeyBuilder<'a> {
    /// Names the table the key is added to.
    pub fn on_table(self, table: impl Into<String>) -> PrimaryKeyColumnsBuilder<'a> {
        PrimaryKeyColumnsBuilder {
            builder: self.builder,
            name: self.name,
            table: table.into(),
        }
    }
}

/// `create().primary_key(name).on_table(t)`.
pub struct PrimaryKeyColumnsBuilder<'a> {
    builder: &'a mut MigrationBuilder,
    name: String,
    table: String,
}

impl PrimaryKeyColumnsBuilder<'_> {
    /// Names the key columns.
    pub fn columns(self, columns: &[&str]) {
        self.builder.push(MigrationOperation::CreatePrimaryKey {
            table: self.table,
            primary_key: PrimaryKeySchema::new(self.name, columns),
        });
    }
}

/// `alter()` verbs.
pub struct AlterBuilder<'a> {
    builder: &'a mut MigrationBuilder,
}

impl<'a> AlterBuilder<'a> {
    /// Alters the named table.
    pub fn table(self, table: impl Into<String>) -> AlterTableBuilder<'a> {
        AlterTableBuilder {
            builder: self.builder,
            table: table.into(),
        }
    }

    /// Renames a table.
    pub fn rename_table(self, old_name: impl Into<String>, new_name: impl Into<String>) {
        self.builder.push(MigrationOperation::RenameTable {
            old_name: old_name.into(),
            new_name: new_name.into(),
        });
    }
}

/// `alter().table(t)`. Every method appends one expression.
pub struct AlterTableBuilder<'a> {
    builder: &'a mut MigrationBuilder,
    table: String,
}

impl AlterTableBuilder<'_> {
    /// Adds a column.
    pub fn add_column(self, column: ColumnSchema) -> Self {
        self.builder.push(MigrationOperation::AddColumn {
            table: self.table.clone(),
            column,
        });
        self
    }

    /// Changes a column's type and nullability.
    pub fn alter_column(self, column: ColumnSchema) -> Self {
        self.builder.push(MigrationOperation::AlterColumn {
            table: self.table.clone(),
            column,
        });
        self
    }

    /// Renames a column.
    pub fn rename_column(self, old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        self.builder.push(MigrationOperation::RenameColumn {
            table: self.table.clone(),
            old_name: old_name.into(),
            new_name: new_name.into(),
        });
        self
    }
}

/// `delete()` verbs.
pub struct DeleteBuilder<'a> {
    builder: &'a mut MigrationBuilder,
}

impl<'a> DeleteBuilder<'a> {
    /// Drops a table.
    pub fn table(self, name: impl Into<String>) {
        self.builder.push(MigrationOperation::drop_table(name));
    }

    /// Drops a table if it exists.
    pub fn table_if_exists(self, name: impl Into<String>) {
        self.builder.push(MigrationOperation::DropTable {
            name: name.into(),
            if_exists: true,
        });
    }

    /// Drops a column.
    pub fn column(self, name: impl Into<String>) -> NamedTargetBuilder<'a> {
        NamedTargetBuilder::new(self.builder, name, Target::Column)
    }

    /// Drops an index.
    pub fn index(self, name: impl Into<String>) -> NamedTargetBuilder<'a> {
        NamedTargetBuilder::new(self.builder, name, Target::Index)
    }

    /// Drops a foreign key.
    pub fn foreign_key(self, name: impl Into<String>) -> NamedTargetBuilder<'a> {
        NamedTargetBuilder::new(self.builder, name, Target::ForeignKey)
    }

    /// Drops a primary key.
    pub fn primary_key(self, name: impl Into<String>) -> NamedTargetBuilder<'a> {
        NamedTargetBuilder::new(self.builder, name, Target::PrimaryKey)
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Column,
    Index,
    ForeignKey,
    PrimaryKey,
}

/// A named object waiting for its table: `delete().index(n)`,
/// `delete().foreign_key(n)`, `delete().primary_key(n)`, `delete().column(n)`.
pub struct NamedTargetBuilder<'a> {
    builder: &'a mut MigrationBuilder,
    name: String,
    target: Target,
}

impl<'a> NamedTargetBuilder<'a> {
    fn new(builder: &'a mut MigrationBuilder, name: impl Into<String>, target: Target) -> Self {
        Self {
            builder,
            name: name.into(),
            target,
        }
    }

    /// Names the owning table.
    pub fn on_table(self, table: impl Into<String>) {
        let table = table.into();
        let operation = match self.target {
            Target::Column => MigrationOperation::DropColumn {
                table,
                column_name: self.name,
            },
            Target::Index => MigrationOperation::drop_index(self.name, table),
            Target::ForeignKey => MigrationOperation::drop_foreign_key(table, self.name),
            Target::PrimaryKey => MigrationOperation::drop_primary_key(table, self.name),
        };
        self.builder.push(operation);
    }

    /// Same as [`on_table`](Self::on_table); reads better for columns and
    /// primary keys.
    pub fn from_table(self, table: impl Into<String>) {
        self.on_table(table);
    }
}

/// `execute()` verbs.
pub struct ExecuteBuilder<'a> {
    builder: &'a mut MigrationBuilder,
}

impl ExecuteBuilder<'_> {
    /// Runs raw SQL.
    pub fn sql(self, sql: impl Into<String>) {
        self.builder.push(MigrationOperation::sql(sql));
    }

    /// Runs SQL computed from the live schema when the step executes.
    pub fn code<F>(self, code: F)
    where
        F: Fn(&MigrationContext<'_>) -> Result<String> + Send + Sync + 'static,
    {
        self.builder.expressions.push(Expression::Code(Box::new(code)));
    }

    /// Drops every index, foreign key and primary key of `table`.
    pub fn drop_keys_and_indexes(self, table: impl Into<String>) {
        self.builder
            .expressions
            .push(Expression::DropKeysAndIndexes(Some(table.into())));
    }

    /// Drops every index, foreign key and primary key in the database.
    pub fn drop_all_keys_and_indexes(self) {
        self.builder
            .expressions
            .push(Expression::DropKeysAndIndexes(None));
    }
}
