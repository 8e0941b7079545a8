//! Migration operations.
//!
//! Every schema change a step can express is one [`MigrationOperation`].
//! Operations are inert data: the builder produces them, a dialect renders
//! them, and the runner executes the rendered statements.

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnSchema, ForeignKeySchema, IndexSchema, PrimaryKeySchema, TableSchema};

/// A single migration operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MigrationOperation {
    /// Create a new table, its keys and its indexes.
    CreateTable {
        /// Table definition.
        table: TableSchema,
        /// Skip silently when the table already exists.
        if_not_exists: bool,
    },

    /// Drop a table.
    DropTable {
        /// Table name.
        name: String,
        /// Whether to use IF EXISTS.
        if_exists: bool,
    },

    /// Rename a table.
    RenameTable {
        /// Old table name.
        old_name: String,
        /// New table name.
        new_name: String,
    },

    /// Add a column to a table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnSchema,
    },

    /// Replace a column's type and nullability.
    AlterColumn {
        /// Table name.
        table: String,
        /// New column definition.
        column: ColumnSchema,
    },

    /// Rename a column.
    RenameColumn {
        /// Table name.
        table: String,
        /// Old column name.
        old_name: String,
        /// New column name.
        new_name: String,
    },

    /// Drop a column from a table.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column_name: String,
    },

    /// Create an index.
    CreateIndex {
        /// Index definition.
        index: IndexSchema,
        /// Skip silently when the index already exists.
        if_not_exists: bool,
    },

    /// Drop an index.
    DropIndex {
        /// Index name.
        name: String,
        /// Owning table.
        table: String,
    },

    /// Add a foreign key constraint to an existing table.
    CreateForeignKey {
        /// Table name.
        table: String,
        /// Foreign key definition.
        foreign_key: ForeignKeySchema,
    },

    /// Drop a foreign key constraint.
    DropForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Add a primary key constraint to an existing table.
    CreatePrimaryKey {
        /// Table name.
        table: String,
        /// Key definition.
        primary_key: PrimaryKeySchema,
    },

    /// Drop a primary key constraint.
    DropPrimaryKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Raw SQL, passed through untouched.
    Sql {
        /// Statement text.
        sql: String,
    },
}

impl MigrationOperation {
    /// Creates a CreateTable operation.
    #[must_use]
    pub fn create_table(table: TableSchema) -> Self {
        Self::CreateTable {
            table,
            if_not_exists: false,
        }
    }

    /// Creates a DropTable operation.
    #[must_use]
    pub fn drop_table(name: impl Into<String>) -> Self {
        Self::DropTable {
            name: name.into(),
            if_exists: false,
        }
    }

    /// Creates a CreateIndex operation.
    #[must_use]
    pub fn create_index(index: IndexSchema) -> Self {
        Self::CreateIndex {
            index,
            if_not_exists: false,
        }
    }

    /// Creates a DropIndex operation.
    #[must_use]
    pub fn drop_index(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self::DropIndex {
            name: name.into(),
            table: table.into(),
        }
    }

    /// Creates a DropForeignKey operation.
    #[must_use]
    pub fn drop_foreign_key(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DropForeignKey {
            table: table.into(),
            name: name.into(),
        }
    }

    /// Creates a DropPrimaryKey operation.
    #[must_use]
    pub fn drop_primary_key(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DropPrimaryKey {
            table: table.into(),
            name: name.into(),
        }
    }

    /// Creates a raw SQL operation.
    #[must_use]
    pub fn sql(sql: impl Into<String>) -> Self {
        Self::Sql { sql: sql.into() }
    }

    /// Short operation label used in diagnostics, e.g. `"drop primary key"`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create table",
            Self::DropTable { .. } => "drop table",
            Self::RenameTable { .. } => "rename table",
            Self::AddColumn { .. } => "add column",
            Self::AlterColumn { .. } => "alter column",
            Self::RenameColumn { .. } => "rename column",
            Self::DropColumn { .. } => "drop column",
            Self::CreateIndex { .. } => "create index",
            Self::DropIndex { .. } => "drop index",
            Self::CreateForeignKey { .. } => "create foreign key",
            Self::DropForeignKey { .. } => "drop foreign key",
            Self::CreatePrimaryKey { .. } => "create primary key",
            Self::DropPrimaryKey { .. } => "drop primary key",
            Self::Sql { .. } => "execute sql",
        }
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable { table, .. } => format!("Create table '{}'", table.name),
            Self::DropTable { name, .. } => format!("Drop table '{}'", name),
            Self::RenameTable { old_name, new_name } => {
                format!("Rename table '{}' to '{}'", old_name, new_name)
            }
            Self::AddColumn { table, column } => {
                format!("Add column '{}' to table '{}'", column.name, table)
            }
            Self::AlterColumn { table, column } => {
                format!("Alter column '{}' in table '{}'", column.name, table)
            }
            Self::RenameColumn {
                table,
                old_name,
                new_name,
            } => format!(
                "Rename column '{}' to '{}' in table '{}'",
                old_name, new_name, table
            ),
            Self::DropColumn { table, column_name } => {
                format!("Drop column '{}' from table '{}'", column_name, table)
            }
            Self::CreateIndex { index, .. } => {
                format!("Create index '{}' on table '{}'", index.name, index.table)
            }
            Self::DropIndex { name, table } => {
                format!("Drop index '{}' on table '{}'", name, table)
            }
            Self::CreateForeignKey { table, foreign_key } => format!(
                "Create foreign key '{}' on table '{}'",
                foreign_key.name, table
            ),
            Self::DropForeignKey { table, name } => {
                format!("Drop foreign key '{}' from table '{}'", name, table)
            }
            Self::CreatePrimaryKey { table, primary_key } => format!(
                "Create primary key '{}' on table '{}'",
                primary_key.name, table
            ),
            Self::DropPrimaryKey { table, name } => {
                format!("Drop primary key '{}' from table '{}'", name, table)
            }
            Self::Sql { .. } => "Execute SQL".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SqlType;

    #[test]
    fn test_kind_labels() {
        assert_eq!(
            MigrationOperation::drop_primary_key("node", "PK_node").kind(),
            "drop primary key"
        );
        assert_eq!(MigrationOperation::sql("SELECT 1").kind(), "execute sql");
    }

    #[test]
    fn test_descriptions() {
        let op = MigrationOperation::AddColumn {
            table: "contentType".to_string(),
            column: ColumnSchema::new("description", SqlType::Text),
        };
        assert_eq!(
            op.description(),
            "Add column 'description' to table 'contentType'"
        );

        let op = MigrationOperation::drop_index("IX_node_Path", "node");
        assert_eq!(op.description(), "Drop index 'IX_node_Path' on table 'node'");
    }

    #[test]
    fn test_create_table_defaults_to_strict() {
        let op = MigrationOperation::create_table(TableSchema::new("node"));
        assert!(matches!(
            op,
            MigrationOperation::CreateTable {
                if_not_exists: false,
                ..
            }
        ));
    }
}
