//! Database dialect implementations.
//!
//! Each dialect knows how to render migration operations as SQL for one
//! database engine, and which catalog queries describe that engine's
//! existing indexes and constraints. Callers only ever see
//! [`MigrationDialect`], so engines can be swapped without touching them.

mod postgres;
mod sqlite;
mod sqlserver;

use std::fmt;
use std::str::FromStr;

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;
pub use sqlserver::SqlServerDialect;

use crate::error::{MigrateError, Result};
use crate::operations::MigrationOperation;
use crate::schema::{
    ColumnSchema, DefaultValue, ForeignKeyAction, ForeignKeySchema, IndexSchema,
    PrimaryKeySchema, SqlType, TableSchema,
};

/// Trait for database-specific SQL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, sql_type: &SqlType) -> String;

    /// Returns the engine's function producing a new GUID.
    fn new_guid_function(&self) -> &'static str;

    /// Catalog query listing user indexes.
    ///
    /// Rows are `(table_name, index_name, column_name, is_unique)`, one row per
    /// indexed column, ordered by table then index.
    fn defined_indexes_sql(&self) -> &'static str;

    /// Catalog query listing named constraints per table.
    fn constraints_per_table_sql(&self) -> &'static str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Renders a default value, `None` when the column has no default.
    fn render_default(&self, default: &DefaultValue) -> Option<String> {
        match default {
            DefaultValue::NewGuid => Some(self.new_guid_function().to_string()),
            DefaultValue::CurrentDateTime => Some("CURRENT_TIMESTAMP".to_string()),
            other => other.to_sql(),
        }
    }

    /// Returns the identity clause appended after the column type, if any.
    fn identity_clause(&self, column: &ColumnSchema) -> Option<String>;

    /// Returns true when the table's primary key is declared on its column
    /// instead of as a table constraint.
    fn inline_primary_key(&self, _table: &TableSchema) -> bool {
        false
    }

    /// Generates column definition SQL.
    ///
    /// `inline_key` carries the primary key when it is declared on this column.
    fn column_definition(&self, column: &ColumnSchema, inline_key: Option<&PrimaryKeySchema>) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_name(&column.sql_type),
        ];

        if let Some(key) = inline_key {
            parts.push(format!(
                "CONSTRAINT {} PRIMARY KEY",
                self.quote_identifier(&key.name)
            ));
        }

        if column.auto_increment {
            if let Some(identity) = self.identity_clause(column) {
                parts.push(identity);
            }
        }

        if !column.nullable && inline_key.is_none() {
            parts.push("NOT NULL".to_string());
        }

        if column.unique {
            parts.push("UNIQUE".to_string());
        }

        if let Some(default_sql) = self.render_default(&column.default) {
            parts.push(format!("DEFAULT {}", default_sql));
        }

        parts.join(" ")
    }

    /// Renders a comma-separated, quoted column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Renders a primary key table constraint.
    fn primary_key_constraint(&self, key: &PrimaryKeySchema) -> String {
        format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            self.quote_identifier(&key.name),
            self.column_list(&key.columns)
        )
    }

    /// Renders a foreign key table constraint.
    fn foreign_key_constraint(&self, fk: &ForeignKeySchema) -> String {
        let mut sql = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_identifier(&fk.name),
            self.column_list(&fk.columns),
            self.quote_identifier(&fk.references_table),
            self.column_list(&fk.references_columns)
        );
        if fk.on_delete != ForeignKeyAction::NoAction {
            sql.push_str(" ON DELETE ");
            sql.push_str(fk.on_delete.to_sql());
        }
        if fk.on_update != ForeignKeyAction::NoAction {
            sql.push_str(" ON UPDATE ");
            sql.push_str(fk.on_update.to_sql());
        }
        sql
    }

    /// Statement run after CREATE TABLE so the identity starts at its seed.
    fn identity_seed_sql(&self, _table: &str, _column: &ColumnSchema) -> Option<String> {
        None
    }

    /// Opening of a CREATE TABLE statement, up to the column list.
    fn create_table_prefix(&self, table: &str, if_not_exists: bool) -> String {
        if if_not_exists {
            format!("CREATE TABLE IF NOT EXISTS {}", self.quote_identifier(table))
        } else {
            format!("CREATE TABLE {}", self.quote_identifier(table))
        }
    }

    /// Generates SQL for creating a table with its keys and indexes.
    fn create_table(&self, table: &TableSchema, if_not_exists: bool) -> Result<Vec<String>> {
        let inline = self.inline_primary_key(table);
        let inline_column = if inline {
            table.single_key_column().map(|c| c.name.as_str())
        } else {
            None
        };

        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let key = if inline_column == Some(c.name.as_str()) {
                    table.primary_key.as_ref()
                } else {
                    None
                };
                self.column_definition(c, key)
            })
            .collect();

        if let Some(key) = table.primary_key.as_ref().filter(|_| inline_column.is_none()) {
            defs.push(self.primary_key_constraint(key));
        }
        for fk in &table.foreign_keys {
            defs.push(self.foreign_key_constraint(fk));
        }

        let mut statements = vec![format!(
            "{} (\n  {}\n)",
            self.create_table_prefix(&table.name, if_not_exists),
            defs.join(",\n  ")
        )];
        if let Some(seed) = table
            .identity_column()
            .and_then(|c| self.identity_seed_sql(&table.name, c))
        {
            statements.push(seed);
        }
        for index in &table.indexes {
            statements.push(self.create_index(index, if_not_exists));
        }
        Ok(statements)
    }

    /// Generates SQL for dropping a table.
    fn drop_table(&self, name: &str, if_exists: bool) -> String {
        let mut sql = String::from("DROP TABLE ");
        if if_exists {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&self.quote_identifier(name));
        sql
    }

    /// Generates SQL for renaming a table.
    fn rename_table(&self, old_name: &str, new_name: &str) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )])
    }

    /// Generates SQL for adding a column.
    fn add_column(&self, table: &str, column: &ColumnSchema) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column, None)
        )
    }

    /// Generates SQL for changing a column's type and nullability.
    fn alter_column(&self, table: &str, column: &ColumnSchema) -> Result<Vec<String>>;

    /// Generates SQL for renaming a column.
    fn rename_column(&self, table: &str, old_name: &str, new_name: &str) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote_identifier(table),
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )])
    }

    /// Generates SQL for dropping a column.
    fn drop_column(&self, table: &str, column_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column_name)
        )
    }

    /// Generates SQL for creating an index.
    fn create_index(&self, index: &IndexSchema, if_not_exists: bool) -> String {
        let mut sql = String::from("CREATE ");
        if index.is_unique() {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        if if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.quote_identifier(&index.name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_identifier(&index.table));
        sql.push_str(" (");
        sql.push_str(&self.column_list(&index.columns));
        sql.push(')');
        sql
    }

    /// Generates SQL for dropping an index.
    fn drop_index(&self, name: &str, _table: &str) -> String {
        format!("DROP INDEX {}", self.quote_identifier(name))
    }

    /// Generates SQL for adding a foreign key to an existing table.
    fn create_foreign_key(&self, table: &str, fk: &ForeignKeySchema) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.foreign_key_constraint(fk)
        )])
    }

    /// Generates SQL for dropping a foreign key.
    fn drop_foreign_key(&self, table: &str, name: &str) -> Result<Vec<String>> {
        Ok(vec![self.drop_constraint(table, name)])
    }

    /// Generates SQL for adding a primary key to an existing table.
    fn create_primary_key(&self, table: &str, key: &PrimaryKeySchema) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.primary_key_constraint(key)
        )])
    }

    /// Generates SQL for dropping a primary key.
    fn drop_primary_key(&self, table: &str, name: &str) -> Result<Vec<String>> {
        Ok(vec![self.drop_constraint(table, name)])
    }

    /// `ALTER TABLE .. DROP CONSTRAINT ..`.
    fn drop_constraint(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(name)
        )
    }

    /// Generates SQL for a migration operation.
    fn generate_sql(&self, operation: &MigrationOperation) -> Result<Vec<String>> {
        match operation {
            MigrationOperation::CreateTable {
                table,
                if_not_exists,
            } => self.create_table(table, *if_not_exists),

            MigrationOperation::DropTable { name, if_exists } => {
                Ok(vec![self.drop_table(name, *if_exists)])
            }

            MigrationOperation::RenameTable { old_name, new_name } => {
                self.rename_table(old_name, new_name)
            }

            MigrationOperation::AddColumn { table, column } => {
                Ok(vec![self.add_column(table, column)])
            }

            MigrationOperation::AlterColumn { table, column } => self.alter_column(table, column),

            MigrationOperation::RenameColumn {
                table,
                old_name,
                new_name,
            } => self.rename_column(table, old_name, new_name),

            MigrationOperation::DropColumn { table, column_name } => {
                Ok(vec![self.drop_column(table, column_name)])
            }

            MigrationOperation::CreateIndex {
                index,
                if_not_exists,
            } => Ok(vec![self.create_index(index, *if_not_exists)]),

            MigrationOperation::DropIndex { name, table } => Ok(vec![self.drop_index(name, table)]),

            MigrationOperation::CreateForeignKey { table, foreign_key } => {
                self.create_foreign_key(table, foreign_key)
            }

            MigrationOperation::DropForeignKey { table, name } => {
                self.drop_foreign_key(table, name)
            }

            MigrationOperation::CreatePrimaryKey { table, primary_key } => {
                self.create_primary_key(table, primary_key)
            }

            MigrationOperation::DropPrimaryKey { table, name } => {
                self.drop_primary_key(table, name)
            }

            MigrationOperation::Sql { sql } => Ok(vec![sql.clone()]),
        }
    }
}

/// The engines a dialect exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DialectKind {
    /// SQLite.
    #[default]
    Sqlite,
    /// PostgreSQL.
    Postgres,
    /// Microsoft SQL Server.
    SqlServer,
}

impl DialectKind {
    /// Returns the dialect for this engine.
    #[must_use]
    pub fn dialect(self) -> Box<dyn MigrationDialect> {
        match self {
            Self::Sqlite => Box::new(SqliteDialect::new()),
            Self::Postgres => Box::new(PostgresDialect::new()),
            Self::SqlServer => Box::new(SqlServerDialect::new()),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::SqlServer => "sqlserver",
        })
    }
}

impl FromStr for DialectKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            other => Err(MigrateError::unsupported("select dialect", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_kind_round_trip_names() {
        assert_eq!("mssql".parse::<DialectKind>().unwrap(), DialectKind::SqlServer);
        assert_eq!("PostgreSQL".parse::<DialectKind>().unwrap(), DialectKind::Postgres);
        assert_eq!(DialectKind::SqlServer.dialect().name(), "sqlserver");
        assert!("oracle".parse::<DialectKind>().is_err());
    }

    #[test]
    fn test_swapping_dialect_changes_only_rendering() {
        let op = MigrationOperation::drop_index("IX_node_Path", "node");
        let rendered: Vec<String> = [DialectKind::Sqlite, DialectKind::Postgres, DialectKind::SqlServer]
            .into_iter()
            .map(|kind| kind.dialect().generate_sql(&op).unwrap().join(";"))
            .collect();

        assert_eq!(rendered[0], "DROP INDEX \"IX_node_Path\"");
        assert_eq!(rendered[1], "DROP INDEX \"IX_node_Path\"");
        assert_eq!(rendered[2], "DROP INDEX [IX_node_Path] ON [node]");
    }
}
