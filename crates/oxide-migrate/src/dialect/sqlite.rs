//! SQLite dialect for migrations.
//!
//! SQLite cannot add, drop or change constraints on an existing table, and
//! has no ALTER COLUMN. Those operations fail with
//! [`MigrateError::Unsupported`] instead of being silently rewritten.

use crate::error::{MigrateError, Result};
use crate::schema::{ColumnSchema, ForeignKeySchema, PrimaryKeySchema, SqlType, TableSchema};

use super::MigrationDialect;

/// Lists user indexes with their columns through the pragma table functions.
/// Automatic indexes backing inline constraints (`origin != 'c'`) are skipped.
const DEFINED_INDEXES_SQL: &str = "SELECT m.name AS table_name, il.name AS index_name, \
ii.name AS column_name, il.\"unique\" AS is_unique \
FROM sqlite_master m \
JOIN pragma_index_list(m.name) il \
JOIN pragma_index_info(il.name) ii \
WHERE m.type = 'table' AND il.origin = 'c' \
ORDER BY m.name, il.name, ii.seqno";

/// Returns each user table with its CREATE statement; constraint names are
/// parsed out of the statement text.
const CONSTRAINTS_PER_TABLE_SQL: &str = "SELECT name AS table_name, sql \
FROM sqlite_master \
WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
ORDER BY name";

/// SQLite migration dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn unsupported(&self, operation: &str) -> MigrateError {
        MigrateError::unsupported(operation, self.name())
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer | SqlType::BigInt | SqlType::SmallInt => "INTEGER".to_string(),
            SqlType::Boolean => "INTEGER".to_string(),
            SqlType::Text | SqlType::Varchar(_) => "TEXT".to_string(),
            SqlType::DateTime | SqlType::Date => "TEXT".to_string(),
            SqlType::Uuid => "TEXT".to_string(),
            SqlType::Decimal(_, _) => "NUMERIC".to_string(),
            SqlType::Double => "REAL".to_string(),
            SqlType::Blob => "BLOB".to_string(),
        }
    }

    fn new_guid_function(&self) -> &'static str {
        "(lower(hex(randomblob(16))))"
    }

    fn defined_indexes_sql(&self) -> &'static str {
        DEFINED_INDEXES_SQL
    }

    fn constraints_per_table_sql(&self) -> &'static str {
        CONSTRAINTS_PER_TABLE_SQL
    }

    fn identity_clause(&self, _column: &ColumnSchema) -> Option<String> {
        Some("AUTOINCREMENT".to_string())
    }

    // AUTOINCREMENT is only legal on an inline INTEGER PRIMARY KEY.
    fn inline_primary_key(&self, table: &TableSchema) -> bool {
        table.single_key_column().is_some_and(|c| c.auto_increment)
    }

    fn identity_seed_sql(&self, table: &str, column: &ColumnSchema) -> Option<String> {
        let seed = column.identity_seed.filter(|seed| *seed > 1)?;
        Some(format!(
            "INSERT INTO sqlite_sequence (name, seq) VALUES ('{}', {})",
            table.replace('\'', "''"),
            seed - 1
        ))
    }

    fn alter_column(&self, _table: &str, _column: &ColumnSchema) -> Result<Vec<String>> {
        Err(self.unsupported("alter column"))
    }

    fn create_foreign_key(&self, _table: &str, _fk: &ForeignKeySchema) -> Result<Vec<String>> {
        Err(self.unsupported("create foreign key"))
    }

    fn drop_foreign_key(&self, _table: &str, _name: &str) -> Result<Vec<String>> {
        Err(self.unsupported("drop foreign key"))
    }

    fn create_primary_key(&self, _table: &str, _key: &PrimaryKeySchema) -> Result<Vec<String>> {
        Err(self.unsupported("create primary key"))
    }

    fn drop_primary_key(&self, _table: &str, _name: &str) -> Result<Vec<String>> {
        Err(self.unsupported("drop primary key"))
    }
}
