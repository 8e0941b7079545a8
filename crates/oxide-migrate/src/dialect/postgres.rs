//! PostgreSQL dialect for migrations.

use crate::error::Result;
use crate::schema::{ColumnSchema, DefaultValue, SqlType};

use super::MigrationDialect;

const DEFINED_INDEXES_SQL: &str = "SELECT t.relname AS table_name, i.relname AS index_name, \
a.attname AS column_name, ix.indisunique AS is_unique \
FROM pg_class t \
JOIN pg_index ix ON t.oid = ix.indrelid \
JOIN pg_class i ON i.oid = ix.indexrelid \
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
JOIN pg_namespace n ON n.oid = t.relnamespace \
WHERE t.relkind = 'r' AND n.nspname = current_schema() AND NOT ix.indisprimary \
ORDER BY t.relname, i.relname";

const CONSTRAINTS_PER_TABLE_SQL: &str = "SELECT tc.table_name, tc.constraint_name \
FROM information_schema.table_constraints tc \
WHERE tc.table_schema = current_schema() \
AND tc.constraint_type IN ('PRIMARY KEY', 'FOREIGN KEY', 'UNIQUE', 'CHECK') \
ORDER BY tc.table_name, tc.constraint_name";

/// PostgreSQL migration dialect.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MigrationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({})", len),
            SqlType::Text => "TEXT".to_string(),
            SqlType::DateTime => "TIMESTAMP".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Decimal(p, s) => format!("NUMERIC({}, {})", p, s),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Blob => "BYTEA".to_string(),
        }
    }

    fn new_guid_function(&self) -> &'static str {
        "gen_random_uuid()"
    }

    fn defined_indexes_sql(&self) -> &'static str {
        DEFINED_INDEXES_SQL
    }

    fn constraints_per_table_sql(&self) -> &'static str {
        CONSTRAINTS_PER_TABLE_SQL
    }

    fn render_default(&self, default: &DefaultValue) -> Option<String> {
        match default {
            DefaultValue::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            DefaultValue::NewGuid => Some(self.new_guid_function().to_string()),
            DefaultValue::CurrentDateTime => Some("CURRENT_TIMESTAMP".to_string()),
            other => other.to_sql(),
        }
    }

    fn identity_clause(&self, column: &ColumnSchema) -> Option<String> {
        Some(match column.identity_seed {
            Some(seed) => format!("GENERATED BY DEFAULT AS IDENTITY (START WITH {})", seed),
            None => "GENERATED BY DEFAULT AS IDENTITY".to_string(),
        })
    }

    fn alter_column(&self, table: &str, column: &ColumnSchema) -> Result<Vec<String>> {
        let table = self.quote_identifier(table);
        let name = self.quote_identifier(&column.name);
        let nullability = if column.nullable {
            "DROP NOT NULL"
        } else {
            "SET NOT NULL"
        };
        Ok(vec![
            format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
                table,
                name,
                self.type_name(&column.sql_type)
            ),
            format!("ALTER TABLE {} ALTER COLUMN {} {}", table, name, nullability),
        ])
    }
}
