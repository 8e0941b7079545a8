//! SQL Server dialect for migrations.
//!
//! Rendering only: nothing in this workspace connects to SQL Server, but
//! `sqlmigrate --dialect sqlserver` prints the statements a step would run.

use crate::error::Result;
use crate::schema::{ColumnSchema, DefaultValue, IndexSchema, PrimaryKeySchema, SqlType};

use super::MigrationDialect;

const DEFINED_INDEXES_SQL: &str = "SELECT T.name AS table_name, I.name AS index_name, \
AC.name AS column_name, \
CASE WHEN I.is_unique_constraint = 1 OR I.is_unique = 1 THEN 1 ELSE 0 END AS is_unique \
FROM sys.tables AS T \
INNER JOIN sys.indexes AS I ON T.object_id = I.object_id \
INNER JOIN sys.index_columns AS IC ON IC.object_id = I.object_id AND IC.index_id = I.index_id \
INNER JOIN sys.all_columns AS AC ON IC.object_id = AC.object_id AND IC.column_id = AC.column_id \
WHERE I.is_primary_key = 0 AND I.type > 0 AND T.is_ms_shipped = 0 \
ORDER BY T.name, I.name";

const CONSTRAINTS_PER_TABLE_SQL: &str = "SELECT TABLE_NAME AS table_name, \
CONSTRAINT_NAME AS constraint_name \
FROM INFORMATION_SCHEMA.CONSTRAINT_TABLE_USAGE \
ORDER BY TABLE_NAME, CONSTRAINT_NAME";

/// SQL Server migration dialect.
#[derive(Debug, Clone, Default)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn literal(value: &str) -> String {
        format!("N'{}'", value.replace('\'', "''"))
    }

    fn clustering(clustered: bool) -> &'static str {
        if clustered {
            "CLUSTERED"
        } else {
            "NONCLUSTERED"
        }
    }
}

impl MigrationDialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer => "INT".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Boolean => "BIT".to_string(),
            SqlType::Varchar(len) => format!("NVARCHAR({})", len),
            SqlType::Text => "NVARCHAR(MAX)".to_string(),
            SqlType::DateTime => "DATETIME2".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Uuid => "UNIQUEIDENTIFIER".to_string(),
            SqlType::Decimal(p, s) => format!("DECIMAL({}, {})", p, s),
            SqlType::Double => "FLOAT".to_string(),
            SqlType::Blob => "VARBINARY(MAX)".to_string(),
        }
    }

    fn new_guid_function(&self) -> &'static str {
        "NEWID()"
    }

    fn defined_indexes_sql(&self) -> &'static str {
        DEFINED_INDEXES_SQL
    }

    fn constraints_per_table_sql(&self) -> &'static str {
        CONSTRAINTS_PER_TABLE_SQL
    }

    fn render_default(&self, default: &DefaultValue) -> Option<String> {
        match default {
            DefaultValue::NewGuid => Some(self.new_guid_function().to_string()),
            DefaultValue::CurrentDateTime => Some("GETDATE()".to_string()),
            DefaultValue::String(s) => Some(Self::literal(s)),
            other => other.to_sql(),
        }
    }

    fn identity_clause(&self, column: &ColumnSchema) -> Option<String> {
        Some(format!("IDENTITY({},1)", column.identity_seed.unwrap_or(1)))
    }

    fn primary_key_constraint(&self, key: &PrimaryKeySchema) -> String {
        format!(
            "CONSTRAINT {} PRIMARY KEY {} ({})",
            self.quote_identifier(&key.name),
            Self::clustering(key.clustered),
            self.column_list(&key.columns)
        )
    }

    fn create_table_prefix(&self, table: &str, if_not_exists: bool) -> String {
        if if_not_exists {
            format!(
                "IF OBJECT_ID({}, N'U') IS NULL CREATE TABLE {}",
                Self::literal(table),
                self.quote_identifier(table)
            )
        } else {
            format!("CREATE TABLE {}", self.quote_identifier(table))
        }
    }

    fn rename_table(&self, old_name: &str, new_name: &str) -> Result<Vec<String>> {
        Ok(vec![format!(
            "EXEC sp_rename {}, {}",
            Self::literal(old_name),
            Self::literal(new_name)
        )])
    }

    fn add_column(&self, table: &str, column: &ColumnSchema) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.column_definition(column, None)
        )
    }

    fn alter_column(&self, table: &str, column: &ColumnSchema) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} ALTER COLUMN {} {} {}",
            self.quote_identifier(table),
            self.quote_identifier(&column.name),
            self.type_name(&column.sql_type),
            if column.nullable { "NULL" } else { "NOT NULL" }
        )])
    }

    fn rename_column(&self, table: &str, old_name: &str, new_name: &str) -> Result<Vec<String>> {
        Ok(vec![format!(
            "EXEC sp_rename {}, {}, N'COLUMN'",
            Self::literal(&format!("{}.{}", table, old_name)),
            Self::literal(new_name)
        )])
    }

    fn create_index(&self, index: &IndexSchema, if_not_exists: bool) -> String {
        let mut sql = String::new();
        if if_not_exists {
            sql.push_str(&format!(
                "IF NOT EXISTS (SELECT 1 FROM sys.indexes WHERE name = {} AND object_id = OBJECT_ID({})) ",
                Self::literal(&index.name),
                Self::literal(&index.table)
            ));
        }
        sql.push_str("CREATE ");
        if index.is_unique() {
            sql.push_str("UNIQUE ");
        }
        sql.push_str(Self::clustering(index.clustered));
        sql.push_str(" INDEX ");
        sql.push_str(&self.quote_identifier(&index.name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_identifier(&index.table));
        sql.push_str(" (");
        sql.push_str(&self.column_list(&index.columns));
        sql.push(')');
        sql
    }

    fn drop_index(&self, name: &str, table: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::MigrationOperation;
    use crate::schema::TableSchema;

    fn dialect() -> SqlServerDialect {
        SqlServerDialect::new()
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(dialect().quote_identifier("node"), "[node]");
        assert_eq!(dialect().quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn test_create_table_with_clustered_key() {
        let table = TableSchema::new("node")
            .column(ColumnSchema::new("id", SqlType::Integer).identity(1060))
            .column(
                ColumnSchema::new("uniqueId", SqlType::Uuid)
                    .not_null()
                    .default(DefaultValue::NewGuid),
            )
            .column(
                ColumnSchema::new("createDate", SqlType::DateTime)
                    .not_null()
                    .default(DefaultValue::CurrentDateTime),
            )
            .primary_key(PrimaryKeySchema::new("PK_node", &["id"]))
            .index("IX_node_Path", &["uniqueId"]);

        let sql = dialect()
            .generate_sql(&MigrationOperation::create_table(table))
            .unwrap();
        assert_eq!(sql.len(), 2);
        assert!(sql[0].contains("[id] INT IDENTITY(1060,1) NOT NULL"));
        assert!(sql[0].contains("[uniqueId] UNIQUEIDENTIFIER NOT NULL DEFAULT NEWID()"));
        assert!(sql[0].contains("[createDate] DATETIME2 NOT NULL DEFAULT GETDATE()"));
        assert!(sql[0].contains("CONSTRAINT [PK_node] PRIMARY KEY CLUSTERED ([id])"));
        assert_eq!(
            sql[1],
            "CREATE NONCLUSTERED INDEX [IX_node_Path] ON [node] ([uniqueId])"
        );
    }

    #[test]
    fn test_create_table_if_not_exists_is_guarded() {
        let op = MigrationOperation::CreateTable {
            table: TableSchema::new("lock").column(ColumnSchema::new("id", SqlType::Integer)),
            if_not_exists: true,
        };
        let sql = dialect().generate_sql(&op).unwrap();
        assert!(sql[0].starts_with("IF OBJECT_ID(N'lock', N'U') IS NULL CREATE TABLE [lock] ("));
    }

    #[test]
    fn test_drop_keys_and_indexes() {
        let render = |op| dialect().generate_sql(&op).unwrap().remove(0);

        assert_eq!(
            render(MigrationOperation::drop_index("IX_A", "node")),
            "DROP INDEX [IX_A] ON [node]"
        );
        assert_eq!(
            render(MigrationOperation::drop_foreign_key("node", "FK_node_parent")),
            "ALTER TABLE [node] DROP CONSTRAINT [FK_node_parent]"
        );
        assert_eq!(
            render(MigrationOperation::drop_primary_key("node", "PK_node")),
            "ALTER TABLE [node] DROP CONSTRAINT [PK_node]"
        );
    }

    #[test]
    fn test_renames_use_sp_rename() {
        let sql = dialect()
            .generate_sql(&MigrationOperation::RenameColumn {
                table: "contentType".to_string(),
                old_name: "descr".to_string(),
                new_name: "description".to_string(),
            })
            .unwrap();
        assert_eq!(
            sql[0],
            "EXEC sp_rename N'contentType.descr', N'description', N'COLUMN'"
        );
    }

    #[test]
    fn test_add_and_alter_column() {
        let column = ColumnSchema::new("description", SqlType::Varchar(500));
        assert_eq!(
            dialect().add_column("contentType", &column),
            "ALTER TABLE [contentType] ADD [description] NVARCHAR(500)"
        );
        assert_eq!(
            dialect().alter_column("contentType", &column).unwrap()[0],
            "ALTER TABLE [contentType] ALTER COLUMN [description] NVARCHAR(500) NULL"
        );
    }

    #[test]
    fn test_catalog_queries() {
        assert!(dialect().defined_indexes_sql().contains("sys.indexes"));
        assert!(dialect()
            .constraints_per_table_sql()
            .contains("INFORMATION_SCHEMA.CONSTRAINT_TABLE_USAGE"));
    }
}
