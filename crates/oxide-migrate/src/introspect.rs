//! Reading the live schema.
//!
//! A [`SchemaSnapshot`] captures the tables, columns, indexes and named
//! constraints of a database at one point in time. Builders and code
//! expressions consult the snapshot instead of issuing queries themselves,
//! so they stay synchronous and side-effect free.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::dialect::{MigrationDialect, SqliteDialect};
use crate::error::{MigrateError, Result};

const TABLE_COLUMNS_SQL: &str = "SELECT m.name, p.name \
FROM sqlite_master m \
JOIN pragma_table_info(m.name) p \
WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%' \
ORDER BY m.name, p.cid";

const CONSTRAINT_NAME_PATTERN: &str =
    r#"(?i)CONSTRAINT\s+["\[`]?(\w+)["\]`]?\s+(?:PRIMARY\s+KEY|FOREIGN\s+KEY|UNIQUE|CHECK|REFERENCES)"#;

/// One indexed column of a user index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDefinition {
    /// Table the index belongs to.
    pub table_name: String,
    /// Index name.
    pub index_name: String,
    /// Indexed column.
    pub column_name: String,
    /// Whether the index enforces uniqueness.
    pub is_unique: bool,
}

/// A named constraint declared on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintDefinition {
    /// Owning table.
    pub table_name: String,
    /// Constraint name.
    pub constraint_name: String,
}

/// The live schema as seen at one point in time.
///
/// Name lookups ignore ASCII case, matching how the supported engines
/// resolve unquoted identifiers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, Vec<String>>,
    indexes: Vec<IndexDefinition>,
    constraints: Vec<ConstraintDefinition>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table and its columns.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, columns: &[&str]) -> Self {
        self.tables.insert(
            name.into(),
            columns.iter().map(ToString::to_string).collect(),
        );
        self
    }

    /// Adds one indexed column.
    #[must_use]
    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a named constraint.
    #[must_use]
    pub fn with_constraint(mut self, table: impl Into<String>, name: impl Into<String>) -> Self {
        self.constraints.push(ConstraintDefinition {
            table_name: table.into(),
            constraint_name: name.into(),
        });
        self
    }

    /// All user indexes, one entry per indexed column.
    #[must_use]
    pub fn defined_indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }

    /// All named constraints, grouped by table.
    #[must_use]
    pub fn constraints_per_table(&self) -> &[ConstraintDefinition] {
        &self.constraints
    }

    /// Table names in the snapshot.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Returns true if the table exists.
    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        self.columns_of(table).is_some()
    }

    /// Returns true if the table exists and has the column.
    #[must_use]
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns_of(table)
            .is_some_and(|cols| cols.iter().any(|c| c.eq_ignore_ascii_case(column)))
    }

    /// Returns true if an index with this name exists on any table.
    #[must_use]
    pub fn has_index(&self, name: &str) -> bool {
        self.indexes
            .iter()
            .any(|i| i.index_name.eq_ignore_ascii_case(name))
    }

    /// Returns true if a constraint with this name exists on any table.
    #[must_use]
    pub fn has_constraint(&self, name: &str) -> bool {
        self.constraints
            .iter()
            .any(|c| c.constraint_name.eq_ignore_ascii_case(name))
    }

    /// Distinct index names on `table`, in catalog order.
    #[must_use]
    pub fn index_names_on(&self, table: &str) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.indexes
            .iter()
            .filter(|i| i.table_name.eq_ignore_ascii_case(table))
            .filter(|i| seen.insert(i.index_name.as_str()))
            .map(|i| i.index_name.as_str())
            .collect()
    }

    /// Constraint names on `table`, in catalog order.
    #[must_use]
    pub fn constraint_names_on(&self, table: &str) -> Vec<&str> {
        self.constraints
            .iter()
            .filter(|c| c.table_name.eq_ignore_ascii_case(table))
            .map(|c| c.constraint_name.as_str())
            .collect()
    }

    fn columns_of(&self, table: &str) -> Option<&Vec<String>> {
        self.tables
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, cols)| cols)
    }
}

/// Reads a [`SchemaSnapshot`] from a live connection.
#[allow(async_fn_in_trait)]
pub trait Introspect {
    /// Reads the current database schema.
    async fn introspect(&mut self) -> Result<SchemaSnapshot>;
}

impl Introspect for SqliteConnection {
    async fn introspect(&mut self) -> Result<SchemaSnapshot> {
        let dialect = SqliteDialect::new();
        let mut snapshot = SchemaSnapshot::new();

        let columns: Vec<(String, String)> = sqlx::query_as(TABLE_COLUMNS_SQL)
            .fetch_all(&mut *self)
            .await?;
        for (table, column) in columns {
            snapshot.tables.entry(table).or_default().push(column);
        }

        let indexes: Vec<(String, String, Option<String>, i64)> =
            sqlx::query_as(dialect.defined_indexes_sql())
                .fetch_all(&mut *self)
                .await?;
        snapshot.indexes = indexes
            .into_iter()
            .map(|(table_name, index_name, column_name, unique)| IndexDefinition {
                table_name,
                index_name,
                // Expression indexes have no column name.
                column_name: column_name.unwrap_or_default(),
                is_unique: unique != 0,
            })
            .collect();

        let pattern = Regex::new(CONSTRAINT_NAME_PATTERN)
            .map_err(|e| MigrateError::Introspection(e.to_string()))?;
        let tables: Vec<(String, Option<String>)> =
            sqlx::query_as(dialect.constraints_per_table_sql())
                .fetch_all(&mut *self)
                .await?;
        for (table, sql) in tables {
            let Some(sql) = sql else { continue };
            for captures in pattern.captures_iter(&sql) {
                snapshot.constraints.push(ConstraintDefinition {
                    table_name: table.clone(),
                    constraint_name: captures[1].to_string(),
                });
            }
        }

        tracing::debug!(
            tables = snapshot.tables.len(),
            indexes = snapshot.indexes.len(),
            constraints = snapshot.constraints.len(),
            "Introspected schema"
        );
        Ok(snapshot)
    }
}
