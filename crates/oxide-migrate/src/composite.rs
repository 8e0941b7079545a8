//! Composite operations that expand into many primitive statements.

use std::collections::BTreeSet;

use crate::context::MigrationContext;
use crate::error::Result;

const FOREIGN_KEY_PREFIX: &str = "FK_";
const PRIMARY_KEY_PREFIX: &str = "PK_";

// Table names compare the way SQL Server and SQLite resolve identifiers;
// key prefixes are matched exactly.
fn on_table(candidate: &str, table: Option<&str>) -> bool {
    table.map_or(true, |t| candidate.eq_ignore_ascii_case(t))
}

/// Drops the indexes, then the `FK_` constraints, then the `PK_` constraints
/// of `table`, or of every table when `table` is `None`.
///
/// Foreign keys go before the primary keys they may reference. The
/// table-scoped form is the all-table result filtered to `table`.
pub fn drop_keys_and_indexes(ctx: &MigrationContext<'_>, table: Option<&str>) -> Result<Vec<String>> {
    let mut local = ctx.local_migration();

    let mut seen = BTreeSet::new();
    for index in ctx.schema.defined_indexes() {
        if !on_table(&index.table_name, table) {
            continue;
        }
        if seen.insert((index.table_name.as_str(), index.index_name.as_str())) {
            local
                .delete()
                .index(index.index_name.as_str())
                .on_table(index.table_name.as_str());
        }
    }

    let constraints: Vec<_> = ctx
        .schema
        .constraints_per_table()
        .iter()
        .filter(|c| on_table(&c.table_name, table))
        .collect();

    for constraint in constraints
        .iter()
        .filter(|c| c.constraint_name.starts_with(FOREIGN_KEY_PREFIX))
    {
        local
            .delete()
            .foreign_key(constraint.constraint_name.as_str())
            .on_table(constraint.table_name.as_str());
    }

    for constraint in constraints
        .iter()
        .filter(|c| c.constraint_name.starts_with(PRIMARY_KEY_PREFIX))
    {
        local
            .delete()
            .primary_key(constraint.constraint_name.as_str())
            .from_table(constraint.table_name.as_str());
    }

    tracing::debug!(
        step = ctx.step,
        table = table.unwrap_or("*"),
        expressions = local.len(),
        "Expanded drop keys and indexes"
    );
    local.statements()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{SqlServerDialect, SqliteDialect};
    use crate::error::MigrateError;
    use crate::introspect::{IndexDefinition, SchemaSnapshot};

    fn index(table: &str, name: &str, column: &str) -> IndexDefinition {
        IndexDefinition {
            table_name: table.to_string(),
            index_name: name.to_string(),
            column_name: column.to_string(),
            is_unique: false,
        }
    }

    fn schema() -> SchemaSnapshot {
        SchemaSnapshot::new()
            .with_table("node", &["id", "parentId", "a"])
            .with_table("other", &["id", "b"])
            .with_index(index("node", "IX_A", "a"))
            .with_index(index("other", "IX_B", "b"))
            .with_constraint("node", "PK_node")
            .with_constraint("node", "FK_node_parent")
    }

    #[test]
    fn test_drop_keys_and_indexes_for_node() {
        let dialect = SqlServerDialect::new();
        let ctx = MigrationContext::new(&dialect, schema(), "s");

        let statements = drop_keys_and_indexes(&ctx, Some("node")).unwrap();
        assert_eq!(
            statements,
            vec![
                "DROP INDEX [IX_A] ON [node]".to_string(),
                "ALTER TABLE [node] DROP CONSTRAINT [FK_node_parent]".to_string(),
                "ALTER TABLE [node] DROP CONSTRAINT [PK_node]".to_string(),
            ]
        );
        assert!(statements.iter().all(|s| !s.contains("other") && !s.contains("IX_B")));
    }

    #[test]
    fn test_foreign_keys_before_primary_keys_across_tables() {
        let schema = schema()
            .with_constraint("other", "PK_other")
            .with_constraint("other", "FK_other_node");
        let dialect = SqlServerDialect::new();
        let ctx = MigrationContext::new(&dialect, schema, "s");

        let statements = drop_keys_and_indexes(&ctx, None).unwrap();
        assert_eq!(statements.len(), 6);

        let last_fk = statements.iter().rposition(|s| s.contains("[FK_")).unwrap();
        let first_pk = statements.iter().position(|s| s.contains("[PK_")).unwrap();
        let last_index = statements.iter().rposition(|s| s.starts_with("DROP INDEX")).unwrap();
        assert!(last_index < statements.iter().position(|s| s.contains("[FK_")).unwrap());
        assert!(last_fk < first_pk);
    }

    #[test]
    fn test_table_scope_is_a_filter_of_all_tables() {
        let dialect = SqlServerDialect::new();
        let ctx = MigrationContext::new(&dialect, schema(), "s");

        let all = drop_keys_and_indexes(&ctx, None).unwrap();
        let scoped = drop_keys_and_indexes(&ctx, Some("NODE")).unwrap();
        let filtered: Vec<String> = all.into_iter().filter(|s| s.contains("[node]")).collect();
        assert_eq!(scoped, filtered);
    }

    #[test]
    fn test_multi_column_index_dropped_once() {
        let schema = SchemaSnapshot::new()
            .with_index(index("node", "IX_node_ParentPath", "parentId"))
            .with_index(index("node", "IX_node_ParentPath", "path"));
        let dialect = SqliteDialect::new();
        let ctx = MigrationContext::new(&dialect, schema, "s");

        assert_eq!(
            drop_keys_and_indexes(&ctx, Some("node")).unwrap(),
            vec!["DROP INDEX \"IX_node_ParentPath\"".to_string()]
        );
    }

    #[test]
    fn test_unprefixed_constraints_are_left_alone() {
        let schema = SchemaSnapshot::new().with_constraint("node", "CK_node_level");
        let dialect = SqlServerDialect::new();
        let ctx = MigrationContext::new(&dialect, schema, "s");

        assert!(drop_keys_and_indexes(&ctx, Some("node")).unwrap().is_empty());
    }

    #[test]
    fn test_lowercase_key_prefixes_are_left_alone() {
        let schema = SchemaSnapshot::new()
            .with_constraint("node", "pk_legacy_note")
            .with_constraint("Node", "fk_lower")
            .with_constraint("node", "FK_node_parent");
        let dialect = SqlServerDialect::new();
        let ctx = MigrationContext::new(&dialect, schema, "s");

        assert_eq!(
            drop_keys_and_indexes(&ctx, Some("node")).unwrap(),
            vec!["ALTER TABLE [node] DROP CONSTRAINT [FK_node_parent]".to_string()]
        );
    }

    #[test]
    fn test_sqlite_cannot_drop_constraints() {
        let dialect = SqliteDialect::new();
        let ctx = MigrationContext::new(&dialect, schema(), "s");

        assert!(matches!(
            drop_keys_and_indexes(&ctx, Some("node")),
            Err(MigrateError::Unsupported { .. })
        ));
    }
}
