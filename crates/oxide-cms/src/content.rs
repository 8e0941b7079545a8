//! Content items.
//!
//! An item is a node plus a `content` row naming its content type. The row
//! also caches the type's alias; that cache is one of the structures rebuilt
//! whenever a type is saved.

use oxide_migrate::prelude::{ColumnSchema, ForeignKeySchema, PrimaryKeySchema, SqlType, TableSchema};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::content_type::{CONTENT_TYPE_TABLE, MAX_ALIAS_LENGTH};
use crate::node::{Node, NODE_TABLE};

/// Table name.
pub const CONTENT_TABLE: &str = "content";

/// A content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentItem {
    /// Backing node.
    pub node: Node,
    /// Id of the item's content type.
    pub content_type_id: i32,
    /// Alias of the content type as of the last rebuild.
    pub content_type_alias: Option<String>,
}

impl FromRow<'_, SqliteRow> for ContentItem {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            node: Node::from_row(row)?,
            content_type_id: row.try_get("contentTypeId")?,
            content_type_alias: row.try_get("contentTypeAlias")?,
        })
    }
}

/// Descriptor of the `content` table.
#[must_use]
pub fn content_table() -> TableSchema {
    TableSchema::new(CONTENT_TABLE)
        .column(ColumnSchema::new("nodeId", SqlType::Integer).not_null())
        .column(ColumnSchema::new("contentTypeId", SqlType::Integer).not_null())
        .column(ColumnSchema::new(
            "contentTypeAlias",
            SqlType::Varchar(MAX_ALIAS_LENGTH),
        ))
        .primary_key(PrimaryKeySchema::new("PK_content", &["nodeId"]))
        .foreign_key(ForeignKeySchema::new(
            "FK_content_node",
            &["nodeId"],
            NODE_TABLE,
            &["id"],
        ))
        .foreign_key(ForeignKeySchema::new(
            "FK_content_contentType",
            &["contentTypeId"],
            CONTENT_TYPE_TABLE,
            &["nodeId"],
        ))
        .index("IX_content_contentTypeId", &["contentTypeId"])
}
