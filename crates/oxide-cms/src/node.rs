//! The content tree.
//!
//! Every piece of content, and every content type, is backed by one row of
//! the `node` table. Rows form a tree through `parentId`; `path` holds the
//! comma-separated ids from the root down to the node itself so subtrees can
//! be selected with a single prefix match.

use chrono::{DateTime, Utc};
use oxide_migrate::prelude::{
    ColumnSchema, DefaultValue, ForeignKeySchema, PrimaryKeySchema, SqlType, TableSchema,
};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

/// Table name.
pub const NODE_TABLE: &str = "node";

/// Id of the root sentinel node.
pub const ROOT_ID: i32 = -1;

/// Path of the root sentinel node.
pub const ROOT_PATH: &str = "-1";

/// Unique id of the root sentinel node.
pub const ROOT_KEY: Uuid = Uuid::from_u128(0x9167_24a5_173d_4619_b97e_b9de_133d_d6f5);

/// Object type of the root sentinel node.
pub const ROOT_OBJECT_TYPE: Uuid = Uuid::from_u128(0xea7d_8624_4cfe_4578_a871_24aa_946b_f34d);

/// First id handed out to a non-root node.
pub const NODE_ID_SEED: i64 = 1060;

/// Maximum length of a node path.
pub const MAX_PATH_LENGTH: usize = 150;

/// Columns selected when loading a [`Node`].
pub(crate) const NODE_COLUMNS: &str = r#""id", "uniqueId", "parentId", "level", "path", "sortOrder", "trashed", "nodeUser", "text", "nodeObjectType", "createDate""#;

/// A node of the content tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Identity; `-1` for the root.
    pub id: i32,
    /// Globally unique key.
    pub unique_id: Uuid,
    /// Parent node id; the root is its own parent.
    pub parent_id: i32,
    /// Depth below the root.
    pub level: i16,
    /// Comma-separated ids from the root to this node.
    pub path: String,
    /// Position among siblings.
    pub sort_order: i32,
    /// Whether the node is in the recycle bin.
    pub trashed: bool,
    /// User who created the node.
    pub user_id: Option<i32>,
    /// Display text.
    pub text: Option<String>,
    /// Kind of object stored at this node.
    pub object_type: Option<Uuid>,
    /// Creation timestamp.
    pub create_date: DateTime<Utc>,
}

impl Node {
    /// Returns true for the root sentinel.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }

    /// Returns true if `other` lies in the subtree below this node.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other
            .path
            .strip_prefix(self.path.as_str())
            .is_some_and(|rest| rest.starts_with(','))
    }

    /// Ids along the path, root first.
    #[must_use]
    pub fn path_ids(&self) -> Vec<i32> {
        self.path.split(',').filter_map(|id| id.parse().ok()).collect()
    }
}

impl FromRow<'_, SqliteRow> for Node {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let unique_id: String = row.try_get("uniqueId")?;
        let object_type: Option<String> = row.try_get("nodeObjectType")?;
        let create_date: String = row.try_get("createDate")?;

        Ok(Self {
            id: row.try_get("id")?,
            unique_id: parse_uuid(&unique_id)?,
            parent_id: row.try_get("parentId")?,
            level: row.try_get("level")?,
            path: row.try_get("path")?,
            sort_order: row.try_get("sortOrder")?,
            trashed: row.try_get("trashed")?,
            user_id: row.try_get("nodeUser")?,
            text: row.try_get("text")?,
            object_type: object_type.as_deref().map(parse_uuid).transpose()?,
            create_date: parse_timestamp(&create_date),
        })
    }
}

pub(crate) fn parse_uuid(value: &str) -> sqlx::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite CURRENT_TIMESTAMP format fallback
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}

/// Input for creating a node.
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    /// Parent node id.
    pub parent_id: i32,
    /// Display text.
    pub text: Option<String>,
    /// Kind of object stored at the node.
    pub object_type: Option<Uuid>,
    /// Creating user.
    pub user_id: Option<i32>,
    /// Explicit key; a fresh one is generated when absent.
    pub unique_id: Option<Uuid>,
}

impl NewNode {
    /// A node under `parent_id`.
    #[must_use]
    pub fn under(parent_id: i32) -> Self {
        Self {
            parent_id,
            ..Self::default()
        }
    }

    /// Sets the display text.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the object type.
    #[must_use]
    pub const fn object_type(mut self, object_type: Uuid) -> Self {
        self.object_type = Some(object_type);
        self
    }

    /// Sets the creating user.
    #[must_use]
    pub const fn user(mut self, user_id: i32) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Sets the key.
    #[must_use]
    pub const fn unique_id(mut self, unique_id: Uuid) -> Self {
        self.unique_id = Some(unique_id);
        self
    }
}

/// Descriptor of the `node` table.
#[must_use]
pub fn node_table() -> TableSchema {
    TableSchema::new(NODE_TABLE)
        .column(ColumnSchema::new("id", SqlType::Integer).identity(NODE_ID_SEED))
        .column(
            ColumnSchema::new("uniqueId", SqlType::Uuid)
                .not_null()
                .default(DefaultValue::NewGuid),
        )
        .column(ColumnSchema::new("parentId", SqlType::Integer).not_null())
        .column(ColumnSchema::new("level", SqlType::SmallInt).not_null())
        .column(ColumnSchema::new("path", SqlType::Varchar(MAX_PATH_LENGTH)).not_null())
        .column(ColumnSchema::new("sortOrder", SqlType::Integer).not_null())
        .column(
            ColumnSchema::new("trashed", SqlType::Boolean)
                .not_null()
                .default(DefaultValue::Bool(false)),
        )
        .column(ColumnSchema::new("nodeUser", SqlType::Integer))
        .column(ColumnSchema::new("text", SqlType::Varchar(255)))
        .column(ColumnSchema::new("nodeObjectType", SqlType::Uuid))
        .column(
            ColumnSchema::new("createDate", SqlType::DateTime)
                .not_null()
                .default(DefaultValue::CurrentDateTime),
        )
        .primary_key(PrimaryKeySchema::new("PK_node", &["id"]))
        .foreign_key(ForeignKeySchema::new(
            "FK_node_parent",
            &["parentId"],
            NODE_TABLE,
            &["id"],
        ))
        .unique_index("IX_node_UniqueId", &["uniqueId"])
        .index("IX_node_ParentId", &["parentId"])
        .index("IX_node_Path", &["path"])
        .index("IX_node_Trashed", &["trashed"])
        .index("IX_node_ObjectType", &["nodeObjectType"])
}
