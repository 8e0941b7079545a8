//! Content types.
//!
//! A content type describes a family of content items (documents, media or
//! members). Each type is stored as a row of `contentType` joined one to one
//! with the `node` row that carries its key, name and creator.

use std::fmt;

use oxide_migrate::prelude::{ColumnSchema, ForeignKeySchema, PrimaryKeySchema, SqlType, TableSchema};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use crate::node::{parse_uuid, NODE_TABLE};

/// Table name.
pub const CONTENT_TYPE_TABLE: &str = "contentType";

/// Maximum length of a type alias.
pub const MAX_ALIAS_LENGTH: usize = 255;

/// The family of items a content type describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentTypeKind {
    /// Document types.
    Document,
    /// Media types.
    Media,
    /// Member types.
    Member,
}

impl ContentTypeKind {
    /// Every kind.
    pub const ALL: [Self; 3] = [Self::Document, Self::Media, Self::Member];

    /// Object type of the nodes backing types of this kind.
    #[must_use]
    pub const fn object_type(self) -> Uuid {
        match self {
            Self::Document => Uuid::from_u128(0xa2cb_7800_f571_4787_9638_bc48_539a_0efb),
            Self::Media => Uuid::from_u128(0x4ea4_382b_2f5a_4c2b_9587_ae9b_3cf3_602e),
            Self::Member => Uuid::from_u128(0x9b54_16fb_e72f_45a9_a07b_5a9a_2709_ce43),
        }
    }

    /// Object type of the nodes backing items of this kind.
    #[must_use]
    pub const fn item_object_type(self) -> Uuid {
        match self {
            Self::Document => Uuid::from_u128(0xc66b_a18e_eaf3_4cff_8a22_41b1_6d66_a972),
            Self::Media => Uuid::from_u128(0xb796_f64c_1f99_4ffb_b886_4bf4_bc01_1a9c),
            Self::Member => Uuid::from_u128(0x39eb_0f98_b348_42a1_8662_e7eb_1848_7560),
        }
    }

    /// The kind whose type nodes carry `object_type`.
    #[must_use]
    pub fn from_object_type(object_type: Uuid) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.object_type() == object_type)
    }
}

impl fmt::Display for ContentTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Media => write!(f, "media"),
            Self::Member => write!(f, "member"),
        }
    }
}

/// A content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentType {
    /// Id of the backing node; `0` until saved.
    pub id: i32,
    /// Unique key, shared with the backing node.
    pub key: Uuid,
    /// Code-facing identifier.
    pub alias: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Family of items described.
    pub kind: ContentTypeKind,
    /// User who last saved the type.
    pub creator_id: i32,
}

impl ContentType {
    /// Creates an unsaved type.
    #[must_use]
    pub fn new(kind: ContentTypeKind, alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            key: Uuid::new_v4(),
            alias: alias.into(),
            name: name.into(),
            description: None,
            kind,
            creator_id: 0,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns true until the type has been saved.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.id == 0
    }
}

impl FromRow<'_, SqliteRow> for ContentType {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let key: String = row.try_get("uniqueId")?;
        let object_type: Option<String> = row.try_get("nodeObjectType")?;
        let kind = object_type
            .as_deref()
            .map(parse_uuid)
            .transpose()?
            .and_then(ContentTypeKind::from_object_type)
            .ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "nodeObjectType".to_string(),
                source: "not a content type object type".into(),
            })?;
        let name: Option<String> = row.try_get("text")?;
        let creator_id: Option<i32> = row.try_get("nodeUser")?;

        Ok(Self {
            id: row.try_get("id")?,
            key: parse_uuid(&key)?,
            alias: row.try_get("alias")?,
            name: name.unwrap_or_default(),
            description: row.try_get("description")?,
            kind,
            creator_id: creator_id.unwrap_or_default(),
        })
    }
}

/// Descriptor of the `contentType` table as first created.
#[must_use]
pub fn content_type_table() -> TableSchema {
    TableSchema::new(CONTENT_TYPE_TABLE)
        .column(ColumnSchema::new("nodeId", SqlType::Integer).not_null())
        .column(ColumnSchema::new("alias", SqlType::Varchar(MAX_ALIAS_LENGTH)).not_null())
        .primary_key(PrimaryKeySchema::new("PK_contentType", &["nodeId"]))
        .foreign_key(ForeignKeySchema::new(
            "FK_contentType_node",
            &["nodeId"],
            NODE_TABLE,
            &["id"],
        ))
        .unique_index("IX_contentType_alias", &["alias"])
}

/// The `description` column added in 8.1.0.
#[must_use]
pub fn description_column() -> ColumnSchema {
    ColumnSchema::new("description", SqlType::Varchar(1000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_object_types_round_trip() {
        for kind in ContentTypeKind::ALL {
            assert_eq!(ContentTypeKind::from_object_type(kind.object_type()), Some(kind));
            assert_eq!(ContentTypeKind::from_object_type(kind.item_object_type()), None);
        }
        assert_eq!(
            ContentTypeKind::Member.object_type().to_string(),
            "9b5416fb-e72f-45a9-a07b-5a9a2709ce43"
        );
    }

    #[test]
    fn test_kind_serde() {
        assert_eq!(
            serde_json::to_string(&ContentTypeKind::Media).unwrap(),
            "\"media\""
        );
        assert_eq!(ContentTypeKind::Document.to_string(), "document");
    }

    #[test]
    fn test_new_type_is_unsaved() {
        let ct = ContentType::new(ContentTypeKind::Member, "member", "Member")
            .with_description("Site members");
        assert!(ct.is_new());
        assert_eq!(ct.description.as_deref(), Some("Site members"));
        assert!(!ct.key.is_nil());
    }

    #[test]
    fn test_table_descriptor() {
        let table = content_type_table();
        assert_eq!(table.primary_key.as_ref().unwrap().name, "PK_contentType");
        assert_eq!(table.foreign_keys[0].references_table, "node");
        assert!(table.get_column("description").is_none());
        assert!(description_column().nullable);
    }
}
