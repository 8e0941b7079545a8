//! Schema representation types.
//!
//! Tables, columns, keys and indexes are described as plain data. Dialects
//! interpret these descriptors when rendering DDL; nothing here knows about a
//! particular database engine.

use serde::{Deserialize, Serialize};

/// SQL data types supported by the migration system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Small integer (16-bit).
    SmallInt,
    /// Boolean.
    Boolean,
    /// Variable-length character string.
    Varchar(usize),
    /// Unbounded text.
    Text,
    /// Date and time.
    DateTime,
    /// Date only.
    Date,
    /// Globally unique identifier.
    Uuid,
    /// Decimal with precision and scale.
    Decimal(u8, u8),
    /// Floating point (double precision).
    Double,
    /// Binary large object.
    Blob,
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum DefaultValue {
    /// No default value.
    #[default]
    None,
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// String default.
    String(String),
    /// Raw SQL expression, rendered verbatim.
    Expression(String),
    /// A freshly generated GUID, rendered with the engine's own function.
    NewGuid,
    /// The current date and time, rendered with the engine's own function.
    CurrentDateTime,
}

impl DefaultValue {
    /// Returns the portable SQL representation of this default value.
    ///
    /// `NewGuid` and `CurrentDateTime` have no portable form; dialects render
    /// them and this returns `None` for both.
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::None | Self::NewGuid | Self::CurrentDateTime => None,
            Self::Null => Some("NULL".to_string()),
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Self::Expression(expr) => Some(expr.clone()),
        }
    }

    /// Returns true if a default is set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
        }
    }
}

/// Schema definition for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// SQL data type.
    pub sql_type: SqlType,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Default value.
    pub default: DefaultValue,
    /// Whether this column is an identity column.
    pub auto_increment: bool,
    /// First value handed out by the identity column.
    pub identity_seed: Option<i64>,
    /// Whether this column has a UNIQUE constraint.
    pub unique: bool,
}

impl ColumnSchema {
    /// Creates a new nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            default: DefaultValue::None,
            auto_increment: false,
            identity_seed: None,
            unique: false,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = value;
        self
    }

    /// Makes this an identity column.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.nullable = false;
        self
    }

    /// Makes this an identity column whose first value is `seed`.
    #[must_use]
    pub fn identity(mut self, seed: i64) -> Self {
        self.identity_seed = Some(seed);
        self.auto_increment()
    }

    /// Sets the column as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A named primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryKeySchema {
    /// Constraint name (conventionally `PK_<table>`).
    pub name: String,
    /// Key columns.
    pub columns: Vec<String>,
    /// Whether the key is the clustered index (SQL Server only).
    pub clustered: bool,
}

impl PrimaryKeySchema {
    /// Creates a clustered primary key over `columns`.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(ToString::to_string).collect(),
            clustered: true,
        }
    }
}

/// Schema definition for a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeySchema {
    /// Constraint name (conventionally `FK_...`).
    pub name: String,
    /// Column(s) in the referencing table.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub references_table: String,
    /// Referenced column(s).
    pub references_columns: Vec<String>,
    /// Action on delete.
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    pub on_update: ForeignKeyAction,
}

impl ForeignKeySchema {
    /// Creates a foreign key with `NO ACTION` semantics.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        columns: &[&str],
        references_table: impl Into<String>,
        references_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(ToString::to_string).collect(),
            references_table: references_table.into(),
            references_columns: references_columns.iter().map(ToString::to_string).collect(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }
}

/// Uniqueness of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// Values must be unique.
    Unique,
    /// Duplicates allowed.
    NonUnique,
}

/// Schema definition for an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Index name.
    pub name: String,
    /// Owning table.
    pub table: String,
    /// Columns included in the index.
    pub columns: Vec<String>,
    /// Unique or not.
    pub kind: IndexKind,
    /// Whether the index is clustered (SQL Server only).
    pub clustered: bool,
}

impl IndexSchema {
    /// Creates a non-unique, non-clustered index.
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: columns.iter().map(ToString::to_string).collect(),
            kind: IndexKind::NonUnique,
            clustered: false,
        }
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.kind = IndexKind::Unique;
        self
    }

    /// Returns true for unique indexes.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.kind == IndexKind::Unique
    }
}

/// Complete schema definition for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Column definitions.
    pub columns: Vec<ColumnSchema>,
    /// Primary key, if any.
    pub primary_key: Option<PrimaryKeySchema>,
    /// Foreign key definitions.
    pub foreign_keys: Vec<ForeignKeySchema>,
    /// Indexes created alongside the table.
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    /// Creates a new table schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Adds a column to the table.
    #[must_use]
    pub fn column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key.
    #[must_use]
    pub fn primary_key(mut self, key: PrimaryKeySchema) -> Self {
        self.primary_key = Some(key);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKeySchema) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Adds an index on this table.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>, columns: &[&str]) -> Self {
        let index = IndexSchema::new(name, self.name.clone(), columns);
        self.indexes.push(index);
        self
    }

    /// Adds a unique index on this table.
    #[must_use]
    pub fn unique_index(mut self, name: impl Into<String>, columns: &[&str]) -> Self {
        let index = IndexSchema::new(name, self.name.clone(), columns).unique();
        self.indexes.push(index);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the single primary key column, when the key has exactly one.
    #[must_use]
    pub fn single_key_column(&self) -> Option<&ColumnSchema> {
        match self.primary_key.as_ref().map(|pk| pk.columns.as_slice()) {
            Some([column]) => self.get_column(column),
            _ => None,
        }
    }

    /// Returns the identity column, if any.
    #[must_use]
    pub fn identity_column(&self) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.auto_increment)
    }
}
