//! Column-level schema types and the builder functions that compose them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical column type. Storage follows [`crate::value::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// UTF-8 text.
    Text,
    /// 64-bit integer.
    Integer,
    /// 64-bit float.
    Real,
    /// Boolean stored as 0/1.
    Boolean,
    /// UTC timestamp stored as RFC 3339 text.
    DateTime,
    /// JSON document stored as text.
    Json,
    /// Raw bytes.
    Blob,
}

impl ColumnType {
    /// Every column type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Text,
        Self::Integer,
        Self::Real,
        Self::Boolean,
        Self::DateTime,
        Self::Json,
        Self::Blob,
    ];

    /// Returns `true` for types that support numeric RANGE offsets.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Real)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Json => "json",
            Self::Blob => "blob",
        })
    }
}

/// Column default. Literal variants are static; the others are
/// evaluated by the engine when a row is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    /// `DEFAULT NULL`.
    Null,
    /// Boolean literal.
    Boolean(bool),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Real(f64),
    /// Text literal.
    Text(String),
    /// `DEFAULT CURRENT_TIMESTAMP`.
    CurrentTimestamp,
    /// Raw SQL expression, emitted in parentheses.
    Expression(String),
}

impl DefaultValue {
    /// Returns `true` if the default is a constant that `ALTER TABLE ...
    /// ADD COLUMN` accepts.
    #[must_use]
    pub const fn is_static(&self) -> bool {
        !matches!(self, Self::CurrentTimestamp | Self::Expression(_))
    }

    /// Renders the default as it appears after `DEFAULT`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Real(f) => format!("{f:?}"),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
            Self::Expression(expr) => format!("({expr})"),
        }
    }
}

/// Action taken on the referencing rows when the referenced row is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    /// Refuse the delete.
    #[default]
    Restrict,
    /// Delete the referencing rows too.
    Cascade,
}

impl OnDelete {
    /// SQL keyword(s) for this action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
        }
    }
}

/// Foreign key target of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
    /// Delete action.
    #[serde(default)]
    pub on_delete: OnDelete,
}

/// A declared column.
///
/// Columns are `NOT NULL` unless marked [`nullable`](Self::nullable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Logical type.
    #[serde(rename = "type")]
    pub ty: ColumnType,
    /// Whether NULL is allowed.
    #[serde(default)]
    pub nullable: bool,
    /// Default value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// UNIQUE constraint.
    #[serde(default)]
    pub unique: bool,
    /// CHECK predicate, raw SQL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    /// Foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyRef>,
    /// Part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// AUTOINCREMENT on an INTEGER PRIMARY KEY.
    #[serde(default)]
    pub autoincrement: bool,
}

impl ColumnDescriptor {
    /// Creates a NOT NULL column with no modifiers.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            default: None,
            unique: false,
            check: None,
            references: None,
            primary_key: false,
            autoincrement: false,
        }
    }

    /// Allows NULL.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets a default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Defaults to the current timestamp.
    #[must_use]
    pub fn default_now(self) -> Self {
        self.default(DefaultValue::CurrentTimestamp)
    }

    /// Adds a UNIQUE constraint.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds a CHECK constraint.
    #[must_use]
    pub fn check(mut self, predicate: impl Into<String>) -> Self {
        self.check = Some(predicate.into());
        self
    }

    /// Adds a foreign key to `table.column` with `ON DELETE RESTRICT`.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKeyRef {
            table: table.into(),
            column: column.into(),
            on_delete: OnDelete::Restrict,
        });
        self
    }

    /// Sets the delete action of the foreign key. No-op without one.
    #[must_use]
    pub fn on_delete(mut self, action: OnDelete) -> Self {
        if let Some(fk) = self.references.as_mut() {
            fk.on_delete = action;
        }
        self
    }

    /// Shorthand for `on_delete(OnDelete::Cascade)`.
    #[must_use]
    pub fn cascade(self) -> Self {
        self.on_delete(OnDelete::Cascade)
    }

    /// Marks the column as (part of) the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks an INTEGER PRIMARY KEY as AUTOINCREMENT.
    #[must_use]
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Returns `true` if SQLite can add this column with `ALTER TABLE ...
    /// ADD COLUMN` to a table that may already hold rows.
    #[must_use]
    pub fn is_addable(&self) -> bool {
        if self.primary_key || self.unique {
            return false;
        }
        if let Some(default) = &self.default {
            if !default.is_static() {
                return false;
            }
        }
        let null_default = matches!(self.default, None | Some(DefaultValue::Null));
        if self.references.is_some() && !(self.nullable && null_default) {
            return false;
        }
        self.nullable || !null_default
    }

    /// Returns `true` if SQLite can remove this column with `ALTER TABLE
    /// ... DROP COLUMN`.
    #[must_use]
    pub const fn is_droppable(&self) -> bool {
        !self.primary_key && !self.unique && self.references.is_none() && self.check.is_none()
    }

    /// Compares everything but the name.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.ty == other.ty
            && self.nullable == other.nullable
            && self.default == other.default
            && self.unique == other.unique
            && self.check == other.check
            && self.references == other.references
            && self.primary_key == other.primary_key
            && self.autoincrement == other.autoincrement
    }
}

/// A TEXT column.
#[must_use]
pub fn text(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(name, ColumnType::Text)
}

/// An INTEGER column.
#[must_use]
pub fn integer(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(name, ColumnType::Integer)
}

/// A REAL column.
#[must_use]
pub fn real(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(name, ColumnType::Real)
}

/// A boolean column.
#[must_use]
pub fn boolean(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(name, ColumnType::Boolean)
}

/// A date/time column.
#[must_use]
pub fn datetime(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(name, ColumnType::DateTime)
}

/// A JSON column.
#[must_use]
pub fn json(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(name, ColumnType::Json)
}

/// A BLOB column.
#[must_use]
pub fn blob(name: impl Into<String>) -> ColumnDescriptor {
    ColumnDescriptor::new(name, ColumnType::Blob)
}
