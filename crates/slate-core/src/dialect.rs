//! SQLite identifier quoting and type names, shared by the query
//! compiler and the DDL generator.

use crate::schema::ColumnType;

/// Quotes an identifier with double quotes, doubling embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Renders `"table"."column"`.
#[must_use]
pub fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", quote_identifier(table), quote_identifier(column))
}

/// Quotes a string literal for DDL, where bind parameters are not allowed.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Declared SQLite type for a logical column type.
#[must_use]
pub const fn sql_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Integer | ColumnType::Boolean => "INTEGER",
        ColumnType::Real => "REAL",
        ColumnType::Text | ColumnType::DateTime | ColumnType::Json => "TEXT",
        ColumnType::Blob => "BLOB",
    }
}
