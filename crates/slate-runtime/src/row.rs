//! Decoded result rows.

use std::sync::Arc;

use slate_core::query::ResultColumn;
use slate_core::value::{decode, FromValue, SqlValue, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row as _, TypeInfo, ValueRef};

use crate::error::{Result, RuntimeError};

/// One result row, decoded through the compiled query's column types.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Builds a row from column names and values of the same length.
    #[must_use]
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub(crate) fn decode(
        row: &SqliteRow,
        columns: &Arc<[String]>,
        types: &[ResultColumn],
    ) -> Result<Self> {
        let mut values = Vec::with_capacity(types.len());
        for (index, column) in types.iter().enumerate() {
            values.push(decode(raw_value(row, index)?, column.ty)?);
        }
        Ok(Self::new(Arc::clone(columns), values))
    }

    /// Converts the value of `column` into `T`.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use slate_core::Value;
    /// use slate_runtime::Row;
    ///
    /// let row = Row::new(
    ///     Arc::from(vec!["name".to_string(), "bio".to_string()]),
    ///     vec![Value::Text("alice".into()), Value::Null],
    /// );
    /// assert_eq!(row.get::<String>("name").unwrap(), "alice");
    /// assert_eq!(row.get::<Option<String>>("bio").unwrap(), None);
    /// assert!(row.get::<i64>("age").is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// [`RuntimeError::MissingColumn`] for an unknown column and
    /// [`RuntimeError::Decode`] when the value cannot become `T`.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self
            .value(column)
            .ok_or_else(|| RuntimeError::MissingColumn(column.to_string()))?;
        Ok(T::from_value(value.clone())?)
    }

    /// The value of `column`.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Column names, in result order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values, in result order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Reads a column as whatever storage class the engine holds for it.
fn raw_value(row: &SqliteRow, index: usize) -> std::result::Result<SqlValue, sqlx::Error> {
    let class = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };
    Ok(match class.as_str() {
        "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => SqlValue::Int(row.try_get_unchecked(index)?),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => SqlValue::Float(row.try_get_unchecked(index)?),
        "BLOB" => SqlValue::Blob(row.try_get_unchecked(index)?),
        _ => SqlValue::Text(row.try_get_unchecked(index)?),
    })
}
