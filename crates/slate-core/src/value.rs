//! Type codec between typed values and SQLite storage classes.
//!
//! [`Value`] is what client code and the query compiler work with.
//! [`SqlValue`] is what actually gets bound to a statement or read back
//! from a row: SQLite only stores NULL, INTEGER, REAL, TEXT and BLOB.
//! [`encode`] and [`decode`] convert between the two so that
//! `decode(encode(v), ty) == v` for every supported value.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{CompileError, DecodeError};
use crate::schema::ColumnType;

/// A typed value as seen by application code.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean, stored as 0/1.
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// UTC timestamp, stored as RFC 3339 text.
    DateTime(DateTime<Utc>),
    /// JSON document, stored as compact JSON text.
    Json(serde_json::Value),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the column type this value naturally belongs to, or
    /// `None` for NULL.
    #[must_use]
    pub const fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(ColumnType::Boolean),
            Self::Integer(_) => Some(ColumnType::Integer),
            Self::Real(_) => Some(ColumnType::Real),
            Self::Text(_) => Some(ColumnType::Text),
            Self::DateTime(_) => Some(ColumnType::DateTime),
            Self::Json(_) => Some(ColumnType::Json),
            Self::Blob(_) => Some(ColumnType::Blob),
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::DateTime(_) => "datetime",
            Self::Json(_) => "json",
            Self::Blob(_) => "blob",
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if this value can be stored in a column of `ty`
    /// without changing its meaning.
    #[must_use]
    pub fn fits(&self, ty: ColumnType) -> bool {
        match (self, ty) {
            (Self::Null, _)
            | (Self::Boolean(_), ColumnType::Boolean)
            | (Self::Integer(_), ColumnType::Integer | ColumnType::Real)
            | (Self::Real(_), ColumnType::Real)
            | (Self::Text(_), ColumnType::Text)
            | (Self::DateTime(_), ColumnType::DateTime)
            | (Self::Json(_), ColumnType::Json)
            | (Self::Blob(_), ColumnType::Blob) => true,
            (Self::Text(s), ColumnType::DateTime) => parse_datetime(s).is_ok(),
            _ => false,
        }
    }
}

/// A value in one of SQLite's storage classes.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,
    /// INTEGER.
    Int(i64),
    /// REAL.
    Float(f64),
    /// TEXT.
    Text(String),
    /// BLOB.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Storage class name as SQLite reports it from `typeof()`.
    #[must_use]
    pub const fn storage_class(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "integer",
            Self::Float(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }
}

/// Encodes a typed value into its storage form.
#[must_use]
pub fn encode(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Int(i64::from(*b)),
        Value::Integer(i) => SqlValue::Int(*i),
        Value::Real(f) => SqlValue::Float(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::DateTime(dt) => SqlValue::Text(format_datetime(dt)),
        Value::Json(j) => SqlValue::Text(j.to_string()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

/// Encodes a value that is about to be written into a column of `ty`,
/// rejecting values that do not fit.
///
/// Integers written to REAL columns are widened so the stored class
/// matches the declaration.
pub fn encode_for(column: &str, value: &Value, ty: ColumnType) -> Result<SqlValue, CompileError> {
    if !value.fits(ty) {
        return Err(CompileError::TypeMismatch {
            column: column.to_string(),
            expected: ty,
            found: value.kind(),
        });
    }
    Ok(match (value, ty) {
        #[allow(clippy::cast_precision_loss)]
        (Value::Integer(i), ColumnType::Real) => SqlValue::Float(*i as f64),
        (Value::Text(s), ColumnType::DateTime) => parse_datetime(s)
            .map(|dt| SqlValue::Text(format_datetime(&dt)))
            .unwrap_or_else(|_| SqlValue::Text(s.clone())),
        _ => encode(value),
    })
}

/// Decodes a stored value as `ty`.
///
/// NULL decodes to [`Value::Null`] for every type. Date/time columns
/// accept RFC 3339 text, SQLite's own `CURRENT_TIMESTAMP` format, plain
/// dates and unix seconds.
pub fn decode(raw: SqlValue, ty: ColumnType) -> Result<Value, DecodeError> {
    let mismatch = |raw: &SqlValue| DecodeError::TypeMismatch {
        expected: ty,
        found: raw.storage_class(),
    };
    match (raw, ty) {
        (SqlValue::Null, _) => Ok(Value::Null),

        (SqlValue::Int(i), ColumnType::Boolean) => Ok(Value::Boolean(i != 0)),
        (SqlValue::Int(i), ColumnType::Integer) => Ok(Value::Integer(i)),
        #[allow(clippy::cast_precision_loss)]
        (SqlValue::Int(i), ColumnType::Real) => Ok(Value::Real(i as f64)),
        (SqlValue::Float(f), ColumnType::Real) => Ok(Value::Real(f)),

        (SqlValue::Text(s), ColumnType::Text) => Ok(Value::Text(s)),
        (SqlValue::Int(i), ColumnType::Text) => Ok(Value::Text(i.to_string())),
        (SqlValue::Float(f), ColumnType::Text) => Ok(Value::Text(f.to_string())),

        (SqlValue::Text(s), ColumnType::DateTime) => parse_datetime(&s).map(Value::DateTime),
        (SqlValue::Int(secs), ColumnType::DateTime) => DateTime::from_timestamp(secs, 0)
            .map(Value::DateTime)
            .ok_or_else(|| DecodeError::InvalidDateTime(secs.to_string())),

        (SqlValue::Text(s), ColumnType::Json) => serde_json::from_str(&s)
            .map(Value::Json)
            .map_err(|e| DecodeError::InvalidJson(e.to_string())),
        (SqlValue::Int(i), ColumnType::Json) => Ok(Value::Json(i.into())),
        (SqlValue::Float(f), ColumnType::Json) => serde_json::Number::from_f64(f)
            .map(|n| Value::Json(serde_json::Value::Number(n)))
            .ok_or_else(|| DecodeError::InvalidJson(f.to_string())),

        (SqlValue::Blob(b), ColumnType::Blob) => Ok(Value::Blob(b)),
        (SqlValue::Text(s), ColumnType::Blob) => Ok(Value::Blob(s.into_bytes())),

        (raw, _) => Err(mismatch(&raw)),
    }
}

/// Decodes a stored value using only its storage class, for result
/// columns whose declared type is unknown.
#[must_use]
pub fn decode_untyped(raw: SqlValue) -> Value {
    match raw {
        SqlValue::Null => Value::Null,
        SqlValue::Int(i) => Value::Integer(i),
        SqlValue::Float(f) => Value::Real(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Blob(b),
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses any of the date/time text forms a DateTime column may hold.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DecodeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DecodeError::InvalidDateTime(s.to_string()))
}

// ================================================================
// Rust <-> Value conversions
// ================================================================

/// Types that can be turned into a [`Value`] (query literals, insert
/// values).
pub trait ToValue {
    /// Converts `self` into a typed value.
    fn to_value(self) -> Value;
}

impl ToValue for Value {
    fn to_value(self) -> Value {
        self
    }
}

impl ToValue for bool {
    fn to_value(self) -> Value {
        Value::Boolean(self)
    }
}

macro_rules! impl_to_value_int {
    ($($t:ty),*) => {
        $(impl ToValue for $t {
            fn to_value(self) -> Value {
                Value::Integer(i64::from(self))
            }
        })*
    };
}

impl_to_value_int!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for f64 {
    fn to_value(self) -> Value {
        Value::Real(self)
    }
}

impl ToValue for f32 {
    fn to_value(self) -> Value {
        Value::Real(f64::from(self))
    }
}

impl ToValue for String {
    fn to_value(self) -> Value {
        Value::Text(self)
    }
}

impl ToValue for &str {
    fn to_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToValue for &String {
    fn to_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for Vec<u8> {
    fn to_value(self) -> Value {
        Value::Blob(self)
    }
}

impl ToValue for &[u8] {
    fn to_value(self) -> Value {
        Value::Blob(self.to_vec())
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(self) -> Value {
        Value::DateTime(self)
    }
}

impl ToValue for serde_json::Value {
    fn to_value(self) -> Value {
        Value::Json(self)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(self) -> Value {
        self.map_or(Value::Null, ToValue::to_value)
    }
}

/// Types that can be extracted from a decoded [`Value`].
pub trait FromValue: Sized {
    /// Converts a typed value into `Self`.
    fn from_value(value: Value) -> Result<Self, DecodeError>;
}

fn conversion<T>(target: &'static str, value: &Value) -> Result<T, DecodeError> {
    Err(DecodeError::Conversion {
        target,
        found: value.kind(),
    })
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Boolean(b) => Ok(b),
            Value::Integer(i) => Ok(i != 0),
            other => conversion("bool", &other),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Integer(i) => Ok(i),
            Value::Boolean(b) => Ok(Self::from(b)),
            other => conversion("i64", &other),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Integer(i) => Self::try_from(i).map_err(|_| DecodeError::Conversion {
                target: "i32",
                found: "integer",
            }),
            other => conversion("i32", &other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Real(f) => Ok(f),
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(i) => Ok(i as Self),
            other => conversion("f64", &other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Text(s) => Ok(s),
            other => conversion("String", &other),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Blob(b) => Ok(b),
            other => conversion("Vec<u8>", &other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            Value::Text(s) => parse_datetime(&s),
            other => conversion("DateTime<Utc>", &other),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Json(j) => Ok(j),
            other => conversion("serde_json::Value", &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
