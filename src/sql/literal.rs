use super::normalise_field;
use crate::value::{FieldValue, to_hex};
use std::fmt;

/// Quotes a string literal, doubling embedded quotes.
pub fn format_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub fn format_literal(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "null".to_string(),
        FieldValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        FieldValue::Int(i) => i.to_string(),
        FieldValue::Float(f) => f.to_string(),
        FieldValue::Text(s) => format_string(s),
        FieldValue::Date(d) => format!("'{}'", d.format("%Y%m%d")),
        FieldValue::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%dT%H:%M:%S%.3f")),
        FieldValue::Time(t) => format!("'{}'", t.format("%H:%M:%S%.3f")),
        FieldValue::Blob(bytes) => format!("0x{}", to_hex(bytes)),
    }
}

/// Operand of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    /// Column reference, normalised to upper case
    Field(String),
    Value(FieldValue),
    /// `?` placeholder bound at execution time
    Param,
    /// Taken over verbatim
    Raw(String),
}

impl SqlExpr {
    pub fn field(name: &str) -> Self {
        SqlExpr::Field(normalise_field(name))
    }

    pub fn value(value: impl Into<FieldValue>) -> Self {
        SqlExpr::Value(value.into())
    }

    pub fn raw(expr: impl Into<String>) -> Self {
        SqlExpr::Raw(expr.into())
    }
}

impl From<FieldValue> for SqlExpr {
    fn from(value: FieldValue) -> Self {
        SqlExpr::Value(value)
    }
}

impl fmt::Display for SqlExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlExpr::Field(name) => write!(f, "{}", name),
            SqlExpr::Value(value) => write!(f, "{}", format_literal(value)),
            SqlExpr::Param => write!(f, "?"),
            SqlExpr::Raw(expr) => write!(f, "{}", expr),
        }
    }
}
