//! Native value representation for marshaled column data.

use crate::conversion::datetime::{self, PgTimestamp};
use crate::protocol::types::oid;

/// A column value marshaled from its wire text representation.
///
/// Integers share one width-safe variant: INT2, INT4 and INT8 all decode
/// to `i64`. Types the marshaler does not understand pass through as text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// BOOL
    Bool(bool),
    /// INT2 / INT4 / INT8
    Int(i64),
    /// DATE / TIME / TIMESTAMP / TIMESTAMPTZ
    Timestamp(PgTimestamp),
    /// Everything else, or a temporal value in an unsupported DateStyle
    Text(String),
}

impl Value {
    /// Returns true for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow as bool, if this is a BOOL value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as i64, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Borrow as a timestamp, if this is a temporal value.
    pub fn as_timestamp(&self) -> Option<&PgTimestamp> {
        match self {
            Value::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// Borrow as text, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render for client-side inline substitution into SQL text.
    ///
    /// `None` means SQL NULL, which is spliced in bare rather than wrapped
    /// in delimiter tokens. Timestamps with an offset render in TIMESTAMPTZ
    /// form, naive ones in TIMESTAMP form.
    pub fn to_inline_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Timestamp(ts) => {
                let type_oid = if ts.offset_hours.is_some() {
                    oid::TIMESTAMPTZ
                } else {
                    oid::TIMESTAMP
                };
                Some(datetime::format_date_for_postgres(ts, type_oid))
            }
            Value::Text(s) => Some(s.clone()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<PgTimestamp> for Value {
    fn from(value: PgTimestamp) -> Self {
        Value::Timestamp(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_text_rendering() {
        assert_eq!(Value::Null.to_inline_text(), None);
        assert_eq!(Value::Bool(true).to_inline_text().unwrap(), "true");
        assert_eq!(Value::Int(-42).to_inline_text().unwrap(), "-42");
        assert_eq!(Value::Text("abc".into()).to_inline_text().unwrap(), "abc");
    }

    #[test]
    fn accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(false).as_bool(), Some(false));
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::Text("x".into()).as_str(), Some("x"));
        assert_eq!(Value::Int(7).as_str(), None);
    }
}
