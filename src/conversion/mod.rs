//! Marshaling between wire text values and native [`Value`]s.

pub mod datetime;

use crate::protocol::backend::FieldDescription;
use crate::protocol::types::oid;
use crate::value::Value;

/// Marshal one column of a data row into a native value.
///
/// `raw` is the column body as delivered (`None` for SQL NULL). The
/// mapping is driven by the column's type OID; anything unrecognized, and
/// any value the type-specific parse rejects, passes through as text with
/// a warning rather than failing the row.
pub fn decode_column(
    raw: Option<&[u8]>,
    field: &FieldDescription,
    datestyle: Option<&str>,
) -> Value {
    let Some(bytes) = raw else {
        return Value::Null;
    };

    let text = match simdutf8::basic::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => {
            tracing::warn!(column = %field.name, "non-UTF-8 column value, decoding lossily");
            return Value::Text(String::from_utf8_lossy(bytes).into_owned());
        }
    };

    match field.type_oid {
        oid::BOOL => Value::Bool(text == "t"),
        oid::INT2 | oid::INT4 | oid::INT8 => match text.parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => {
                tracing::warn!(column = %field.name, value = text, "unparseable integer");
                Value::Text(text.to_owned())
            }
        },
        oid::DATE | oid::TIME | oid::TIMESTAMP | oid::TIMESTAMPTZ => {
            let parsed = match datestyle {
                Some(style) => datetime::parse_date_from_postgres(text, style, field.type_oid),
                None => {
                    tracing::warn!(column = %field.name, "DateStyle not yet reported by server");
                    None
                }
            };
            match parsed {
                Some(ts) => Value::Timestamp(ts),
                None => Value::Text(text.to_owned()),
            }
        }
        _ => Value::Text(text.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::FormatCode;
    use chrono::NaiveDate;

    fn field(type_oid: u32) -> FieldDescription {
        FieldDescription {
            name: "c".to_string(),
            table_oid: 0,
            column_id: 0,
            type_oid,
            type_size: -1,
            type_modifier: -1,
            format: FormatCode::Text,
        }
    }

    #[test]
    fn null_column() {
        assert_eq!(decode_column(None, &field(oid::INT4), None), Value::Null);
    }

    #[test]
    fn bool_column() {
        assert_eq!(
            decode_column(Some(b"t"), &field(oid::BOOL), None),
            Value::Bool(true)
        );
        assert_eq!(
            decode_column(Some(b"f"), &field(oid::BOOL), None),
            Value::Bool(false)
        );
    }

    #[test]
    fn integer_widths_share_one_variant() {
        assert_eq!(
            decode_column(Some(b"7"), &field(oid::INT2), None),
            Value::Int(7)
        );
        assert_eq!(
            decode_column(Some(b"-12345"), &field(oid::INT4), None),
            Value::Int(-12345)
        );
        assert_eq!(
            decode_column(Some(b"9000000000"), &field(oid::INT8), None),
            Value::Int(9_000_000_000)
        );
    }

    #[test]
    fn unparseable_integer_passes_through() {
        assert_eq!(
            decode_column(Some(b"many"), &field(oid::INT4), None),
            Value::Text("many".to_string())
        );
    }

    #[test]
    fn timestamp_with_datestyle() {
        let value = decode_column(
            Some(b"2024-03-05 10:20:30"),
            &field(oid::TIMESTAMP),
            Some("ISO, MDY"),
        );
        let ts = value.as_timestamp().expect("timestamp value");
        assert_eq!(
            ts.datetime.date(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
        );
    }

    #[test]
    fn timestamp_without_datestyle_passes_through() {
        assert_eq!(
            decode_column(Some(b"2024-03-05 10:20:30"), &field(oid::TIMESTAMP), None),
            Value::Text("2024-03-05 10:20:30".to_string())
        );
    }

    #[test]
    fn unknown_oid_is_text() {
        assert_eq!(
            decode_column(Some(b"3.14"), &field(oid::NUMERIC), None),
            Value::Text("3.14".to_string())
        );
    }

    #[test]
    fn non_utf8_is_lossy_text() {
        let value = decode_column(Some(&[0xff, b'a']), &field(oid::TEXT), None);
        assert_eq!(value, Value::Text("\u{fffd}a".to_string()));
    }
}
