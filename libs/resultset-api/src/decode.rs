use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::DecodeError;
use crate::schema::{FieldType, TypeCode};
use crate::value::{RawValue, Value};

/// Turns one raw scalar cell into a native value, keyed by its declared type.
///
/// Composite types (`ARRAY`, `STRUCT`) are unwrapped by the caller; the
/// decoder only ever sees leaves.
pub trait ScalarDecoder: Send + Sync {
    fn decode(&self, field_type: &FieldType, raw: &RawValue) -> Result<Value, DecodeError>;
}

/// Decoder for the stream's wire encodings.
///
/// | code                 | wire form                                   |
/// |----------------------|---------------------------------------------|
/// | BOOL                 | bool                                        |
/// | INT64                | decimal string                              |
/// | FLOAT64, FLOAT32     | number, or `"NaN"` / `"Infinity"` / `"-Infinity"` |
/// | NUMERIC              | decimal string, kept verbatim               |
/// | STRING, ENUM         | string                                      |
/// | BYTES, PROTO         | base64 string                               |
/// | JSON                 | string holding a JSON document              |
/// | TIMESTAMP            | RFC 3339 string                             |
/// | DATE                 | `YYYY-MM-DD`                                |
#[derive(Debug, Clone, Copy, Default)]
pub struct WireDecoder;

impl ScalarDecoder for WireDecoder {
    fn decode(&self, field_type: &FieldType, raw: &RawValue) -> Result<Value, DecodeError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }

        let code = field_type.code;
        match code {
            TypeCode::Bool => match raw {
                RawValue::Bool(b) => Ok(Value::Bool(*b)),
                other => Err(mismatch(code, other)),
            },
            TypeCode::Int64 => match raw {
                RawValue::String(s) => Ok(Value::Int64(s.parse()?)),
                RawValue::Number(n)
                    if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 =>
                {
                    Ok(Value::Int64(*n as i64))
                }
                other => Err(mismatch(code, other)),
            },
            TypeCode::Float64 | TypeCode::Float32 => match raw {
                RawValue::Number(n) => Ok(Value::Float64(*n)),
                RawValue::String(s) => match s.as_str() {
                    "NaN" => Ok(Value::Float64(f64::NAN)),
                    "Infinity" => Ok(Value::Float64(f64::INFINITY)),
                    "-Infinity" => Ok(Value::Float64(f64::NEG_INFINITY)),
                    other => Err(DecodeError::format(format!(
                        "{code}: unexpected string {other:?}"
                    ))),
                },
                other => Err(mismatch(code, other)),
            },
            TypeCode::Numeric => {
                let s = expect_str(code, raw)?;
                if is_decimal(s) || s == "NaN" {
                    Ok(Value::Numeric(s.to_string()))
                } else {
                    Err(DecodeError::format(format!("{code}: {s:?} is not a decimal")))
                }
            }
            TypeCode::String | TypeCode::Enum => Ok(Value::String(expect_str(code, raw)?.to_string())),
            TypeCode::Bytes | TypeCode::Proto => {
                let s = expect_str(code, raw)?;
                Ok(Value::Bytes(base64::engine::general_purpose::STANDARD.decode(s)?))
            }
            TypeCode::Json => Ok(Value::Json(serde_json::from_str(expect_str(code, raw)?)?)),
            TypeCode::Timestamp => {
                let ts = DateTime::parse_from_rfc3339(expect_str(code, raw)?)?;
                Ok(Value::Timestamp(ts.with_timezone(&Utc)))
            }
            TypeCode::Date => Ok(Value::Date(NaiveDate::parse_from_str(
                expect_str(code, raw)?,
                "%Y-%m-%d",
            )?)),
            TypeCode::Array | TypeCode::Struct | TypeCode::TypeCodeUnspecified => Err(
                DecodeError::unsupported(format!("{code} is not a scalar type")),
            ),
        }
    }
}

fn expect_str(code: TypeCode, raw: &RawValue) -> Result<&str, DecodeError> {
    raw.as_str().ok_or_else(|| mismatch(code, raw))
}

fn mismatch(code: TypeCode, raw: &RawValue) -> DecodeError {
    DecodeError::format(format!("{code}: unexpected {} value", raw.kind()))
}

/// Optional sign, digits, optional fraction. At least one digit overall.
fn is_decimal(s: &str) -> bool {
    let unsigned = s.strip_prefix(['-', '+']).unwrap_or(s);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    !(int.is_empty() && frac.is_empty())
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn decode(code: TypeCode, raw: RawValue) -> Result<Value, DecodeError> {
        WireDecoder.decode(&FieldType::scalar(code), &raw)
    }

    #[test]
    fn decodes_string_encoded_scalars() {
        assert_eq!(decode(TypeCode::Int64, "-42".into()).unwrap(), Value::Int64(-42));
        assert_eq!(
            decode(TypeCode::Numeric, "12.500".into()).unwrap(),
            Value::Numeric("12.500".into())
        );
        assert_eq!(
            decode(TypeCode::Bytes, "aGk=".into()).unwrap(),
            Value::Bytes(b"hi".to_vec())
        );
        assert_eq!(
            decode(TypeCode::Json, r#"{"a":[1]}"#.into()).unwrap(),
            Value::Json(serde_json::json!({"a": [1]}))
        );
        assert_eq!(
            decode(TypeCode::Date, "2024-02-29".into()).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        let Value::Timestamp(ts) = decode(TypeCode::Timestamp, "2024-01-02T03:04:05.5+01:00".into()).unwrap() else {
            panic!("expected timestamp");
        };
        assert_eq!(ts.to_rfc3339(), "2024-01-02T02:04:05.500+00:00");
    }

    #[test]
    fn decodes_wire_scalars() {
        assert_eq!(decode(TypeCode::Bool, RawValue::Bool(true)).unwrap(), Value::Bool(true));
        assert_eq!(decode(TypeCode::Float64, RawValue::Number(2.5)).unwrap(), Value::Float64(2.5));
        assert!(matches!(
            decode(TypeCode::Float64, "NaN".into()).unwrap(),
            Value::Float64(f) if f.is_nan()
        ));
        assert_eq!(decode(TypeCode::String, RawValue::Null).unwrap(), Value::Null);
    }

    #[test]
    fn rejects_malformed_values() {
        assert_eq!(decode(TypeCode::Int64, "12a".into()).unwrap_err().kind, ErrorKind::Format);
        assert_eq!(
            decode(TypeCode::Int64, "99999999999999999999".into()).unwrap_err().kind,
            ErrorKind::Range
        );
        assert_eq!(decode(TypeCode::Bool, "true".into()).unwrap_err().kind, ErrorKind::Format);
        assert_eq!(decode(TypeCode::Numeric, "1.2.3".into()).unwrap_err().kind, ErrorKind::Format);
        assert_eq!(decode(TypeCode::Date, "2024-13-01".into()).unwrap_err().kind, ErrorKind::Format);
        assert_eq!(
            decode(TypeCode::Array, RawValue::List(vec![])).unwrap_err().kind,
            ErrorKind::Unsupported
        );
    }

    #[test]
    fn decimal_shapes() {
        assert!(is_decimal("0"));
        assert!(is_decimal("-1.25"));
        assert!(is_decimal(".5"));
        assert!(!is_decimal(""));
        assert!(!is_decimal("-"));
        assert!(!is_decimal("1e5"));
    }
}
