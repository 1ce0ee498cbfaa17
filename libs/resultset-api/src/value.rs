use std::collections::BTreeMap;

use base64::Engine;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

// ═══════════════════════════════════════════════════════════════
//  Wire representation
// ═══════════════════════════════════════════════════════════════

/// Kind-tagged cell value as it arrives on the stream.
///
/// `{"stringValue": "abc"}`, `{"listValue": {"values": [...]}}`, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireValue {
    NullValue(NullSentinel),
    BoolValue(bool),
    NumberValue(f64),
    StringValue(String),
    ListValue(WireList),
    StructValue(WireStruct),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullSentinel {
    #[default]
    #[serde(rename = "NULL_VALUE")]
    NullValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireList {
    #[serde(default)]
    pub values: Vec<WireValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireStruct {
    #[serde(default)]
    pub fields: BTreeMap<String, WireValue>,
}

// ═══════════════════════════════════════════════════════════════
//  Raw (type-erased) representation
// ═══════════════════════════════════════════════════════════════

/// Cell value after the kind tag is erased, before scalar decoding.
///
/// Arrays and structs are both ordered lists; the declared column type
/// decides how a list is read.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<RawValue>),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Empty strings left behind by a merge are artifacts, not values.
    pub fn is_empty_string(&self) -> bool {
        matches!(self, RawValue::String(s) if s.is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RawValue]> {
        match self {
            RawValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short shape name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "bool",
            RawValue::Number(_) => "number",
            RawValue::String(_) => "string",
            RawValue::List(_) => "list",
        }
    }
}

impl TryFrom<WireValue> for RawValue {
    type Error = DecodeError;

    fn try_from(value: WireValue) -> Result<Self, DecodeError> {
        Ok(match value {
            WireValue::NullValue(_) => RawValue::Null,
            WireValue::BoolValue(b) => RawValue::Bool(b),
            WireValue::NumberValue(n) => RawValue::Number(n),
            WireValue::StringValue(s) => RawValue::String(s),
            WireValue::ListValue(list) => RawValue::List(
                list.values
                    .into_iter()
                    .map(RawValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            // Struct cells travel as positional lists. Map keys carry no
            // declared order, so a keyed struct cannot be placed.
            WireValue::StructValue(st) => {
                let keys: Vec<&str> = st.fields.keys().map(String::as_str).collect();
                return Err(DecodeError::unsupported(format!(
                    "keyed struct value {{{}}}, struct values must be positional lists",
                    keys.join(", ")
                )));
            }
        })
    }
}

impl From<RawValue> for WireValue {
    fn from(value: RawValue) -> Self {
        match value {
            RawValue::Null => WireValue::NullValue(NullSentinel::NullValue),
            RawValue::Bool(b) => WireValue::BoolValue(b),
            RawValue::Number(n) => WireValue::NumberValue(n),
            RawValue::String(s) => WireValue::StringValue(s),
            RawValue::List(items) => WireValue::ListValue(WireList {
                values: items.into_iter().map(WireValue::from).collect(),
            }),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::String(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::String(s)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<Vec<RawValue>> for RawValue {
    fn from(items: Vec<RawValue>) -> Self {
        RawValue::List(items)
    }
}

/// Positional array of raw values. Order matches the row type's fields.
///
/// Values only, no names or types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow(pub Vec<RawValue>);

impl RawRow {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[RawValue] {
        &self.0
    }
}

// ═══════════════════════════════════════════════════════════════
//  Decoded representation
// ═══════════════════════════════════════════════════════════════

/// Decoded cell value.
///
/// - INT64: parsed eagerly, JSON rendering checks the safe-integer range
/// - NUMERIC: kept as its decimal string, never rounded
/// - Array, Struct: recursive; struct children keep declared order and names
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Numeric(String),
    String(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

/// Largest integer a JSON consumer can hold in a double without loss.
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Options for rendering decoded rows as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    /// Render INT64 values outside the safe-integer range as strings
    /// instead of failing.
    pub wrap_numbers: bool,
    /// Render STRUCT values as ordered `[{name, value}]` arrays instead of objects.
    pub wrap_structs: bool,
    /// Include unnamed fields under `_<index>` keys.
    pub include_nameless: bool,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_json(&self, options: &JsonOptions) -> Result<serde_json::Value, DecodeError> {
        use serde_json::Value as Json;

        Ok(match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int64(i) => {
                if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(i) {
                    Json::from(*i)
                } else if options.wrap_numbers {
                    Json::String(i.to_string())
                } else {
                    return Err(DecodeError::range(format!(
                        "integer {i} is outside the safe JSON range, enable wrap_numbers"
                    )));
                }
            }
            Value::Float64(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => Json::Number(n),
                None if f.is_nan() => Json::String("NaN".into()),
                None if *f > 0.0 => Json::String("Infinity".into()),
                None => Json::String("-Infinity".into()),
            },
            Value::Numeric(s) | Value::String(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::String(base64::engine::general_purpose::STANDARD.encode(b)),
            Value::Json(j) => j.clone(),
            Value::Timestamp(ts) => Json::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|v| v.to_json(options))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Struct(fields) => {
                if options.wrap_structs {
                    let mut out = Vec::with_capacity(fields.len());
                    for (name, value) in fields {
                        out.push(serde_json::json!({
                            "name": name,
                            "value": value.to_json(options)?,
                        }));
                    }
                    Json::Array(out)
                } else {
                    Json::Object(named_to_json(
                        fields.iter().map(|(n, v)| (n.as_str(), v)),
                        options,
                    )?)
                }
            }
        })
    }
}

/// Build a JSON object from ordered `(name, value)` pairs.
///
/// Later duplicates overwrite earlier ones. Unnamed entries are skipped
/// unless `include_nameless` is set, then keyed by position as `_<index>`.
pub fn named_to_json<'a>(
    entries: impl Iterator<Item = (&'a str, &'a Value)>,
    options: &JsonOptions,
) -> Result<serde_json::Map<String, serde_json::Value>, DecodeError> {
    let mut map = serde_json::Map::new();
    for (index, (name, value)) in entries.enumerate() {
        let key = if !name.is_empty() {
            name.to_string()
        } else if options.include_nameless {
            format!("_{index}")
        } else {
            continue;
        };
        let json = value.to_json(options).map_err(|e| e.with_context(&key))?;
        map.insert(key, json);
    }
    Ok(map)
}
