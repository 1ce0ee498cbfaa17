use serde::{Deserialize, Serialize};

use crate::schema::ResultSetMetadata;
use crate::value::{RawValue, WireValue};

/// One message of a partial result stream.
///
/// `values` is a flat run of cells; row boundaries are implied by the field
/// count. When `chunked_value` is set, the last element of `values` is
/// incomplete and continues in the first element of the next message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Row type. Present on the first message of a stream only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultSetMetadata>,
    #[serde(default)]
    pub values: Vec<WireValue>,
    #[serde(default)]
    pub chunked_value: bool,
    /// Opaque token the transport can resume from.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_token")]
    pub resume_token: Option<Vec<u8>>,
    /// Query statistics. Present on the last message of a stream only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ResultSetStats>,
}

impl Chunk {
    /// Build a chunk from already type-erased values.
    pub fn from_raw(values: impl IntoIterator<Item = RawValue>, chunked_value: bool) -> Self {
        Self {
            values: values.into_iter().map(WireValue::from).collect(),
            chunked_value,
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: ResultSetMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_resume_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.resume_token = Some(token.into());
        self
    }

    pub fn with_stats(mut self, stats: ResultSetStats) -> Self {
        self.stats = Some(stats);
        self
    }
}

/// Execution statistics sent with the final message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetStats {
    /// Exact row count for DML. INT64 travels as a string on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "int64_string")]
    pub row_count_exact: Option<i64>,
    /// Free-form plan / timing statistics, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_stats: Option<serde_json::Value>,
}

mod base64_token {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(token: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match token {
            Some(bytes) => s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded = Option::<String>::deserialize(d)?;
        encoded
            .map(|s| {
                base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

mod int64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(i64),
        String(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<i64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_str(&v.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Option::<Repr>::deserialize(d)? {
            None => Ok(None),
            Some(Repr::Number(n)) => Ok(Some(n)),
            Some(Repr::String(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}
