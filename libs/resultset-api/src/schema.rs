use std::fmt;

use serde::{Deserialize, Serialize};

/// Column type code reported by result metadata.
///
/// The set is closed: metadata carrying an unknown code fails to deserialize
/// instead of silently falling through to a string column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeCode {
    TypeCodeUnspecified,
    Bool,
    Int64,
    Float64,
    Float32,
    Timestamp,
    Date,
    String,
    Bytes,
    Array,
    Struct,
    Numeric,
    Json,
    Proto,
    Enum,
}

impl TypeCode {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeCode::TypeCodeUnspecified => "TYPE_CODE_UNSPECIFIED",
            TypeCode::Bool => "BOOL",
            TypeCode::Int64 => "INT64",
            TypeCode::Float64 => "FLOAT64",
            TypeCode::Float32 => "FLOAT32",
            TypeCode::Timestamp => "TIMESTAMP",
            TypeCode::Date => "DATE",
            TypeCode::String => "STRING",
            TypeCode::Bytes => "BYTES",
            TypeCode::Array => "ARRAY",
            TypeCode::Struct => "STRUCT",
            TypeCode::Numeric => "NUMERIC",
            TypeCode::Json => "JSON",
            TypeCode::Proto => "PROTO",
            TypeCode::Enum => "ENUM",
        }
    }

    /// Floating point values travel as wire numbers and are never merged.
    pub fn is_float(self) -> bool {
        matches!(self, TypeCode::Float64 | TypeCode::Float32)
    }

    pub fn is_composite(self) -> bool {
        matches!(self, TypeCode::Array | TypeCode::Struct)
    }

    /// Scalar codes whose wire form is a string, so a value split across a
    /// chunk boundary can be rejoined by concatenation.
    pub fn is_string_encoded(self) -> bool {
        matches!(
            self,
            TypeCode::Int64
                | TypeCode::Timestamp
                | TypeCode::Date
                | TypeCode::String
                | TypeCode::Bytes
                | TypeCode::Numeric
                | TypeCode::Json
                | TypeCode::Proto
                | TypeCode::Enum
        )
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of a column or of a nested element.
///
/// `array_element_type` is set for `ARRAY`, `struct_type` for `STRUCT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldType {
    pub code: TypeCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_element_type: Option<Box<FieldType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub struct_type: Option<StructType>,
}

impl FieldType {
    pub fn scalar(code: TypeCode) -> Self {
        Self {
            code,
            array_element_type: None,
            struct_type: None,
        }
    }

    pub fn array(element: FieldType) -> Self {
        Self {
            code: TypeCode::Array,
            array_element_type: Some(Box::new(element)),
            struct_type: None,
        }
    }

    pub fn structure(fields: Vec<Field>) -> Self {
        Self {
            code: TypeCode::Struct,
            array_element_type: None,
            struct_type: Some(StructType { fields }),
        }
    }
}

/// Ordered child fields of a `STRUCT`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructType {
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A single column. `name` may be empty for unnamed expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Result metadata, delivered with the first message of a stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetMetadata {
    #[serde(default)]
    pub row_type: StructType,
}

impl ResultSetMetadata {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            row_type: StructType { fields },
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.row_type.fields
    }
}
