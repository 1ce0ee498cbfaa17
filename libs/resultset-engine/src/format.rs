use std::collections::HashMap;
use std::sync::Arc;

use resultset_api::value::named_to_json;
use resultset_api::{DecodeError, JsonOptions, RawRow, RawValue, ScalarDecoder, TypeCode, Value, WireDecoder};

use crate::error::ReassemblyError;
use crate::row_type::{RowType, TypeId, display_name};

/// One decoded column of a formatted row.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: String,
    pub value: Value,
}

/// A complete row with field names attached, in declared order.
///
/// Unnamed fields and duplicate names stay in the ordered view; the keyed
/// view skips the former and keeps the last of the latter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedRow {
    columns: Vec<NamedValue>,
}

impl FormattedRow {
    pub fn columns(&self) -> &[NamedValue] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Value at a field position.
    pub fn value(&self, position: usize) -> Option<&Value> {
        self.columns.get(position).map(|c| &c.value)
    }

    /// Value by field name, last field wins on duplicates.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if name.is_empty() {
            return None;
        }
        self.columns.iter().rev().find(|c| c.name == name).map(|c| &c.value)
    }

    pub fn to_keyed(&self) -> HashMap<&str, &Value> {
        self.columns
            .iter()
            .filter(|c| !c.name.is_empty())
            .map(|c| (c.name.as_str(), &c.value))
            .collect()
    }

    pub fn to_json(&self, options: &JsonOptions) -> Result<serde_json::Value, DecodeError> {
        named_to_json(self.columns.iter().map(|c| (c.name.as_str(), &c.value)), options)
            .map(serde_json::Value::Object)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.columns.into_iter().map(|c| c.value).collect()
    }
}

/// Converts raw rows into named, decoded rows.
///
/// Stateless apart from the shared row type and decoder: the input row is
/// never mutated and may be formatted any number of times.
#[derive(Clone)]
pub struct RowFormatter {
    row_type: Arc<RowType>,
    decoder: Arc<dyn ScalarDecoder>,
}

impl std::fmt::Debug for RowFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowFormatter")
            .field("fields", &self.row_type.len())
            .finish()
    }
}

impl RowFormatter {
    pub fn new(row_type: Arc<RowType>) -> Self {
        Self::with_decoder(row_type, Arc::new(WireDecoder))
    }

    pub fn with_decoder(row_type: Arc<RowType>, decoder: Arc<dyn ScalarDecoder>) -> Self {
        Self { row_type, decoder }
    }

    pub fn format(&self, row: &RawRow) -> Result<FormattedRow, ReassemblyError> {
        self.format_at(row, 0)
    }

    /// Format a flush batch. Errors carry the row's index within `rows`.
    pub fn format_batch(&self, rows: &[RawRow]) -> Result<Vec<FormattedRow>, ReassemblyError> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| self.format_at(row, index))
            .collect()
    }

    fn format_at(&self, row: &RawRow, index: usize) -> Result<FormattedRow, ReassemblyError> {
        let columns = self.row_type.columns();
        if row.len() != columns.len() {
            return Err(ReassemblyError::SchemaMismatch(format!(
                "row {index} has {} values, row type declares {}",
                row.len(),
                columns.len()
            )));
        }

        let mut out = Vec::with_capacity(columns.len());
        for (column, raw) in columns.iter().zip(row.values()) {
            let at = Location {
                field: display_name(&column.name),
                row: index,
            };
            out.push(NamedValue {
                name: column.name.clone(),
                value: self.format_value(column.ty, raw, &at, "")?,
            });
        }
        Ok(FormattedRow { columns: out })
    }

    /// `path` locates `raw` inside its column: empty at the top, then
    /// `[i]` per array element and `.name` per struct child.
    fn format_value(
        &self,
        ty: TypeId,
        raw: &RawValue,
        at: &Location<'_>,
        path: &str,
    ) -> Result<Value, ReassemblyError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }

        let code = self.row_type.code(ty);
        match code {
            TypeCode::Array => {
                let items = expect_list(code, raw, at, path)?;
                let element = self
                    .row_type
                    .element(ty)
                    .ok_or_else(|| at.mismatch(path, "ARRAY without element type"))?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.format_value(element, item, at, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            TypeCode::Struct => {
                let items = expect_list(code, raw, at, path)?;
                let children = self.row_type.children(ty);
                if items.len() != children.len() {
                    return Err(at.mismatch(
                        path,
                        format!(
                            "STRUCT has {} values, type declares {}",
                            items.len(),
                            children.len()
                        ),
                    ));
                }
                children
                    .iter()
                    .zip(items)
                    .map(|(child, item)| {
                        let child_path = format!("{path}.{}", display_name(&child.name));
                        self.format_value(child.ty, item, at, &child_path)
                            .map(|v| (child.name.clone(), v))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Struct)
            }
            _ => self
                .decoder
                .decode(self.row_type.field_type(ty), raw)
                .map_err(|e| at.malformed(path, e)),
        }
    }
}

/// Column and batch row of the value being formatted.
struct Location<'a> {
    field: &'a str,
    row: usize,
}

impl Location<'_> {
    /// The value's shape contradicts its declared type.
    fn mismatch(&self, path: &str, msg: impl std::fmt::Display) -> ReassemblyError {
        ReassemblyError::SchemaMismatch(format!(
            "row {} field '{}{path}': {msg}",
            self.row, self.field
        ))
    }

    /// The scalar decoder rejected the value.
    fn malformed(&self, path: &str, source: DecodeError) -> ReassemblyError {
        let source = match path.strip_prefix('.').unwrap_or(path) {
            "" => source,
            inner => source.with_context(inner),
        };
        ReassemblyError::MalformedValue {
            field: self.field.to_string(),
            row: self.row,
            source,
        }
    }
}

fn expect_list<'v>(
    code: TypeCode,
    raw: &'v RawValue,
    at: &Location<'_>,
    path: &str,
) -> Result<&'v [RawValue], ReassemblyError> {
    raw.as_list()
        .ok_or_else(|| at.mismatch(path, format!("{code} column holds a {} value", raw.kind())))
}
