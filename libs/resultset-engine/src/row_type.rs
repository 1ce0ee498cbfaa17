use resultset_api::{Field, FieldType, ResultSetMetadata, TypeCode};

use crate::error::ReassemblyError;

/// Index of a type node inside a [`RowType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Named reference to a type node: a top-level column or a struct child.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug)]
enum Shape {
    Scalar,
    Array { element: TypeId },
    Struct { children: Vec<Column> },
}

#[derive(Debug)]
struct TypeNode {
    /// Shallow copy of the declared type, nested parts stripped.
    /// This is what the scalar decoder sees.
    field_type: FieldType,
    shape: Shape,
}

/// Immutable arena of the type tree of one query's result rows.
///
/// Built once from the result metadata. Every nested element or struct
/// child is a `TypeId` into the arena, so positional lookups during a
/// merge are plain bounds-checked indexing and the recursion depth is
/// bounded by the declared nesting.
#[derive(Debug)]
pub struct RowType {
    nodes: Vec<TypeNode>,
    columns: Vec<Column>,
}

impl RowType {
    pub fn new(fields: &[Field]) -> Result<Self, ReassemblyError> {
        if fields.is_empty() {
            return Err(ReassemblyError::EmptyRowType);
        }

        let mut row_type = RowType {
            nodes: Vec::new(),
            columns: Vec::with_capacity(fields.len()),
        };
        for field in fields {
            let ty = row_type
                .intern(&field.field_type)
                .map_err(|e| e.with_context(display_name(&field.name)))?;
            row_type.columns.push(Column {
                name: field.name.clone(),
                ty,
            });
        }
        Ok(row_type)
    }

    pub fn from_metadata(metadata: &ResultSetMetadata) -> Result<Self, ReassemblyError> {
        Self::new(metadata.fields())
    }

    fn intern(&mut self, field_type: &FieldType) -> Result<TypeId, ReassemblyError> {
        let shape = match field_type.code {
            TypeCode::Array => {
                let element = field_type.array_element_type.as_deref().ok_or_else(|| {
                    ReassemblyError::InvalidRowType("ARRAY without element type".into())
                })?;
                Shape::Array {
                    element: self.intern(element).map_err(|e| e.with_context("[]"))?,
                }
            }
            TypeCode::Struct => {
                let struct_type = field_type.struct_type.as_ref().ok_or_else(|| {
                    ReassemblyError::InvalidRowType("STRUCT without struct type".into())
                })?;
                let mut children = Vec::with_capacity(struct_type.fields.len());
                for child in &struct_type.fields {
                    let ty = self
                        .intern(&child.field_type)
                        .map_err(|e| e.with_context(display_name(&child.name)))?;
                    children.push(Column {
                        name: child.name.clone(),
                        ty,
                    });
                }
                Shape::Struct { children }
            }
            TypeCode::TypeCodeUnspecified => {
                return Err(ReassemblyError::InvalidRowType("unspecified type code".into()));
            }
            _ => Shape::Scalar,
        };

        let id = TypeId(self.nodes.len() as u32);
        self.nodes.push(TypeNode {
            field_type: FieldType::scalar(field_type.code),
            shape,
        });
        Ok(id)
    }

    /// Number of top-level fields, i.e. values per complete row.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false: construction rejects an empty field list.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, position: usize) -> Option<&Column> {
        self.columns.get(position)
    }

    pub fn code(&self, ty: TypeId) -> TypeCode {
        self.nodes[ty.index()].field_type.code
    }

    pub fn field_type(&self, ty: TypeId) -> &FieldType {
        &self.nodes[ty.index()].field_type
    }

    /// Element type of an `ARRAY` node.
    pub fn element(&self, ty: TypeId) -> Option<TypeId> {
        match self.nodes[ty.index()].shape {
            Shape::Array { element } => Some(element),
            _ => None,
        }
    }

    /// Children of a `STRUCT` node, empty for anything else.
    pub fn children(&self, ty: TypeId) -> &[Column] {
        match &self.nodes[ty.index()].shape {
            Shape::Struct { children } => children,
            _ => &[],
        }
    }

    pub fn child(&self, ty: TypeId, position: usize) -> Option<&Column> {
        self.children(ty).get(position)
    }
}

pub(crate) fn display_name(name: &str) -> &str {
    if name.is_empty() { "<unnamed>" } else { name }
}
