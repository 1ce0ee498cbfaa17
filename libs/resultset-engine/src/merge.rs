use serde::Deserialize;

use resultset_api::{RawValue, TypeCode};

use crate::error::ReassemblyError;
use crate::row_type::{RowType, TypeId, display_name};

/// What to do with a chunked scalar pair that cannot be concatenated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Only string-encoded scalars are concatenated. A split float is
    /// `InvalidChunkedFloat`, any other non-concatenable pair is `SchemaMismatch`.
    #[default]
    Strict,
    /// Non-concatenable pairs are returned unmerged, as two values.
    Lenient,
}

/// Rejoin a value split across a chunk boundary.
///
/// `head` is the incomplete last value of the previous chunk, `tail` the
/// first value of the next one, `ty` the declared type at that position.
/// Returns one value when merged, two when the pair is left unmerged.
/// Empty strings in the result are merge artifacts and are dropped.
pub fn merge(
    row_type: &RowType,
    ty: TypeId,
    head: RawValue,
    tail: RawValue,
    policy: MergePolicy,
    path: &str,
) -> Result<Vec<RawValue>, ReassemblyError> {
    let mut merged = if head.is_null() || tail.is_null() {
        vec![head, tail]
    } else {
        let code = row_type.code(ty);
        if code.is_composite() {
            vec![merge_lists(row_type, ty, head, tail, policy, path)?]
        } else {
            merge_scalars(code, head, tail, policy, path)?
        }
    };
    merged.retain(|v| !v.is_empty_string());
    Ok(merged)
}

/// Splice the last element of `head` and the first element of `tail`
/// through a recursive merge, keeping everything around them in order.
fn merge_lists(
    row_type: &RowType,
    ty: TypeId,
    head: RawValue,
    tail: RawValue,
    policy: MergePolicy,
    path: &str,
) -> Result<RawValue, ReassemblyError> {
    let code = row_type.code(ty);
    let (mut head, tail) = match (head, tail) {
        (RawValue::List(h), RawValue::List(t)) => (h, t),
        (h, t) => {
            return Err(ReassemblyError::SchemaMismatch(format!(
                "{path}: {code} split into {} and {} values",
                h.kind(),
                t.kind()
            )));
        }
    };

    let Some(last) = head.pop() else {
        return Ok(RawValue::List(tail));
    };
    let mut tail = tail.into_iter();
    let Some(first) = tail.next() else {
        head.push(last);
        return Ok(RawValue::List(head));
    };

    // Index of `last` in the value being completed.
    let position = head.len();
    let (child, child_path) = match code {
        TypeCode::Array => {
            let element = row_type.element(ty).ok_or_else(|| {
                ReassemblyError::SchemaMismatch(format!("{path}: array has no element type"))
            })?;
            (element, format!("{path}[{position}]"))
        }
        _ => {
            let column = row_type.child(ty, position).ok_or_else(|| {
                ReassemblyError::SchemaMismatch(format!(
                    "{path}: struct value has {} fields, type declares {}",
                    position + 1,
                    row_type.children(ty).len()
                ))
            })?;
            (column.ty, format!("{path}.{}", display_name(&column.name)))
        }
    };

    let spliced = merge(row_type, child, last, first, policy, &child_path)?;
    head.extend(spliced);
    head.extend(tail);
    Ok(RawValue::List(head))
}

fn merge_scalars(
    code: TypeCode,
    head: RawValue,
    tail: RawValue,
    policy: MergePolicy,
    path: &str,
) -> Result<Vec<RawValue>, ReassemblyError> {
    if code.is_float() {
        return match policy {
            MergePolicy::Strict => Err(ReassemblyError::InvalidChunkedFloat {
                field: path.to_string(),
            }),
            MergePolicy::Lenient => Ok(vec![head, tail]),
        };
    }

    match (head, tail) {
        (RawValue::String(mut h), RawValue::String(t))
            if code.is_string_encoded() || policy == MergePolicy::Lenient =>
        {
            h.push_str(&t);
            Ok(vec![RawValue::String(h)])
        }
        (h, t) => match policy {
            MergePolicy::Strict => Err(ReassemblyError::SchemaMismatch(format!(
                "{path}: {code} split into {} and {} values cannot be merged",
                h.kind(),
                t.kind()
            ))),
            MergePolicy::Lenient => Ok(vec![h, t]),
        },
    }
}

#[cfg(test)]
mod tests {
    use resultset_api::{Field, FieldType};

    use super::*;

    fn s(v: &str) -> RawValue {
        RawValue::from(v)
    }

    fn list(items: Vec<RawValue>) -> RawValue {
        RawValue::List(items)
    }

    fn single(field_type: FieldType) -> (RowType, TypeId) {
        let rt = RowType::new(&[Field::new("f", field_type)]).unwrap();
        let ty = rt.column(0).unwrap().ty;
        (rt, ty)
    }

    fn strict(rt: &RowType, ty: TypeId, head: RawValue, tail: RawValue) -> Result<Vec<RawValue>, ReassemblyError> {
        merge(rt, ty, head, tail, MergePolicy::Strict, "f")
    }

    #[test]
    fn concatenates_strings() {
        let (rt, ty) = single(FieldType::scalar(TypeCode::String));
        assert_eq!(strict(&rt, ty, s("he"), s("llo")).unwrap(), vec![s("hello")]);
    }

    #[test]
    fn concatenates_integer_digits() {
        let (rt, ty) = single(FieldType::scalar(TypeCode::Int64));
        assert_eq!(strict(&rt, ty, s("12"), s("345")).unwrap(), vec![s("12345")]);
    }

    #[test]
    fn null_is_never_concatenated() {
        let (rt, ty) = single(FieldType::scalar(TypeCode::String));
        assert_eq!(
            strict(&rt, ty, RawValue::Null, s("x")).unwrap(),
            vec![RawValue::Null, s("x")]
        );
        assert_eq!(
            strict(&rt, ty, s("x"), RawValue::Null).unwrap(),
            vec![s("x"), RawValue::Null]
        );
    }

    #[test]
    fn empty_string_artifacts_are_dropped() {
        let (rt, ty) = single(FieldType::scalar(TypeCode::String));
        assert_eq!(strict(&rt, ty, RawValue::Null, s("")).unwrap(), vec![RawValue::Null]);
        assert_eq!(strict(&rt, ty, s("abc"), s("")).unwrap(), vec![s("abc")]);
        assert!(strict(&rt, ty, s(""), s("")).unwrap().is_empty());
    }

    #[test]
    fn floats_are_never_merged() {
        let (rt, ty) = single(FieldType::scalar(TypeCode::Float64));
        let err = strict(&rt, ty, RawValue::Number(1.0), RawValue::Number(2.0)).unwrap_err();
        assert!(matches!(err, ReassemblyError::InvalidChunkedFloat { field } if field == "f"));

        let lenient = merge(&rt, ty, s("1."), s("5"), MergePolicy::Lenient, "f").unwrap();
        assert_eq!(lenient, vec![s("1."), s("5")]);

        // A null neighbour is not a split float.
        assert_eq!(
            strict(&rt, ty, RawValue::Null, RawValue::Number(2.0)).unwrap(),
            vec![RawValue::Null, RawValue::Number(2.0)]
        );
    }

    #[test]
    fn bool_pairs_follow_policy() {
        let (rt, ty) = single(FieldType::scalar(TypeCode::Bool));
        let err = strict(&rt, ty, RawValue::Bool(true), RawValue::Bool(false)).unwrap_err();
        assert!(matches!(err, ReassemblyError::SchemaMismatch(_)));

        let lenient =
            merge(&rt, ty, RawValue::Bool(true), RawValue::Bool(false), MergePolicy::Lenient, "f")
                .unwrap();
        assert_eq!(lenient, vec![RawValue::Bool(true), RawValue::Bool(false)]);
    }

    #[test]
    fn splices_arrays() {
        let (rt, ty) = single(FieldType::array(FieldType::scalar(TypeCode::String)));
        let merged = strict(&rt, ty, list(vec![s("a"), s("b")]), list(vec![s("c")])).unwrap();
        assert_eq!(merged, vec![list(vec![s("a"), s("bc")])]);

        let merged = strict(&rt, ty, list(vec![s("a"), s("b")]), list(vec![s(""), s("c")])).unwrap();
        assert_eq!(merged, vec![list(vec![s("a"), s("b"), s("c")])]);
    }

    #[test]
    fn array_boundary_on_null_element_keeps_both() {
        let (rt, ty) = single(FieldType::array(FieldType::scalar(TypeCode::String)));
        let merged =
            strict(&rt, ty, list(vec![s("a"), RawValue::Null]), list(vec![s("b")])).unwrap();
        assert_eq!(merged, vec![list(vec![s("a"), RawValue::Null, s("b")])]);
    }

    #[test]
    fn array_of_floats_splits_between_elements() {
        let (rt, ty) = single(FieldType::array(FieldType::scalar(TypeCode::Float64)));
        let merged = strict(
            &rt,
            ty,
            list(vec![RawValue::Number(1.0)]),
            list(vec![RawValue::Null, RawValue::Number(2.0)]),
        )
        .unwrap();
        assert_eq!(
            merged,
            vec![list(vec![RawValue::Number(1.0), RawValue::Null, RawValue::Number(2.0)])]
        );
    }

    #[test]
    fn empty_list_side_concatenates() {
        let (rt, ty) = single(FieldType::array(FieldType::scalar(TypeCode::String)));
        assert_eq!(
            strict(&rt, ty, list(vec![]), list(vec![s("a")])).unwrap(),
            vec![list(vec![s("a")])]
        );
        assert_eq!(
            strict(&rt, ty, list(vec![s("a")]), list(vec![])).unwrap(),
            vec![list(vec![s("a")])]
        );
    }

    #[test]
    fn struct_child_selected_by_position() {
        let (rt, ty) = single(FieldType::structure(vec![
            Field::new("score", FieldType::scalar(TypeCode::Float64)),
            Field::new("label", FieldType::scalar(TypeCode::String)),
        ]));
        let merged = strict(
            &rt,
            ty,
            list(vec![RawValue::Number(0.5), s("hel")]),
            list(vec![s("lo")]),
        )
        .unwrap();
        assert_eq!(merged, vec![list(vec![RawValue::Number(0.5), s("hello")])]);

        // Splitting at the float child is rejected with its path.
        let err = strict(&rt, ty, list(vec![RawValue::Number(0.5)]), list(vec![RawValue::Number(1.0)]))
            .unwrap_err();
        assert!(matches!(err, ReassemblyError::InvalidChunkedFloat { field } if field == "f.score"));
    }

    #[test]
    fn struct_longer_than_declared_is_a_mismatch() {
        let (rt, ty) = single(FieldType::structure(vec![Field::new(
            "only",
            FieldType::scalar(TypeCode::String),
        )]));
        let err = strict(&rt, ty, list(vec![s("a"), s("b")]), list(vec![s("c")])).unwrap_err();
        assert!(matches!(err, ReassemblyError::SchemaMismatch(_)));
    }

    #[test]
    fn composite_split_into_scalar_is_a_mismatch() {
        let (rt, ty) = single(FieldType::array(FieldType::scalar(TypeCode::String)));
        let err = strict(&rt, ty, s("a"), list(vec![s("b")])).unwrap_err();
        assert!(matches!(err, ReassemblyError::SchemaMismatch(msg) if msg.contains("string and list")));
    }

    #[test]
    fn two_level_nesting() {
        // ARRAY<STRUCT<name STRING, note STRING>>
        let (rt, ty) = single(FieldType::array(FieldType::structure(vec![
            Field::new("name", FieldType::scalar(TypeCode::String)),
            Field::new("note", FieldType::scalar(TypeCode::String)),
        ])));
        let whole = list(vec![
            list(vec![s("ann"), s("first")]),
            list(vec![s("bob"), s("second")]),
        ]);
        let head = list(vec![list(vec![s("ann"), s("first")]), list(vec![s("bob"), s("sec")])]);
        let tail = list(vec![list(vec![s("ond")])]);
        assert_eq!(strict(&rt, ty, head, tail).unwrap(), vec![whole]);
    }

    #[test]
    fn three_level_nesting() {
        // ARRAY<STRUCT<id STRING, parts ARRAY<STRING>>>
        let (rt, ty) = single(FieldType::array(FieldType::structure(vec![
            Field::new("id", FieldType::scalar(TypeCode::String)),
            Field::new("parts", FieldType::array(FieldType::scalar(TypeCode::String))),
        ])));
        let whole = list(vec![
            list(vec![s("x1"), list(vec![s("alpha"), s("beta")])]),
            list(vec![s("x2"), list(vec![s("gamma")])]),
        ]);
        let head = list(vec![list(vec![s("x1"), list(vec![s("alpha"), s("be")])])]);
        let tail = list(vec![
            list(vec![list(vec![s("ta")])]),
            list(vec![s("x2"), list(vec![s("gamma")])]),
        ]);
        assert_eq!(strict(&rt, ty, head, tail).unwrap(), vec![whole]);
    }
}
