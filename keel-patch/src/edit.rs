//! Apply a single structural edit to an in-progress JSON value.

use serde_json::Value;

use crate::diff::{format_path, EditOp, Segment};
use crate::error::PatchError;

/// Apply `op` at `path` (relative to `target`).
///
/// An empty path addresses `target` itself: add/replace overwrite it and
/// remove resets it to `null`.
pub fn apply(
    target: &mut Value,
    op: EditOp,
    path: &[Segment],
    value: Option<&Value>,
) -> Result<(), PatchError> {
    let Some((last, parents)) = path.split_last() else {
        *target = match op {
            EditOp::Remove => Value::Null,
            EditOp::Add | EditOp::Replace => required(value, path)?.clone(),
        };
        return Ok(());
    };

    let mut cursor = target;
    for (depth, segment) in parents.iter().enumerate() {
        cursor = step(cursor, segment).ok_or_else(|| PatchError::InvalidEdit {
            path: format_path(&path[..=depth]),
            reason: "no such location".to_string(),
        })?;
    }

    match (cursor, last) {
        (Value::Object(map), Segment::Field(key)) => {
            match op {
                EditOp::Add | EditOp::Replace => {
                    map.insert(key.clone(), required(value, path)?.clone());
                }
                EditOp::Remove => {
                    map.remove(key);
                }
            }
            Ok(())
        }
        (Value::Array(items), Segment::Index(index)) => {
            let index = *index;
            match op {
                EditOp::Add if index <= items.len() => {
                    items.insert(index, required(value, path)?.clone());
                    Ok(())
                }
                EditOp::Replace if index < items.len() => {
                    items[index] = required(value, path)?.clone();
                    Ok(())
                }
                EditOp::Remove if index < items.len() => {
                    items.remove(index);
                    Ok(())
                }
                _ => Err(PatchError::InvalidEdit {
                    path: format_path(path),
                    reason: format!("index out of bounds (len {})", items.len()),
                }),
            }
        }
        _ => Err(PatchError::InvalidEdit {
            path: format_path(path),
            reason: "segment does not match container type".to_string(),
        }),
    }
}

fn step<'v>(value: &'v mut Value, segment: &Segment) -> Option<&'v mut Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Field(key)) => map.get_mut(key),
        (Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
        _ => None,
    }
}

fn required<'v>(value: Option<&'v Value>, path: &[Segment]) -> Result<&'v Value, PatchError> {
    value.ok_or_else(|| PatchError::InvalidEdit {
        path: format_path(path),
        reason: "missing value".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Differ;
    use serde_json::json;

    fn field(name: &str) -> Segment {
        Segment::Field(name.to_string())
    }

    #[test]
    fn replaces_root() {
        let mut v = json!({"a": 1});
        apply(&mut v, EditOp::Replace, &[], Some(&json!("x"))).unwrap();
        assert_eq!(v, json!("x"));
    }

    #[test]
    fn removing_root_yields_null() {
        let mut v = json!("text");
        apply(&mut v, EditOp::Remove, &[], None).unwrap();
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn adds_nested_key() {
        let mut v = json!({"config": {"token": "a"}});
        apply(
            &mut v,
            EditOp::Add,
            &[field("config"), field("extra")],
            Some(&json!("b")),
        )
        .unwrap();
        assert_eq!(v, json!({"config": {"token": "a", "extra": "b"}}));
    }

    #[test]
    fn array_insert_and_remove() {
        let mut v = json!(["a", "c"]);
        apply(&mut v, EditOp::Add, &[Segment::Index(1)], Some(&json!("b"))).unwrap();
        assert_eq!(v, json!(["a", "b", "c"]));
        apply(&mut v, EditOp::Remove, &[Segment::Index(0)], None).unwrap();
        assert_eq!(v, json!(["b", "c"]));
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let mut v = json!([]);
        let err = apply(&mut v, EditOp::Replace, &[Segment::Index(0)], Some(&json!(1)))
            .unwrap_err();
        assert!(matches!(err, PatchError::InvalidEdit { .. }));
    }

    #[test]
    fn missing_intermediate_is_an_error() {
        let mut v = json!({});
        let err = apply(
            &mut v,
            EditOp::Add,
            &[field("a"), field("b")],
            Some(&json!(1)),
        )
        .unwrap_err();
        assert!(err.to_string().contains("/a"));
    }

    #[test]
    fn applying_a_diff_reproduces_the_target() {
        let before = json!({"a": [1, 2, 3, 4], "b": {"x": 1, "y": [true]}, "c": "gone"});
        let after = json!({"a": [1, 5], "b": {"x": 2, "y": [true, false], "z": null}});
        let mut working = before.clone();
        for edit in Differ::default().diff(&before, &after) {
            apply(&mut working, edit.op, &edit.path, edit.value.as_ref()).unwrap();
        }
        assert_eq!(working, after);
    }
}
