//! Copy-on-write path edits over a `DocumentModel`.

use serde_json::{Map, Value};

use crate::document::{DocumentModel, FieldPath};

/// Returns a deep copy of `document` with `path` set to `value`.
///
/// Any ancestor that is absent, null, or not an object is replaced by a fresh
/// object, discarding whatever was there. The input is never modified.
pub fn apply(document: &DocumentModel, path: &FieldPath, value: Value) -> DocumentModel {
    let mut root = document.fields().clone();
    write(&mut root, path.segments(), value);
    DocumentModel::from(root)
}

/// Reads the value at `path`, if every ancestor is an object.
pub fn read<'a>(document: &'a DocumentModel, path: &FieldPath) -> Option<&'a Value> {
    let (last, ancestors) = path.segments().split_last()?;
    let mut current = document.fields();
    for segment in ancestors {
        current = current.get(segment)?.as_object()?;
    }
    current.get(last)
}

fn write(map: &mut Map<String, Value>, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [head, rest @ ..] => {
            let slot = map.entry(head.clone()).or_insert(Value::Null);
            match slot {
                Value::Object(child) => write(child, rest, value),
                other => {
                    let mut child = Map::new();
                    write(&mut child, rest, value);
                    *other = Value::Object(child);
                }
            }
        }
    }
}
