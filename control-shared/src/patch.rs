//! A small RFC-6902-like JSON Patch engine applied to declared-configuration
//! documents. Supports `add`, `remove`, `replace`, `move`, `copy`, and
//! `test`, including the `/-` array-append token.

use serde_json::Value;

use crate::error::{ControlError, ControlResult};

/// A single patch operation, deserialized from the wire form
/// `{op, path, value?, from?}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { path: String, from: String },
    Copy { path: String, from: String },
    Test { path: String, value: Value },
}

/// Applies a sequence of patch operations to `document`, returning the
/// patched document. Operations apply in order; any failure aborts the
/// whole patch (the document is never partially mutated on error).
pub fn apply_patch(document: &Value, ops: &[PatchOp]) -> ControlResult<Value> {
    let mut working = document.clone();
    for op in ops {
        apply_one(&mut working, op)?;
    }
    Ok(working)
}

fn apply_one(doc: &mut Value, op: &PatchOp) -> ControlResult<()> {
    match op {
        PatchOp::Add { path, value } => set_at(doc, path, value.clone(), true),
        PatchOp::Replace { path, value } => set_at(doc, path, value.clone(), false),
        PatchOp::Remove { path } => remove_at(doc, path),
        PatchOp::Test { path, value } => {
            let actual = get_at(doc, path)?;
            if actual == value {
                Ok(())
            } else {
                Err(ControlError::Validation(format!(
                    "test failed at {path}: expected {value}, found {actual}"
                )))
            }
        }
        PatchOp::Move { path, from } => {
            let value = get_at(doc, from)?.clone();
            remove_at(doc, from)?;
            set_at(doc, path, value, true)
        }
        PatchOp::Copy { path, from } => {
            let value = get_at(doc, from)?.clone();
            set_at(doc, path, value, true)
        }
    }
}

fn tokenize(path: &str) -> ControlResult<Vec<String>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    if !path.starts_with('/') {
        return Err(ControlError::Validation(format!(
            "invalid JSON pointer: {path}"
        )));
    }
    Ok(path[1..]
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn get_at<'a>(doc: &'a Value, path: &str) -> ControlResult<&'a Value> {
    let tokens = tokenize(path)?;
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get(&token)
                .ok_or_else(|| ControlError::Validation(format!("no such path: {path}")))?,
            Value::Array(arr) => {
                let idx: usize = token
                    .parse()
                    .map_err(|_| ControlError::Validation(format!("invalid array index: {token}")))?;
                arr.get(idx)
                    .ok_or_else(|| ControlError::Validation(format!("index out of range: {path}")))?
            }
            _ => return Err(ControlError::Validation(format!("cannot descend into scalar at {path}"))),
        };
    }
    Ok(current)
}

fn set_at(doc: &mut Value, path: &str, value: Value, insert: bool) -> ControlResult<()> {
    let tokens = tokenize(path)?;
    if tokens.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (last, parents) = tokens.split_last().expect("non-empty checked above");
    let mut current = doc;
    for token in parents {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| ControlError::Validation(format!("no such path: {path}")))?,
            Value::Array(arr) => {
                let idx: usize = token
                    .parse()
                    .map_err(|_| ControlError::Validation(format!("invalid array index: {token}")))?;
                arr.get_mut(idx)
                    .ok_or_else(|| ControlError::Validation(format!("index out of range: {path}")))?
            }
            _ => return Err(ControlError::Validation(format!("cannot descend into scalar at {path}"))),
        };
    }
    match current {
        Value::Object(map) => {
            if !insert && !map.contains_key(last) {
                return Err(ControlError::Validation(format!("no such path: {path}")));
            }
            map.insert(last.clone(), value);
        }
        Value::Array(arr) => {
            if last == "-" {
                arr.push(value);
            } else {
                let idx: usize = last
                    .parse()
                    .map_err(|_| ControlError::Validation(format!("invalid array index: {last}")))?;
                if insert {
                    if idx > arr.len() {
                        return Err(ControlError::Validation(format!("index out of range: {path}")));
                    }
                    arr.insert(idx, value);
                } else {
                    if idx >= arr.len() {
                        return Err(ControlError::Validation(format!("index out of range: {path}")));
                    }
                    arr[idx] = value;
                }
            }
        }
        _ => return Err(ControlError::Validation(format!("cannot set into scalar at {path}"))),
    }
    Ok(())
}

fn remove_at(doc: &mut Value, path: &str) -> ControlResult<()> {
    let tokens = tokenize(path)?;
    let (last, parents) = tokens
        .split_last()
        .ok_or_else(|| ControlError::Validation("cannot remove document root".to_string()))?;
    let mut current = doc;
    for token in parents {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| ControlError::Validation(format!("no such path: {path}")))?,
            Value::Array(arr) => {
                let idx: usize = token
                    .parse()
                    .map_err(|_| ControlError::Validation(format!("invalid array index: {token}")))?;
                arr.get_mut(idx)
                    .ok_or_else(|| ControlError::Validation(format!("index out of range: {path}")))?
            }
            _ => return Err(ControlError::Validation(format!("cannot descend into scalar at {path}"))),
        };
    }
    match current {
        Value::Object(map) => {
            map.remove(last)
                .ok_or_else(|| ControlError::Validation(format!("no such path: {path}")))?;
        }
        Value::Array(arr) => {
            let idx: usize = last
                .parse()
                .map_err(|_| ControlError::Validation(format!("invalid array index: {last}")))?;
            if idx >= arr.len() {
                return Err(ControlError::Validation(format!("index out of range: {path}")));
            }
            arr.remove(idx);
        }
        _ => return Err(ControlError::Validation(format!("cannot remove from scalar at {path}"))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replace_is_idempotent() {
        let doc = json!({"port": 8080});
        let ops = vec![PatchOp::Replace {
            path: "/port".to_string(),
            value: json!(9090),
        }];
        let once = apply_patch(&doc, &ops).unwrap();
        let twice = apply_patch(&once, &ops).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once["port"], 9090);
    }

    #[test]
    fn remove_is_idempotent_once_absent_errors_are_ignored_by_caller() {
        let doc = json!({"a": 1, "b": 2});
        let ops = vec![PatchOp::Remove {
            path: "/a".to_string(),
        }];
        let once = apply_patch(&doc, &ops).unwrap();
        assert_eq!(once, json!({"b": 2}));
        // Applying again fails because the key no longer exists — that is
        // expected non-idempotence for remove, per the append-order caveat.
        assert!(apply_patch(&once, &ops).is_err());
    }

    #[test]
    fn add_append_token_pushes_to_tail() {
        let doc = json!({"sources": [1, 2]});
        let ops = vec![PatchOp::Add {
            path: "/sources/-".to_string(),
            value: json!(3),
        }];
        let patched = apply_patch(&doc, &ops).unwrap();
        assert_eq!(patched["sources"], json!([1, 2, 3]));
    }

    #[test]
    fn add_append_twice_is_order_dependent_not_idempotent() {
        let doc = json!({"sources": []});
        let ops = vec![PatchOp::Add {
            path: "/sources/-".to_string(),
            value: json!("x"),
        }];
        let once = apply_patch(&doc, &ops).unwrap();
        let twice = apply_patch(&once, &ops).unwrap();
        assert_ne!(once, twice);
        assert_eq!(twice["sources"], json!(["x", "x"]));
    }

    #[test]
    fn test_op_fails_patch_on_mismatch() {
        let doc = json!({"port": 8080});
        let ops = vec![
            PatchOp::Test {
                path: "/port".to_string(),
                value: json!(9999),
            },
            PatchOp::Replace {
                path: "/port".to_string(),
                value: json!(1),
            },
        ];
        assert!(apply_patch(&doc, &ops).is_err());
    }

    #[test]
    fn move_relocates_value() {
        let doc = json!({"a": {"x": 1}, "b": {}});
        let ops = vec![PatchOp::Move {
            path: "/b/x".to_string(),
            from: "/a/x".to_string(),
        }];
        let patched = apply_patch(&doc, &ops).unwrap();
        assert_eq!(patched["b"]["x"], 1);
        assert!(patched["a"].get("x").is_none());
    }
}
