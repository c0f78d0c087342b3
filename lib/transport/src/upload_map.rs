//! Binding between GraphQL variables and the file parts of a
//! [multipart request](https://github.com/jaydenseric/graphql-multipart-request-spec).
//!
//! [`build_map`] produces the `map` field a client sends next to `operations`,
//! [`bind`] and [`bind_operations`] put the files back into the variables on the
//! receiving side.

use std::collections::VecDeque;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::TransportError;

/// File-handle key to every dotted path that the file fills in.
pub type UploadMap = IndexMap<String, Vec<String>>;

/// What a bound variable holds in place of its `null` placeholder.
pub trait FileReference {
    fn to_reference(&self, key: &str) -> Value;
}

/// Builds the upload map for `variables`, silently dropping entries that do not
/// point at a provided file.
pub fn build_map<F>(variables: &Map<String, Value>, files: &IndexMap<String, F>) -> UploadMap {
    let mut leftovers = Vec::new();
    collect_map(variables, files, &mut leftovers)
}

/// Like [`build_map`], but every placeholder must get a file and every file must be used.
pub fn build_map_strict<F>(
    variables: &Map<String, Value>,
    files: &IndexMap<String, F>,
) -> Result<UploadMap, TransportError> {
    let mut problems = Vec::new();
    let map = collect_map(variables, files, &mut problems);

    for key in files.keys() {
        if !map.contains_key(key) {
            problems.push(format!("file '{}' is not referenced by any variable", key));
        }
    }

    match problems.into_iter().next() {
        Some(problem) => Err(TransportError::UploadMapMismatch(problem)),
        None => Ok(map),
    }
}

fn collect_map<F>(
    variables: &Map<String, Value>,
    files: &IndexMap<String, F>,
    problems: &mut Vec<String>,
) -> UploadMap {
    // Handles named after a top-level null placeholder are claimed by that
    // variable and never drawn from the shared queue.
    let claimed: Vec<&str> = variables
        .iter()
        .filter(|(key, value)| upload_target(key, value).1.is_null())
        .map(|(key, _)| key.as_str())
        .collect();
    let mut queue: VecDeque<&String> = files
        .keys()
        .filter(|key| !claimed.contains(&key.as_str()))
        .collect();

    let mut map = UploadMap::new();

    for (key, value) in variables {
        let (reference, target) = upload_target(key, value);

        match target {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    if !item.is_null() {
                        continue;
                    }
                    match queue.pop_front() {
                        Some(handle) => map
                            .entry(handle.clone())
                            .or_default()
                            .push(format!("variables.{}.{}", reference, index)),
                        None => problems.push(format!(
                            "no file left for 'variables.{}.{}'",
                            reference, index
                        )),
                    }
                }
            }
            Value::Null => {
                if files.contains_key(key) {
                    map.insert(key.clone(), vec![format!("variables.{}", reference)]);
                } else {
                    problems.push(format!("no file named '{}'", key));
                }
            }
            _ => {
                trace!(variable = %key, "skipping non-upload variable");
            }
        }
    }

    map.retain(|key, _| files.contains_key(key));
    map
}

/// Resolves the reference path and the placeholder value of one top-level variable,
/// descending into a single-key "folder" mapping.
fn upload_target<'a>(key: &str, value: &'a Value) -> (String, &'a Value) {
    match value {
        Value::Object(folder) => match folder.iter().next() {
            Some((inner_key, inner)) => (format!("{}.{}", key, inner_key), inner),
            None => (key.to_string(), value),
        },
        _ => (key.to_string(), value),
    }
}

/// Replaces the placeholders of a variables tree with file references.
/// Paths are relative to the operation, so each must start with `variables.`.
pub fn bind<F: FileReference>(
    variables: &Value,
    map: &UploadMap,
    files: &IndexMap<String, F>,
    strict: bool,
) -> Result<Value, TransportError> {
    let mut operation = Value::Object(Map::from_iter([(
        "variables".to_string(),
        variables.clone(),
    )]));
    bind_into(&mut operation, map, files, strict)?;

    match operation {
        Value::Object(mut fields) => Ok(fields.remove("variables").unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

/// Replaces the placeholders of a decoded `operations` field, a single operation
/// (`variables.file`) or a batch (`0.variables.file`).
pub fn bind_operations<F: FileReference>(
    mut operations: Value,
    map: &UploadMap,
    files: &IndexMap<String, F>,
    strict: bool,
) -> Result<Value, TransportError> {
    bind_into(&mut operations, map, files, strict)?;
    Ok(operations)
}

fn bind_into<F: FileReference>(
    root: &mut Value,
    map: &UploadMap,
    files: &IndexMap<String, F>,
    strict: bool,
) -> Result<(), TransportError> {
    if strict {
        if let Some(unmapped) = files.keys().find(|key| !map.contains_key(*key)) {
            return Err(TransportError::UploadMapMismatch(format!(
                "file '{}' is not referenced by the map",
                unmapped
            )));
        }
    }

    for (handle, paths) in map {
        let Some(file) = files.get(handle) else {
            if strict {
                return Err(TransportError::UploadMapMismatch(format!(
                    "map references missing file '{}'",
                    handle
                )));
            }
            trace!(handle = %handle, "dropping map entry without a file");
            continue;
        };

        for path in paths {
            let slot = resolve_path(root, path)?;
            if strict && !slot.is_null() {
                return Err(TransportError::UploadMapMismatch(format!(
                    "path '{}' does not hold a null placeholder",
                    path
                )));
            }
            *slot = file.to_reference(handle);
        }
    }

    Ok(())
}

fn resolve_path<'a>(root: &'a mut Value, path: &str) -> Result<&'a mut Value, TransportError> {
    let not_found = || TransportError::PathResolution {
        path: path.to_string(),
    };

    if path.is_empty() {
        return Err(not_found());
    }

    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(fields) => fields.get_mut(segment).ok_or_else(not_found),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get_mut(index))
            .ok_or_else(not_found),
        _ => Err(not_found()),
    })
}
