//! Locating items inside upstream responses.

use serde_json::Value;

/// Walks a dot-separated path (e.g. `"photo_manifest.max_sol"`) through
/// nested objects.
#[must_use]
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| current.get(segment))
}

/// Extracts the items of a response.
///
/// Without a path, an array response yields its elements and any other
/// response is treated as a single item. Path segments select object
/// fields; a `*` segment fans out over every value of an object or array
/// (the NEO feed keys its items by date). Arrays reached at the end of the
/// path are flattened.
#[must_use]
pub fn extract_items(payload: &Value, path: Option<&str>) -> Vec<Value> {
    let mut nodes = vec![payload];

    for segment in path.into_iter().flat_map(|p| p.split('.')) {
        if segment.is_empty() {
            continue;
        }
        nodes = nodes
            .into_iter()
            .flat_map(|node| -> Vec<&Value> {
                match (segment, node) {
                    ("*", Value::Object(map)) => map.values().collect(),
                    ("*", Value::Array(items)) => items.iter().collect(),
                    (key, Value::Object(map)) => map.get(key).into_iter().collect(),
                    _ => Vec::new(),
                }
            })
            .collect();
    }

    nodes
        .into_iter()
        .flat_map(|node| match node {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        })
        .collect()
}

/// Sets `field` to `variant` on object items that do not carry it.
pub fn tag_variant(items: &mut [Value], field: &str, variant: &str) {
    for item in items {
        if let Value::Object(map) = item {
            map.entry(field.to_owned())
                .or_insert_with(|| Value::String(variant.to_owned()));
        }
    }
}
