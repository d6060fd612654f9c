use serde_json::{Map, Value};

const MAX_DEPTH: usize = 48;

fn walk<'a, T>(
    value: &'a Value,
    depth: usize,
    f: &mut dyn FnMut(&'a Map<String, Value>) -> Option<T>,
) -> Option<T> {
    if depth > MAX_DEPTH {
        return None;
    }
    match value {
        Value::Object(map) => {
            if let Some(found) = f(map) {
                return Some(found);
            }
            for child in map.values() {
                if let Some(found) = walk(child, depth + 1, f) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => {
            for item in items {
                if let Some(found) = walk(item, depth + 1, f) {
                    return Some(found);
                }
            }
            None
        }
        _ => None,
    }
}

/// Depth-first, pre-order search over every object under `roots`.
pub fn find_object<'a, T>(
    roots: impl IntoIterator<Item = &'a Value>,
    mut f: impl FnMut(&'a Map<String, Value>) -> Option<T>,
) -> Option<T> {
    for root in roots {
        if let Some(found) = walk(root, 0, &mut f) {
            return Some(found);
        }
    }
    None
}

/// First occurrence of any of `keys` whose value `f` accepts.
pub fn find_key<'a, T>(
    roots: impl IntoIterator<Item = &'a Value>,
    keys: &[&str],
    f: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    find_object(roots, |obj| keys.iter().find_map(|k| obj.get(*k).and_then(&f)))
}

pub fn str_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Scalars as text: strings as-is, numbers formatted.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
