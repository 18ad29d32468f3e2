//! Form-encoded webhook bodies
//!
//! Providers that post `application/x-www-form-urlencoded` bodies flatten
//! nested objects into bracketed keys such as
//! `event-data[message][headers][message-id]`. This module rebuilds the
//! nested JSON document from those pairs.

use serde_json::{Map, Value};

/// Expand bracketed form pairs into a nested JSON object.
///
/// `key[]` appends to an array. Later pairs win when a key is repeated or
/// when a scalar and an object collide.
pub fn expand_form_pairs<I>(pairs: I) -> Value
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut root = Map::new();
    for (key, value) in pairs {
        let path = key_path(&key);
        if path.is_empty() {
            continue;
        }
        insert(&mut root, &path, Value::String(value));
    }
    Value::Object(root)
}

/// `a[b][c]` becomes `["a", "b", "c"]`; `a[]` ends with an empty segment
fn key_path(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[') else {
        return if key.is_empty() { Vec::new() } else { vec![key] };
    };

    let mut path = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            break;
        };
        path.push(&stripped[..close]);
        rest = &stripped[close + 1..];
    }
    if path[0].is_empty() {
        return Vec::new();
    }
    path
}

fn insert(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    let (head, tail) = (path[0], &path[1..]);

    match tail {
        [] => {
            map.insert(head.to_string(), value);
        }
        [""] => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                items.push(value);
            }
        }
        _ => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(child) = slot {
                insert(child, tail, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_nested_keys() {
        let document = expand_form_pairs(pairs(&[
            ("signature[timestamp]", "1529006854"),
            ("signature[token]", "abc"),
            ("event-data[event]", "delivered"),
            ("event-data[message][headers][message-id]", "<m1@example.com>"),
        ]));

        assert_eq!(
            document,
            json!({
                "signature": {"timestamp": "1529006854", "token": "abc"},
                "event-data": {
                    "event": "delivered",
                    "message": {"headers": {"message-id": "<m1@example.com>"}}
                }
            })
        );
    }

    #[test]
    fn test_array_keys() {
        let document = expand_form_pairs(pairs(&[
            ("event-data[tags][]", "welcome"),
            ("event-data[tags][]", "onboarding"),
        ]));
        assert_eq!(
            document,
            json!({"event-data": {"tags": ["welcome", "onboarding"]}})
        );
    }

    #[test]
    fn test_flat_and_malformed_keys() {
        let document = expand_form_pairs(pairs(&[
            ("event", "opened"),
            ("[orphan]", "x"),
            ("", "y"),
            ("recipient[", "a@example.com"),
        ]));
        assert_eq!(
            document,
            json!({"event": "opened", "recipient": "a@example.com"})
        );
    }
}
