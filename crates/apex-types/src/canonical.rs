use sha2::{Digest, Sha256};

/// Recursively sorts the keys of every object in `value` so that two
/// semantically-equal JSON values always serialize to the same bytes,
/// regardless of field insertion order. Shared by transaction checksums,
/// ledger hash-chaining, and WAL record digests.
pub fn sort_keys(value: serde_json::Value) -> Result<serde_json::Value, String> {
    Ok(sort_keys_inner(value))
}

fn sort_keys_inner(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: std::collections::BTreeMap<String, serde_json::Value> =
                std::collections::BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k, sort_keys_inner(v));
            }
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys_inner).collect())
        }
        other => other,
    }
}

/// Hashes the canonical byte representation of `value` with SHA-256 and
/// returns the lowercase hex digest.
pub fn sha256_hex(value: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(value).expect("canonical value always serializes");
    let digest = Sha256::digest(&bytes);
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").expect("writing to a String cannot fail");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_keys_is_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(
            serde_json::to_string(&sort_keys(a).unwrap()).unwrap(),
            serde_json::to_string(&sort_keys(b).unwrap()).unwrap()
        );
    }

    #[test]
    fn sha256_hex_is_deterministic() {
        let value = json!({"x": 1});
        assert_eq!(sha256_hex(&value), sha256_hex(&value));
    }

    #[test]
    fn sha256_hex_differs_on_value_change() {
        assert_ne!(sha256_hex(&json!({"x": 1})), sha256_hex(&json!({"x": 2})));
    }
}
