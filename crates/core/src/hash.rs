// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical JSON hashing for the inbox dedup key.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Render a JSON value with map keys sorted, so two semantically identical
/// payloads that differ only in key order hash identically.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// The inbox dedup key for a step delivery:
/// `sha256(runId ":" stepName ":" canonicalJSON(inputs))`, truncated to 12
/// hex characters. Callers with an explicit `idempotencyKey` bypass this
/// entirely and use that string verbatim instead.
pub fn inbox_key(run_id: &str, step_name: &str, inputs: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update(b":");
    hasher.update(step_name.as_bytes());
    hasher.update(b":");
    hasher.update(canonical_json(inputs).as_bytes());
    let digest = hasher.finalize();
    let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
    hex[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_object_keys() {
        let a = canonical_json(&json!({"b": 1, "a": 2}));
        let b = canonical_json(&json!({"a": 2, "b": 1}));
        assert_eq!(a, b);
        assert_eq!(a, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn canonical_json_is_stable_through_nesting() {
        let a = canonical_json(&json!({"outer": {"z": 1, "a": 2}}));
        assert_eq!(a, r#"{"outer":{"a":2,"z":1}}"#);
    }

    #[test]
    fn inbox_key_is_deterministic() {
        let inputs = json!({"x": 1});
        let k1 = inbox_key("run1", "echo", &inputs);
        let k2 = inbox_key("run1", "echo", &inputs);
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 12);
    }

    #[test]
    fn inbox_key_differs_by_run_step_or_inputs() {
        let inputs = json!({"x": 1});
        let base = inbox_key("run1", "echo", &inputs);
        assert_ne!(base, inbox_key("run2", "echo", &inputs));
        assert_ne!(base, inbox_key("run1", "other", &inputs));
        assert_ne!(base, inbox_key("run1", "echo", &json!({"x": 2})));
    }

    #[test]
    fn inbox_key_ignores_object_key_order() {
        let a = inbox_key("run1", "echo", &json!({"a": 1, "b": 2}));
        let b = inbox_key("run1", "echo", &json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn kv_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
            prop::collection::vec(("[a-z]{1,6}", any::<i64>()), 1..8).prop_map(|pairs| {
                let mut seen = std::collections::HashSet::new();
                pairs.into_iter().filter(|(k, _)| seen.insert(k.clone())).collect()
            })
        }

        proptest! {
            /// Shuffling an object's key order never changes its canonical
            /// rendering, for arbitrary key/value sets.
            #[test]
            fn canonical_json_is_order_independent(
                pairs in kv_strategy(),
                seed in any::<u64>(),
            ) {
                let mut forward = pairs.clone();
                let mut shuffled = pairs;
                // A cheap deterministic shuffle: rotate by `seed`.
                if !shuffled.is_empty() {
                    let mid = (seed as usize) % shuffled.len();
                    shuffled.rotate_left(mid);
                }
                let to_map = |entries: &[(String, i64)]| {
                    Value::Object(entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect())
                };
                forward.sort();
                prop_assert_eq!(canonical_json(&to_map(&forward)), canonical_json(&to_map(&shuffled)));
            }

            /// The inbox key is a pure function of its three inputs: calling
            /// it twice with the same `(run, step, inputs)` always agrees.
            #[test]
            fn inbox_key_is_pure(
                run_id in "[a-z0-9]{1,10}",
                step_name in "[a-z0-9]{1,10}",
                x in any::<i64>(),
            ) {
                let inputs = json!({ "x": x });
                prop_assert_eq!(inbox_key(&run_id, &step_name, &inputs), inbox_key(&run_id, &step_name, &inputs));
            }
        }
    }
}
