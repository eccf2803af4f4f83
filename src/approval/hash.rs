//! Canonical payload hashing.
//!
//! Produces a short, key-order-invariant fingerprint of a request payload
//! for advisory deduplication and log correlation. The fold is a 32-bit
//! polynomial hash: it is **not** collision-resistant and must never be used
//! as an integrity or uniqueness guarantee.

use serde_json::Value;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Hash a JSON payload into a base-36 fingerprint.
///
/// The payload is first serialised canonically (object keys sorted by
/// UTF-16 code unit at every depth, array order preserved), then its UTF-16
/// code units are folded with `hash = hash * 31 + unit` in wrapping 32-bit
/// signed arithmetic. The absolute value is emitted in lowercase base 36.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use tokio_ai_governance::hash_payload;
///
/// assert_eq!(
///     hash_payload(&json!({"a": 1, "b": 2})),
///     hash_payload(&json!({"b": 2, "a": 1})),
/// );
/// ```
pub fn hash_payload(payload: &Value) -> String {
    let canonical = canonical_json(payload);
    let mut hash: i32 = 0;
    for unit in canonical.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
    }
    to_base36(hash.unsigned_abs())
}

/// Serialise `value` as compact JSON with object keys in sorted order.
///
/// Independent of whether `serde_json` was built with `preserve_order`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out),
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
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            // UTF-16 order, not UTF-8 byte order: they differ once keys mix
            // U+E000..U+FFFF with astral characters.
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                if let Some(v) = map.get(key.as_str()) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if u32::from(c) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn to_base36(mut n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_payload_key_order_invariant() {
        assert_eq!(
            hash_payload(&json!({"a": 1, "b": 2})),
            hash_payload(&json!({"b": 2, "a": 1}))
        );
    }

    #[test]
    fn test_hash_payload_differs_on_value_change() {
        assert_ne!(hash_payload(&json!({"a": 1})), hash_payload(&json!({"a": 2})));
    }

    #[test]
    fn test_hash_payload_known_values() {
        assert_eq!(hash_payload(&json!({"a": 1})), "numd4y");
        assert_eq!(hash_payload(&json!({"a": 2})), "numd43");
        assert_eq!(hash_payload(&json!({"a": 1, "b": 2})), "kz8hg0");
        assert_eq!(hash_payload(&json!({})), "31e");
    }

    #[test]
    fn test_hash_payload_nested_objects_sorted() {
        let a = json!({"b": {"d": true, "c": [1, 2]}});
        let b = json!({"b": {"c": [1, 2], "d": true}});
        assert_eq!(hash_payload(&a), hash_payload(&b));
        assert_eq!(hash_payload(&a), "6s54ic");
    }

    #[test]
    fn test_hash_payload_array_order_matters() {
        assert_ne!(
            hash_payload(&json!({"c": [1, 2]})),
            hash_payload(&json!({"c": [2, 1]}))
        );
    }

    #[test]
    fn test_canonical_json_sorts_keys_compactly() {
        let v = json!({"z": null, "a": "x", "m": [true, 1.5]});
        assert_eq!(canonical_json(&v), r#"{"a":"x","m":[true,1.5],"z":null}"#);
    }

    #[test]
    fn test_canonical_json_escapes_strings() {
        let v = json!({"q": "say \"hi\"\n"});
        assert_eq!(canonical_json(&v), r#"{"q":"say \"hi\"\n"}"#);
    }

    #[test]
    fn test_canonical_json_escapes_control_chars_like_serde() {
        let raw = "tab\there\u{01}bell\u{08}back\\slash";
        let v = json!({ "k": raw });
        let expected = format!(
            "{{\"k\":{}}}",
            serde_json::to_string(raw).expect("test: serialise")
        );
        assert_eq!(canonical_json(&v), expected);
        assert!(canonical_json(&v).contains("\\u0001"));
    }

    #[test]
    fn test_canonical_json_orders_keys_by_utf16_units() {
        // U+FF61 is 0xFF61 in UTF-16 but U+1F600 starts with surrogate 0xD83D,
        // so the emoji sorts first even though its UTF-8 bytes sort last.
        let v = json!({"\u{FF61}": 1, "\u{1F600}": 2});
        assert_eq!(canonical_json(&v), "{\"\u{1F600}\":2,\"\u{FF61}\":1}");
    }

    #[test]
    fn test_hash_payload_is_lowercase_base36() {
        let h = hash_payload(&json!({"questions": 40, "feature": "survey_builder"}));
        assert!(!h.is_empty());
        assert!(h.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_to_base36_zero_and_max() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        // |i32::MIN| = 2^31
        assert_eq!(to_base36(2_147_483_648), "zik0zk");
    }
}
