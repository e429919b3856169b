//! The two merge semantics used by the compiler.
//!
//! They are kept as separate operations on purpose: compute-pool fields use
//! [`override_merge`] (the overlay wins field by field), permission
//! statements use [`concat_statements`] (both lists survive, in order).
//! Environment variables layer per key, see [`crate::env`].

use serde_json::Value;

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other overlay value replaces the base
/// value wholesale, arrays included. A `null` overlay counts as absent.
pub fn override_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => override_merge(existing, value),
                    None if !value.is_null() => {
                        base.insert(key.clone(), value.clone());
                    }
                    None => {}
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Provider statements followed by function statements.
pub fn concat_statements(provider: &[Value], function: &[Value]) -> Vec<Value> {
    provider.iter().chain(function).cloned().collect()
}
