//! Field-level comparison of local and server copies of a row.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

/// Sync bookkeeping fields, never reported as user-visible divergence.
pub const IGNORED_FIELDS: [&str; 4] = ["_updated_at", "updated_at", "client_rev", "synced_at"];

/// One diverging field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub field: String,
    pub local: Value,
    pub server: Value,
}

/// Compare two flat records field by field.
///
/// Covers the union of keys of both records, sorted by field name. A key
/// missing on one side compares as `null`.
pub fn shallow_diff(local: &Map<String, Value>, server: &Map<String, Value>) -> Vec<FieldDiff> {
    let keys: BTreeSet<&String> = local.keys().chain(server.keys()).collect();

    keys.into_iter()
        .filter(|key| !IGNORED_FIELDS.contains(&key.as_str()))
        .filter_map(|key| {
            let local_value = local.get(key).unwrap_or(&Value::Null);
            let server_value = server.get(key).unwrap_or(&Value::Null);
            if values_equal(local_value, server_value) {
                None
            } else {
                Some(FieldDiff {
                    field: key.clone(),
                    local: local_value.clone(),
                    server: server_value.clone(),
                })
            }
        })
        .collect()
}

/// Names of the diverging fields, in diff order.
pub fn diff_fields(diffs: &[FieldDiff]) -> Vec<String> {
    diffs.iter().map(|diff| diff.field.clone()).collect()
}

/// Deep structural equality where numbers compare by value (`1 == 1.0`).
#[allow(clippy::float_cmp)]
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            a == b || matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y)
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => left == right,
    }
}
