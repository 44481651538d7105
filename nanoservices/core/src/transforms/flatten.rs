//! Projection of nested API records into flat, columnar-safe rows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static NULL: Value = Value::Null;

/// One entity exactly as the source API returned it.
pub type RawRecord = Map<String, Value>;

/// Nested object fields and the sub-field each one is reduced to.
///
/// `owner: {"login": "octocat", ..}` becomes `owner_login: "octocat"`.
pub const NESTED_PROJECTIONS: &[(&str, &str)] = &[
    ("owner", "login"),
    ("organization", "login"),
    ("license", "spdx_id"),
    ("parent", "full_name"),
    ("source", "full_name"),
    ("template_repository", "full_name"),
];

/// A record holding only scalars or lists of scalars.
///
/// Absent and null fields compare equal, matching how a columnar store reads
/// back a row that never had the column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatRecord(Map<String, Value>);

impl FlatRecord {
    /// Wrap a map that is already flat. Nested values are dropped.
    pub fn from_flat(fields: Map<String, Value>) -> Self {
        FlatRecord(
            fields
                .into_iter()
                .filter(|(_, v)| is_columnar(v))
                .collect(),
        )
    }

    /// Field value, with absent fields reported as null.
    pub fn get(&self, key: &str) -> &Value {
        self.0.get(key).unwrap_or(&NULL)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).as_str()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }


    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for FlatRecord {
    fn eq(&self, other: &Self) -> bool {
        self.0
            .keys()
            .chain(other.0.keys())
            .all(|k| self.get(k) == other.get(k))
    }
}

/// Project every known nested object to its designated scalar and drop
/// anything else that is not columnar.
///
/// Absent or malformed nested objects produce a null scalar rather than an error.
pub fn flatten(mut raw: RawRecord) -> FlatRecord {
    let mut flat = Map::with_capacity(raw.len());

    for (parent, sub_field) in NESTED_PROJECTIONS {
        let projected = match raw.remove(*parent) {
            Some(Value::Object(nested)) => nested
                .get(*sub_field)
                .filter(|v| is_scalar(v))
                .cloned()
                .unwrap_or(Value::Null),
            _ => Value::Null,
        };
        flat.insert(format!("{parent}_{sub_field}"), projected);
    }

    for (key, value) in raw {
        if is_columnar(&value) {
            flat.insert(key, value);
        } else {
            tracing::trace!(field = %key, "dropping nested field during flatten");
        }
    }

    FlatRecord(flat)
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn is_columnar(value: &Value) -> bool {
    match value {
        Value::Object(_) => false,
        Value::Array(items) => items.iter().all(|v| is_scalar(v) && !v.is_null()),
        _ => true,
    }
}
