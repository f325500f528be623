//! Schema-aware diff-then-apply merging of Kubernetes records.
//!
//! The schema knowledge comes from the [`DeepMerge`] implementations generated by
//! [`k8s_openapi`]: lists that Kubernetes declares as associative (`x-kubernetes-list-type: map`,
//! e.g. containers by `name` or ports by `containerPort`) are merged entry by entry, atomic lists
//! are replaced and maps are merged key by key.
use std::any::type_name;

use k8s_openapi::DeepMerge;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use snafu::{ResultExt, ensure};
use tracing::trace;

use crate::merge::{DeserializeSnafu, NotAStructuredValueSnafu, Result, SerializeSnafu};

/// A record the structural primitive can merge.
///
/// Implemented for every [`k8s_openapi`] resource type and their nested records.
pub trait Structural: Clone + DeepMerge + DeserializeOwned + Serialize {}

impl<T> Structural for T where T: Clone + DeepMerge + DeserializeOwned + Serialize {}

/// Merges `patch` onto `current`, using `base` to decide what `patch` actually changes.
///
/// This happens in two steps:
///
/// 1. A minimal patch is derived from the difference between `base` and `patch`. It only contains
///    fields that `patch` sets (absent, `null`, empty strings and empty lists do not count as set)
///    and that differ from `base`.
/// 2. The minimal patch is laid over `current` and the result is deep merged into `current`.
///    The second step is what makes identity keyed lists work: a list in the patch only contains
///    the entries the patch knows about, and [`DeepMerge`] matches them against the entries of
///    `current` instead of dropping the rest.
///
/// Fields set on `current` but not on `patch` are kept, fields set on `patch` win.
pub fn diff_and_apply<T>(base: &T, current: &T, patch: &T) -> Result<T>
where
    T: Structural,
{
    let base = to_structural(base)?;
    let patch = to_structural(patch)?;

    let Some(minimal_patch) = minimal_patch(&base, &patch) else {
        trace!(
            type_name = type_name::<T>(),
            "patch does not change anything"
        );
        return Ok(current.clone());
    };
    trace!(
        type_name = type_name::<T>(),
        changed_fields = minimal_patch.as_object().map_or(0, Map::len),
        "applying minimal patch"
    );

    let mut overlay = to_structural(current)?;
    json_patch::merge(&mut overlay, &minimal_patch);
    let overlay: T = serde_json::from_value(overlay).context(DeserializeSnafu {
        type_name: type_name::<T>(),
    })?;

    let mut merged = current.clone();
    merged.merge_from(overlay);
    Ok(merged)
}

/// Computes the part of `new` that is set and differs from `base`.
///
/// Objects are compared field by field, everything else (including lists) as a whole. Returns
/// [`None`] if `new` does not change anything.
pub fn minimal_patch(base: &Value, new: &Value) -> Option<Value> {
    match new {
        Value::Null => None,
        Value::String(string) if string.is_empty() => None,
        Value::Array(entries) if entries.is_empty() => None,
        Value::Object(fields) => {
            let base_fields = base.as_object();
            let patch: Map<String, Value> = fields
                .iter()
                .filter_map(|(key, value)| {
                    let base_value = base_fields
                        .and_then(|base_fields| base_fields.get(key))
                        .unwrap_or(&Value::Null);
                    minimal_patch(base_value, value).map(|patch| (key.clone(), patch))
                })
                .collect();

            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        value => (value != base).then(|| value.clone()),
    }
}

fn to_structural<T>(value: &T) -> Result<Value>
where
    T: Serialize,
{
    let value = serde_json::to_value(value).context(SerializeSnafu {
        type_name: type_name::<T>(),
    })?;
    ensure!(
        value.is_object(),
        NotAStructuredValueSnafu {
            type_name: type_name::<T>(),
            found: kind_of(&value),
        }
    );
    Ok(value)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
