//! Reconciliation of ordered lists.
//!
//! None of the functions here reorder entries already present in the destination: they only
//! update entries in place and append new ones.
use serde::Serialize;
use serde_json::Value;
use snafu::{ResultExt, ensure};
use tracing::trace;

use crate::merge::{EmptyIdentityPathSnafu, Result, SerializeSnafu};

/// Merges `new` into `current` by identity.
///
/// For every entry of `new`, the first entry of `current` with the same identity is updated
/// with `merge`. Entries without a match are appended in the order they appear in `new`.
/// Identities do not need to be unique, but only the first match is ever updated.
pub fn reconcile_by_key<T, K, E>(
    current: &mut Vec<T>,
    new: Vec<T>,
    identity: impl Fn(&T) -> K,
    mut merge: impl FnMut(&mut T, T) -> Result<(), E>,
) -> Result<(), E>
where
    K: PartialEq,
{
    for entry in new {
        let key = identity(&entry);
        if let Some(existing) = current
            .iter_mut()
            .find(|existing| identity(existing) == key)
        {
            merge(existing, entry)?;
        } else {
            current.push(entry);
        }
    }

    Ok(())
}

/// Appends every entry of `new` that is not already contained in `current`.
///
/// This is the reconciliation for lists without any identity, where only equality counts.
pub fn append_missing<T>(current: &mut Vec<T>, new: Vec<T>)
where
    T: PartialEq,
{
    for entry in new {
        if !current.contains(&entry) {
            current.push(entry);
        }
    }
}

/// Appends entries from all `sources` whose identity is not yet present in `current`.
///
/// The identity of an entry is the value found at the dotted `path` of its serialized form,
/// e.g. `configMapRef.name` for an [`EnvFromSource`]. Entries lacking the path all share the
/// same (empty) identity. Duplicates inside the sources are skipped as well, the first
/// occurrence wins.
///
/// [`EnvFromSource`]: k8s_openapi::api::core::v1::EnvFromSource
pub fn merge_slice_by_path<T>(current: &mut Vec<T>, path: &str, sources: &[&[T]]) -> Result<()>
where
    T: Clone + Serialize,
{
    ensure!(!path.trim().is_empty(), EmptyIdentityPathSnafu);
    let pointer = format!("/{}", path.replace('.', "/"));

    let mut known = current
        .iter()
        .map(|entry| identity_at(entry, &pointer))
        .collect::<Result<Vec<_>>>()?;

    for entry in sources.iter().flat_map(|source| source.iter()) {
        let identity = identity_at(entry, &pointer)?;
        if known.contains(&identity) {
            trace!(path, %identity, "skipping entry with known identity");
            continue;
        }

        current.push(entry.clone());
        known.push(identity);
    }

    Ok(())
}

fn identity_at<T>(entry: &T, pointer: &str) -> Result<Value>
where
    T: Serialize,
{
    let value = serde_json::to_value(entry).context(SerializeSnafu {
        type_name: std::any::type_name::<T>(),
    })?;
    Ok(value.pointer(pointer).cloned().unwrap_or(Value::Null))
}
