//! The merge engine behind every builder setter.
//!
//! Each setter names exactly one field and a [`MergePolicy`]. Depending on the shape of the
//! field, one of the primitives in this module decides what ends up in the target:
//!
//! - [`set_scalar`] for strings, integers and enums,
//! - [`set_map`] for key/value sets like labels and annotations,
//! - [`set_record`] for single nested records like probes or security contexts,
//! - [`set_keyed_list`] and [`set_plain_list`] for ordered lists of sub-objects.
//!
//! Nested records are reconciled through the [`structural`] primitive, lists through the
//! [`collection`] reconciler and maps through the [`map`] union.
//!
//! Every primitive is atomic with respect to its field: the field is only written once the
//! merge succeeded, a failed merge leaves it untouched.
use std::collections::BTreeMap;

use serde::{Serialize, de::DeserializeOwned};
use snafu::Snafu;

pub mod collection;
pub mod map;
pub mod structural;

mod policy;

pub use policy::MergePolicy;
pub use structural::{Structural, diff_and_apply};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to convert {type_name} into its structural form"))]
    Serialize {
        source: serde_json::Error,
        type_name: &'static str,
    },

    #[snafu(display("failed to read the merged structural form back as {type_name}"))]
    Deserialize {
        source: serde_json::Error,
        type_name: &'static str,
    },

    #[snafu(display("cannot merge {type_name}: expected a record, found {found}"))]
    NotAStructuredValue {
        type_name: &'static str,
        found: &'static str,
    },

    #[snafu(display("identity path must not be empty"))]
    EmptyIdentityPath,
}

/// Tells whether a field currently holds its zero value.
///
/// [`MergePolicy::ReplaceIfUnset`] only writes fields for which this returns `true`.
pub trait Unset {
    fn is_unset(&self) -> bool;
}

/// An absent value, or a present one that equals its default, is unset.
impl<T> Unset for Option<T>
where
    T: Default + PartialEq,
{
    fn is_unset(&self) -> bool {
        self.as_ref().is_none_or(|value| *value == T::default())
    }
}

impl Unset for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Unset for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

/// Whether `policy` stores the new value wholesale instead of merging it.
///
/// `absent` marks a destination that holds nothing at all, which turns every policy into a
/// replacement.
fn replaces_wholesale(policy: MergePolicy, current: &impl Unset, absent: bool) -> bool {
    match policy {
        MergePolicy::Replace => true,
        MergePolicy::ReplaceIfUnset => current.is_unset(),
        MergePolicy::DeepMerge => absent,
    }
}

/// Sets a scalar field.
///
/// Scalars have no inner structure, so [`MergePolicy::DeepMerge`] overwrites exactly like
/// [`MergePolicy::Replace`]. [`MergePolicy::ReplaceIfUnset`] keeps a non-zero value.
pub fn set_scalar<T>(current: &mut T, value: T, policy: MergePolicy)
where
    T: Unset,
{
    match policy {
        MergePolicy::Replace | MergePolicy::DeepMerge => *current = value,
        MergePolicy::ReplaceIfUnset => {
            if current.is_unset() {
                *current = value;
            }
        }
    }
}

/// Sets a key/value map field.
///
/// With [`MergePolicy::DeepMerge`] the new keys are unioned into the current map via
/// [`map::union`], conflicting keys take the new value. Merging an absent map is a no-op.
pub fn set_map<V>(
    current: &mut Option<BTreeMap<String, V>>,
    value: Option<BTreeMap<String, V>>,
    policy: MergePolicy,
) -> Result<()>
where
    V: Serialize + DeserializeOwned + PartialEq,
{
    if replaces_wholesale(policy, &*current, current.is_none()) {
        *current = value;
        return Ok(());
    }

    if let (MergePolicy::DeepMerge, Some(existing), Some(value)) = (policy, current.as_mut(), value)
    {
        *existing = map::union(existing, &value)?;
    }

    Ok(())
}

/// Sets a single nested record.
///
/// An absent new value is a no-op for every policy. With [`MergePolicy::DeepMerge`] the record
/// is reconciled through [`diff_and_apply`], which keeps every field the new value does not set.
pub fn set_record<T>(current: &mut Option<T>, value: Option<T>, policy: MergePolicy) -> Result<()>
where
    T: Structural + Default + PartialEq,
{
    let Some(value) = value else {
        return Ok(());
    };

    if replaces_wholesale(policy, &*current, current.is_none()) {
        *current = Some(value);
        return Ok(());
    }

    if let (MergePolicy::DeepMerge, Some(existing)) = (policy, current.as_mut()) {
        *existing = diff_and_apply(&*existing, &*existing, &value)?;
    }

    Ok(())
}

/// Sets an ordered list whose entries carry an identity.
///
/// With [`MergePolicy::DeepMerge`] the lists are reconciled by [`collection::reconcile_by_key`]:
/// entries of `value` matching an existing entry are merged into it using `merge`, all others
/// are appended. The reconciliation runs on a copy, so a failing `merge` leaves `current`
/// untouched.
pub fn set_keyed_list<T, K, E>(
    current: &mut Option<Vec<T>>,
    value: Option<Vec<T>>,
    policy: MergePolicy,
    identity: impl Fn(&T) -> K,
    merge: impl FnMut(&mut T, T) -> Result<(), E>,
) -> Result<(), E>
where
    T: Clone + PartialEq,
    K: PartialEq,
{
    if replaces_wholesale(policy, &*current, current.is_none()) {
        *current = value;
        return Ok(());
    }

    if let (MergePolicy::DeepMerge, Some(existing), Some(value)) = (policy, current.as_ref(), value)
    {
        let mut reconciled = existing.clone();
        collection::reconcile_by_key(&mut reconciled, value, identity, merge)?;
        *current = Some(reconciled);
    }

    Ok(())
}

/// Sets an ordered list of plain values without an identity.
///
/// With [`MergePolicy::DeepMerge`] a new entry is appended unless an equal entry is already
/// present.
pub fn set_plain_list<T>(current: &mut Option<Vec<T>>, value: Option<Vec<T>>, policy: MergePolicy)
where
    T: PartialEq,
{
    if replaces_wholesale(policy, &*current, current.is_none()) {
        *current = value;
        return;
    }

    if let (MergePolicy::DeepMerge, Some(existing), Some(value)) = (policy, current.as_mut(), value)
    {
        collection::append_missing(existing, value);
    }
}

/// Replaces `current` with the deep merge of itself and `value`.
///
/// This is the `merge` callback most keyed lists use for matched entries.
#[allow(clippy::needless_pass_by_value)]
pub fn merge_entry<T>(current: &mut T, value: T) -> Result<()>
where
    T: Structural,
{
    *current = diff_and_apply(&*current, &*current, &value)?;
    Ok(())
}
