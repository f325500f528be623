use serde::{Deserialize, Serialize};

/// Controls how a builder setter combines a new value with what the target already holds.
///
/// A policy is passed per call and never stored on the builder. Setters accept
/// `impl Into<Option<MergePolicy>>`, so `None` selects the default ([`MergePolicy::Replace`]).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum MergePolicy {
    /// Unconditionally overwrite the field.
    #[default]
    Replace,

    /// Overwrite the field only if it currently holds its zero value.
    ReplaceIfUnset,

    /// Reconcile the new value with the current one, keeping whatever the new
    /// value does not set.
    DeepMerge,
}

impl MergePolicy {
    /// Resolves the effective policy from zero or more policy tokens.
    ///
    /// Only the first token is honored, the rest are ignored. Without any token the
    /// default policy ([`MergePolicy::Replace`]) applies.
    ///
    /// ```
    /// # use k8s_builder::merge::MergePolicy;
    /// assert_eq!(MergePolicy::resolve(None), MergePolicy::Replace);
    /// assert_eq!(
    ///     MergePolicy::resolve(Some(MergePolicy::DeepMerge)),
    ///     MergePolicy::DeepMerge
    /// );
    /// ```
    pub fn resolve(tokens: impl IntoIterator<Item = Self>) -> Self {
        tokens.into_iter().next().unwrap_or_default()
    }

    /// The policy a setter applies for its optional `policy` argument.
    pub fn effective(policy: impl Into<Option<Self>>) -> Self {
        let policy: Option<Self> = policy.into();
        Self::resolve(policy)
    }
}
