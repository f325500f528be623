use std::{any::type_name, collections::BTreeMap};

use serde::{Serialize, de::DeserializeOwned};
use snafu::ResultExt;

use crate::merge::{DeserializeSnafu, Result, SerializeSnafu};

/// Unions `new` into a copy of `base` following JSON merge patch semantics ([RFC 7386]).
///
/// Keys only present on one side are kept, keys present on both sides take the value from
/// `new`. Fails if the merged map can no longer be read as `BTreeMap<String, V>`.
///
/// [RFC 7386]: https://datatracker.ietf.org/doc/html/rfc7386
pub fn union<V>(
    base: &BTreeMap<String, V>,
    new: &BTreeMap<String, V>,
) -> Result<BTreeMap<String, V>>
where
    V: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(base).context(SerializeSnafu {
        type_name: type_name::<BTreeMap<String, V>>(),
    })?;
    let patch = serde_json::to_value(new).context(SerializeSnafu {
        type_name: type_name::<BTreeMap<String, V>>(),
    })?;

    json_patch::merge(&mut merged, &patch);

    serde_json::from_value(merged).context(DeserializeSnafu {
        type_name: type_name::<BTreeMap<String, V>>(),
    })
}
