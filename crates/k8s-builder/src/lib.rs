//! Builders for Kubernetes resources that assemble an object from multiple partial sources.
//!
//! Every setter takes the new value together with an optional [`MergePolicy`]:
//!
//! - [`MergePolicy::Replace`] (the default) overwrites the field,
//! - [`MergePolicy::ReplaceIfUnset`] only writes fields that still hold their zero value,
//! - [`MergePolicy::DeepMerge`] reconciles the new value with the existing one. Lists of
//!   sub-objects are matched by an identity (e.g. containers by name) instead of by position.
//!
//! ```
//! # use k8s_builder::{builder::PodTemplateBuilder, merge::MergePolicy};
//! # use k8s_openapi::api::core::v1::Container;
//! let main = Container {
//!     name: "main".to_owned(),
//!     image: Some("nginx:1.27".to_owned()),
//!     ..Container::default()
//! };
//! let override_image = Container {
//!     name: "main".to_owned(),
//!     image: Some("nginx:1.28".to_owned()),
//!     ..Container::default()
//! };
//!
//! let pod_template = PodTemplateBuilder::new()
//!     .with_containers(vec![main], None)?
//!     .with_containers(vec![override_image], MergePolicy::DeepMerge)?
//!     .build();
//!
//! let containers = pod_template.spec.map(|spec| spec.containers).unwrap_or_default();
//! assert_eq!(containers.len(), 1);
//! assert_eq!(containers[0].image.as_deref(), Some("nginx:1.28"));
//! # Ok::<(), k8s_builder::builder::pod_template::Error>(())
//! ```
//!
//! [`MergePolicy`]: merge::MergePolicy
//! [`MergePolicy::Replace`]: merge::MergePolicy::Replace
//! [`MergePolicy::ReplaceIfUnset`]: merge::MergePolicy::ReplaceIfUnset
//! [`MergePolicy::DeepMerge`]: merge::MergePolicy::DeepMerge

pub mod builder;
pub mod deferred;
pub mod logging;
pub mod merge;

// External re-exports
pub use k8s_openapi;
