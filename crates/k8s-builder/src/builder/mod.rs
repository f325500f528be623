//! Field builders for Kubernetes resources.
//!
//! [`ContainerBuilder`] and [`PodTemplateBuilder`] apply every setter immediately, while
//! [`IngressBuilder`] records its setters and only applies them on
//! [`build`](crate::deferred::DeferredBuilder::build).
pub mod container;
pub mod ingress;
pub mod pod_template;

pub use container::{ContainerBuilder, ImagePullPolicy};
pub use ingress::{IngressBuilder, IngressOperation};
pub use pod_template::PodTemplateBuilder;
