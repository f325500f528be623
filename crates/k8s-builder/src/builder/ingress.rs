use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{Ingress, IngressSpec};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::{
    deferred::{DeferredBuilder, DeferredOperation},
    merge::{self, MergePolicy},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to merge ingress field {field:?}"))]
    MergeField {
        source: merge::Error,
        field: &'static str,
    },
}

/// A deferred builder for [`Ingress`] objects.
///
/// ```
/// # use k8s_builder::builder::IngressBuilder;
/// # use k8s_builder::merge::MergePolicy;
/// let mut builder = IngressBuilder::new();
/// builder
///     .with_name("web", None)
///     .with_namespace("default", None)
///     .with_name("ignored", MergePolicy::ReplaceIfUnset);
/// assert_eq!(builder.pending_operations().len(), 3);
///
/// let ingress = builder.build().expect("all operations are known");
/// assert_eq!(ingress.metadata.name.as_deref(), Some("web"));
/// assert!(builder.is_empty());
/// ```
pub type IngressBuilder = DeferredBuilder<IngressOperation>;

/// The operations an [`IngressBuilder`] records.
///
/// Serialized with an `operation` tag, e.g. `{"operation": "withName", "name": "web"}`. The
/// policy is optional everywhere and defaults to [`MergePolicy::Replace`].
#[derive(
    Clone,
    Debug,
    Deserialize,
    PartialEq,
    Serialize,
    strum::IntoStaticStr,
    strum::VariantNames,
)]
#[serde(tag = "operation", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum IngressOperation {
    WithIngressSpec {
        spec: Option<IngressSpec>,
        policy: Option<MergePolicy>,
    },
    WithLabels {
        labels: Option<BTreeMap<String, String>>,
        policy: Option<MergePolicy>,
    },
    WithAnnotations {
        annotations: Option<BTreeMap<String, String>>,
        policy: Option<MergePolicy>,
    },
    WithName {
        name: String,
        policy: Option<MergePolicy>,
    },
    WithNamespace {
        namespace: String,
        policy: Option<MergePolicy>,
    },
}

impl DeferredOperation for IngressOperation {
    type Error = Error;
    type Target = Ingress;

    fn name(&self) -> &'static str {
        self.into()
    }

    fn apply(self, ingress: &mut Ingress) -> Result<(), Error> {
        match self {
            Self::WithIngressSpec { spec, policy } => apply_ingress_spec(ingress, spec, policy),
            Self::WithLabels { labels, policy } => merge::set_map(
                &mut ingress.metadata.labels,
                labels,
                MergePolicy::effective(policy),
            )
            .context(MergeFieldSnafu { field: "labels" }),
            Self::WithAnnotations {
                annotations,
                policy,
            } => merge::set_map(
                &mut ingress.metadata.annotations,
                annotations,
                MergePolicy::effective(policy),
            )
            .context(MergeFieldSnafu {
                field: "annotations",
            }),
            Self::WithName { name, policy } => {
                merge::set_scalar(
                    &mut ingress.metadata.name,
                    Some(name),
                    MergePolicy::effective(policy),
                );
                Ok(())
            }
            Self::WithNamespace { namespace, policy } => {
                merge::set_scalar(
                    &mut ingress.metadata.namespace,
                    Some(namespace),
                    MergePolicy::effective(policy),
                );
                Ok(())
            }
        }
    }
}

fn apply_ingress_spec(
    ingress: &mut Ingress,
    spec: Option<IngressSpec>,
    policy: Option<MergePolicy>,
) -> Result<(), Error> {
    merge::set_record(&mut ingress.spec, spec, MergePolicy::effective(policy))
        .context(MergeFieldSnafu { field: "spec" })
}

impl From<Ingress> for IngressBuilder {
    fn from(ingress: Ingress) -> Self {
        Self::from_target(ingress)
    }
}

impl IngressBuilder {
    pub fn with_ingress_spec(
        &mut self,
        spec: impl Into<Option<IngressSpec>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> &mut Self {
        self.record(IngressOperation::WithIngressSpec {
            spec: spec.into(),
            policy: policy.into(),
        })
    }

    pub fn with_labels(
        &mut self,
        labels: impl Into<Option<BTreeMap<String, String>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> &mut Self {
        self.record(IngressOperation::WithLabels {
            labels: labels.into(),
            policy: policy.into(),
        })
    }

    pub fn with_annotations(
        &mut self,
        annotations: impl Into<Option<BTreeMap<String, String>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> &mut Self {
        self.record(IngressOperation::WithAnnotations {
            annotations: annotations.into(),
            policy: policy.into(),
        })
    }

    pub fn with_name(
        &mut self,
        name: impl Into<String>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> &mut Self {
        self.record(IngressOperation::WithName {
            name: name.into(),
            policy: policy.into(),
        })
    }

    pub fn with_namespace(
        &mut self,
        namespace: impl Into<String>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> &mut Self {
        self.record(IngressOperation::WithNamespace {
            namespace: namespace.into(),
            policy: policy.into(),
        })
    }
}
