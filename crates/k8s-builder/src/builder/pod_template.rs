use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{
        Affinity, Container, LocalObjectReference, PodSecurityContext, PodSpec, PodTemplateSpec,
        Toleration, Volume,
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::{
    builder::container::{self, ContainerBuilder},
    merge::{self, MergePolicy},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to merge pod template field {field:?}"))]
    MergeField {
        source: merge::Error,
        field: &'static str,
    },

    #[snafu(display("failed to merge container {name:?} of pod template field {field:?}"))]
    MergeContainer {
        source: container::Error,
        field: &'static str,
        name: String,
    },
}

/// A builder to build [`PodTemplateSpec`] objects.
///
/// Metadata and spec are only created once a setter has a value to write into them, so a builder
/// that was never touched builds a template with neither. Containers and init containers are
/// matched by their name, a matched container is merged with
/// [`ContainerBuilder::with_container`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PodTemplateBuilder {
    pod_template: PodTemplateSpec,
}

impl From<PodTemplateSpec> for PodTemplateBuilder {
    fn from(pod_template: PodTemplateSpec) -> Self {
        Self { pod_template }
    }
}

impl PodTemplateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pod_template(&self) -> &PodTemplateSpec {
        &self.pod_template
    }

    pub fn build(&self) -> PodTemplateSpec {
        self.pod_template.clone()
    }

    pub fn into_inner(self) -> PodTemplateSpec {
        self.pod_template
    }

    /// The metadata `value` is written into, `None` if there is neither a value nor metadata.
    fn metadata_for<T>(&mut self, value: Option<&T>) -> Option<&mut ObjectMeta> {
        if value.is_none() && self.pod_template.metadata.is_none() {
            return None;
        }
        Some(
            self.pod_template
                .metadata
                .get_or_insert_with(ObjectMeta::default),
        )
    }

    /// The pod spec `value` is written into, `None` if there is neither a value nor a pod spec.
    fn spec_for<T>(&mut self, value: Option<&T>) -> Option<&mut PodSpec> {
        if value.is_none() && self.pod_template.spec.is_none() {
            return None;
        }
        Some(self.pod_template.spec.get_or_insert_with(PodSpec::default))
    }

    /// Re-bases the builder on an existing pod template.
    ///
    /// [`MergePolicy::DeepMerge`] merges metadata and all scalar and map fields of the pod spec
    /// with [`merge::diff_and_apply`]. Lists of sub-objects and nested records are reconciled
    /// afterwards by their own setters. Merging into an untouched builder stores the template as
    /// is. An absent template is a no-op.
    pub fn with_pod_template_spec(
        &mut self,
        pod_template: impl Into<Option<PodTemplateSpec>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        let Some(pod_template) = pod_template.into() else {
            return Ok(self);
        };

        let unset = self.pod_template == PodTemplateSpec::default();
        match MergePolicy::effective(policy) {
            MergePolicy::Replace => self.pod_template = pod_template,
            // Nothing to merge into
            MergePolicy::ReplaceIfUnset | MergePolicy::DeepMerge if unset => {
                self.pod_template = pod_template;
            }
            MergePolicy::ReplaceIfUnset => {}
            MergePolicy::DeepMerge => self.merge_pod_template(pod_template)?,
        }

        Ok(self)
    }

    fn merge_pod_template(&mut self, mut pod_template: PodTemplateSpec) -> Result<()> {
        let has_spec = pod_template.spec.is_some() || self.pod_template.spec.is_some();
        let mut spec = pod_template.spec.take().unwrap_or_default();
        let containers = std::mem::take(&mut spec.containers);
        let init_containers = spec.init_containers.take();
        let image_pull_secrets = spec.image_pull_secrets.take();
        let tolerations = spec.tolerations.take();
        let volumes = spec.volumes.take();
        let affinity = spec.affinity.take();
        let security_context = spec.security_context.take();
        if spec != PodSpec::default() {
            pod_template.spec = Some(spec);
        }
        debug!(
            containers = containers.len(),
            "merging pod template, lists are reconciled separately"
        );

        let merged = merge::diff_and_apply(&self.pod_template, &self.pod_template, &pod_template)
            .context(MergeFieldSnafu {
                field: "podTemplate",
            })?;

        let mut builder = Self::from(merged);
        if has_spec {
            builder
                .with_containers(containers, MergePolicy::DeepMerge)?
                .with_init_containers(init_containers, MergePolicy::DeepMerge)?
                .with_image_pull_secrets(image_pull_secrets, MergePolicy::DeepMerge)?
                .with_tolerations(tolerations, MergePolicy::DeepMerge)
                .with_volumes(volumes, MergePolicy::DeepMerge)?
                .with_affinity(affinity, MergePolicy::DeepMerge)?
                .with_security_context(security_context, MergePolicy::DeepMerge)?;
        }
        self.pod_template = builder.into_inner();

        Ok(())
    }

    pub fn with_labels(
        &mut self,
        labels: impl Into<Option<BTreeMap<String, String>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        let labels: Option<BTreeMap<String, String>> = labels.into();
        if let Some(metadata) = self.metadata_for(labels.as_ref()) {
            merge::set_map(&mut metadata.labels, labels, MergePolicy::effective(policy))
                .context(MergeFieldSnafu { field: "labels" })?;
        }
        Ok(self)
    }

    pub fn with_annotations(
        &mut self,
        annotations: impl Into<Option<BTreeMap<String, String>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        let annotations: Option<BTreeMap<String, String>> = annotations.into();
        if let Some(metadata) = self.metadata_for(annotations.as_ref()) {
            merge::set_map(
                &mut metadata.annotations,
                annotations,
                MergePolicy::effective(policy),
            )
            .context(MergeFieldSnafu {
                field: "annotations",
            })?;
        }
        Ok(self)
    }

    pub fn with_node_selector(
        &mut self,
        node_selector: impl Into<Option<BTreeMap<String, String>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        let node_selector: Option<BTreeMap<String, String>> = node_selector.into();
        if let Some(spec) = self.spec_for(node_selector.as_ref()) {
            merge::set_map(
                &mut spec.node_selector,
                node_selector,
                MergePolicy::effective(policy),
            )
            .context(MergeFieldSnafu {
                field: "nodeSelector",
            })?;
        }
        Ok(self)
    }

    pub fn with_termination_grace_period_seconds(
        &mut self,
        seconds: i64,
        policy: impl Into<Option<MergePolicy>>,
    ) -> &mut Self {
        let seconds = Some(seconds);
        if let Some(spec) = self.spec_for(seconds.as_ref()) {
            merge::set_scalar(
                &mut spec.termination_grace_period_seconds,
                seconds,
                MergePolicy::effective(policy),
            );
        }
        self
    }

    /// Pull secrets are matched by name.
    pub fn with_image_pull_secrets(
        &mut self,
        image_pull_secrets: impl Into<Option<Vec<LocalObjectReference>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        let image_pull_secrets: Option<Vec<LocalObjectReference>> = image_pull_secrets.into();
        if let Some(spec) = self.spec_for(image_pull_secrets.as_ref()) {
            merge::set_keyed_list(
                &mut spec.image_pull_secrets,
                image_pull_secrets,
                MergePolicy::effective(policy),
                |reference| reference.name.clone(),
                merge::merge_entry,
            )
            .context(MergeFieldSnafu {
                field: "imagePullSecrets",
            })?;
        }
        Ok(self)
    }

    /// Tolerations have no identity, a toleration is only added if no equal one is present.
    pub fn with_tolerations(
        &mut self,
        tolerations: impl Into<Option<Vec<Toleration>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> &mut Self {
        let tolerations: Option<Vec<Toleration>> = tolerations.into();
        if let Some(spec) = self.spec_for(tolerations.as_ref()) {
            merge::set_plain_list(
                &mut spec.tolerations,
                tolerations,
                MergePolicy::effective(policy),
            );
        }
        self
    }

    pub fn with_containers(
        &mut self,
        containers: impl Into<Option<Vec<Container>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        let containers: Option<Vec<Container>> = containers.into();
        let Some(spec) = self.spec_for(containers.as_ref()) else {
            return Ok(self);
        };
        // The field is required, an empty list is treated as absent
        let mut current = Some(std::mem::take(&mut spec.containers)).filter(|c| !c.is_empty());
        let result = set_containers(
            &mut current,
            containers,
            MergePolicy::effective(policy),
            "containers",
        );
        spec.containers = current.unwrap_or_default();
        result?;
        Ok(self)
    }

    pub fn with_init_containers(
        &mut self,
        init_containers: impl Into<Option<Vec<Container>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        let init_containers: Option<Vec<Container>> = init_containers.into();
        if let Some(spec) = self.spec_for(init_containers.as_ref()) {
            set_containers(
                &mut spec.init_containers,
                init_containers,
                MergePolicy::effective(policy),
                "initContainers",
            )?;
        }
        Ok(self)
    }

    /// Volumes are matched by name.
    pub fn with_volumes(
        &mut self,
        volumes: impl Into<Option<Vec<Volume>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        let volumes: Option<Vec<Volume>> = volumes.into();
        if let Some(spec) = self.spec_for(volumes.as_ref()) {
            merge::set_keyed_list(
                &mut spec.volumes,
                volumes,
                MergePolicy::effective(policy),
                |volume| volume.name.clone(),
                merge::merge_entry,
            )
            .context(MergeFieldSnafu { field: "volumes" })?;
        }
        Ok(self)
    }

    pub fn with_affinity(
        &mut self,
        affinity: impl Into<Option<Affinity>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        let affinity: Option<Affinity> = affinity.into();
        if let Some(spec) = self.spec_for(affinity.as_ref()) {
            merge::set_record(&mut spec.affinity, affinity, MergePolicy::effective(policy))
                .context(MergeFieldSnafu { field: "affinity" })?;
        }
        Ok(self)
    }

    pub fn with_security_context(
        &mut self,
        security_context: impl Into<Option<PodSecurityContext>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        let security_context: Option<PodSecurityContext> = security_context.into();
        if let Some(spec) = self.spec_for(security_context.as_ref()) {
            merge::set_record(
                &mut spec.security_context,
                security_context,
                MergePolicy::effective(policy),
            )
            .context(MergeFieldSnafu {
                field: "securityContext",
            })?;
        }
        Ok(self)
    }
}

fn set_containers(
    current: &mut Option<Vec<Container>>,
    containers: Option<Vec<Container>>,
    policy: MergePolicy,
    field: &'static str,
) -> Result<()> {
    merge::set_keyed_list(
        current,
        containers,
        policy,
        |container| container.name.clone(),
        |existing, container| {
            let name = container.name.clone();
            let mut builder = ContainerBuilder::from(existing.clone());
            builder
                .with_container(container, MergePolicy::DeepMerge)
                .context(MergeContainerSnafu { field, name })?;
            *existing = builder.into_inner();
            Ok(())
        },
    )
}
