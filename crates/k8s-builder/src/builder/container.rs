use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvFromSource, EnvVar, Probe, ResourceRequirements,
    SecurityContext, VolumeMount,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::merge::{self, MergePolicy};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to merge container field {field:?}"))]
    MergeField {
        source: merge::Error,
        field: &'static str,
    },
}

/// The image pull policies Kubernetes understands.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
pub enum ImagePullPolicy {
    Always,
    IfNotPresent,
    Never,
}

/// A builder to build [`Container`] objects field by field.
///
/// Every setter takes the new value and an optional [`MergePolicy`] deciding how the value is
/// combined with what the container already holds. Without a policy the value replaces the
/// field.
///
/// ```
/// # use k8s_builder::builder::container::ContainerBuilder;
/// # use k8s_builder::merge::MergePolicy;
/// let container = ContainerBuilder::new()
///     .with_name("main", None)
///     .with_image("nginx:1.27", None)
///     .with_image("ignored", MergePolicy::ReplaceIfUnset)
///     .build();
///
/// assert_eq!(container.name, "main");
/// assert_eq!(container.image.as_deref(), Some("nginx:1.27"));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContainerBuilder {
    container: Container,
}

impl From<Container> for ContainerBuilder {
    fn from(container: Container) -> Self {
        Self { container }
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The container assembled so far.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Returns a copy of the assembled container, the builder can be used further.
    pub fn build(&self) -> Container {
        self.container.clone()
    }

    pub fn into_inner(self) -> Container {
        self.container
    }

    /// Re-bases the builder on an existing container.
    ///
    /// With [`MergePolicy::DeepMerge`], all scalar and map fields are merged through
    /// [`merge::diff_and_apply`] first. Lists and nested records are then reconciled one by one
    /// by their dedicated setters, so that e.g. ports are matched by their container port.
    /// Merging into an untouched builder stores the container as is. An absent container is a
    /// no-op.
    pub fn with_container(
        &mut self,
        container: impl Into<Option<Container>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        let Some(container) = container.into() else {
            return Ok(self);
        };

        let unset = self.container == Container::default();
        match MergePolicy::effective(policy) {
            MergePolicy::Replace => self.container = container,
            // Nothing to merge into
            MergePolicy::ReplaceIfUnset | MergePolicy::DeepMerge if unset => {
                self.container = container;
            }
            MergePolicy::ReplaceIfUnset => {}
            MergePolicy::DeepMerge => self.merge_container(container)?,
        }

        Ok(self)
    }

    fn merge_container(&mut self, mut container: Container) -> Result<()> {
        // Taken out so that the structural pass only sees scalar and map fields
        let env = container.env.take();
        let env_from = container.env_from.take();
        let ports = container.ports.take();
        let volume_mounts = container.volume_mounts.take();
        let resources = container.resources.take();
        let security_context = container.security_context.take();
        let liveness_probe = container.liveness_probe.take();
        let readiness_probe = container.readiness_probe.take();
        let startup_probe = container.startup_probe.take();

        let merged = merge::diff_and_apply(&self.container, &self.container, &container)
            .context(MergeFieldSnafu { field: "container" })?;

        // Only commit once every field merged, the builder must not end up half merged
        let mut builder = Self::from(merged);
        builder
            .with_env(env, MergePolicy::DeepMerge)?
            .with_env_from(env_from, MergePolicy::DeepMerge)
            .with_ports(ports, MergePolicy::DeepMerge)?
            .with_volume_mounts(volume_mounts, MergePolicy::DeepMerge)?
            .with_resources(resources, MergePolicy::DeepMerge)?
            .with_security_context(security_context, MergePolicy::DeepMerge)?
            .with_liveness_probe(liveness_probe, MergePolicy::DeepMerge)?
            .with_readiness_probe(readiness_probe, MergePolicy::DeepMerge)?
            .with_startup_probe(startup_probe, MergePolicy::DeepMerge)?;
        self.container = builder.into_inner();

        Ok(())
    }

    pub fn with_name(
        &mut self,
        name: impl Into<String>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> &mut Self {
        merge::set_scalar(
            &mut self.container.name,
            name.into(),
            MergePolicy::effective(policy),
        );
        self
    }

    pub fn with_image(
        &mut self,
        image: impl Into<String>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> &mut Self {
        merge::set_scalar(
            &mut self.container.image,
            Some(image.into()),
            MergePolicy::effective(policy),
        );
        self
    }

    pub fn with_image_pull_policy(
        &mut self,
        image_pull_policy: ImagePullPolicy,
        policy: impl Into<Option<MergePolicy>>,
    ) -> &mut Self {
        merge::set_scalar(
            &mut self.container.image_pull_policy,
            Some(image_pull_policy.to_string()),
            MergePolicy::effective(policy),
        );
        self
    }

    /// Environment variables are matched by their name.
    pub fn with_env(
        &mut self,
        env: impl Into<Option<Vec<EnvVar>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        merge::set_keyed_list(
            &mut self.container.env,
            env.into(),
            MergePolicy::effective(policy),
            |env_var| env_var.name.clone(),
            merge::merge_entry,
        )
        .context(MergeFieldSnafu { field: "env" })?;
        Ok(self)
    }

    /// Sources have no identity, a source is only added if no equal one is present.
    pub fn with_env_from(
        &mut self,
        env_from: impl Into<Option<Vec<EnvFromSource>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> &mut Self {
        merge::set_plain_list(
            &mut self.container.env_from,
            env_from.into(),
            MergePolicy::effective(policy),
        );
        self
    }

    /// Ports are matched by their container port.
    pub fn with_ports(
        &mut self,
        ports: impl Into<Option<Vec<ContainerPort>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        merge::set_keyed_list(
            &mut self.container.ports,
            ports.into(),
            MergePolicy::effective(policy),
            |port| port.container_port,
            merge::merge_entry,
        )
        .context(MergeFieldSnafu { field: "ports" })?;
        Ok(self)
    }

    /// Volume mounts are matched by mount path and sub path.
    pub fn with_volume_mounts(
        &mut self,
        volume_mounts: impl Into<Option<Vec<VolumeMount>>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        merge::set_keyed_list(
            &mut self.container.volume_mounts,
            volume_mounts.into(),
            MergePolicy::effective(policy),
            |volume_mount| (volume_mount.mount_path.clone(), volume_mount.sub_path.clone()),
            merge::merge_entry,
        )
        .context(MergeFieldSnafu {
            field: "volumeMounts",
        })?;
        Ok(self)
    }

    pub fn with_resources(
        &mut self,
        resources: impl Into<Option<ResourceRequirements>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        merge::set_record(
            &mut self.container.resources,
            resources.into(),
            MergePolicy::effective(policy),
        )
        .context(MergeFieldSnafu { field: "resources" })?;
        Ok(self)
    }

    pub fn with_security_context(
        &mut self,
        security_context: impl Into<Option<SecurityContext>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        merge::set_record(
            &mut self.container.security_context,
            security_context.into(),
            MergePolicy::effective(policy),
        )
        .context(MergeFieldSnafu {
            field: "securityContext",
        })?;
        Ok(self)
    }

    pub fn with_liveness_probe(
        &mut self,
        probe: impl Into<Option<Probe>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        merge::set_record(
            &mut self.container.liveness_probe,
            probe.into(),
            MergePolicy::effective(policy),
        )
        .context(MergeFieldSnafu {
            field: "livenessProbe",
        })?;
        Ok(self)
    }

    pub fn with_readiness_probe(
        &mut self,
        probe: impl Into<Option<Probe>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        merge::set_record(
            &mut self.container.readiness_probe,
            probe.into(),
            MergePolicy::effective(policy),
        )
        .context(MergeFieldSnafu {
            field: "readinessProbe",
        })?;
        Ok(self)
    }

    pub fn with_startup_probe(
        &mut self,
        probe: impl Into<Option<Probe>>,
        policy: impl Into<Option<MergePolicy>>,
    ) -> Result<&mut Self> {
        merge::set_record(
            &mut self.container.startup_probe,
            probe.into(),
            MergePolicy::effective(policy),
        )
        .context(MergeFieldSnafu {
            field: "startupProbe",
        })?;
        Ok(self)
    }
}
