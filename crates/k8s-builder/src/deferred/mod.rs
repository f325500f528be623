//! Builders that record their setters and apply them later.
//!
//! A [`DeferredBuilder`] keeps an ordered log of pending operations instead of mutating its
//! target right away. Operations are either typed values of a closed operation enum (see
//! [`DeferredOperation`]) or [`PlannedOperation`]s loaded from a [`BuildPlan`] document, which
//! only carry the operation name and its arguments. [`DeferredBuilder::build`] drains the log
//! and applies all operations in the order they were recorded.
//!
//! A build plan looks like this:
//!
//! ```yaml
//! operations:
//!   - operation: withName
//!     name: web
//!   - operation: withLabels
//!     labels:
//!       app: web
//!     policy: deepMerge
//! ```
use std::fmt::Debug;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu, ensure};
use strum::VariantNames;
use tracing::{debug, instrument};

/// The key carrying the operation name in a serialized operation.
pub const OPERATION_KEY: &str = "operation";

#[derive(Debug, Snafu)]
pub enum Error<E>
where
    E: std::error::Error + 'static,
{
    #[snafu(display("recorded operation {name:?} does not resolve to a known operation"))]
    UnresolvableOperation { name: String },

    #[snafu(display("failed to read the arguments of recorded operation {name:?}"))]
    InvalidOperationArguments {
        source: serde_json::Error,
        name: String,
    },

    #[snafu(display("failed to apply recorded operation {name:?}"))]
    ApplyOperation { source: E, name: String },
}

/// A closed set of operations a [`DeferredBuilder`] can record.
///
/// Implementors are usually enums deriving [`strum::VariantNames`] and [`Deserialize`] with an
/// internal tag named [`OPERATION_KEY`]. Both must use the same spelling for the variant names,
/// because a [`PlannedOperation`] is resolved by looking its name up in
/// [`VARIANTS`](VariantNames::VARIANTS) before its arguments are deserialized.
pub trait DeferredOperation: Clone + Debug + DeserializeOwned + VariantNames {
    /// The object the operations are applied to.
    type Target: Clone + Debug + Default;

    type Error: std::error::Error + 'static;

    /// The name this operation is recorded and planned under.
    fn name(&self) -> &'static str;

    /// Applies the operation to `target` immediately.
    fn apply(self, target: &mut Self::Target) -> Result<(), Self::Error>;
}

/// An operation that is only known by its name and arguments.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlannedOperation {
    pub operation: String,

    #[serde(flatten)]
    pub arguments: Map<String, Value>,
}

impl PlannedOperation {
    pub fn new(operation: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            operation: operation.into(),
            arguments,
        }
    }

    fn resolve<Op>(self) -> Result<Op, Error<Op::Error>>
    where
        Op: DeferredOperation,
    {
        let Self {
            operation: name,
            mut arguments,
        } = self;
        ensure!(
            Op::VARIANTS.contains(&name.as_str()),
            UnresolvableOperationSnafu { name }
        );

        arguments.insert(OPERATION_KEY.to_owned(), Value::String(name.clone()));
        serde_json::from_value(Value::Object(arguments))
            .context(InvalidOperationArgumentsSnafu { name })
    }
}

/// A document listing operations to record, in order.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct BuildPlan {
    #[serde(default)]
    pub operations: Vec<PlannedOperation>,
}

/// An entry of the operation log.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PendingOperation<Op> {
    Typed(Op),
    Planned(PlannedOperation),
}

impl<Op> PendingOperation<Op>
where
    Op: DeferredOperation,
{
    /// The recorded operation name, which is not necessarily a known one for planned operations.
    pub fn name(&self) -> &str {
        match self {
            Self::Typed(operation) => operation.name(),
            Self::Planned(planned) => &planned.operation,
        }
    }

    fn resolve(self) -> Result<Op, Error<Op::Error>> {
        match self {
            Self::Typed(operation) => Ok(operation),
            Self::Planned(planned) => planned.resolve(),
        }
    }
}

/// A builder that records operations and applies them on [`build`](Self::build).
///
/// The log is strictly first in, first out. Recording never touches the target, so the
/// pending operations can be inspected and rearranged with
/// [`pending_operations_mut`](Self::pending_operations_mut) until the builder is built.
#[derive(Clone, Debug)]
pub struct DeferredBuilder<Op>
where
    Op: DeferredOperation,
{
    target: Op::Target,
    operations: Vec<PendingOperation<Op>>,
}

impl<Op> Default for DeferredBuilder<Op>
where
    Op: DeferredOperation,
{
    fn default() -> Self {
        Self::from_target(Op::Target::default())
    }
}

impl<Op> DeferredBuilder<Op>
where
    Op: DeferredOperation,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder whose operations are applied on top of `target`.
    pub fn from_target(target: Op::Target) -> Self {
        Self {
            target,
            operations: Vec::new(),
        }
    }

    /// The target as of the last build, pending operations are not reflected.
    pub fn target(&self) -> &Op::Target {
        &self.target
    }

    pub fn record(&mut self, operation: Op) -> &mut Self {
        self.operations.push(PendingOperation::Typed(operation));
        self
    }

    /// Records an operation by name. The name is only resolved on [`build`](Self::build).
    pub fn record_planned(&mut self, operation: PlannedOperation) -> &mut Self {
        self.operations.push(PendingOperation::Planned(operation));
        self
    }

    /// Records all operations of `plan` in their order.
    pub fn record_plan(&mut self, plan: BuildPlan) -> &mut Self {
        self.operations
            .extend(plan.operations.into_iter().map(PendingOperation::Planned));
        self
    }

    pub fn pending_operations(&self) -> &[PendingOperation<Op>] {
        &self.operations
    }

    pub fn pending_operations_mut(&mut self) -> &mut Vec<PendingOperation<Op>> {
        &mut self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Applies all pending operations in the order they were recorded and returns a copy of the
    /// target.
    ///
    /// The log is drained before the first operation runs, so the builder is empty afterwards
    /// whether the build succeeds or not. If an operation fails, the operations applied before
    /// it stay applied and the operations after it are discarded.
    #[instrument(skip(self), fields(pending = self.operations.len()))]
    pub fn build(&mut self) -> Result<Op::Target, Error<Op::Error>> {
        let operations = std::mem::take(&mut self.operations);

        for operation in operations {
            let operation = operation.resolve()?;
            let name = operation.name();
            debug!(operation = name, "applying recorded operation");
            operation
                .apply(&mut self.target)
                .context(ApplyOperationSnafu { name })?;
        }

        Ok(self.target.clone())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;

    #[derive(Clone, Debug, Default, Eq, PartialEq)]
    struct Service {
        name: String,
        replicas: Option<i32>,
    }

    #[derive(Debug, Snafu)]
    #[snafu(display("replicas must not be negative, got {replicas}"))]
    struct NegativeReplicasError {
        replicas: i32,
    }

    #[derive(
        Clone, Debug, Deserialize, Eq, PartialEq, strum::IntoStaticStr, strum::VariantNames,
    )]
    #[serde(tag = "operation", rename_all = "camelCase")]
    #[strum(serialize_all = "camelCase")]
    enum ServiceOperation {
        SetName { name: String },
        SetReplicas { replicas: i32 },
    }

    impl DeferredOperation for ServiceOperation {
        type Error = NegativeReplicasError;
        type Target = Service;

        fn name(&self) -> &'static str {
            self.into()
        }

        fn apply(self, target: &mut Service) -> Result<(), NegativeReplicasError> {
            match self {
                Self::SetName { name } => target.name = name,
                Self::SetReplicas { replicas } => {
                    ensure!(replicas >= 0, NegativeReplicasSnafu { replicas });
                    target.replicas = Some(replicas);
                }
            }
            Ok(())
        }
    }

    type ServiceBuilder = DeferredBuilder<ServiceOperation>;

    fn set_name(name: &str) -> ServiceOperation {
        ServiceOperation::SetName {
            name: name.to_owned(),
        }
    }

    fn planned(value: Value) -> PlannedOperation {
        serde_json::from_value(value).expect("test operation is valid")
    }

    #[test]
    fn recording_does_not_touch_the_target() {
        let mut builder = ServiceBuilder::new();
        builder.record(set_name("a"));

        assert_eq!(builder.target(), &Service::default());
        assert_eq!(builder.pending_operations().len(), 1);
        assert_eq!(builder.pending_operations()[0].name(), "setName");
    }

    #[test]
    fn operations_are_applied_in_recording_order() {
        let mut builder = ServiceBuilder::new();
        builder.record(set_name("a")).record(set_name("b"));

        let service = builder.build().expect("all operations are known");
        assert_eq!(service.name, "b");
    }

    #[test]
    fn build_drains_the_log_and_the_builder_stays_usable() {
        let mut builder = ServiceBuilder::new();
        builder.record(set_name("a"));
        builder.build().expect("all operations are known");
        assert!(builder.is_empty());

        builder.record(ServiceOperation::SetReplicas { replicas: 3 });
        let service = builder.build().expect("all operations are known");
        assert_eq!(
            service,
            Service {
                name: "a".to_owned(),
                replicas: Some(3),
            }
        );
    }

    #[test]
    fn pending_operations_can_be_reordered() {
        let mut builder = ServiceBuilder::new();
        builder.record(set_name("a")).record(set_name("b"));
        builder.pending_operations_mut().reverse();

        assert_eq!(builder.build().expect("all operations are known").name, "a");
    }

    #[test]
    fn unresolvable_operation_is_reported_by_name() {
        let mut builder = ServiceBuilder::new();
        builder
            .record(set_name("a"))
            .record_planned(planned(json!({"operation": "setColor", "color": "blue"})))
            .record(set_name("b"));

        let error = builder.build().expect_err("setColor is unknown");
        assert!(matches!(
            &error,
            Error::UnresolvableOperation { name } if name == "setColor"
        ));
        assert_eq!(
            error.to_string(),
            r#"recorded operation "setColor" does not resolve to a known operation"#
        );

        // No rollback, and nothing after the failing operation was applied
        assert_eq!(builder.target().name, "a");
        assert!(builder.is_empty());
    }

    #[test]
    fn invalid_arguments_are_reported_by_name() {
        let mut builder = ServiceBuilder::new();
        builder.record_planned(planned(json!({"operation": "setReplicas", "replicas": "three"})));

        let error = builder.build().expect_err("replicas must be a number");
        assert!(matches!(
            error,
            Error::InvalidOperationArguments { name, .. } if name == "setReplicas"
        ));
    }

    #[test]
    fn failing_operation_is_reported_by_name() {
        let mut builder = ServiceBuilder::new();
        builder.record(ServiceOperation::SetReplicas { replicas: -1 });

        let error = builder.build().expect_err("negative replicas are rejected");
        assert!(matches!(
            error,
            Error::ApplyOperation { name, source: NegativeReplicasError { replicas: -1 } }
                if name == "setReplicas"
        ));
    }

    #[test]
    fn build_plan_from_yaml() {
        let plan: BuildPlan = serde_yaml::from_str(indoc! {"
            operations:
              - operation: setName
                name: web
              - operation: setReplicas
                replicas: 2
        "})
        .expect("test YAML is valid");

        let mut builder = ServiceBuilder::new();
        builder.record(set_name("ignored")).record_plan(plan);

        let names: Vec<_> = builder
            .pending_operations()
            .iter()
            .map(PendingOperation::name)
            .collect();
        assert_eq!(names, vec!["setName", "setName", "setReplicas"]);

        assert_eq!(
            builder.build().expect("all operations are known"),
            Service {
                name: "web".to_owned(),
                replicas: Some(2),
            }
        );
    }

    #[test]
    fn empty_build_plan() {
        let plan: BuildPlan = serde_yaml::from_str("{}").expect("test YAML is valid");
        assert_eq!(plan, BuildPlan::default());
    }
}
