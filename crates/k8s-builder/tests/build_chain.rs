use std::collections::BTreeMap;

use indoc::indoc;
use k8s_builder::{
    builder::{ContainerBuilder, ImagePullPolicy, IngressBuilder, PodTemplateBuilder},
    deferred::BuildPlan,
    merge::MergePolicy,
};
use k8s_openapi::api::{
    core::v1::{Container, PodTemplateSpec, Probe},
    networking::v1::{Ingress, IngressSpec},
};

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

/// Builds a pod template from defaults, user overrides and enforced settings, the way an
/// operator assembles its workloads.
#[test]
fn pod_template_from_layered_sources() {
    let defaults: PodTemplateSpec = serde_yaml::from_str(indoc! {"
        metadata:
          labels:
            app.kubernetes.io/name: web
        spec:
          containers:
            - name: main
              image: registry.example.com/web:1.0.0
              ports:
                - containerPort: 8080
                  name: http
              resources:
                limits:
                  cpu: '1'
                  memory: 1Gi
          tolerations:
            - key: dedicated
              operator: Exists
    "})
    .expect("test YAML is valid");

    let user_overrides: PodTemplateSpec = serde_yaml::from_str(indoc! {"
        metadata:
          labels:
            team: frontend
        spec:
          containers:
            - name: main
              resources:
                limits:
                  memory: 2Gi
              env:
                - name: LOG_LEVEL
                  value: debug
            - name: debug-sidecar
              image: busybox
          tolerations:
            - key: dedicated
              operator: Exists
            - key: spot
              operator: Exists
    "})
    .expect("test YAML is valid");

    let readiness_probe: Probe = serde_yaml::from_str(indoc! {"
        httpGet:
          path: /ready
          port: 8080
        periodSeconds: 5
    "})
    .expect("test YAML is valid");

    let enforced_main = ContainerBuilder::new()
        .with_name("main", None)
        .with_image_pull_policy(ImagePullPolicy::IfNotPresent, None)
        .with_readiness_probe(readiness_probe, None)
        .expect("replace never fails")
        .build();

    let mut builder = PodTemplateBuilder::new();
    builder
        .with_pod_template_spec(defaults, None)
        .expect("replace never fails")
        .with_pod_template_spec(user_overrides, MergePolicy::DeepMerge)
        .expect("user overrides can be merged")
        .with_containers(vec![enforced_main], MergePolicy::DeepMerge)
        .expect("enforced settings can be merged")
        .with_labels(
            labels(&[("app.kubernetes.io/name", "ignored")]),
            MergePolicy::ReplaceIfUnset,
        )
        .expect("labels can be set")
        .with_termination_grace_period_seconds(30, MergePolicy::ReplaceIfUnset);

    let pod_template = builder.build();
    let expected: PodTemplateSpec = serde_yaml::from_str(indoc! {"
        metadata:
          labels:
            app.kubernetes.io/name: web
            team: frontend
        spec:
          terminationGracePeriodSeconds: 30
          containers:
            - name: main
              image: registry.example.com/web:1.0.0
              imagePullPolicy: IfNotPresent
              ports:
                - containerPort: 8080
                  name: http
              resources:
                limits:
                  cpu: '1'
                  memory: 2Gi
              env:
                - name: LOG_LEVEL
                  value: debug
              readinessProbe:
                httpGet:
                  path: /ready
                  port: 8080
                periodSeconds: 5
            - name: debug-sidecar
              image: busybox
          tolerations:
            - key: dedicated
              operator: Exists
            - key: spot
              operator: Exists
    "})
    .expect("test YAML is valid");

    assert_eq!(pod_template, expected);
}

#[test]
fn replace_discards_everything_built_so_far() {
    let mut builder = PodTemplateBuilder::new();
    builder
        .with_labels(labels(&[("a", "1")]), None)
        .expect("replace never fails")
        .with_containers(
            vec![Container {
                name: "main".to_owned(),
                ..Container::default()
            }],
            None,
        )
        .expect("replace never fails")
        .with_pod_template_spec(PodTemplateSpec::default(), MergePolicy::Replace)
        .expect("replace never fails");

    assert_eq!(builder.build(), PodTemplateSpec::default());
}

#[test]
fn builder_is_reusable_after_build() {
    let mut builder = ContainerBuilder::new();
    let first = builder.with_name("main", None).with_image("a", None).build();
    let second = builder.with_image("b", None).build();

    assert_eq!(first.image.as_deref(), Some("a"));
    assert_eq!(second.name, "main");
    assert_eq!(second.image.as_deref(), Some("b"));
}

#[test]
fn ingress_from_recorded_and_planned_operations() {
    let plan: BuildPlan = serde_yaml::from_str(indoc! {"
        operations:
          - operation: withAnnotations
            annotations:
              nginx.ingress.kubernetes.io/rewrite-target: /
          - operation: withIngressSpec
            spec:
              tls:
                - hosts:
                    - web.example.com
                  secretName: web-tls
            policy: deepMerge
          - operation: withName
            name: ignored
            policy: replaceIfUnset
    "})
    .expect("test YAML is valid");

    let spec: IngressSpec = serde_yaml::from_str(indoc! {"
        ingressClassName: nginx
        rules:
          - host: web.example.com
            http:
              paths:
                - path: /
                  pathType: Prefix
                  backend:
                    service:
                      name: web
                      port:
                        number: 8080
    "})
    .expect("test YAML is valid");

    let mut builder = IngressBuilder::new();
    builder
        .with_name("web", None)
        .with_namespace("default", None)
        .with_labels(labels(&[("app.kubernetes.io/name", "web")]), None)
        .with_ingress_spec(spec, None)
        .record_plan(plan);
    assert_eq!(builder.pending_operations().len(), 7);

    let ingress = builder.build().expect("all operations are known");
    assert!(builder.is_empty());

    let expected: Ingress = serde_yaml::from_str(indoc! {"
        apiVersion: networking.k8s.io/v1
        kind: Ingress
        metadata:
          name: web
          namespace: default
          labels:
            app.kubernetes.io/name: web
          annotations:
            nginx.ingress.kubernetes.io/rewrite-target: /
        spec:
          ingressClassName: nginx
          rules:
            - host: web.example.com
              http:
                paths:
                  - path: /
                    pathType: Prefix
                    backend:
                      service:
                        name: web
                        port:
                          number: 8080
          tls:
            - hosts:
                - web.example.com
              secretName: web-tls
    "})
    .expect("test YAML is valid");

    assert_eq!(ingress, expected);
}
