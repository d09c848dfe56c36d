//! Shared test infrastructure: manifest builders and a scripted mock
//! deployment handler with per-call bookkeeping.

#![allow(dead_code)]

use anyhow::bail;
use mldeploy_core::manifest::{
    ContainerSpec, DeploymentManifest, Edge, EndpointType, ExecutionGraph, ModelSpec, VariantSpec,
};
use mldeploy_core::orchestration::{
    DagUpdateOutput, DeploymentHandler, EndpointDeployOutput, ModelDeployOutput,
    ScalingPublishOutput, TaskKind,
};
use mldeploy_core::params::{InMemoryParameterDirectory, ParameterDirectory};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn variant() -> VariantSpec {
    VariantSpec {
        variant_name: "primary".to_string(),
        instance_count: 1,
        instance_weight: 1.0,
        instance_type: "standard-large".to_string(),
        max_concurrent_invocations: 4,
    }
}

pub fn model(name: &str, endpoint_type: EndpointType, dependency_key: &str) -> ModelSpec {
    ModelSpec {
        model_name: name.to_string(),
        model_card_reference: format!("cards/{name}.json"),
        endpoint_name: name.to_string(),
        endpoint_type,
        containers: vec![ContainerSpec {
            container_name: format!("{name}-container"),
            image_reference: format!("registry/{name}:latest"),
            dependency_key: dependency_key.to_string(),
        }],
        variants: vec![variant()],
        min_capacity: 1,
        max_capacity: 2,
    }
}

pub fn edge(endpoint_name: &str, endpoint_type: EndpointType) -> Edge {
    Edge {
        endpoint_name: endpoint_name.to_string(),
        endpoint_type,
        multi_container: false,
        container_name: None,
    }
}

pub fn graph(entries: Vec<(&str, Vec<Edge>)>) -> ExecutionGraph {
    let mut groups = BTreeMap::new();
    for (key, edges) in entries {
        groups.insert(key.to_string(), edges);
    }
    ExecutionGraph { groups }
}

/// The four-model inference pipeline: data-preprocessing feeds
/// feature-engineering, which feeds two parallel inference endpoints.
pub fn sample_manifest() -> DeploymentManifest {
    DeploymentManifest {
        models: vec![
            model("data-preprocessing", EndpointType::RealTime, "raw-data-dependent"),
            model(
                "feature-engineering",
                EndpointType::Async,
                "data-preprocessing-dependent",
            ),
            model("inference-1", EndpointType::RealTime, "feature-engineering-dependent"),
            model("inference-2", EndpointType::RealTime, "feature-engineering-dependent"),
        ],
        execution_graphs: vec![graph(vec![
            (
                "raw-data-dependent",
                vec![edge("data-preprocessing", EndpointType::RealTime)],
            ),
            (
                "data-preprocessing-dependent",
                vec![edge("feature-engineering", EndpointType::Async)],
            ),
            (
                "feature-engineering-dependent",
                vec![
                    edge("inference-1", EndpointType::RealTime),
                    edge("inference-2", EndpointType::RealTime),
                ],
            ),
        ])],
    }
}

type CallKey = (TaskKind, String);

/// Scripted deployment handler. Succeeds by default; individual calls can be
/// made to fail a number of times, fail always, or hang until cancelled.
/// Every invocation is recorded.
pub struct MockDeploymentHandler {
    invocations: Mutex<Vec<CallKey>>,
    fail_times: Mutex<HashMap<CallKey, u32>>,
    always_fail: Mutex<HashSet<CallKey>>,
    hang: Mutex<HashSet<CallKey>>,
    in_flight_model_deploys: AtomicUsize,
    peak_model_deploys: AtomicUsize,
    directory: Arc<InMemoryParameterDirectory>,
}

impl MockDeploymentHandler {
    pub fn new() -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            fail_times: Mutex::new(HashMap::new()),
            always_fail: Mutex::new(HashSet::new()),
            hang: Mutex::new(HashSet::new()),
            in_flight_model_deploys: AtomicUsize::new(0),
            peak_model_deploys: AtomicUsize::new(0),
            directory: Arc::new(InMemoryParameterDirectory::new()),
        }
    }

    /// Fail the next `times` invocations of (kind, name), then succeed.
    pub fn fail_times(&self, kind: TaskKind, name: &str, times: u32) {
        self.fail_times.lock().insert((kind, name.to_string()), times);
    }

    pub fn always_fail(&self, kind: TaskKind, name: &str) {
        self.always_fail.lock().insert((kind, name.to_string()));
    }

    /// Make (kind, name) sleep far past any test deadline.
    pub fn hang_on(&self, kind: TaskKind, name: &str) {
        self.hang.lock().insert((kind, name.to_string()));
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }

    pub fn count_of_kind(&self, kind: TaskKind) -> usize {
        self.invocations.lock().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn count_of(&self, kind: TaskKind, name: &str) -> usize {
        self.invocations
            .lock()
            .iter()
            .filter(|(k, n)| *k == kind && n == name)
            .count()
    }

    /// Highest number of ModelDeploy calls observed in flight at once.
    pub fn peak_concurrent_model_deploys(&self) -> usize {
        self.peak_model_deploys.load(Ordering::SeqCst)
    }

    pub fn directory(&self) -> Arc<InMemoryParameterDirectory> {
        Arc::clone(&self.directory)
    }

    async fn check(&self, kind: TaskKind, name: &str) -> anyhow::Result<()> {
        let key = (kind, name.to_string());
        self.invocations.lock().push(key.clone());

        if self.hang.lock().contains(&key) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.always_fail.lock().contains(&key) {
            bail!("{kind} scripted to fail for {name}");
        }
        let mut fail_times = self.fail_times.lock();
        if let Some(remaining) = fail_times.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                bail!("{kind} scripted transient failure for {name}");
            }
        }
        Ok(())
    }
}

impl Default for MockDeploymentHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeploymentHandler for MockDeploymentHandler {
    async fn deploy_model(&self, spec: &ModelSpec) -> anyhow::Result<ModelDeployOutput> {
        let in_flight = self.in_flight_model_deploys.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_model_deploys.fetch_max(in_flight, Ordering::SeqCst);
        // Hold the slot long enough for sibling branches to overlap.
        let result = async {
            self.check(TaskKind::ModelDeploy, &spec.model_name).await?;
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(ModelDeployOutput {
                model_reference: format!("{}-2026-01-15-00-00-00", spec.model_name),
                status: "Created".to_string(),
            })
        }
        .await;
        self.in_flight_model_deploys.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn deploy_endpoint(
        &self,
        spec: &ModelSpec,
        model_reference: &str,
    ) -> anyhow::Result<EndpointDeployOutput> {
        self.check(TaskKind::EndpointDeploy, &spec.model_name).await?;
        anyhow::ensure!(
            model_reference.starts_with(&spec.model_name),
            "endpoint deploy received a foreign model reference: {model_reference}"
        );
        Ok(EndpointDeployOutput {
            endpoint_reference: spec.endpoint_name.clone(),
            status: "InService".to_string(),
        })
    }

    async fn apply_scaling_and_publish(
        &self,
        spec: &ModelSpec,
        endpoint_reference: &str,
    ) -> anyhow::Result<ScalingPublishOutput> {
        self.check(TaskKind::EndpointScalingAndParameterPublish, &spec.model_name)
            .await?;
        let publication = Edge {
            endpoint_name: spec.endpoint_name.clone(),
            endpoint_type: spec.endpoint_type,
            multi_container: spec.is_multi_container(),
            container_name: spec.containers.first().map(|c| c.container_name.clone()),
        };
        let parameter_path = publication.parameter_path(&spec.containers[0].dependency_key);
        self.directory.put(&parameter_path, endpoint_reference).await?;
        Ok(ScalingPublishOutput { parameter_path })
    }

    async fn update_dependency_parameters(
        &self,
        dependency_key: &str,
        edge: &Edge,
    ) -> anyhow::Result<DagUpdateOutput> {
        self.check(TaskKind::UpdateDependencyParameters, &edge.endpoint_name)
            .await?;
        self.directory
            .put(&edge.parameter_path(dependency_key), &edge.endpoint_name)
            .await?;
        Ok(DagUpdateOutput { updated: true })
    }
}
