//! # Deployment Manifest
//!
//! Data model for the deployment input document: the `models` collection of
//! [`ModelSpec`] entries and the `execution_graphs` collection mapping
//! dependency keys to the downstream endpoints that become eligible once the
//! key's producing deployment completes.
//!
//! A manifest is loaded once per workflow run and is immutable for that run.
//! Loading and structural validation live in [`loader`] and [`validation`];
//! this module holds only the typed shapes and the parameter-path scheme used
//! by the downstream parameter directory.

pub mod loader;
pub mod validation;

pub use loader::SpecLoader;
pub use validation::validate_manifest;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel dependency key for containers with no upstream dependency.
/// Keys equal to this value need no execution graph entry.
pub const NO_DEPENDENCY: &str = "none";

/// Serving mode of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointType {
    RealTime,
    Async,
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointType::RealTime => write!(f, "real-time"),
            EndpointType::Async => write!(f, "async"),
        }
    }
}

/// One container in a model's inference pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub container_name: String,
    pub image_reference: String,
    /// Execution-graph key linking this container to its dependency group,
    /// or [`NO_DEPENDENCY`] for a root container.
    pub dependency_key: String,
}

/// One production variant of an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub variant_name: String,
    pub instance_count: u32,
    pub instance_weight: f64,
    pub instance_type: String,
    pub max_concurrent_invocations: u32,
}

/// One deployable model/endpoint unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub model_name: String,
    /// Opaque locator of the model card document; resolved by the external
    /// model-deployment handler.
    pub model_card_reference: String,
    pub endpoint_name: String,
    pub endpoint_type: EndpointType,
    pub containers: Vec<ContainerSpec>,
    pub variants: Vec<VariantSpec>,
    pub min_capacity: u32,
    pub max_capacity: u32,
}

impl ModelSpec {
    /// Dependency keys referenced by this model's containers, sentinel
    /// entries excluded.
    pub fn dependency_keys(&self) -> impl Iterator<Item = &str> {
        self.containers
            .iter()
            .map(|c| c.dependency_key.as_str())
            .filter(|k| *k != NO_DEPENDENCY)
    }

    pub fn is_multi_container(&self) -> bool {
        self.containers.len() > 1
    }
}

/// One downstream deployment under a dependency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub endpoint_name: String,
    pub endpoint_type: EndpointType,
    /// Real-time endpoints hosting more than one container must be invoked
    /// with an explicit target container, so their directory entry carries
    /// the container name as an extra path segment.
    #[serde(default, alias = "multi_container_endpoint")]
    pub multi_container: bool,
    #[serde(default)]
    pub container_name: Option<String>,
}

impl Edge {
    /// Parameter-directory path owned by this edge under `dependency_key`.
    ///
    /// Async endpoints and single-container real-time endpoints use
    /// `/{key}/{type}/{endpoint}`; multi-container real-time endpoints append
    /// the target container name.
    pub fn parameter_path(&self, dependency_key: &str) -> String {
        match (self.endpoint_type, self.multi_container, self.container_name.as_deref()) {
            (EndpointType::RealTime, true, Some(container)) => format!(
                "/{dependency_key}/{}/{}/{container}",
                self.endpoint_type, self.endpoint_name
            ),
            _ => format!(
                "/{dependency_key}/{}/{}",
                self.endpoint_type, self.endpoint_name
            ),
        }
    }
}

/// Ordered mapping from dependency key to the downstream deployments that
/// become eligible once the key's producer has completed.
///
/// Keys iterate in sorted order (deterministic across runs); the edge
/// sequence under each key preserves document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionGraph {
    pub groups: BTreeMap<String, Vec<Edge>>,
}

impl ExecutionGraph {
    pub fn contains_key(&self, dependency_key: &str) -> bool {
        self.groups.contains_key(dependency_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Edge])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Endpoint name implied as the producer of `dependency_key` by the
    /// `<endpoint>-dependent` key scheme. The resolver treats keys whose
    /// implied producer is not a declared endpoint as roots.
    pub fn producer_of(dependency_key: &str) -> Option<&str> {
        dependency_key.strip_suffix("-dependent")
    }
}

/// The full deployment input document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    pub models: Vec<ModelSpec>,
    pub execution_graphs: Vec<ExecutionGraph>,
}

impl DeploymentManifest {
    /// Flatten the `execution_graphs` collection into a single graph.
    ///
    /// Validation rejects a dependency key appearing in more than one graph,
    /// so the merge never overwrites for a valid manifest.
    pub fn merged_graph(&self) -> ExecutionGraph {
        let mut groups = BTreeMap::new();
        for graph in &self.execution_graphs {
            for (key, edges) in &graph.groups {
                groups.insert(key.clone(), edges.clone());
            }
        }
        ExecutionGraph { groups }
    }

    pub fn model_for_endpoint(&self, endpoint_name: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.endpoint_name == endpoint_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(endpoint_name: &str, endpoint_type: EndpointType) -> Edge {
        Edge {
            endpoint_name: endpoint_name.to_string(),
            endpoint_type,
            multi_container: false,
            container_name: None,
        }
    }

    #[test]
    fn parameter_path_for_async_endpoint() {
        let edge = edge("feature-engineering", EndpointType::Async);
        assert_eq!(
            edge.parameter_path("data-preprocessing-dependent"),
            "/data-preprocessing-dependent/async/feature-engineering"
        );
    }

    #[test]
    fn parameter_path_for_single_container_real_time_endpoint() {
        let edge = edge("data-preprocessing", EndpointType::RealTime);
        assert_eq!(
            edge.parameter_path("raw-data-dependent"),
            "/raw-data-dependent/real-time/data-preprocessing"
        );
    }

    #[test]
    fn parameter_path_for_multi_container_real_time_endpoint() {
        let edge = Edge {
            endpoint_name: "inference-1".to_string(),
            endpoint_type: EndpointType::RealTime,
            multi_container: true,
            container_name: Some("ranker".to_string()),
        };
        assert_eq!(
            edge.parameter_path("feature-engineering-dependent"),
            "/feature-engineering-dependent/real-time/inference-1/ranker"
        );
    }

    #[test]
    fn endpoint_type_round_trips_kebab_case() {
        let parsed: EndpointType = serde_json::from_str("\"real-time\"").unwrap();
        assert_eq!(parsed, EndpointType::RealTime);
        assert_eq!(serde_json::to_string(&EndpointType::Async).unwrap(), "\"async\"");
    }

    #[test]
    fn edge_accepts_source_field_alias() {
        let parsed: Edge = serde_json::from_str(
            r#"{"endpoint_name": "inference-1", "endpoint_type": "real-time",
                "multi_container_endpoint": true, "container_name": "ranker"}"#,
        )
        .unwrap();
        assert!(parsed.multi_container);
    }

    #[test]
    fn producer_follows_key_scheme() {
        assert_eq!(
            ExecutionGraph::producer_of("data-preprocessing-dependent"),
            Some("data-preprocessing")
        );
        assert_eq!(ExecutionGraph::producer_of("raw-data"), None);
    }

    #[test]
    fn merged_graph_keeps_sorted_key_order() {
        let mut first = ExecutionGraph::default();
        first
            .groups
            .insert("raw-data-dependent".to_string(), vec![edge("data-preprocessing", EndpointType::RealTime)]);
        let mut second = ExecutionGraph::default();
        second.groups.insert(
            "data-preprocessing-dependent".to_string(),
            vec![edge("feature-engineering", EndpointType::Async)],
        );

        let manifest = DeploymentManifest {
            models: vec![],
            execution_graphs: vec![first, second],
        };
        let merged = manifest.merged_graph();
        let keys: Vec<&str> = merged.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["data-preprocessing-dependent", "raw-data-dependent"]);
    }
}
