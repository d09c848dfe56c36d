//! # Dependency Resolver
//!
//! Resolves a validated execution graph into an [`ExecutionPlan`]: one
//! [`DependencyGroup`] per dependency key, emitted in deterministic
//! topological order with cycle detection up front.
//!
//! A node is a dependency key; for each [`Edge`] under key `k` the graph
//! carries `k -> edge.endpoint_name`. Keys are linked to each other through
//! the producer relation: key `k2` is downstream of `k1` when the endpoint
//! that produces `k2` appears as an edge under `k1`. The producer of a key is
//! resolved from the `<endpoint>-dependent` key scheme; a key whose implied
//! producer is not a declared endpoint is a root group.
//!
//! The resolver executes nothing. It only establishes which deployments may
//! run concurrently (no dependency relation) versus sequentially (a chain
//! along edges), and it fails before any task invocation when the graph
//! contains a cycle.

use crate::error::{OrchestrationError, OrchestrationResult};
use crate::manifest::{DeploymentManifest, Edge, ExecutionGraph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// One dependency key with its ordered downstream edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyGroup {
    pub dependency_key: String,
    /// Endpoint whose deployment produces this key, or `None` for a root.
    pub producer: Option<String>,
    /// Edge order is preserved from the manifest; edges in the same group
    /// have no ordering relation to edges of other groups.
    pub edges: Vec<Edge>,
}

impl DependencyGroup {
    /// The parameter-directory paths owned by this group's edges.
    pub fn expected_parameter_paths(&self) -> BTreeSet<String> {
        self.edges
            .iter()
            .map(|e| e.parameter_path(&self.dependency_key))
            .collect()
    }
}

/// Resolved execution plan: groups in topological order, producers first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub groups: Vec<DependencyGroup>,
}

impl ExecutionPlan {
    pub fn group(&self, dependency_key: &str) -> Option<&DependencyGroup> {
        self.groups.iter().find(|g| g.dependency_key == dependency_key)
    }

    /// Position of a key in the plan's topological order.
    pub fn position(&self, dependency_key: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.dependency_key == dependency_key)
    }

    /// Keys with no producing endpoint; their chains start the graph.
    pub fn roots(&self) -> impl Iterator<Item = &DependencyGroup> {
        self.groups.iter().filter(|g| g.producer.is_none())
    }
}

/// Builds execution plans from validated manifests.
pub struct DependencyResolver;

impl DependencyResolver {
    /// Resolve the manifest's merged graph into an execution plan.
    ///
    /// Fails with [`OrchestrationError::CyclicDependency`] naming the key
    /// cycle when the graph is not acyclic. Resolution is deterministic:
    /// the same manifest always yields the same plan.
    pub fn resolve(manifest: &DeploymentManifest) -> OrchestrationResult<ExecutionPlan> {
        let graph = manifest.merged_graph();
        let endpoints: HashSet<&str> = manifest
            .models
            .iter()
            .map(|m| m.endpoint_name.as_str())
            .collect();

        // Index-based adjacency over dependency keys, in sorted key order.
        let keys: Vec<&str> = graph.iter().map(|(k, _)| k).collect();

        // produced_by[endpoint] = indices of the keys that endpoint produces.
        let mut produced_by: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, key) in keys.iter().enumerate() {
            if let Some(producer) = ExecutionGraph::producer_of(key) {
                if endpoints.contains(producer) {
                    produced_by.entry(producer).or_default().push(i);
                }
            }
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); keys.len()];
        for (i, (_, edges)) in graph.iter().enumerate() {
            for edge in edges {
                if let Some(downstream) = produced_by.get(edge.endpoint_name.as_str()) {
                    adjacency[i].extend(downstream.iter().copied());
                }
            }
        }

        let order = topological_order(&keys, &adjacency)?;

        let groups = order
            .into_iter()
            .map(|i| {
                let key = keys[i];
                let producer = ExecutionGraph::producer_of(key)
                    .filter(|p| endpoints.contains(p))
                    .map(str::to_string);
                DependencyGroup {
                    dependency_key: key.to_string(),
                    producer,
                    edges: graph.groups[key].clone(),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            groups = groups.len(),
            roots = groups.iter().filter(|g| g.producer.is_none()).count(),
            "execution graph resolved"
        );

        Ok(ExecutionPlan { groups })
    }
}

/// Depth-first topological sort with cycle detection.
///
/// Tracks the active recursion path so a back-edge reports the full key
/// cycle. Nodes are visited in sorted-key order, making the resulting order
/// deterministic for a given graph.
fn topological_order(keys: &[&str], adjacency: &[Vec<usize>]) -> OrchestrationResult<Vec<usize>> {
    let mut visited = vec![false; keys.len()];
    let mut on_path = vec![false; keys.len()];
    let mut path = Vec::new();
    let mut post_order = Vec::with_capacity(keys.len());

    fn visit(
        node: usize,
        keys: &[&str],
        adjacency: &[Vec<usize>],
        visited: &mut [bool],
        on_path: &mut [bool],
        path: &mut Vec<usize>,
        post_order: &mut Vec<usize>,
    ) -> OrchestrationResult<()> {
        visited[node] = true;
        on_path[node] = true;
        path.push(node);

        for &next in &adjacency[node] {
            if on_path[next] {
                // Back-edge: slice the active path from the revisited node.
                let start = path.iter().position(|&n| n == next).unwrap_or(0);
                let mut cycle: Vec<String> =
                    path[start..].iter().map(|&n| keys[n].to_string()).collect();
                cycle.push(keys[next].to_string());
                return Err(OrchestrationError::CyclicDependency { cycle });
            }
            if !visited[next] {
                visit(next, keys, adjacency, visited, on_path, path, post_order)?;
            }
        }

        path.pop();
        on_path[node] = false;
        post_order.push(node);
        Ok(())
    }

    for node in 0..keys.len() {
        if !visited[node] {
            visit(
                node,
                keys,
                adjacency,
                &mut visited,
                &mut on_path,
                &mut path,
                &mut post_order,
            )?;
        }
    }

    post_order.reverse();
    Ok(post_order)
}
