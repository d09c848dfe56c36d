//! Parameter directory.
//!
//! The downstream key-value store recording one entry per deployed endpoint
//! under the path scheme of [`crate::manifest::Edge::parameter_path`].
//! Inference-pipeline callers list a dependency key's prefix to discover
//! which endpoints to invoke at that stage.
//!
//! The store itself is external; this module defines the boundary trait, an
//! in-memory implementation used by tests and reference handlers, and the
//! stale-entry pruning pass a DAG update applies to its own key's prefix.

use crate::orchestration::resolver::DependencyGroup;
use dashmap::DashMap;
use tracing::debug;

/// External key-value parameter store.
#[async_trait::async_trait]
pub trait ParameterDirectory: Send + Sync {
    async fn put(&self, path: &str, value: &str) -> anyhow::Result<()>;

    async fn get(&self, path: &str) -> anyhow::Result<Option<String>>;

    /// Paths under `prefix`, in sorted order.
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>>;

    async fn delete(&self, path: &str) -> anyhow::Result<()>;
}

/// In-memory parameter directory backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryParameterDirectory {
    entries: DashMap<String, String>,
}

impl InMemoryParameterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl ParameterDirectory for InMemoryParameterDirectory {
    async fn put(&self, path: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(path.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, path: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(path).map(|entry| entry.value().clone()))
    }

    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let mut paths: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        self.entries.remove(path);
        Ok(())
    }
}

/// Remove directory entries under a group's key that no longer correspond to
/// an edge of that group, so endpoints dropped from the execution graph stop
/// being discoverable. Scoped to the owning key's prefix only; returns the
/// removed paths.
pub async fn prune_stale_parameters(
    directory: &dyn ParameterDirectory,
    group: &DependencyGroup,
) -> anyhow::Result<Vec<String>> {
    let expected = group.expected_parameter_paths();
    let prefix = format!("/{}/", group.dependency_key);
    let mut removed = Vec::new();

    for path in directory.list(&prefix).await? {
        if !expected.contains(&path) {
            directory.delete(&path).await?;
            removed.push(path);
        }
    }

    if !removed.is_empty() {
        debug!(
            dependency_key = %group.dependency_key,
            removed = removed.len(),
            "pruned stale parameter entries"
        );
    }
    Ok(removed)
}
