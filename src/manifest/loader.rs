//! Manifest loading.
//!
//! Parses the JSON input document into a [`DeploymentManifest`] and runs
//! total validation before handing it to the resolver. Parse failures and
//! validation failures are both fatal, pre-execution.

use crate::error::{OrchestrationError, OrchestrationResult};
use crate::manifest::{validate_manifest, DeploymentManifest};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Loads and validates deployment manifests.
pub struct SpecLoader;

impl SpecLoader {
    /// Parse and validate a manifest from a JSON string.
    pub fn from_json_str(raw: &str) -> OrchestrationResult<DeploymentManifest> {
        let manifest: DeploymentManifest =
            serde_json::from_str(raw).map_err(|e| OrchestrationError::MalformedDocument {
                reason: e.to_string(),
            })?;
        Self::validated(manifest)
    }

    /// Parse and validate a manifest from an already-parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> OrchestrationResult<DeploymentManifest> {
        let manifest: DeploymentManifest =
            serde_json::from_value(value).map_err(|e| OrchestrationError::MalformedDocument {
                reason: e.to_string(),
            })?;
        Self::validated(manifest)
    }

    /// Read, parse, and validate a manifest from a file on disk.
    pub fn from_path(path: &Path) -> OrchestrationResult<DeploymentManifest> {
        let raw = fs::read_to_string(path).map_err(|e| OrchestrationError::MalformedDocument {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&raw)
    }

    fn validated(manifest: DeploymentManifest) -> OrchestrationResult<DeploymentManifest> {
        validate_manifest(&manifest)?;
        debug!(
            models = manifest.models.len(),
            graphs = manifest.execution_graphs.len(),
            "manifest loaded and validated"
        );
        Ok(manifest)
    }
}
