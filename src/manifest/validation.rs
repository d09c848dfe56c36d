//! Structural validation for deployment manifests.
//!
//! Validation is total: every entry is checked and every problem found is
//! reported, not just the first. No side effects.

use crate::error::{ValidationError, ValidationIssue};
use crate::manifest::{DeploymentManifest, EndpointType, ModelSpec, NO_DEPENDENCY};
use std::collections::{HashMap, HashSet};

/// Validate a manifest, reporting every structural issue found.
pub fn validate_manifest(manifest: &DeploymentManifest) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    check_unique_names(manifest, &mut issues);
    check_models(manifest, &mut issues);
    check_graph_keys(manifest, &mut issues);
    check_edges(manifest, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(issues))
    }
}

fn check_unique_names(manifest: &DeploymentManifest, issues: &mut Vec<ValidationIssue>) {
    let mut model_names = HashSet::new();
    let mut endpoint_names = HashSet::new();
    for model in &manifest.models {
        if !model_names.insert(model.model_name.as_str()) {
            issues.push(ValidationIssue::DuplicateModelName {
                model_name: model.model_name.clone(),
            });
        }
        if !endpoint_names.insert(model.endpoint_name.as_str()) {
            issues.push(ValidationIssue::DuplicateEndpointName {
                endpoint_name: model.endpoint_name.clone(),
            });
        }
    }
}

fn check_models(manifest: &DeploymentManifest, issues: &mut Vec<ValidationIssue>) {
    for model in &manifest.models {
        if model.containers.is_empty() {
            issues.push(ValidationIssue::NoContainers {
                model_name: model.model_name.clone(),
            });
        }
        if model.min_capacity > model.max_capacity {
            issues.push(ValidationIssue::CapacityBoundsInverted {
                model_name: model.model_name.clone(),
                min_capacity: model.min_capacity,
                max_capacity: model.max_capacity,
            });
        }
        check_variants(model, issues);
    }
}

// Async endpoints carry exactly one production variant; real-time endpoints
// carry 1 to 10 and must keep at least one instance warm.
fn check_variants(model: &ModelSpec, issues: &mut Vec<ValidationIssue>) {
    match model.endpoint_type {
        EndpointType::Async => {
            if model.variants.len() != 1 {
                issues.push(ValidationIssue::AsyncVariantCount {
                    model_name: model.model_name.clone(),
                    count: model.variants.len(),
                });
            }
        }
        EndpointType::RealTime => {
            if model.variants.is_empty() || model.variants.len() > 10 {
                issues.push(ValidationIssue::RealTimeVariantCount {
                    model_name: model.model_name.clone(),
                    count: model.variants.len(),
                });
            }
            if model.min_capacity < 1 {
                issues.push(ValidationIssue::RealTimeMinCapacity {
                    model_name: model.model_name.clone(),
                    min_capacity: model.min_capacity,
                });
            }
        }
    }
}

fn check_graph_keys(manifest: &DeploymentManifest, issues: &mut Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    for graph in &manifest.execution_graphs {
        for (key, _) in graph.iter() {
            if !seen.insert(key.to_string()) {
                issues.push(ValidationIssue::DuplicateDependencyKey {
                    dependency_key: key.to_string(),
                });
            }
        }
    }

    for model in &manifest.models {
        for container in &model.containers {
            if container.dependency_key != NO_DEPENDENCY
                && !seen.contains(&container.dependency_key)
            {
                issues.push(ValidationIssue::DanglingDependencyKey {
                    model_name: model.model_name.clone(),
                    container_name: container.container_name.clone(),
                    dependency_key: container.dependency_key.clone(),
                });
            }
        }
    }
}

fn check_edges(manifest: &DeploymentManifest, issues: &mut Vec<ValidationIssue>) {
    let declared: HashMap<&str, EndpointType> = manifest
        .models
        .iter()
        .map(|m| (m.endpoint_name.as_str(), m.endpoint_type))
        .collect();

    for graph in &manifest.execution_graphs {
        for (key, edges) in graph.iter() {
            for edge in edges {
                match declared.get(edge.endpoint_name.as_str()) {
                    None => issues.push(ValidationIssue::UnknownEdgeEndpoint {
                        dependency_key: key.to_string(),
                        endpoint_name: edge.endpoint_name.clone(),
                    }),
                    Some(declared_type) if *declared_type != edge.endpoint_type => {
                        issues.push(ValidationIssue::EndpointTypeMismatch {
                            dependency_key: key.to_string(),
                            endpoint_name: edge.endpoint_name.clone(),
                            declared: *declared_type,
                            referenced: edge.endpoint_type,
                        });
                    }
                    Some(_) => {}
                }
                if edge.endpoint_type == EndpointType::RealTime
                    && edge.multi_container
                    && edge.container_name.is_none()
                {
                    issues.push(ValidationIssue::MissingContainerName {
                        dependency_key: key.to_string(),
                        endpoint_name: edge.endpoint_name.clone(),
                    });
                }
            }
        }
    }
}
