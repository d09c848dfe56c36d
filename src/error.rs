//! Error types for the deployment orchestration core.
//!
//! Pre-execution errors (validation, cyclic dependencies) abort a run before
//! any task is invoked. Task-level errors are handled inside the step
//! executor's retry loop and surface as branch-terminal failures in the
//! execution report rather than as returned errors.

use crate::manifest::EndpointType;
use crate::orchestration::types::TaskKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One structural problem found in a deployment manifest.
///
/// Validation is total: the validator walks the whole document and reports
/// every issue it can find, each naming the offending field.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ValidationIssue {
    #[error("duplicate model_name: {model_name}")]
    DuplicateModelName { model_name: String },

    #[error("duplicate endpoint_name: {endpoint_name}")]
    DuplicateEndpointName { endpoint_name: String },

    #[error("dependency_key {dependency_key} appears in more than one execution graph")]
    DuplicateDependencyKey { dependency_key: String },

    #[error(
        "container {container_name} of model {model_name} references dependency_key \
         {dependency_key} with no execution graph entry"
    )]
    DanglingDependencyKey {
        model_name: String,
        container_name: String,
        dependency_key: String,
    },

    #[error(
        "edge {endpoint_name} under {dependency_key} declares endpoint_type {referenced} \
         but the model declares {declared}"
    )]
    EndpointTypeMismatch {
        dependency_key: String,
        endpoint_name: String,
        declared: EndpointType,
        referenced: EndpointType,
    },

    #[error("edge {endpoint_name} under {dependency_key} names no declared model")]
    UnknownEdgeEndpoint {
        dependency_key: String,
        endpoint_name: String,
    },

    #[error(
        "multi-container edge {endpoint_name} under {dependency_key} is missing container_name"
    )]
    MissingContainerName {
        dependency_key: String,
        endpoint_name: String,
    },

    #[error("model {model_name} has min_capacity {min_capacity} > max_capacity {max_capacity}")]
    CapacityBoundsInverted {
        model_name: String,
        min_capacity: u32,
        max_capacity: u32,
    },

    #[error("async model {model_name} must declare exactly one variant, found {count}")]
    AsyncVariantCount { model_name: String, count: usize },

    #[error("real-time model {model_name} must declare 1 to 10 variants, found {count}")]
    RealTimeVariantCount { model_name: String, count: usize },

    #[error("real-time model {model_name} must have min_capacity >= 1, found {min_capacity}")]
    RealTimeMinCapacity {
        model_name: String,
        min_capacity: u32,
    },

    #[error("model {model_name} declares no containers")]
    NoContainers { model_name: String },
}

/// Aggregate of every structural problem found in one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "manifest validation failed ({} issues):", self.issues.len())?;
        for issue in &self.issues {
            write!(f, " [{issue}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised by the orchestration core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestrationError {
    /// Manifest failed structural validation. Fatal, pre-execution.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The dependency graph contains a cycle. Fatal, pre-execution.
    #[error("cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// The manifest document could not be parsed at all.
    #[error("malformed manifest document: {reason}")]
    MalformedDocument { reason: String },

    /// A single task invocation failed. Transient; retried per policy.
    #[error("task {task_kind} failed on attempt {attempt}: {reason}")]
    TaskInvocation {
        task_kind: TaskKind,
        attempt: u32,
        reason: String,
    },

    /// A single task invocation exceeded its per-call timeout. Treated as
    /// transient and retried per policy.
    #[error("task {task_kind} timed out after {timeout:?} on attempt {attempt}")]
    TaskTimeout {
        task_kind: TaskKind,
        attempt: u32,
        timeout: Duration,
    },

    /// Every configured attempt for a task failed. Terminal for the owning
    /// branch only.
    #[error("task {task_kind} exhausted {attempts} attempt(s): {last_error}")]
    TaskExhaustedRetries {
        task_kind: TaskKind,
        attempts: u32,
        last_error: String,
    },

    /// The whole run exceeded its workflow deadline. Terminal for the run;
    /// in-flight branches are cancelled.
    #[error("workflow deadline of {deadline:?} exceeded")]
    WorkflowDeadlineExceeded { deadline: Duration },

    /// Configuration could not be loaded or was inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_issue() {
        let error = ValidationError::new(vec![
            ValidationIssue::DuplicateModelName {
                model_name: "data-preprocessing".to_string(),
            },
            ValidationIssue::NoContainers {
                model_name: "inference-1".to_string(),
            },
        ]);

        let rendered = error.to_string();
        assert!(rendered.contains("2 issues"));
        assert!(rendered.contains("duplicate model_name: data-preprocessing"));
        assert!(rendered.contains("inference-1 declares no containers"));
    }

    #[test]
    fn cycle_error_names_the_cycle() {
        let error = OrchestrationError::CyclicDependency {
            cycle: vec![
                "a-dependent".to_string(),
                "b-dependent".to_string(),
                "a-dependent".to_string(),
            ],
        };
        assert_eq!(
            error.to_string(),
            "cyclic dependency detected: a-dependent -> b-dependent -> a-dependent"
        );
    }
}
