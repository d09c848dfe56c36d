//! Core types shared across the orchestration components: task kinds and
//! outputs, the external deployment-handler boundary, and per-branch result
//! records consumed by the aggregator.

use crate::manifest::{Edge, ModelSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// The four task kinds the orchestrator sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    ModelDeploy,
    EndpointDeploy,
    EndpointScalingAndParameterPublish,
    UpdateDependencyParameters,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::ModelDeploy => "ModelDeploy",
            TaskKind::EndpointDeploy => "EndpointDeploy",
            TaskKind::EndpointScalingAndParameterPublish => {
                "EndpointScalingAndParameterPublish"
            }
            TaskKind::UpdateDependencyParameters => "UpdateDependencyParameters",
        };
        write!(f, "{name}")
    }
}

/// Output of a model deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDeployOutput {
    pub model_reference: String,
    pub status: String,
}

/// Output of an endpoint deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDeployOutput {
    pub endpoint_reference: String,
    pub status: String,
}

/// Output of autoscaling registration plus parameter publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPublishOutput {
    pub parameter_path: String,
}

/// Output of one dependency-parameter update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagUpdateOutput {
    pub updated: bool,
}

/// Typed output of one completed task invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskOutput {
    Model(ModelDeployOutput),
    Endpoint(EndpointDeployOutput),
    ScalingPublish(ScalingPublishOutput),
    DagUpdate(DagUpdateOutput),
}

/// External task boundary implemented by the deployment step handlers.
///
/// The orchestration core sequences and supervises these calls; the handler
/// owns the cloud interaction. Handler errors are opaque to the core, which
/// classifies them only as retryable-or-not by task-kind policy.
#[async_trait::async_trait]
pub trait DeploymentHandler: Send + Sync {
    /// Create or update the model and its model card.
    async fn deploy_model(&self, spec: &ModelSpec) -> anyhow::Result<ModelDeployOutput>;

    /// Create or update the serving endpoint for a deployed model.
    async fn deploy_endpoint(
        &self,
        spec: &ModelSpec,
        model_reference: &str,
    ) -> anyhow::Result<EndpointDeployOutput>;

    /// Register autoscaling for the endpoint and publish its parameter entry.
    async fn apply_scaling_and_publish(
        &self,
        spec: &ModelSpec,
        endpoint_reference: &str,
    ) -> anyhow::Result<ScalingPublishOutput>;

    /// Refresh the dependency-ordering entry for one edge of a group.
    async fn update_dependency_parameters(
        &self,
        dependency_key: &str,
        edge: &Edge,
    ) -> anyhow::Result<DagUpdateOutput>;
}

/// One recorded task invocation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// `None` on success.
    pub error: Option<String>,
}

/// Result of one task within a branch, with its full attempt history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub task_kind: TaskKind,
    pub attempts: Vec<AttemptRecord>,
    pub succeeded: bool,
    pub error: Option<String>,
}

/// Which fan-out phase a branch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Phase 1: per-model deployment chains.
    ModelDeployment,
    /// Phase 2: per-dependency-group parameter updates.
    DagUpdate,
}

/// Terminal state of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchStatus {
    Succeeded,
    Failed,
    /// Cancelled by the workflow deadline; distinct from a failure.
    Cancelled,
}

/// Terminal outcome of one fan-out branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub branch_id: Uuid,
    pub phase: Phase,
    /// Model name for Phase 1 branches, dependency key for Phase 2 branches.
    pub label: String,
    pub status: BranchStatus,
    pub steps: Vec<StepRecord>,
    pub error: Option<String>,
}

impl BranchRecord {
    pub fn is_success(&self) -> bool {
        self.status == BranchStatus::Succeeded
    }

    /// Task kind of the last step this branch ran, if any.
    pub fn last_task_kind(&self) -> Option<TaskKind> {
        self.steps.last().map(|s| s.task_kind)
    }

    /// Total invocation attempts recorded across the branch's steps.
    pub fn total_attempts(&self) -> usize {
        self.steps.iter().map(|s| s.attempts.len()).sum()
    }
}
