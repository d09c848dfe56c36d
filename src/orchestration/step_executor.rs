//! # Step Executor
//!
//! Executes one deployment task at a time against the external
//! [`DeploymentHandler`] boundary, bounding each invocation with the task
//! kind's per-call timeout and retrying per its policy.
//!
//! Every invocation attempt is recorded in the returned [`StepOutcome`];
//! a failure is never silently swallowed. When attempts are exhausted the
//! outcome carries a terminal [`OrchestrationError::TaskExhaustedRetries`]
//! for the owning branch; sibling branches are unaffected.

use crate::config::TaskPolicies;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::manifest::{Edge, ModelSpec};
use crate::orchestration::types::{AttemptRecord, DeploymentHandler, StepRecord, TaskKind, TaskOutput};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, instrument, warn};

/// One task invocation request with its typed payload.
#[derive(Debug)]
pub enum TaskInvocation<'a> {
    ModelDeploy {
        spec: &'a ModelSpec,
    },
    EndpointDeploy {
        spec: &'a ModelSpec,
        model_reference: &'a str,
    },
    EndpointScalingAndParameterPublish {
        spec: &'a ModelSpec,
        endpoint_reference: &'a str,
    },
    UpdateDependencyParameters {
        dependency_key: &'a str,
        edge: &'a Edge,
    },
}

impl TaskInvocation<'_> {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskInvocation::ModelDeploy { .. } => TaskKind::ModelDeploy,
            TaskInvocation::EndpointDeploy { .. } => TaskKind::EndpointDeploy,
            TaskInvocation::EndpointScalingAndParameterPublish { .. } => {
                TaskKind::EndpointScalingAndParameterPublish
            }
            TaskInvocation::UpdateDependencyParameters { .. } => {
                TaskKind::UpdateDependencyParameters
            }
        }
    }
}

/// Terminal result of one task with its full attempt history.
#[derive(Debug)]
pub struct StepOutcome {
    pub task_kind: TaskKind,
    pub attempts: Vec<AttemptRecord>,
    pub outcome: OrchestrationResult<TaskOutput>,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Collapse the outcome into the record shape the aggregator consumes.
    pub fn to_record(&self) -> StepRecord {
        StepRecord {
            task_kind: self.task_kind,
            attempts: self.attempts.clone(),
            succeeded: self.outcome.is_ok(),
            error: self.outcome.as_ref().err().map(ToString::to_string),
        }
    }
}

/// Supervises single task invocations with timeout and retry.
pub struct StepExecutor {
    handler: Arc<dyn DeploymentHandler>,
    policies: TaskPolicies,
}

impl StepExecutor {
    pub fn new(handler: Arc<dyn DeploymentHandler>, policies: TaskPolicies) -> Self {
        Self { handler, policies }
    }

    /// Execute one task to its terminal outcome.
    ///
    /// Retries transient failures (handler errors and per-call timeouts)
    /// until success or until the kind's attempts are exhausted. A kind with
    /// `max_attempts = 1` is terminal on its first failure.
    #[instrument(skip(self, invocation), fields(task_kind = %invocation.kind()))]
    pub async fn execute(&self, invocation: TaskInvocation<'_>) -> StepOutcome {
        let kind = invocation.kind();
        let policy = self.policies.policy_for(kind).clone();
        let mut attempts = Vec::new();
        let mut last_error = String::new();

        for attempt in 1..=policy.retry.max_attempts {
            let started_at = Utc::now();
            let call_start = Instant::now();
            let result = timeout(policy.call_timeout, self.invoke(&invocation)).await;
            let duration = call_start.elapsed();

            match result {
                Ok(Ok(output)) => {
                    attempts.push(AttemptRecord {
                        attempt,
                        started_at,
                        duration,
                        error: None,
                    });
                    debug!(
                        attempt = attempt,
                        duration_ms = duration.as_millis() as u64,
                        "task invocation succeeded"
                    );
                    return StepOutcome {
                        task_kind: kind,
                        attempts,
                        outcome: Ok(output),
                    };
                }
                Ok(Err(e)) => {
                    let invocation_error = OrchestrationError::TaskInvocation {
                        task_kind: kind,
                        attempt,
                        reason: e.to_string(),
                    };
                    warn!(
                        attempt = attempt,
                        max_attempts = policy.retry.max_attempts,
                        error = %invocation_error,
                        "task invocation failed"
                    );
                    last_error = invocation_error.to_string();
                    attempts.push(AttemptRecord {
                        attempt,
                        started_at,
                        duration,
                        error: Some(last_error.clone()),
                    });
                }
                Err(_) => {
                    let timeout_error = OrchestrationError::TaskTimeout {
                        task_kind: kind,
                        attempt,
                        timeout: policy.call_timeout,
                    };
                    warn!(
                        attempt = attempt,
                        max_attempts = policy.retry.max_attempts,
                        timeout_ms = policy.call_timeout.as_millis() as u64,
                        "task invocation timed out"
                    );
                    last_error = timeout_error.to_string();
                    attempts.push(AttemptRecord {
                        attempt,
                        started_at,
                        duration,
                        error: Some(last_error.clone()),
                    });
                }
            }

            if let Some(delay) = policy.retry.delay_for(attempt) {
                sleep(delay).await;
            }
        }

        let exhausted = OrchestrationError::TaskExhaustedRetries {
            task_kind: kind,
            attempts: policy.retry.max_attempts,
            last_error,
        };
        error!(error = %exhausted, "task attempts exhausted");
        StepOutcome {
            task_kind: kind,
            attempts,
            outcome: Err(exhausted),
        }
    }

    async fn invoke(&self, invocation: &TaskInvocation<'_>) -> anyhow::Result<TaskOutput> {
        match invocation {
            TaskInvocation::ModelDeploy { spec } => self
                .handler
                .deploy_model(spec)
                .await
                .map(TaskOutput::Model),
            TaskInvocation::EndpointDeploy {
                spec,
                model_reference,
            } => self
                .handler
                .deploy_endpoint(spec, model_reference)
                .await
                .map(TaskOutput::Endpoint),
            TaskInvocation::EndpointScalingAndParameterPublish {
                spec,
                endpoint_reference,
            } => self
                .handler
                .apply_scaling_and_publish(spec, endpoint_reference)
                .await
                .map(TaskOutput::ScalingPublish),
            TaskInvocation::UpdateDependencyParameters {
                dependency_key,
                edge,
            } => self
                .handler
                .update_dependency_parameters(dependency_key, edge)
                .await
                .map(TaskOutput::DagUpdate),
        }
    }
}
