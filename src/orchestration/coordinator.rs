//! # Workflow Coordinator
//!
//! The two-phase orchestration state machine:
//!
//! `Init -> Phase1Fanout -> Phase1Join -> Phase2Fanout -> Phase2Join -> Done`
//!
//! `Init` loads, validates, and resolves the manifest; a validation or cycle
//! failure aborts the run before any task is invoked. Phase 1 fans out one
//! branch per model running the fixed sequence
//! `ModelDeploy -> EndpointDeploy -> EndpointScalingAndParameterPublish`;
//! branches are independent of each other even when their containers declare
//! dependency keys; the dependency relation governs Phase 2 wiring, not
//! Phase 1 scheduling. Phase 2, gated on Phase 1's barrier, fans out one
//! branch per dependency group running `UpdateDependencyParameters` per edge
//! in manifest order.
//!
//! Failure policy is best-effort aggregation: a branch failure never cancels
//! sibling branches; every branch runs to its own terminal state and the
//! report carries every outcome. The only condition that cancels in-flight
//! branches is the workflow deadline, signalled through a watch channel that
//! every branch observes at its suspension points; cancelled branches are
//! reported as `Cancelled`, distinct from `Failed`.

use crate::config::CoordinatorConfig;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::manifest::{validate_manifest, DeploymentManifest, ModelSpec};
use crate::orchestration::aggregator::{ExecutionReport, ResultAggregator};
use crate::orchestration::resolver::{DependencyGroup, DependencyResolver};
use crate::orchestration::step_executor::{StepExecutor, TaskInvocation};
use crate::orchestration::types::{
    BranchRecord, BranchStatus, DeploymentHandler, Phase, StepRecord, TaskOutput,
};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Drives a deployment manifest through both fan-out phases and aggregates
/// the per-branch outcomes into an execution report.
pub struct WorkflowCoordinator {
    executor: Arc<StepExecutor>,
    config: CoordinatorConfig,
}

impl WorkflowCoordinator {
    pub fn new(handler: Arc<dyn DeploymentHandler>, config: CoordinatorConfig) -> Self {
        let executor = Arc::new(StepExecutor::new(handler, config.policies.clone()));
        Self { executor, config }
    }

    /// Execute one workflow run.
    ///
    /// Pre-execution failures (validation, cyclic dependencies) are returned
    /// as errors before any task runs. Everything after that point lands in
    /// the structured report, including deadline cancellation.
    #[instrument(skip(self, manifest), fields(models = manifest.models.len()))]
    pub async fn run(&self, manifest: DeploymentManifest) -> OrchestrationResult<ExecutionReport> {
        let run_id = Uuid::new_v4();

        // Init: resolve everything before the first task invocation.
        validate_manifest(&manifest)?;
        let plan = DependencyResolver::resolve(&manifest)?;

        info!(
            run_id = %run_id,
            models = manifest.models.len(),
            groups = plan.groups.len(),
            deadline_secs = self.config.workflow_deadline.as_secs(),
            "starting deployment workflow"
        );

        let mut aggregator = ResultAggregator::new(run_id);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let deadline = Instant::now() + self.config.workflow_deadline;

        // Phase 1: one branch per model, all started concurrently.
        let labels: Vec<String> = manifest.models.iter().map(|m| m.model_name.clone()).collect();
        let handles: Vec<JoinHandle<BranchRecord>> = manifest
            .models
            .iter()
            .map(|spec| {
                let executor = Arc::clone(&self.executor);
                let spec = Arc::new(spec.clone());
                let cancel = cancel_rx.clone();
                tokio::spawn(run_model_branch(executor, spec, cancel))
            })
            .collect();
        let (records, deadline_hit) =
            join_phase(handles, labels, Phase::ModelDeployment, deadline, &cancel_tx).await;
        aggregator.record_all(records);

        if deadline_hit {
            warn!(
                error = %OrchestrationError::WorkflowDeadlineExceeded {
                    deadline: self.config.workflow_deadline
                },
                "cancelling run before dependency updates"
            );
            aggregator.mark_deadline_exceeded();
            return Ok(aggregator.finish());
        }

        // Phase 2: gated on the Phase 1 barrier; one branch per dependency
        // group. Runs even when Phase 1 had branch failures.
        let labels: Vec<String> = plan
            .groups
            .iter()
            .map(|g| g.dependency_key.clone())
            .collect();
        let handles: Vec<JoinHandle<BranchRecord>> = plan
            .groups
            .iter()
            .map(|group| {
                let executor = Arc::clone(&self.executor);
                let group = Arc::new(group.clone());
                let cancel = cancel_rx.clone();
                tokio::spawn(run_dag_branch(executor, group, cancel))
            })
            .collect();
        let (records, deadline_hit) =
            join_phase(handles, labels, Phase::DagUpdate, deadline, &cancel_tx).await;
        aggregator.record_all(records);

        if deadline_hit {
            warn!(
                error = %OrchestrationError::WorkflowDeadlineExceeded {
                    deadline: self.config.workflow_deadline
                },
                "run exceeded its deadline during dependency updates"
            );
            aggregator.mark_deadline_exceeded();
        }

        Ok(aggregator.finish())
    }
}

/// Wait for every branch of a phase to reach a terminal state, cancelling
/// the fan-out if the workflow deadline expires first.
async fn join_phase(
    handles: Vec<JoinHandle<BranchRecord>>,
    labels: Vec<String>,
    phase: Phase,
    deadline: Instant,
    cancel_tx: &watch::Sender<bool>,
) -> (Vec<BranchRecord>, bool) {
    let joined = join_all(handles);
    tokio::pin!(joined);

    let mut deadline_hit = false;
    let results = tokio::select! {
        results = &mut joined => results,
        _ = tokio::time::sleep_until(deadline) => {
            deadline_hit = true;
            let _ = cancel_tx.send(true);
            // Branches observe the signal at their next suspension point
            // and terminate as Cancelled.
            joined.await
        }
    };

    let records = results
        .into_iter()
        .zip(labels)
        .map(|(result, label)| match result {
            Ok(record) => record,
            Err(e) => {
                error!(label = %label, error = %e, "branch task panicked");
                BranchRecord {
                    branch_id: Uuid::new_v4(),
                    phase,
                    label,
                    status: BranchStatus::Failed,
                    steps: Vec::new(),
                    error: Some(format!("branch task panicked: {e}")),
                }
            }
        })
        .collect();

    (records, deadline_hit)
}

/// Phase 1 branch: the fixed three-step deployment chain for one model,
/// each step strictly after the previous succeeds.
async fn run_model_branch(
    executor: Arc<StepExecutor>,
    spec: Arc<ModelSpec>,
    mut cancel: watch::Receiver<bool>,
) -> BranchRecord {
    let branch_id = Uuid::new_v4();
    let label = spec.model_name.clone();
    let mut steps: Vec<StepRecord> = Vec::new();

    if *cancel.borrow() {
        return cancelled(branch_id, Phase::ModelDeployment, label, steps);
    }

    let outcome = tokio::select! {
        _ = cancel.changed() => {
            return cancelled(branch_id, Phase::ModelDeployment, label, steps);
        }
        outcome = executor.execute(TaskInvocation::ModelDeploy { spec: &spec }) => outcome,
    };
    steps.push(outcome.to_record());
    let model_reference = match outcome.outcome {
        Ok(TaskOutput::Model(output)) => output.model_reference,
        Ok(_) => {
            return failed(
                branch_id,
                Phase::ModelDeployment,
                label,
                steps,
                "handler returned mismatched output for ModelDeploy".to_string(),
            );
        }
        Err(e) => {
            return failed(branch_id, Phase::ModelDeployment, label, steps, e.to_string());
        }
    };

    let outcome = tokio::select! {
        _ = cancel.changed() => {
            return cancelled(branch_id, Phase::ModelDeployment, label, steps);
        }
        outcome = executor.execute(TaskInvocation::EndpointDeploy {
            spec: &spec,
            model_reference: &model_reference,
        }) => outcome,
    };
    steps.push(outcome.to_record());
    let endpoint_reference = match outcome.outcome {
        Ok(TaskOutput::Endpoint(output)) => output.endpoint_reference,
        Ok(_) => {
            return failed(
                branch_id,
                Phase::ModelDeployment,
                label,
                steps,
                "handler returned mismatched output for EndpointDeploy".to_string(),
            );
        }
        Err(e) => {
            return failed(branch_id, Phase::ModelDeployment, label, steps, e.to_string());
        }
    };

    let outcome = tokio::select! {
        _ = cancel.changed() => {
            return cancelled(branch_id, Phase::ModelDeployment, label, steps);
        }
        outcome = executor.execute(TaskInvocation::EndpointScalingAndParameterPublish {
            spec: &spec,
            endpoint_reference: &endpoint_reference,
        }) => outcome,
    };
    steps.push(outcome.to_record());
    if let Err(e) = &outcome.outcome {
        let reason = e.to_string();
        return failed(branch_id, Phase::ModelDeployment, label, steps, reason);
    }

    BranchRecord {
        branch_id,
        phase: Phase::ModelDeployment,
        label,
        status: BranchStatus::Succeeded,
        steps,
        error: None,
    }
}

/// Phase 2 branch: dependency-parameter updates for one group's edges, in
/// manifest order. The group's branch is the only writer of its keys.
async fn run_dag_branch(
    executor: Arc<StepExecutor>,
    group: Arc<DependencyGroup>,
    mut cancel: watch::Receiver<bool>,
) -> BranchRecord {
    let branch_id = Uuid::new_v4();
    let label = group.dependency_key.clone();
    let mut steps: Vec<StepRecord> = Vec::new();

    if *cancel.borrow() {
        return cancelled(branch_id, Phase::DagUpdate, label, steps);
    }

    for edge in &group.edges {
        let outcome = tokio::select! {
            _ = cancel.changed() => {
                return cancelled(branch_id, Phase::DagUpdate, label, steps);
            }
            outcome = executor.execute(TaskInvocation::UpdateDependencyParameters {
                dependency_key: &group.dependency_key,
                edge,
            }) => outcome,
        };
        steps.push(outcome.to_record());
        if let Err(e) = &outcome.outcome {
            let reason = e.to_string();
            return failed(branch_id, Phase::DagUpdate, label, steps, reason);
        }
    }

    BranchRecord {
        branch_id,
        phase: Phase::DagUpdate,
        label,
        status: BranchStatus::Succeeded,
        steps,
        error: None,
    }
}

fn cancelled(branch_id: Uuid, phase: Phase, label: String, steps: Vec<StepRecord>) -> BranchRecord {
    BranchRecord {
        branch_id,
        phase,
        label,
        status: BranchStatus::Cancelled,
        steps,
        error: Some("cancelled by workflow deadline".to_string()),
    }
}

fn failed(
    branch_id: Uuid,
    phase: Phase,
    label: String,
    steps: Vec<StepRecord>,
    reason: String,
) -> BranchRecord {
    BranchRecord {
        branch_id,
        phase,
        label,
        status: BranchStatus::Failed,
        steps,
        error: Some(reason),
    }
}
