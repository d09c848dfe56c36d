//! Result aggregation.
//!
//! Collects per-branch outcomes from both phases into the final execution
//! report. Overall status is `Success` only when every branch in both phases
//! succeeded; anything else is `PartialFailure` with the failing branches
//! listed. There is no silent success.

use crate::orchestration::types::{BranchRecord, BranchStatus, Phase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Overall outcome of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    Success,
    PartialFailure,
}

/// The structured report returned to the workflow caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    pub status: WorkflowStatus,
    /// Set when the workflow deadline expired and in-flight branches were
    /// cancelled.
    pub deadline_exceeded: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub branches: Vec<BranchRecord>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Success
    }

    pub fn failed_branches(&self) -> impl Iterator<Item = &BranchRecord> {
        self.branches.iter().filter(|b| !b.is_success())
    }

    pub fn phase_branches(&self, phase: Phase) -> impl Iterator<Item = &BranchRecord> {
        self.branches.iter().filter(move |b| b.phase == phase)
    }

    pub fn branch(&self, label: &str) -> Option<&BranchRecord> {
        self.branches.iter().find(|b| b.label == label)
    }
}

/// Accumulates branch records during a run and folds them into the report.
pub struct ResultAggregator {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    deadline_exceeded: bool,
    branches: Vec<BranchRecord>,
}

impl ResultAggregator {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            deadline_exceeded: false,
            branches: Vec::new(),
        }
    }

    pub fn record(&mut self, record: BranchRecord) {
        self.branches.push(record);
    }

    pub fn record_all(&mut self, records: Vec<BranchRecord>) {
        self.branches.extend(records);
    }

    pub fn mark_deadline_exceeded(&mut self) {
        self.deadline_exceeded = true;
    }

    /// Fold the collected records into the final report.
    pub fn finish(self) -> ExecutionReport {
        let status = if self.branches.iter().all(BranchRecord::is_success) {
            WorkflowStatus::Success
        } else {
            WorkflowStatus::PartialFailure
        };

        let succeeded = self.branches.iter().filter(|b| b.is_success()).count();
        let failed = self
            .branches
            .iter()
            .filter(|b| b.status == BranchStatus::Failed)
            .count();
        let cancelled = self
            .branches
            .iter()
            .filter(|b| b.status == BranchStatus::Cancelled)
            .count();
        info!(
            run_id = %self.run_id,
            status = ?status,
            succeeded = succeeded,
            failed = failed,
            cancelled = cancelled,
            deadline_exceeded = self.deadline_exceeded,
            "deployment workflow finished"
        );

        ExecutionReport {
            run_id: self.run_id,
            status,
            deadline_exceeded: self.deadline_exceeded,
            started_at: self.started_at,
            completed_at: Utc::now(),
            branches: self.branches,
        }
    }
}
