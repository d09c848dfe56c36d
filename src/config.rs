//! Configuration for the orchestration core.
//!
//! The per-task retry/timeout table is configuration passed into the step
//! executor, not global state. Defaults match the production policy table;
//! `for_testing()` shrinks every duration so test suites run in milliseconds.
//! Environment overrides are loaded through `MLDEPLOY_`-prefixed variables.

use crate::error::{OrchestrationError, OrchestrationResult};
use crate::orchestration::types::TaskKind;
use serde::Deserialize;
use std::time::Duration;

/// Retry behavior for one task kind.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. 1 means no retry.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any computed delay.
    pub max_delay: Duration,
    /// Multiplier applied per retry; 1.0 keeps a fixed interval.
    pub backoff_multiplier: f64,
    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Single attempt, terminal on first failure.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Fixed interval between attempts.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: interval,
            max_delay: interval,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt, or `None`
    /// when attempts are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self
            .base_delay
            .mul_f64(self.backoff_multiplier.powi(exponent))
            .min(self.max_delay);

        if self.jitter {
            let jitter = fastrand::f64() * 0.1;
            Some(delay.mul_f64(1.0 + jitter).min(self.max_delay))
        } else {
            Some(delay)
        }
    }
}

/// Retry policy plus per-call timeout for one task kind.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPolicy {
    pub retry: RetryPolicy,
    pub call_timeout: Duration,
}

/// The fixed per-task-kind policy table.
///
/// Model and DAG-update operations are treated as non-idempotent or expensive
/// to repeat and get a single attempt; endpoint provisioning and scaling poll
/// eventually-consistent state and are expected to need repeated attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPolicies {
    pub model_deploy: TaskPolicy,
    pub endpoint_deploy: TaskPolicy,
    pub scaling_and_publish: TaskPolicy,
    pub dag_update: TaskPolicy,
}

const CALL_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const RETRY_INTERVAL: Duration = Duration::from_secs(30);

impl TaskPolicies {
    /// The production policy table.
    pub fn standard() -> Self {
        Self {
            model_deploy: TaskPolicy {
                retry: RetryPolicy::no_retry(),
                call_timeout: CALL_TIMEOUT,
            },
            endpoint_deploy: TaskPolicy {
                retry: RetryPolicy::fixed(8, RETRY_INTERVAL),
                call_timeout: CALL_TIMEOUT,
            },
            scaling_and_publish: TaskPolicy {
                retry: RetryPolicy::fixed(8, RETRY_INTERVAL),
                call_timeout: CALL_TIMEOUT,
            },
            dag_update: TaskPolicy {
                retry: RetryPolicy::no_retry(),
                call_timeout: CALL_TIMEOUT,
            },
        }
    }

    /// Same attempt counts as the production table with millisecond delays.
    pub fn for_testing() -> Self {
        let mut policies = Self::standard();
        for policy in [
            &mut policies.model_deploy,
            &mut policies.endpoint_deploy,
            &mut policies.scaling_and_publish,
            &mut policies.dag_update,
        ] {
            policy.call_timeout = Duration::from_millis(250);
            policy.retry.base_delay = Duration::from_millis(1);
            policy.retry.max_delay = Duration::from_millis(1);
        }
        policies
    }

    pub fn policy_for(&self, kind: TaskKind) -> &TaskPolicy {
        match kind {
            TaskKind::ModelDeploy => &self.model_deploy,
            TaskKind::EndpointDeploy => &self.endpoint_deploy,
            TaskKind::EndpointScalingAndParameterPublish => &self.scaling_and_publish,
            TaskKind::UpdateDependencyParameters => &self.dag_update,
        }
    }
}

impl Default for TaskPolicies {
    fn default() -> Self {
        Self::standard()
    }
}

/// Configuration for a whole workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Overall deadline for the run; expiry cancels in-flight branches.
    pub workflow_deadline: Duration,
    pub policies: TaskPolicies,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            workflow_deadline: Duration::from_secs(180 * 60),
            policies: TaskPolicies::standard(),
        }
    }
}

/// Environment override document, `MLDEPLOY_`-prefixed.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    #[serde(default)]
    workflow_deadline_secs: Option<u64>,
    #[serde(default)]
    call_timeout_secs: Option<u64>,
    #[serde(default)]
    retry_interval_secs: Option<u64>,
}

impl CoordinatorConfig {
    /// Configuration tuned for test suites.
    pub fn for_testing() -> Self {
        Self {
            workflow_deadline: Duration::from_secs(5),
            policies: TaskPolicies::for_testing(),
        }
    }

    /// Defaults overlaid with `MLDEPLOY_*` environment variables
    /// (`MLDEPLOY_WORKFLOW_DEADLINE_SECS`, `MLDEPLOY_CALL_TIMEOUT_SECS`,
    /// `MLDEPLOY_RETRY_INTERVAL_SECS`).
    pub fn from_env() -> OrchestrationResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("MLDEPLOY").try_parsing(true))
            .build()
            .map_err(|e| OrchestrationError::Configuration(e.to_string()))?;
        let overrides: EnvOverrides = settings
            .try_deserialize()
            .map_err(|e| OrchestrationError::Configuration(e.to_string()))?;

        let mut config = Self::default();
        if let Some(secs) = overrides.workflow_deadline_secs {
            config.workflow_deadline = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.call_timeout_secs {
            let timeout = Duration::from_secs(secs);
            config.policies.model_deploy.call_timeout = timeout;
            config.policies.endpoint_deploy.call_timeout = timeout;
            config.policies.scaling_and_publish.call_timeout = timeout;
            config.policies.dag_update.call_timeout = timeout;
        }
        if let Some(secs) = overrides.retry_interval_secs {
            let interval = Duration::from_secs(secs);
            config.policies.endpoint_deploy.retry = RetryPolicy::fixed(
                config.policies.endpoint_deploy.retry.max_attempts,
                interval,
            );
            config.policies.scaling_and_publish.retry = RetryPolicy::fixed(
                config.policies.scaling_and_publish.retry.max_attempts,
                interval,
            );
        }
        Ok(config)
    }
}
