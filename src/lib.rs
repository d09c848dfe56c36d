#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # MLDeploy Core
//!
//! Dependency-aware orchestration core for deploying machine-learning models
//! and serving endpoints.
//!
//! ## Overview
//!
//! A deployment run consumes a declarative manifest (a `models` collection
//! plus an execution graph mapping dependency keys to downstream endpoints)
//! and drives it through two barrier-separated phases:
//!
//! 1. **Model deployment**: one branch per model running the fixed chain
//!    `ModelDeploy -> EndpointDeploy -> EndpointScalingAndParameterPublish`,
//!    fanned out in parallel across models
//! 2. **Dependency update**: one branch per dependency group refreshing the
//!    downstream parameter directory, fanned out in parallel across groups
//!
//! The step bodies are external collaborators behind the
//! [`orchestration::DeploymentHandler`] trait; this crate sequences and
//! supervises them with per-task timeouts, per-kind retry policies, a global
//! workflow deadline, and best-effort failure aggregation.
//!
//! ## Module Organization
//!
//! - [`manifest`] - Input document model, loading, and total validation
//! - [`orchestration`] - Resolver, step executor, coordinator, aggregator
//! - [`params`] - Downstream parameter-directory boundary and pruning
//! - [`config`] - Retry/timeout policy table and run configuration
//! - [`error`] - Structured error taxonomy
//! - [`logging`] - Structured tracing initialization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mldeploy_core::manifest::SpecLoader;
//! use mldeploy_core::orchestration::DependencyResolver;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = SpecLoader::from_path(std::path::Path::new("manifest.json"))?;
//! let plan = DependencyResolver::resolve(&manifest)?;
//!
//! for group in &plan.groups {
//!     println!(
//!         "{} -> {} downstream endpoint(s)",
//!         group.dependency_key,
//!         group.edges.len()
//!     );
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Running a full workflow takes a [`orchestration::DeploymentHandler`]
//! implementation and a [`config::CoordinatorConfig`]:
//!
//! ```rust,ignore
//! let coordinator = WorkflowCoordinator::new(handler, CoordinatorConfig::default());
//! let report = coordinator.run(manifest).await?;
//! assert!(report.is_success());
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod orchestration;
pub mod params;

pub use config::{CoordinatorConfig, RetryPolicy, TaskPolicies, TaskPolicy};
pub use error::{OrchestrationError, OrchestrationResult, ValidationError, ValidationIssue};
pub use manifest::{
    ContainerSpec, DeploymentManifest, Edge, EndpointType, ExecutionGraph, ModelSpec, SpecLoader,
    VariantSpec,
};
pub use orchestration::{
    BranchRecord, BranchStatus, DependencyResolver, DeploymentHandler, ExecutionPlan,
    ExecutionReport, Phase, StepExecutor, TaskKind, WorkflowCoordinator, WorkflowStatus,
};
pub use params::{InMemoryParameterDirectory, ParameterDirectory};
