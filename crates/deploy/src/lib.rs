//! GameKit deployment orchestration.
//!
//! This crate owns per-feature deployment state and decides which
//! create, redeploy and delete actions are allowed. It has no cloud SDK
//! dependency: the application provides a [`CloudProvider`]
//! implementation that talks to the actual stack service.
//!
//! # Pipeline
//!
//! 1. **Generate templates** for the feature's stack
//! 2. **Upload dashboards**, Lambda **layers** and **functions**
//! 3. **Deploy resources** by creating or updating the stack
//!
//! Each step moves the feature to the matching [`FeatureStatus`] and
//! emits a [`DeploymentEvent`].
//!
//! [`FeatureStatus`]: gamekit_types::FeatureStatus

pub mod error;
pub mod gating;
pub mod graph;
pub mod orchestrator;
pub mod provider;
pub mod types;

// Re-export primary types for convenience.
pub use error::{DeployError, GraphError, ProviderError};
pub use graph::FeatureDependencyGraph;
pub use orchestrator::{ClaimedAction, DeploymentOrchestrator};
pub use provider::{
    CloudProvider, DeploymentContext, FeatureVariableSource, ResourceInfo, StackStatus,
    StepRequest,
};
pub use types::{
    DeploymentAction, DeploymentEvent, DeploymentResponse, DescribeResourcesResponse,
    PipelineStep,
};
