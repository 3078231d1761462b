//! Deployment error types.

use gamekit_types::{DeploymentActionBlockedReason, FeatureType, ResultCode};

use crate::types::{DeploymentAction, PipelineStep};

/// Errors reported by a [`CloudProvider`](crate::CloudProvider).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("stack {0} not found")]
    StackNotFound(String),
}

/// Invalid dependency edges passed to
/// [`FeatureDependencyGraph::from_edges`](crate::FeatureDependencyGraph::from_edges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("main cannot depend on {0}")]
    MainHasDependency(FeatureType),

    #[error("{0} depends on itself through its dependencies")]
    Cycle(FeatureType),
}

/// Errors produced by the deployment orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("a deployment is in progress")]
    DeploymentInProgress,

    #[error("region {0:?} has no short region code")]
    RegionCodeConversion(String),

    #[error("cannot {action} {feature}: {reason}")]
    InvalidFeatureState {
        feature: FeatureType,
        action: DeploymentAction,
        reason: DeploymentActionBlockedReason,
    },

    #[error("{action} of {feature} failed to {step}: {source}")]
    Step {
        feature: FeatureType,
        action: DeploymentAction,
        step: PipelineStep,
        source: ProviderError,
    },

    #[error("{action} of {feature} ended with stack status {status}")]
    StackFailed {
        feature: FeatureType,
        action: DeploymentAction,
        status: String,
    },

    #[error("failed to delete {feature} stack: {source}")]
    StackDelete {
        feature: FeatureType,
        source: ProviderError,
    },

    #[error("failed to describe {feature} resources: {reason}")]
    DescribeResources { feature: FeatureType, reason: String },
}

impl DeployError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            DeployError::DeploymentInProgress => ResultCode::OrchestrationDeploymentInProgress,
            DeployError::RegionCodeConversion(_) => ResultCode::RegionCodeConversionFailed,
            DeployError::InvalidFeatureState { .. } => ResultCode::OrchestrationInvalidFeatureState,
            DeployError::Step { step, action, .. } => match step {
                PipelineStep::GenerateTemplates => ResultCode::TemplateGenerationFailed,
                PipelineStep::UploadDashboards => ResultCode::DashboardUploadFailed,
                PipelineStep::UploadLayers => ResultCode::LayerUploadFailed,
                PipelineStep::UploadFunctions => ResultCode::FunctionUploadFailed,
                PipelineStep::DeployStack => stack_failure_code(*action),
            },
            DeployError::StackFailed { action, .. } => stack_failure_code(*action),
            DeployError::StackDelete { .. } => ResultCode::CloudFormationStackDeleteFailed,
            DeployError::DescribeResources { .. } => {
                ResultCode::CloudFormationDescribeResourceFailed
            }
        }
    }
}

fn stack_failure_code(action: DeploymentAction) -> ResultCode {
    match action {
        DeploymentAction::Redeploy => ResultCode::CloudFormationStackUpdateFailed,
        _ => ResultCode::CloudFormationStackCreationFailed,
    }
}
