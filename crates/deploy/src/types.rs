//! Deployment request, response and event types.

use std::collections::BTreeMap;
use std::fmt;

use gamekit_types::{FeatureStatus, FeatureType, ResultCode};

use crate::provider::ResourceInfo;

/// Long-running action a feature can be put through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeploymentAction {
    Create,
    Redeploy,
    Delete,
}

impl fmt::Display for DeploymentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeploymentAction::Create => "deployment",
            DeploymentAction::Redeploy => "redeployment",
            DeploymentAction::Delete => "deletion",
        })
    }
}

/// A step of the create/redeploy pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    GenerateTemplates,
    UploadDashboards,
    UploadLayers,
    UploadFunctions,
    DeployStack,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 5] = [
        PipelineStep::GenerateTemplates,
        PipelineStep::UploadDashboards,
        PipelineStep::UploadLayers,
        PipelineStep::UploadFunctions,
        PipelineStep::DeployStack,
    ];

    /// Status a feature holds while this step runs.
    pub fn status(self) -> FeatureStatus {
        match self {
            PipelineStep::GenerateTemplates => FeatureStatus::GeneratingTemplates,
            PipelineStep::UploadDashboards => FeatureStatus::UploadingDashboards,
            PipelineStep::UploadLayers => FeatureStatus::UploadingLayers,
            PipelineStep::UploadFunctions => FeatureStatus::UploadingFunctions,
            PipelineStep::DeployStack => FeatureStatus::DeployingResources,
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStep::GenerateTemplates => "generate templates",
            PipelineStep::UploadDashboards => "upload dashboards",
            PipelineStep::UploadLayers => "upload layers",
            PipelineStep::UploadFunctions => "upload functions",
            PipelineStep::DeployStack => "deploy stack",
        })
    }
}

/// Progress notifications from the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentEvent {
    StatusChanged {
        feature: FeatureType,
        status: FeatureStatus,
    },
    /// Sent once per create, redeploy or delete call.
    Finished {
        feature: FeatureType,
        action: DeploymentAction,
        result: ResultCode,
    },
}

/// Outcome of a long-running create, redeploy, delete or refresh call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResponse {
    pub result: ResultCode,
    pub feature_statuses: BTreeMap<FeatureType, FeatureStatus>,
}

impl DeploymentResponse {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

/// Outcome of `describe_feature_resources`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeResourcesResponse {
    pub result: ResultCode,
    pub resources: Vec<ResourceInfo>,
}
