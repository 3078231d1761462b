//! Deployment status types and action eligibility results.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::feature::FeatureType;

/// Fine-grained deployment state of a single feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureStatus {
    Deployed,
    Undeployed,
    Error,
    RollbackComplete,
    Running,
    GeneratingTemplates,
    UploadingDashboards,
    UploadingLayers,
    UploadingFunctions,
    DeployingResources,
    DeletingResources,
    Unknown,
}

impl FeatureStatus {
    pub fn display_name(self) -> &'static str {
        match self {
            FeatureStatus::Deployed => "Deployed",
            FeatureStatus::Undeployed => "Undeployed",
            FeatureStatus::Error => "Error",
            FeatureStatus::RollbackComplete => "Rollback Complete",
            FeatureStatus::Running => "Running",
            FeatureStatus::GeneratingTemplates => "Generating Templates",
            FeatureStatus::UploadingDashboards => "Uploading Dashboards",
            FeatureStatus::UploadingLayers => "Uploading Layers",
            FeatureStatus::UploadingFunctions => "Uploading Functions",
            FeatureStatus::DeployingResources => "Deploying Resources",
            FeatureStatus::DeletingResources => "Deleting Resources",
            FeatureStatus::Unknown => "Unknown",
        }
    }

    /// Coarse projection used by status badges.
    pub fn summary(self) -> FeatureStatusSummary {
        match self {
            FeatureStatus::Deployed => FeatureStatusSummary::Deployed,
            FeatureStatus::Undeployed => FeatureStatusSummary::Undeployed,
            FeatureStatus::Error | FeatureStatus::RollbackComplete => FeatureStatusSummary::Error,
            FeatureStatus::Unknown => FeatureStatusSummary::Unknown,
            _ => FeatureStatusSummary::Running,
        }
    }

    /// Whether a pipeline is moving this feature between resting states.
    ///
    /// `Unknown` is a resting state: it only means no refresh has
    /// reported on the feature yet.
    pub fn is_updating(self) -> bool {
        !matches!(
            self,
            FeatureStatus::Deployed
                | FeatureStatus::Undeployed
                | FeatureStatus::Error
                | FeatureStatus::RollbackComplete
                | FeatureStatus::Unknown
        )
    }
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Coarse view of [`FeatureStatus`]. Always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureStatusSummary {
    Deployed,
    Undeployed,
    Error,
    Running,
    Unknown,
}

/// Why a create, redeploy or delete action is not allowed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum DeploymentActionBlockedReason {
    NotBlocked = 0,
    FeatureMustBeCreated = 1,
    FeatureMustBeDeleted = 2,
    FeatureStatusIsUnknown = 3,
    OngoingDeployments = 4,
    DependenciesMustBeCreated = 5,
    DependenciesMustBeDeleted = 6,
    DependenciesStatusIsInvalid = 7,
    CredentialsInvalid = 8,
    MainStackNotReady = 9,
}

impl fmt::Display for DeploymentActionBlockedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotBlocked => "not blocked",
            Self::FeatureMustBeCreated => "the feature must be created first",
            Self::FeatureMustBeDeleted => "the feature must be deleted first",
            Self::FeatureStatusIsUnknown => "the feature status is unknown",
            Self::OngoingDeployments => "a deployment is in progress",
            Self::DependenciesMustBeCreated => "dependencies must be created first",
            Self::DependenciesMustBeDeleted => "dependent features must be deleted first",
            Self::DependenciesStatusIsInvalid => "dependency status is unknown",
            Self::CredentialsInvalid => "credentials are not set",
            Self::MainStackNotReady => "the main stack is not deployed",
        };
        f.write_str(msg)
    }
}

/// Outcome of a `can_create`/`can_redeploy`/`can_delete` check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanExecuteDeploymentActionResult {
    pub target_feature: FeatureType,
    pub can_execute_action: bool,
    pub reason: DeploymentActionBlockedReason,
    /// Every feature responsible for `reason`, not just the first found.
    pub blocking_features: BTreeSet<FeatureType>,
}

impl CanExecuteDeploymentActionResult {
    pub fn allowed(target_feature: FeatureType) -> Self {
        Self {
            target_feature,
            can_execute_action: true,
            reason: DeploymentActionBlockedReason::NotBlocked,
            blocking_features: BTreeSet::new(),
        }
    }

    pub fn blocked(
        target_feature: FeatureType,
        reason: DeploymentActionBlockedReason,
        blocking_features: impl IntoIterator<Item = FeatureType>,
    ) -> Self {
        Self {
            target_feature,
            can_execute_action: false,
            reason,
            blocking_features: blocking_features.into_iter().collect(),
        }
    }
}
