//! Deployment action eligibility rules.
//!
//! Checks run in a fixed order and the first failing rule decides the
//! reason:
//!
//! 1. credentials are set
//! 2. nothing relevant is mid-pipeline
//! 3. dependencies (create, redeploy) or dependents (delete) are in place
//! 4. the feature's own status allows the action

use std::collections::{BTreeMap, BTreeSet};

use gamekit_types::{
    CanExecuteDeploymentActionResult, DeploymentActionBlockedReason as Reason, FeatureStatus,
    FeatureType,
};

use crate::graph::FeatureDependencyGraph;

/// Point-in-time view of orchestrator state used to evaluate actions.
pub struct Eligibility<'a> {
    pub graph: &'a FeatureDependencyGraph,
    pub statuses: &'a BTreeMap<FeatureType, FeatureStatus>,
    /// Features with a pipeline running in this process.
    pub in_flight: &'a BTreeSet<FeatureType>,
    pub credentials_valid: bool,
}

impl Eligibility<'_> {
    pub fn status(&self, feature: FeatureType) -> FeatureStatus {
        self.statuses
            .get(&feature)
            .copied()
            .unwrap_or(FeatureStatus::Unknown)
    }

    pub fn is_updating(&self, feature: FeatureType) -> bool {
        self.in_flight.contains(&feature) || self.status(feature).is_updating()
    }

    pub fn can_create(&self, feature: FeatureType) -> CanExecuteDeploymentActionResult {
        let deps = self.graph.dependencies(feature);
        self.check_common(feature, &deps)
            .or_else(|| self.check_dependencies_deployed(feature, &deps))
            .or_else(|| {
                self.check_own_status(
                    feature,
                    &[
                        FeatureStatus::Undeployed,
                        FeatureStatus::Error,
                        FeatureStatus::RollbackComplete,
                    ],
                    Reason::FeatureMustBeDeleted,
                )
            })
            .unwrap_or_else(|| CanExecuteDeploymentActionResult::allowed(feature))
    }

    pub fn can_redeploy(&self, feature: FeatureType) -> CanExecuteDeploymentActionResult {
        let deps = self.graph.dependencies(feature);
        self.check_common(feature, &deps)
            .or_else(|| {
                let main = FeatureType::Main;
                let main_ready = self.status(main) == FeatureStatus::Deployed;
                let main_known = self.status(main) != FeatureStatus::Unknown;
                (deps.contains(&main) && !main_ready && main_known)
                    .then(|| blocked(feature, Reason::MainStackNotReady, [main]))
            })
            .or_else(|| self.check_dependencies_deployed(feature, &deps))
            .or_else(|| {
                self.check_own_status(
                    feature,
                    &[FeatureStatus::Deployed, FeatureStatus::Error],
                    Reason::FeatureMustBeCreated,
                )
            })
            .unwrap_or_else(|| CanExecuteDeploymentActionResult::allowed(feature))
    }

    pub fn can_delete(&self, feature: FeatureType) -> CanExecuteDeploymentActionResult {
        let dependents = self.graph.dependents(feature);
        self.check_common(feature, &dependents)
            .or_else(|| {
                let unknown = self.with_status(&dependents, |s| s == FeatureStatus::Unknown);
                (!unknown.is_empty())
                    .then(|| blocked(feature, Reason::DependenciesStatusIsInvalid, unknown))
            })
            .or_else(|| {
                let live = self.with_status(&dependents, |s| s != FeatureStatus::Undeployed);
                (!live.is_empty())
                    .then(|| blocked(feature, Reason::DependenciesMustBeDeleted, live))
            })
            .or_else(|| {
                self.check_own_status(
                    feature,
                    &[
                        FeatureStatus::Deployed,
                        FeatureStatus::Error,
                        FeatureStatus::RollbackComplete,
                    ],
                    Reason::FeatureMustBeCreated,
                )
            })
            .unwrap_or_else(|| CanExecuteDeploymentActionResult::allowed(feature))
    }

    /// Rules 1 and 2: credentials, then anything in `related` or the
    /// feature itself mid-pipeline.
    fn check_common(
        &self,
        feature: FeatureType,
        related: &BTreeSet<FeatureType>,
    ) -> Option<CanExecuteDeploymentActionResult> {
        if !self.credentials_valid {
            return Some(blocked(feature, Reason::CredentialsInvalid, []));
        }
        let busy: BTreeSet<FeatureType> = std::iter::once(feature)
            .chain(related.iter().copied())
            .filter(|f| self.is_updating(*f))
            .collect();
        (!busy.is_empty()).then(|| blocked(feature, Reason::OngoingDeployments, busy))
    }

    /// Rule 4: the feature's own status must be one of `allowed`.
    fn check_own_status(
        &self,
        feature: FeatureType,
        allowed: &[FeatureStatus],
        otherwise: Reason,
    ) -> Option<CanExecuteDeploymentActionResult> {
        let status = self.status(feature);
        if allowed.contains(&status) {
            None
        } else if status == FeatureStatus::Unknown {
            Some(blocked(feature, Reason::FeatureStatusIsUnknown, []))
        } else {
            Some(blocked(feature, otherwise, []))
        }
    }

    fn check_dependencies_deployed(
        &self,
        feature: FeatureType,
        deps: &BTreeSet<FeatureType>,
    ) -> Option<CanExecuteDeploymentActionResult> {
        let unknown = self.with_status(deps, |s| s == FeatureStatus::Unknown);
        if !unknown.is_empty() {
            return Some(blocked(feature, Reason::DependenciesStatusIsInvalid, unknown));
        }
        let missing = self.with_status(deps, |s| s != FeatureStatus::Deployed);
        (!missing.is_empty()).then(|| blocked(feature, Reason::DependenciesMustBeCreated, missing))
    }

    fn with_status(
        &self,
        features: &BTreeSet<FeatureType>,
        pred: impl Fn(FeatureStatus) -> bool,
    ) -> BTreeSet<FeatureType> {
        features
            .iter()
            .copied()
            .filter(|f| pred(self.status(*f)))
            .collect()
    }
}

fn blocked(
    feature: FeatureType,
    reason: Reason,
    blocking: impl IntoIterator<Item = FeatureType>,
) -> CanExecuteDeploymentActionResult {
    CanExecuteDeploymentActionResult::blocked(feature, reason, blocking)
}
