//! Cloud provider seam and stack status mapping.
//!
//! `CloudProvider` is implemented by the application on top of its cloud
//! SDK. Using a trait keeps orchestration logic decoupled from the SDK
//! and testable with mocks.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use gamekit_types::{AccountCredentials, AccountInfo, FeatureStatus, FeatureType};

use crate::error::ProviderError;

/// Boxed future returned by provider calls.
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Account and region a deployment session targets.
///
/// Fixed for the lifetime of a session; replaced only by `set_credentials`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContext {
    pub account_info: AccountInfo,
    pub credentials: AccountCredentials,
    pub short_region_code: String,
}

impl DeploymentContext {
    /// Name of the stack holding `feature`'s resources.
    pub fn stack_name(&self, feature: FeatureType) -> String {
        format!(
            "gamekit-{}-{}-{}",
            self.account_info.environment,
            self.account_info.game_name,
            feature.api_name()
        )
    }
}

/// Everything a provider needs to act on one feature.
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub feature: FeatureType,
    pub context: DeploymentContext,
    /// Feature variables from settings, substituted into templates.
    pub variables: BTreeMap<String, String>,
}

impl StepRequest {
    pub fn stack_name(&self) -> String {
        self.context.stack_name(self.feature)
    }
}

/// One resource in a feature's stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub logical_resource_id: String,
    pub resource_type: String,
    pub resource_status: String,
}

/// Raw stack status string, e.g. `CREATE_COMPLETE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackStatus(pub String);

impl StackStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Maps the stack status onto a feature status.
    pub fn feature_status(&self) -> FeatureStatus {
        match self.0.as_str() {
            "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "IMPORT_COMPLETE" => FeatureStatus::Deployed,
            "ROLLBACK_COMPLETE" => FeatureStatus::RollbackComplete,
            // The stack still serves the previous template.
            "UPDATE_ROLLBACK_COMPLETE" | "IMPORT_ROLLBACK_COMPLETE" => FeatureStatus::Error,
            "DELETE_COMPLETE" => FeatureStatus::Undeployed,
            "DELETE_IN_PROGRESS" => FeatureStatus::DeletingResources,
            s if s.ends_with("_IN_PROGRESS") => FeatureStatus::DeployingResources,
            s if s.ends_with("_FAILED") => FeatureStatus::Error,
            _ => FeatureStatus::Unknown,
        }
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stack operations the orchestrator drives.
pub trait CloudProvider: Send + Sync {
    fn generate_templates<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, ()>;

    fn upload_dashboards<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, ()>;

    fn upload_layers<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, ()>;

    fn upload_functions<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, ()>;

    /// Creates or updates the stack and waits until it settles.
    fn deploy_stack<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, StackStatus>;

    /// Deletes the stack and waits until it is gone.
    fn delete_stack<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, ()>;

    /// Current stack status, or `None` if the stack does not exist.
    fn describe_stack<'a>(
        &'a self,
        req: &'a StepRequest,
    ) -> ProviderFuture<'a, Option<StackStatus>>;

    fn describe_stack_resources<'a>(
        &'a self,
        req: &'a StepRequest,
    ) -> ProviderFuture<'a, Vec<ResourceInfo>>;
}

/// Source of per-feature variables, usually the settings store.
pub trait FeatureVariableSource: Send + Sync {
    fn feature_variables(&self, feature: FeatureType) -> BTreeMap<String, String>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scriptable in-memory provider shared by the crate's tests.

    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    use super::*;
    use crate::types::PipelineStep;

    #[derive(Default)]
    pub struct MockProvider {
        /// Live stacks and their status.
        pub stacks: Mutex<HashMap<FeatureType, String>>,
        /// Steps that fail, per feature.
        pub failing_steps: Mutex<HashSet<(FeatureType, PipelineStep)>>,
        /// Status `deploy_stack` reports instead of `CREATE_COMPLETE`.
        pub deploy_outcome: Mutex<HashMap<FeatureType, String>>,
        pub describe_fails: Mutex<HashSet<FeatureType>>,
        pub delete_fails: Mutex<HashSet<FeatureType>>,
        pub resources: Mutex<HashMap<FeatureType, Vec<ResourceInfo>>>,
        /// Steps executed, in order.
        pub log: Mutex<Vec<(FeatureType, &'static str)>>,
        /// When set, `deploy_stack` waits for a notification.
        pub gate: Mutex<Option<Arc<Notify>>>,
        /// When set, `describe_stack` reads the stack, logs `describe`,
        /// then waits for a notification before answering.
        pub describe_gate: Mutex<Option<Arc<Notify>>>,
        pub last_variables: Mutex<BTreeMap<String, String>>,
    }

    impl MockProvider {
        pub fn fail_step(&self, feature: FeatureType, step: PipelineStep) {
            self.failing_steps.lock().unwrap().insert((feature, step));
        }

        pub fn set_stack(&self, feature: FeatureType, status: &str) {
            self.stacks.lock().unwrap().insert(feature, status.into());
        }

        pub fn log(&self) -> Vec<(FeatureType, &'static str)> {
            self.log.lock().unwrap().clone()
        }

        fn step(
            &self,
            req: &StepRequest,
            step: PipelineStep,
            name: &'static str,
        ) -> Result<(), ProviderError> {
            self.log.lock().unwrap().push((req.feature, name));
            *self.last_variables.lock().unwrap() = req.variables.clone();
            if self.failing_steps.lock().unwrap().contains(&(req.feature, step)) {
                return Err(ProviderError::Request(format!("{name} failed")));
            }
            Ok(())
        }
    }

    impl CloudProvider for MockProvider {
        fn generate_templates<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, ()> {
            Box::pin(async move { self.step(req, PipelineStep::GenerateTemplates, "templates") })
        }

        fn upload_dashboards<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, ()> {
            Box::pin(async move { self.step(req, PipelineStep::UploadDashboards, "dashboards") })
        }

        fn upload_layers<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, ()> {
            Box::pin(async move { self.step(req, PipelineStep::UploadLayers, "layers") })
        }

        fn upload_functions<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, ()> {
            Box::pin(async move { self.step(req, PipelineStep::UploadFunctions, "functions") })
        }

        fn deploy_stack<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, StackStatus> {
            Box::pin(async move {
                let gate = self.gate.lock().unwrap().clone();
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                self.step(req, PipelineStep::DeployStack, "stack")?;
                let status = self
                    .deploy_outcome
                    .lock()
                    .unwrap()
                    .get(&req.feature)
                    .cloned()
                    .unwrap_or_else(|| "CREATE_COMPLETE".into());
                self.set_stack(req.feature, &status);
                Ok(StackStatus::new(status))
            })
        }

        fn delete_stack<'a>(&'a self, req: &'a StepRequest) -> ProviderFuture<'a, ()> {
            Box::pin(async move {
                self.log.lock().unwrap().push((req.feature, "delete"));
                if self.delete_fails.lock().unwrap().contains(&req.feature) {
                    return Err(ProviderError::Request("delete failed".into()));
                }
                self.stacks.lock().unwrap().remove(&req.feature);
                Ok(())
            })
        }

        fn describe_stack<'a>(
            &'a self,
            req: &'a StepRequest,
        ) -> ProviderFuture<'a, Option<StackStatus>> {
            Box::pin(async move {
                if self.describe_fails.lock().unwrap().contains(&req.feature) {
                    return Err(ProviderError::Request("throttled".into()));
                }
                let snapshot = self
                    .stacks
                    .lock()
                    .unwrap()
                    .get(&req.feature)
                    .cloned()
                    .map(StackStatus::new);
                let gate = self.describe_gate.lock().unwrap().clone();
                if let Some(gate) = gate {
                    self.log.lock().unwrap().push((req.feature, "describe"));
                    gate.notified().await;
                }
                Ok(snapshot)
            })
        }

        fn describe_stack_resources<'a>(
            &'a self,
            req: &'a StepRequest,
        ) -> ProviderFuture<'a, Vec<ResourceInfo>> {
            Box::pin(async move {
                if self.describe_fails.lock().unwrap().contains(&req.feature) {
                    return Err(ProviderError::Request("throttled".into()));
                }
                Ok(self
                    .resources
                    .lock()
                    .unwrap()
                    .get(&req.feature)
                    .cloned()
                    .unwrap_or_default())
            })
        }
    }
}
