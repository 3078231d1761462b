//! Per-feature deployment state and long-running stack operations.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gamekit_types::{
    AccountCredentials, AccountInfo, CanExecuteDeploymentActionResult,
    DeploymentActionBlockedReason, FeatureStatus, FeatureStatusSummary, FeatureType, ResultCode,
    short_region_code,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DeployError, ProviderError};
use crate::gating::Eligibility;
use crate::graph::FeatureDependencyGraph;
use crate::provider::{
    CloudProvider, DeploymentContext, FeatureVariableSource, ResourceInfo, StepRequest,
};
use crate::types::{
    DeploymentAction, DeploymentEvent, DeploymentResponse, DescribeResourcesResponse,
    PipelineStep,
};

/// A create, redeploy or delete currently running in this process.
#[derive(Debug, Clone)]
struct Operation {
    id: Uuid,
    message: String,
}

struct State {
    context: Option<DeploymentContext>,
    statuses: BTreeMap<FeatureType, FeatureStatus>,
    in_flight: BTreeMap<FeatureType, Operation>,
    /// Bumped whenever an action claims the feature or credentials
    /// change. A status lookup that started under an older generation
    /// is stale.
    generations: BTreeMap<FeatureType, u64>,
}

impl State {
    fn generation(&self, feature: FeatureType) -> u64 {
        self.generations.get(&feature).copied().unwrap_or_default()
    }

    fn bump_generation(&mut self, feature: FeatureType) {
        *self.generations.entry(feature).or_default() += 1;
    }
}

/// State shared with in-flight action tokens.
struct Shared {
    state: Mutex<State>,
    events_tx: mpsc::Sender<DeploymentEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, feature: FeatureType, status: FeatureStatus) {
        self.set_status_locked(&mut self.lock(), feature, status);
    }

    fn set_status_locked(&self, state: &mut State, feature: FeatureType, status: FeatureStatus) {
        if state.statuses.insert(feature, status) != Some(status) {
            debug!(feature = %feature, status = %status, "status changed");
            let _ = self
                .events_tx
                .try_send(DeploymentEvent::StatusChanged { feature, status });
        }
    }
}

/// Owns deployment state for every feature of one game and environment.
///
/// Queries are synchronous and only read cached state. Long-running
/// actions are `async` and resolve once the action has fully completed
/// or failed; at most one action runs per feature at a time.
pub struct DeploymentOrchestrator {
    provider: Arc<dyn CloudProvider>,
    graph: FeatureDependencyGraph,
    variables: Option<Arc<dyn FeatureVariableSource>>,
    shared: Arc<Shared>,
    events_rx: Option<mpsc::Receiver<DeploymentEvent>>,
}

impl DeploymentOrchestrator {
    /// Creates an orchestrator with no credentials and every feature
    /// in `Unknown` status.
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        let state = State {
            context: None,
            statuses: FeatureType::ALL
                .into_iter()
                .map(|f| (f, FeatureStatus::Unknown))
                .collect(),
            in_flight: BTreeMap::new(),
            generations: BTreeMap::new(),
        };
        Self {
            provider,
            graph: FeatureDependencyGraph::new(),
            variables: None,
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                events_tx,
            }),
            events_rx: Some(events_rx),
        }
    }

    pub fn with_graph(mut self, graph: FeatureDependencyGraph) -> Self {
        self.graph = graph;
        self
    }

    /// Supplies per-feature template variables to every pipeline run.
    pub fn with_variable_source(mut self, source: Arc<dyn FeatureVariableSource>) -> Self {
        self.variables = Some(source);
        self
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<DeploymentEvent>> {
        self.events_rx.take()
    }

    pub fn graph(&self) -> &FeatureDependencyGraph {
        &self.graph
    }

    /// Sets the account and region for subsequent actions.
    ///
    /// Rejected while any feature is updating. On success every cached
    /// status goes back to `Unknown` until the next refresh.
    pub fn set_credentials(
        &self,
        account_info: AccountInfo,
        credentials: AccountCredentials,
    ) -> Result<(), DeployError> {
        let mut state = self.shared.lock();
        if !state.in_flight.is_empty() || state.statuses.values().any(|s| s.is_updating()) {
            return Err(DeployError::DeploymentInProgress);
        }
        let short_code = short_region_code(&credentials.region)
            .ok_or_else(|| DeployError::RegionCodeConversion(credentials.region.clone()))?;

        info!(
            environment = %account_info.environment,
            game = %account_info.game_name,
            region = %credentials.region,
            "deployment credentials set"
        );
        state.context = Some(DeploymentContext {
            account_info,
            credentials,
            short_region_code: short_code.to_string(),
        });
        for feature in FeatureType::ALL {
            state.bump_generation(feature);
            state.statuses.insert(feature, FeatureStatus::Unknown);
        }
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        self.shared.lock().context.is_some()
    }

    pub fn feature_status(&self, feature: FeatureType) -> FeatureStatus {
        self.shared
            .lock()
            .statuses
            .get(&feature)
            .copied()
            .unwrap_or(FeatureStatus::Unknown)
    }

    pub fn feature_status_summary(&self, feature: FeatureType) -> FeatureStatusSummary {
        self.feature_status(feature).summary()
    }

    pub fn feature_statuses(&self) -> BTreeMap<FeatureType, FeatureStatus> {
        self.shared.lock().statuses.clone()
    }

    /// True while `feature`'s own pipeline or its `Main` prerequisite
    /// is running.
    pub fn is_feature_deployment_in_progress(&self, feature: FeatureType) -> bool {
        let state = self.shared.lock();
        let main_busy = feature != FeatureType::Main
            && self.graph.dependencies(feature).contains(&FeatureType::Main)
            && Self::updating(&state, FeatureType::Main);
        Self::updating(&state, feature) || main_busy
    }

    pub fn is_feature_updating(&self, feature: FeatureType) -> bool {
        Self::updating(&self.shared.lock(), feature)
    }

    pub fn is_any_feature_updating(&self) -> bool {
        let state = self.shared.lock();
        state.statuses.keys().any(|f| Self::updating(&state, *f))
    }

    pub fn can_create_feature(&self, feature: FeatureType) -> CanExecuteDeploymentActionResult {
        self.check(&self.shared.lock(), DeploymentAction::Create, feature)
    }

    pub fn can_redeploy_feature(&self, feature: FeatureType) -> CanExecuteDeploymentActionResult {
        self.check(&self.shared.lock(), DeploymentAction::Redeploy, feature)
    }

    pub fn can_delete_feature(&self, feature: FeatureType) -> CanExecuteDeploymentActionResult {
        self.check(&self.shared.lock(), DeploymentAction::Delete, feature)
    }

    /// Human-readable descriptions of the actions currently running.
    pub fn ongoing_operations(&self) -> Vec<String> {
        self.shared
            .lock()
            .in_flight
            .values()
            .map(|op| op.message.clone())
            .collect()
    }

    /// Creates `feature`'s stack, running the full pipeline.
    pub async fn create_feature(&self, feature: FeatureType) -> DeploymentResponse {
        self.run_action(feature, DeploymentAction::Create).await
    }

    /// Updates an existing stack, running the full pipeline again.
    pub async fn redeploy_feature(&self, feature: FeatureType) -> DeploymentResponse {
        self.run_action(feature, DeploymentAction::Redeploy).await
    }

    /// Deletes `feature`'s stack.
    pub async fn delete_feature(&self, feature: FeatureType) -> DeploymentResponse {
        self.run_action(feature, DeploymentAction::Delete).await
    }

    /// Checks eligibility and claims `feature` for `action` without
    /// running anything yet.
    ///
    /// From the moment this returns `Ok`, the feature counts as in
    /// progress and further actions on it are rejected. Pass the claim
    /// to [`run_claimed`](Self::run_claimed) to run the pipeline. A
    /// rejection is returned as the finished response.
    pub fn begin_action(
        &self,
        feature: FeatureType,
        action: DeploymentAction,
    ) -> Result<ClaimedAction, DeploymentResponse> {
        self.claim(feature, action).map_err(|e| {
            warn!(feature = %feature, action = %action, error = %e, "action rejected");
            self.finish(feature, action, e.result_code())
        })
    }

    /// Runs the pipeline for an action claimed with
    /// [`begin_action`](Self::begin_action).
    pub async fn run_claimed(&self, claimed: ClaimedAction) -> DeploymentResponse {
        let ClaimedAction {
            mut guard,
            action,
            context,
            prior,
        } = claimed;
        debug_assert!(Arc::ptr_eq(&guard.shared, &self.shared));
        let feature = guard.feature;
        info!(feature = %feature, action = %action, "starting");

        let req = self.request(feature, context);
        let result = match action {
            DeploymentAction::Delete => self.run_delete(&req, prior).await,
            _ => self.run_deploy(&req, action).await,
        };
        guard.settled = true;
        drop(guard);

        let code = match result {
            Ok(()) => {
                info!(feature = %feature, action = %action, "completed");
                ResultCode::Success
            }
            Err(e) => {
                warn!(feature = %feature, action = %action, error = %e, "failed");
                e.result_code()
            }
        };
        self.finish(feature, action, code)
    }

    /// Reconciles one feature's cached status with the live stack.
    ///
    /// Always succeeds. A failed lookup leaves the feature `Unknown`.
    pub async fn refresh_feature_status(&self, feature: FeatureType) -> DeploymentResponse {
        self.refresh_one(feature).await;
        self.response(ResultCode::Success)
    }

    /// Reconciles every feature's cached status with the live stacks.
    pub async fn refresh_feature_statuses(&self) -> DeploymentResponse {
        for feature in FeatureType::ALL {
            self.refresh_one(feature).await;
        }
        self.response(ResultCode::Success)
    }

    /// Lists the resources in `feature`'s stack.
    ///
    /// Fails if any resource reports no status.
    pub async fn describe_feature_resources(
        &self,
        feature: FeatureType,
    ) -> DescribeResourcesResponse {
        match self.try_describe_resources(feature).await {
            Ok(resources) => DescribeResourcesResponse {
                result: ResultCode::Success,
                resources,
            },
            Err(e) => {
                warn!(feature = %feature, error = %e, "describe resources failed");
                DescribeResourcesResponse {
                    result: e.result_code(),
                    resources: Vec::new(),
                }
            }
        }
    }

    fn updating(state: &State, feature: FeatureType) -> bool {
        state.in_flight.contains_key(&feature)
            || state
                .statuses
                .get(&feature)
                .is_some_and(|s| s.is_updating())
    }

    fn check(
        &self,
        state: &State,
        action: DeploymentAction,
        feature: FeatureType,
    ) -> CanExecuteDeploymentActionResult {
        let in_flight: BTreeSet<FeatureType> = state.in_flight.keys().copied().collect();
        let view = Eligibility {
            graph: &self.graph,
            statuses: &state.statuses,
            in_flight: &in_flight,
            credentials_valid: state.context.is_some(),
        };
        match action {
            DeploymentAction::Create => view.can_create(feature),
            DeploymentAction::Redeploy => view.can_redeploy(feature),
            DeploymentAction::Delete => view.can_delete(feature),
        }
    }

    /// Re-checks eligibility and registers the action in one critical
    /// section, so two racing callers cannot both start.
    fn claim(
        &self,
        feature: FeatureType,
        action: DeploymentAction,
    ) -> Result<ClaimedAction, DeployError> {
        let mut state = self.shared.lock();
        let check = self.check(&state, action, feature);
        let context = match (&state.context, check.can_execute_action) {
            (Some(context), true) => context.clone(),
            (None, _) => {
                return Err(DeployError::InvalidFeatureState {
                    feature,
                    action,
                    reason: DeploymentActionBlockedReason::CredentialsInvalid,
                });
            }
            (Some(_), false) => {
                return Err(DeployError::InvalidFeatureState {
                    feature,
                    action,
                    reason: check.reason,
                });
            }
        };

        let id = Uuid::new_v4();
        let message = format!(
            "\"{}\" feature {action} is in progress.",
            feature.display_name()
        );
        state.in_flight.insert(feature, Operation { id, message });
        state.bump_generation(feature);
        let prior = state
            .statuses
            .get(&feature)
            .copied()
            .unwrap_or(FeatureStatus::Unknown);
        let first = match action {
            DeploymentAction::Delete => FeatureStatus::DeletingResources,
            _ => PipelineStep::GenerateTemplates.status(),
        };
        self.shared.set_status_locked(&mut state, feature, first);
        debug!(feature = %feature, action = %action, operation = %id, "claimed feature");

        Ok(ClaimedAction {
            guard: InFlight {
                shared: self.shared.clone(),
                feature,
                id,
                settled: false,
            },
            action,
            context,
            prior,
        })
    }

    fn request(&self, feature: FeatureType, context: DeploymentContext) -> StepRequest {
        let variables = self
            .variables
            .as_ref()
            .map(|source| source.feature_variables(feature))
            .unwrap_or_default();
        StepRequest {
            feature,
            context,
            variables,
        }
    }

    async fn run_action(
        &self,
        feature: FeatureType,
        action: DeploymentAction,
    ) -> DeploymentResponse {
        match self.begin_action(feature, action) {
            Ok(claimed) => self.run_claimed(claimed).await,
            Err(rejected) => rejected,
        }
    }

    async fn run_deploy(
        &self,
        req: &StepRequest,
        action: DeploymentAction,
    ) -> Result<(), DeployError> {
        let feature = req.feature;
        let provider = self.provider.as_ref();
        for step in PipelineStep::ALL {
            self.shared.set_status(feature, step.status());
            let outcome = match step {
                PipelineStep::GenerateTemplates => provider.generate_templates(req).await,
                PipelineStep::UploadDashboards => provider.upload_dashboards(req).await,
                PipelineStep::UploadLayers => provider.upload_layers(req).await,
                PipelineStep::UploadFunctions => provider.upload_functions(req).await,
                PipelineStep::DeployStack => {
                    return self.finish_stack(req, action).await;
                }
            };
            if let Err(source) = outcome {
                self.shared.set_status(feature, FeatureStatus::Error);
                return Err(DeployError::Step {
                    feature,
                    action,
                    step,
                    source,
                });
            }
        }
        Ok(())
    }

    async fn finish_stack(
        &self,
        req: &StepRequest,
        action: DeploymentAction,
    ) -> Result<(), DeployError> {
        let feature = req.feature;
        let stack = match self.provider.deploy_stack(req).await {
            Ok(stack) => stack,
            Err(source) => {
                self.shared.set_status(feature, FeatureStatus::Error);
                return Err(DeployError::Step {
                    feature,
                    action,
                    step: PipelineStep::DeployStack,
                    source,
                });
            }
        };
        debug!(feature = %feature, stack = %req.stack_name(), status = %stack, "stack settled");
        match stack.feature_status() {
            FeatureStatus::Deployed => {
                self.shared.set_status(feature, FeatureStatus::Deployed);
                Ok(())
            }
            other => {
                let terminal = match other {
                    FeatureStatus::RollbackComplete => FeatureStatus::RollbackComplete,
                    _ => FeatureStatus::Error,
                };
                self.shared.set_status(feature, terminal);
                Err(DeployError::StackFailed {
                    feature,
                    action,
                    status: stack.0,
                })
            }
        }
    }

    async fn run_delete(
        &self,
        req: &StepRequest,
        prior: FeatureStatus,
    ) -> Result<(), DeployError> {
        let feature = req.feature;
        let source = match self.provider.delete_stack(req).await {
            Ok(()) | Err(ProviderError::StackNotFound(_)) => {
                self.shared.set_status(feature, FeatureStatus::Undeployed);
                return Ok(());
            }
            Err(source) => source,
        };

        // The stack may be half-deleted; trust what it reports now.
        let reconciled = match self.provider.describe_stack(req).await {
            Ok(None) => FeatureStatus::Undeployed,
            Ok(Some(stack)) => match stack.feature_status() {
                s @ (FeatureStatus::Deployed
                | FeatureStatus::Undeployed
                | FeatureStatus::RollbackComplete) => s,
                _ => prior,
            },
            Err(e) => {
                debug!(feature = %feature, error = %e, "describe after failed delete");
                prior
            }
        };
        self.shared.set_status(feature, reconciled);
        Err(DeployError::StackDelete { feature, source })
    }

    async fn refresh_one(&self, feature: FeatureType) {
        let (context, generation) = {
            let state = self.shared.lock();
            if state.in_flight.contains_key(&feature) {
                return;
            }
            match &state.context {
                Some(context) => (context.clone(), state.generation(feature)),
                None => return,
            }
        };
        let req = StepRequest {
            feature,
            context,
            variables: BTreeMap::new(),
        };
        let status = match self.provider.describe_stack(&req).await {
            Ok(Some(stack)) => stack.feature_status(),
            Ok(None) => FeatureStatus::Undeployed,
            Err(e) => {
                warn!(feature = %feature, error = %e, "status refresh failed");
                FeatureStatus::Unknown
            }
        };

        let mut state = self.shared.lock();
        // An action or credential change since the lookup started makes
        // its result stale, even if that action has already finished.
        if state.generation(feature) != generation {
            debug!(feature = %feature, "discarding stale status refresh");
            return;
        }
        self.shared.set_status_locked(&mut state, feature, status);
    }

    async fn try_describe_resources(
        &self,
        feature: FeatureType,
    ) -> Result<Vec<ResourceInfo>, DeployError> {
        let context = self.shared.lock().context.clone();
        let context = context.ok_or_else(|| DeployError::DescribeResources {
            feature,
            reason: "credentials are not set".into(),
        })?;
        let req = StepRequest {
            feature,
            context,
            variables: BTreeMap::new(),
        };
        let resources = self
            .provider
            .describe_stack_resources(&req)
            .await
            .map_err(|e| DeployError::DescribeResources {
                feature,
                reason: e.to_string(),
            })?;
        if let Some(unknown) = resources.iter().find(|r| r.resource_status.is_empty()) {
            return Err(DeployError::DescribeResources {
                feature,
                reason: format!("no status for {}", unknown.logical_resource_id),
            });
        }
        Ok(resources)
    }

    fn finish(
        &self,
        feature: FeatureType,
        action: DeploymentAction,
        result: ResultCode,
    ) -> DeploymentResponse {
        let _ = self.shared.events_tx.try_send(DeploymentEvent::Finished {
            feature,
            action,
            result,
        });
        self.response(result)
    }

    fn response(&self, result: ResultCode) -> DeploymentResponse {
        DeploymentResponse {
            result,
            feature_statuses: self.feature_statuses(),
        }
    }
}

/// A create, redeploy or delete that passed its checks and holds its
/// feature, waiting to be run.
///
/// Dropping it without running releases the feature and leaves it
/// `Unknown`.
#[must_use = "a claimed action holds its feature until it is run or dropped"]
pub struct ClaimedAction {
    guard: InFlight,
    action: DeploymentAction,
    context: DeploymentContext,
    prior: FeatureStatus,
}

impl ClaimedAction {
    pub fn feature(&self) -> FeatureType {
        self.guard.feature
    }

    pub fn action(&self) -> DeploymentAction {
        self.action
    }
}

impl std::fmt::Debug for ClaimedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimedAction")
            .field("feature", &self.guard.feature)
            .field("action", &self.action)
            .field("operation", &self.guard.id)
            .finish_non_exhaustive()
    }
}

/// Registration of a running action; unregisters on drop.
///
/// If the action is dropped before it settles, the feature's real state
/// is unknown and is marked as such.
struct InFlight {
    shared: Arc<Shared>,
    feature: FeatureType,
    id: Uuid,
    settled: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if state.in_flight.get(&self.feature).is_some_and(|op| op.id == self.id) {
            state.in_flight.remove(&self.feature);
        }
        if !self.settled {
            warn!(feature = %self.feature, "action abandoned before completion");
            let feature = self.feature;
            self.shared
                .set_status_locked(&mut state, feature, FeatureStatus::Unknown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use tokio::sync::Notify;
    use FeatureType::*;

    fn account() -> (AccountInfo, AccountCredentials) {
        (
            AccountInfo {
                environment: "dev".into(),
                account_id: "123456789012".into(),
                company_name: "studio".into(),
                game_name: "mygame".into(),
            },
            AccountCredentials {
                region: "us-west-2".into(),
                access_key: "AKIA".into(),
                access_secret: "secret".into(),
                account_id: "123456789012".into(),
            },
        )
    }

    /// Orchestrator with credentials set and every feature refreshed
    /// from `provider`'s stacks.
    async fn ready(provider: Arc<MockProvider>) -> DeploymentOrchestrator {
        let orch = DeploymentOrchestrator::new(provider);
        let (info, creds) = account();
        orch.set_credentials(info, creds).unwrap();
        orch.refresh_feature_statuses().await;
        orch
    }

    struct FixedVariables;

    impl FeatureVariableSource for FixedVariables {
        fn feature_variables(&self, feature: FeatureType) -> BTreeMap<String, String> {
            BTreeMap::from([("feature".to_string(), feature.api_name().to_string())])
        }
    }

    #[test]
    fn starts_unknown_without_credentials() {
        let orch = DeploymentOrchestrator::new(Arc::new(MockProvider::default()));
        assert!(!orch.has_credentials());
        for f in FeatureType::ALL {
            assert_eq!(orch.feature_status(f), FeatureStatus::Unknown);
        }
        let r = orch.can_create_feature(Main);
        assert_eq!(r.reason, DeploymentActionBlockedReason::CredentialsInvalid);
    }

    #[test]
    fn set_credentials_rejects_unmapped_region() {
        let orch = DeploymentOrchestrator::new(Arc::new(MockProvider::default()));
        let (info, mut creds) = account();
        creds.region = "mars-north-1".into();
        let err = orch.set_credentials(info, creds).unwrap_err();
        assert_eq!(err.result_code(), ResultCode::RegionCodeConversionFailed);
        assert!(!orch.has_credentials());
    }

    #[tokio::test]
    async fn refresh_maps_live_stacks() {
        let provider = Arc::new(MockProvider::default());
        provider.set_stack(Main, "CREATE_COMPLETE");
        provider.set_stack(Identity, "ROLLBACK_COMPLETE");
        let orch = ready(provider).await;

        assert_eq!(orch.feature_status(Main), FeatureStatus::Deployed);
        assert_eq!(orch.feature_status(Identity), FeatureStatus::RollbackComplete);
        assert_eq!(orch.feature_status(Achievements), FeatureStatus::Undeployed);
        assert_eq!(orch.feature_status_summary(Main), FeatureStatusSummary::Deployed);
    }

    #[tokio::test]
    async fn refresh_degrades_failures_to_unknown() {
        let provider = Arc::new(MockProvider::default());
        provider.set_stack(Main, "CREATE_COMPLETE");
        let orch = ready(provider.clone()).await;
        assert_eq!(orch.feature_status(Main), FeatureStatus::Deployed);
        provider.describe_fails.lock().unwrap().insert(Main);

        let response = orch.refresh_feature_status(Main).await;
        assert!(response.is_success());
        assert_eq!(orch.feature_status(Main), FeatureStatus::Unknown);
        assert_eq!(response.feature_statuses[&Achievements], FeatureStatus::Undeployed);
    }

    #[tokio::test]
    async fn refresh_without_credentials_succeeds() {
        let orch = DeploymentOrchestrator::new(Arc::new(MockProvider::default()));
        let response = orch.refresh_feature_statuses().await;
        assert!(response.is_success());
        assert!(response
            .feature_statuses
            .values()
            .all(|s| *s == FeatureStatus::Unknown));
    }

    #[tokio::test]
    async fn create_main_then_achievements() {
        let provider = Arc::new(MockProvider::default());
        let mut orch = DeploymentOrchestrator::new(provider.clone());
        let mut events = orch.take_events().unwrap();
        let (info, creds) = account();
        orch.set_credentials(info, creds).unwrap();
        orch.refresh_feature_statuses().await;

        let blocked = orch.can_create_feature(Achievements);
        assert!(!blocked.can_execute_action);
        assert_eq!(
            blocked.reason,
            DeploymentActionBlockedReason::DependenciesMustBeCreated
        );
        assert_eq!(blocked.blocking_features, BTreeSet::from([Main]));

        let response = orch.create_feature(Main).await;
        assert_eq!(response.result, ResultCode::Success);
        assert_eq!(response.feature_statuses[&Main], FeatureStatus::Deployed);
        assert!(orch.can_create_feature(Achievements).can_execute_action);

        let response = orch.create_feature(Achievements).await;
        assert!(response.is_success());
        assert_eq!(orch.feature_status(Achievements), FeatureStatus::Deployed);

        let mut main_statuses = Vec::new();
        let mut finished = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                DeploymentEvent::StatusChanged { feature: Main, status } => {
                    main_statuses.push(status)
                }
                DeploymentEvent::Finished { result, .. } => {
                    assert_eq!(result, ResultCode::Success);
                    finished += 1;
                }
                _ => {}
            }
        }
        assert_eq!(finished, 2);
        assert_eq!(
            main_statuses,
            vec![
                FeatureStatus::Undeployed,
                FeatureStatus::GeneratingTemplates,
                FeatureStatus::UploadingDashboards,
                FeatureStatus::UploadingLayers,
                FeatureStatus::UploadingFunctions,
                FeatureStatus::DeployingResources,
                FeatureStatus::Deployed,
            ]
        );
        assert_eq!(
            provider
                .log()
                .iter()
                .filter(|(f, _)| *f == Main)
                .map(|(_, step)| *step)
                .collect::<Vec<_>>(),
            vec!["templates", "dashboards", "layers", "functions", "stack"]
        );
    }

    #[tokio::test]
    async fn create_before_dependency_is_rejected() {
        let provider = Arc::new(MockProvider::default());
        let orch = ready(provider.clone()).await;

        let response = orch.create_feature(Achievements).await;
        assert_eq!(response.result, ResultCode::OrchestrationInvalidFeatureState);
        assert_eq!(orch.feature_status(Achievements), FeatureStatus::Undeployed);
        assert!(provider.log().is_empty());
    }

    #[tokio::test]
    async fn create_without_credentials_is_rejected() {
        let orch = DeploymentOrchestrator::new(Arc::new(MockProvider::default()));
        let response = orch.create_feature(Main).await;
        assert_eq!(response.result, ResultCode::OrchestrationInvalidFeatureState);
        assert_eq!(orch.feature_status(Main), FeatureStatus::Unknown);
    }

    #[tokio::test]
    async fn step_failure_moves_to_error() {
        let provider = Arc::new(MockProvider::default());
        provider.fail_step(Main, PipelineStep::UploadLayers);
        let orch = ready(provider.clone()).await;

        let response = orch.create_feature(Main).await;
        assert_eq!(response.result, ResultCode::LayerUploadFailed);
        assert_eq!(orch.feature_status(Main), FeatureStatus::Error);
        assert!(!orch.is_feature_updating(Main));
        assert!(orch.ongoing_operations().is_empty());
        assert!(!provider.log().contains(&(Main, "functions")));
    }

    #[tokio::test]
    async fn rolled_back_stack_reports_creation_failure() {
        let provider = Arc::new(MockProvider::default());
        provider
            .deploy_outcome
            .lock()
            .unwrap()
            .insert(Main, "ROLLBACK_COMPLETE".into());
        let orch = ready(provider).await;

        let response = orch.create_feature(Main).await;
        assert_eq!(response.result, ResultCode::CloudFormationStackCreationFailed);
        assert_eq!(orch.feature_status(Main), FeatureStatus::RollbackComplete);
        // Rolled back stacks can be created again.
        assert!(orch.can_create_feature(Main).can_execute_action);
    }

    #[tokio::test]
    async fn redeploy_failure_reports_update_failure() {
        let provider = Arc::new(MockProvider::default());
        provider.set_stack(Main, "CREATE_COMPLETE");
        provider
            .deploy_outcome
            .lock()
            .unwrap()
            .insert(Main, "UPDATE_ROLLBACK_COMPLETE".into());
        let orch = ready(provider).await;

        let response = orch.redeploy_feature(Main).await;
        assert_eq!(response.result, ResultCode::CloudFormationStackUpdateFailed);
        assert_eq!(orch.feature_status(Main), FeatureStatus::Error);
    }

    #[tokio::test]
    async fn redeploy_passes_feature_variables() {
        let provider = Arc::new(MockProvider::default());
        provider.set_stack(Main, "CREATE_COMPLETE");
        provider.set_stack(Achievements, "UPDATE_COMPLETE");
        let orch = DeploymentOrchestrator::new(provider.clone())
            .with_variable_source(Arc::new(FixedVariables));
        let (info, creds) = account();
        orch.set_credentials(info, creds).unwrap();
        orch.refresh_feature_statuses().await;

        let response = orch.redeploy_feature(Achievements).await;
        assert!(response.is_success());
        assert_eq!(
            provider.last_variables.lock().unwrap().get("feature").map(String::as_str),
            Some("achievements")
        );
    }

    #[tokio::test]
    async fn delete_blocked_by_deployed_dependent() {
        let provider = Arc::new(MockProvider::default());
        provider.set_stack(Main, "CREATE_COMPLETE");
        provider.set_stack(Achievements, "CREATE_COMPLETE");
        let orch = ready(provider).await;

        let r = orch.can_delete_feature(Main);
        assert!(!r.can_execute_action);
        assert_eq!(r.reason, DeploymentActionBlockedReason::DependenciesMustBeDeleted);
        assert_eq!(r.blocking_features, BTreeSet::from([Achievements]));

        let response = orch.delete_feature(Main).await;
        assert_eq!(response.result, ResultCode::OrchestrationInvalidFeatureState);
        assert_eq!(orch.feature_status(Main), FeatureStatus::Deployed);
    }

    #[tokio::test]
    async fn delete_dependent_then_main() {
        let provider = Arc::new(MockProvider::default());
        provider.set_stack(Main, "CREATE_COMPLETE");
        provider.set_stack(Achievements, "CREATE_COMPLETE");
        let orch = ready(provider.clone()).await;

        assert!(orch.delete_feature(Achievements).await.is_success());
        assert_eq!(orch.feature_status(Achievements), FeatureStatus::Undeployed);
        assert!(orch.delete_feature(Main).await.is_success());
        assert_eq!(orch.feature_status(Main), FeatureStatus::Undeployed);
        assert!(provider.stacks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_adopts_live_stack_status() {
        let provider = Arc::new(MockProvider::default());
        provider.set_stack(Achievements, "CREATE_COMPLETE");
        provider.set_stack(Main, "CREATE_COMPLETE");
        provider.delete_fails.lock().unwrap().insert(Achievements);
        let orch = ready(provider.clone()).await;

        provider.set_stack(Achievements, "ROLLBACK_COMPLETE");
        let response = orch.delete_feature(Achievements).await;
        assert_eq!(response.result, ResultCode::CloudFormationStackDeleteFailed);
        assert_eq!(
            orch.feature_status(Achievements),
            FeatureStatus::RollbackComplete
        );
    }

    #[tokio::test]
    async fn failed_delete_restores_prior_status() {
        let provider = Arc::new(MockProvider::default());
        provider.set_stack(Main, "CREATE_COMPLETE");
        provider.set_stack(Achievements, "CREATE_COMPLETE");
        let orch = ready(provider.clone()).await;
        provider.delete_fails.lock().unwrap().insert(Achievements);
        provider.describe_fails.lock().unwrap().insert(Achievements);

        let response = orch.delete_feature(Achievements).await;
        assert_eq!(response.result, ResultCode::CloudFormationStackDeleteFailed);
        assert_eq!(orch.feature_status(Achievements), FeatureStatus::Deployed);
    }

    #[tokio::test]
    async fn in_progress_for_whole_create_window() {
        let provider = Arc::new(MockProvider::default());
        let gate = Arc::new(Notify::new());
        *provider.gate.lock().unwrap() = Some(gate.clone());
        let orch = Arc::new(ready(provider).await);

        let task = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.create_feature(Main).await })
        };
        for _ in 0..100 {
            if orch.feature_status(Main) == FeatureStatus::DeployingResources {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(orch.feature_status(Main), FeatureStatus::DeployingResources);
        assert!(orch.is_feature_deployment_in_progress(Main));
        assert!(orch.is_feature_deployment_in_progress(Achievements));
        assert!(!orch.is_feature_updating(Achievements));
        assert!(orch.is_any_feature_updating());
        assert_eq!(
            orch.ongoing_operations(),
            vec!["\"Main\" feature deployment is in progress.".to_string()]
        );

        // A second action on the same feature is rejected, not queued.
        let second = orch.create_feature(Main).await;
        assert_eq!(second.result, ResultCode::OrchestrationInvalidFeatureState);
        let r = orch.can_create_feature(Achievements);
        assert_eq!(r.reason, DeploymentActionBlockedReason::OngoingDeployments);

        let (info, creds) = account();
        let err = orch.set_credentials(info, creds).unwrap_err();
        assert_eq!(err.result_code(), ResultCode::OrchestrationDeploymentInProgress);

        // Refresh leaves the running feature alone.
        orch.refresh_feature_status(Main).await;
        assert_eq!(orch.feature_status(Main), FeatureStatus::DeployingResources);

        gate.notify_one();
        let response = task.await.unwrap();
        assert!(response.is_success());
        assert!(!orch.is_feature_deployment_in_progress(Main));
        assert!(orch.ongoing_operations().is_empty());
        assert_eq!(orch.feature_status(Main), FeatureStatus::Deployed);
    }

    #[tokio::test]
    async fn abandoned_action_leaves_feature_unknown() {
        let provider = Arc::new(MockProvider::default());
        let gate = Arc::new(Notify::new());
        *provider.gate.lock().unwrap() = Some(gate);
        let orch = ready(provider).await;

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            orch.create_feature(Main),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(orch.feature_status(Main), FeatureStatus::Unknown);
        assert!(orch.ongoing_operations().is_empty());
    }

    #[tokio::test]
    async fn begin_action_claims_before_running() {
        let provider = Arc::new(MockProvider::default());
        let orch = ready(provider.clone()).await;

        let claimed = orch.begin_action(Main, DeploymentAction::Create).unwrap();
        assert_eq!(claimed.feature(), Main);
        assert!(orch.is_feature_deployment_in_progress(Main));
        assert!(orch.is_feature_deployment_in_progress(Achievements));
        let again = orch.can_create_feature(Main);
        assert_eq!(again.reason, DeploymentActionBlockedReason::OngoingDeployments);
        assert!(orch.begin_action(Main, DeploymentAction::Create).is_err());
        assert!(provider.log().is_empty());

        let response = orch.run_claimed(claimed).await;
        assert!(response.is_success());
        assert_eq!(orch.feature_status(Main), FeatureStatus::Deployed);
        assert!(!orch.is_feature_deployment_in_progress(Main));
    }

    #[tokio::test]
    async fn rejected_begin_reports_finished() {
        let mut orch = DeploymentOrchestrator::new(Arc::new(MockProvider::default()));
        let mut events = orch.take_events().unwrap();

        let rejected = orch.begin_action(Main, DeploymentAction::Delete).unwrap_err();
        assert_eq!(rejected.result, ResultCode::OrchestrationInvalidFeatureState);
        assert_eq!(
            events.try_recv().unwrap(),
            DeploymentEvent::Finished {
                feature: Main,
                action: DeploymentAction::Delete,
                result: ResultCode::OrchestrationInvalidFeatureState,
            }
        );
    }

    #[tokio::test]
    async fn dropped_claim_releases_feature() {
        let orch = ready(Arc::new(MockProvider::default())).await;

        let claimed = orch.begin_action(Main, DeploymentAction::Create).unwrap();
        drop(claimed);
        assert!(!orch.is_feature_updating(Main));
        assert_eq!(orch.feature_status(Main), FeatureStatus::Unknown);
        assert!(orch.ongoing_operations().is_empty());
    }

    #[tokio::test]
    async fn refresh_started_before_create_does_not_overwrite_it() {
        let provider = Arc::new(MockProvider::default());
        let orch = Arc::new(ready(provider.clone()).await);
        let gate = Arc::new(Notify::new());
        *provider.describe_gate.lock().unwrap() = Some(gate.clone());

        let refresh = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.refresh_feature_status(Main).await })
        };
        for _ in 0..100 {
            if provider.log().contains(&(Main, "describe")) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(provider.log().contains(&(Main, "describe")));

        // The refresh is holding a snapshot taken before the stack existed.
        assert!(orch.create_feature(Main).await.is_success());
        gate.notify_one();
        assert!(refresh.await.unwrap().is_success());

        assert_eq!(orch.feature_status(Main), FeatureStatus::Deployed);
        assert!(!orch.can_create_feature(Main).can_execute_action);
    }

    #[tokio::test]
    async fn refresh_started_before_credentials_change_is_discarded() {
        let provider = Arc::new(MockProvider::default());
        let orch = Arc::new(ready(provider.clone()).await);
        let gate = Arc::new(Notify::new());
        *provider.describe_gate.lock().unwrap() = Some(gate.clone());

        let refresh = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.refresh_feature_status(Main).await })
        };
        for _ in 0..100 {
            if provider.log().contains(&(Main, "describe")) {
                break;
            }
            tokio::task::yield_now().await;
        }

        let (info, creds) = account();
        orch.set_credentials(info, creds).unwrap();
        gate.notify_one();
        refresh.await.unwrap();
        assert_eq!(orch.feature_status(Main), FeatureStatus::Unknown);
    }

    #[tokio::test]
    async fn set_credentials_resets_statuses() {
        let provider = Arc::new(MockProvider::default());
        provider.set_stack(Main, "CREATE_COMPLETE");
        let orch = ready(provider).await;
        assert_eq!(orch.feature_status(Main), FeatureStatus::Deployed);

        let (info, creds) = account();
        orch.set_credentials(info, creds).unwrap();
        assert_eq!(orch.feature_status(Main), FeatureStatus::Unknown);
    }

    #[tokio::test]
    async fn describe_resources() {
        let provider = Arc::new(MockProvider::default());
        provider.resources.lock().unwrap().insert(
            Main,
            vec![ResourceInfo {
                logical_resource_id: "MainBucket".into(),
                resource_type: "AWS::S3::Bucket".into(),
                resource_status: "CREATE_COMPLETE".into(),
            }],
        );
        let orch = ready(provider).await;

        let response = orch.describe_feature_resources(Main).await;
        assert_eq!(response.result, ResultCode::Success);
        assert_eq!(response.resources.len(), 1);
        assert_eq!(response.resources[0].logical_resource_id, "MainBucket");
    }

    #[tokio::test]
    async fn describe_resources_fails_on_missing_status() {
        let provider = Arc::new(MockProvider::default());
        provider.resources.lock().unwrap().insert(
            Identity,
            vec![
                ResourceInfo {
                    logical_resource_id: "UserPool".into(),
                    resource_type: "AWS::Cognito::UserPool".into(),
                    resource_status: "CREATE_COMPLETE".into(),
                },
                ResourceInfo {
                    logical_resource_id: "IdentityTable".into(),
                    resource_type: "AWS::DynamoDB::Table".into(),
                    resource_status: String::new(),
                },
            ],
        );
        let orch = ready(provider).await;

        let response = orch.describe_feature_resources(Identity).await;
        assert_eq!(
            response.result,
            ResultCode::CloudFormationDescribeResourceFailed
        );
        assert!(response.resources.is_empty());
    }
}
