//! The GameKit context handle.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gamekit_deploy::{
    CloudProvider, DeploymentAction, DeploymentEvent, DeploymentOrchestrator, DeploymentResponse,
    DescribeResourcesResponse,
};
use gamekit_gameplay_data::{
    ClientSettings, GameplayDataEvent, GameplayDataTransport, UserGameplayDataClient,
};
use gamekit_settings::SettingsStore;
use gamekit_types::{AccountDetails, FeatureType};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::GameKitConfig;
use crate::error::GameKitError;
use crate::variables::SettingsVariables;

/// Owns every core component for one game.
///
/// Create one per game and pass it by reference. Dropping it stops the
/// gameplay data retry worker.
pub struct GameKit {
    config: GameKitConfig,
    runtime: Handle,
    settings: Arc<Mutex<SettingsStore>>,
    orchestrator: Arc<DeploymentOrchestrator>,
    deployment_events: Option<mpsc::Receiver<DeploymentEvent>>,
    gameplay_data: Option<Arc<UserGameplayDataClient>>,
    gameplay_data_events: Option<mpsc::Receiver<GameplayDataEvent>>,
}

impl GameKit {
    /// Builds the settings store and orchestrator. Callback entry
    /// points spawn onto `runtime`.
    pub fn new(config: GameKitConfig, provider: Arc<dyn CloudProvider>, runtime: Handle) -> Self {
        let settings = Arc::new(Mutex::new(SettingsStore::new(
            config.settings_root.clone(),
            config.plugin_version.clone(),
            config.game_name.clone(),
            config.environment.clone(),
        )));
        let mut orchestrator = DeploymentOrchestrator::new(provider)
            .with_variable_source(Arc::new(SettingsVariables::new(settings.clone())));
        let deployment_events = orchestrator.take_events();

        info!(
            game = %config.game_name,
            environment = %config.environment,
            root = %config.settings_root.display(),
            "GameKit context created"
        );
        Self {
            config,
            runtime,
            settings,
            orchestrator: Arc::new(orchestrator),
            deployment_events,
            gameplay_data: None,
            gameplay_data_events: None,
        }
    }

    /// Attaches a user gameplay data client talking through `transport`.
    pub fn with_gameplay_data(
        mut self,
        transport: Arc<dyn GameplayDataTransport>,
        settings: ClientSettings,
    ) -> Self {
        let mut client = UserGameplayDataClient::new(transport, settings);
        self.gameplay_data_events = client.take_events();
        self.gameplay_data = Some(Arc::new(client));
        self
    }

    pub fn config(&self) -> &GameKitConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<DeploymentOrchestrator> {
        &self.orchestrator
    }

    pub fn gameplay_data(&self) -> Option<&Arc<UserGameplayDataClient>> {
        self.gameplay_data.as_ref()
    }

    /// Locks the settings store. Do not hold the guard across an await.
    pub fn settings(&self) -> MutexGuard<'_, SettingsStore> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the deployment event receiver. Can only be called once.
    pub fn take_deployment_events(&mut self) -> Option<mpsc::Receiver<DeploymentEvent>> {
        self.deployment_events.take()
    }

    /// Takes the gameplay data event receiver. Can only be called once.
    pub fn take_gameplay_data_events(&mut self) -> Option<mpsc::Receiver<GameplayDataEvent>> {
        self.gameplay_data_events.take()
    }

    /// Sets deployment credentials and records the game, environment
    /// and region as last used.
    ///
    /// Settings are only touched if the orchestrator accepted the
    /// credentials.
    pub fn set_account_details(&self, details: &AccountDetails) -> Result<(), GameKitError> {
        let account_info = details.account_info();
        self.orchestrator
            .set_credentials(account_info.clone(), details.account_credentials())?;

        self.settings().populate_and_save(
            &account_info.game_name,
            &account_info.environment,
            &details.region,
        )?;
        debug!(
            game = %account_info.game_name,
            environment = %account_info.environment,
            region = %details.region,
            "account details applied"
        );
        Ok(())
    }

    pub fn create_feature_with_callback<F>(
        &self,
        feature: FeatureType,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(DeploymentResponse) + Send + 'static,
    {
        self.spawn_action(feature, DeploymentAction::Create, callback)
    }

    pub fn redeploy_feature_with_callback<F>(
        &self,
        feature: FeatureType,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(DeploymentResponse) + Send + 'static,
    {
        self.spawn_action(feature, DeploymentAction::Redeploy, callback)
    }

    pub fn delete_feature_with_callback<F>(
        &self,
        feature: FeatureType,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(DeploymentResponse) + Send + 'static,
    {
        self.spawn_action(feature, DeploymentAction::Delete, callback)
    }

    pub fn refresh_feature_status_with_callback<F>(
        &self,
        feature: FeatureType,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(DeploymentResponse) + Send + 'static,
    {
        let orchestrator = self.orchestrator.clone();
        self.spawn_with_callback(
            async move { orchestrator.refresh_feature_status(feature).await },
            callback,
        )
    }

    pub fn refresh_feature_statuses_with_callback<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(DeploymentResponse) + Send + 'static,
    {
        let orchestrator = self.orchestrator.clone();
        self.spawn_with_callback(
            async move { orchestrator.refresh_feature_statuses().await },
            callback,
        )
    }

    pub fn describe_feature_resources_with_callback<F>(
        &self,
        feature: FeatureType,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(DescribeResourcesResponse) + Send + 'static,
    {
        let orchestrator = self.orchestrator.clone();
        self.spawn_with_callback(
            async move { orchestrator.describe_feature_resources(feature).await },
            callback,
        )
    }

    /// Starts the gameplay data retry worker on the context's runtime.
    ///
    /// Does nothing if no client is attached.
    pub fn start_gameplay_data_retries(&self) {
        if let Some(client) = &self.gameplay_data {
            let _guard = self.runtime.enter();
            client.start_retry_background_thread();
        }
    }

    /// Stops the retry worker and persists pending gameplay data calls
    /// to the automatic offline cache, if one was enabled.
    pub async fn shutdown(&self) -> Result<(), GameKitError> {
        if let Some(client) = &self.gameplay_data {
            client.shutdown().await?;
        }
        info!(game = %self.config.game_name, "GameKit context shut down");
        Ok(())
    }

    /// Claims `feature` before returning, so the action shows as in
    /// progress to every query from here on, then runs it on the
    /// context runtime.
    fn spawn_action<F>(
        &self,
        feature: FeatureType,
        action: DeploymentAction,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(DeploymentResponse) + Send + 'static,
    {
        match self.orchestrator.begin_action(feature, action) {
            Ok(claimed) => {
                let orchestrator = self.orchestrator.clone();
                self.spawn_with_callback(
                    async move { orchestrator.run_claimed(claimed).await },
                    callback,
                )
            }
            Err(rejected) => self.spawn_with_callback(async move { rejected }, callback),
        }
    }

    /// Runs `fut` on the context runtime and hands its output to
    /// `callback`, exactly once.
    fn spawn_with_callback<T, Fut, F>(&self, fut: Fut, callback: F) -> JoinHandle<()>
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        self.runtime.spawn(async move { callback(fut.await) })
    }
}

impl Drop for GameKit {
    fn drop(&mut self) {
        if let Some(client) = &self.gameplay_data
            && client.is_background_thread_running()
        {
            warn!("GameKit dropped with retry worker running, stopping it");
            client.stop_retry_background_thread();
        }
    }
}
