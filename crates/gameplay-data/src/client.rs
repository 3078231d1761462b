//! User gameplay data client with offline support.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gamekit_types::ResultCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache;
use crate::error::GameplayDataError;
use crate::retry::{RetryCore, lock, run_worker};
use crate::transport::{CallResponse, GameplayDataTransport, TransportError};
use crate::types::{ApiCall, ApiCallKind, ClientSettings, GameplayDataEvent, WriteOutcome};
use crate::validation::{validate_bundle_name, validate_item_key, validate_item_keys};

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Gameplay data client that keeps writes alive through network loss.
///
/// Network health starts out healthy and is updated by every live call
/// and retry. Writes that fail on the network are queued and replayed by
/// the retry worker; reads always go straight to the backend.
pub struct UserGameplayDataClient {
    core: Arc<RetryCore>,
    events_rx: Option<mpsc::Receiver<GameplayDataEvent>>,
    worker: Mutex<Option<Worker>>,
    offline_cache_path: Mutex<Option<PathBuf>>,
}

impl UserGameplayDataClient {
    pub fn new(transport: Arc<dyn GameplayDataTransport>, settings: ClientSettings) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            core: Arc::new(RetryCore::new(transport, settings, events_tx)),
            events_rx: Some(events_rx),
            worker: Mutex::new(None),
            offline_cache_path: Mutex::new(None),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<GameplayDataEvent>> {
        self.events_rx.take()
    }

    pub fn client_settings(&self) -> ClientSettings {
        lock(&self.core.settings).clone()
    }

    /// Replaces the client settings. A smaller queue size evicts the
    /// oldest pending calls.
    pub fn set_client_settings(&self, settings: ClientSettings) {
        let capacity = settings.max_retry_queue_size as usize;
        *lock(&self.core.settings) = settings;
        let evicted = lock(&self.core.queue).set_capacity(capacity);
        for call in evicted {
            self.core.report_dropped(call);
        }
    }

    /// Calls waiting for retry, oldest first.
    pub fn pending_calls(&self) -> Vec<ApiCall> {
        lock(&self.core.queue).snapshot()
    }

    pub fn pending_call_count(&self) -> usize {
        lock(&self.core.queue).len()
    }

    /// Result of the most recent live call or retry.
    pub fn last_network_health_state(&self) -> bool {
        self.core.is_healthy()
    }

    // -----------------------------------------------------------------------
    // Bundle operations
    // -----------------------------------------------------------------------

    pub async fn add_bundle(
        &self,
        bundle_name: &str,
        items: &BTreeMap<String, String>,
    ) -> Result<WriteOutcome, GameplayDataError> {
        validate_bundle_name(bundle_name)?;
        validate_item_keys(items.keys())?;
        let (keys, values): (Vec<String>, Vec<String>) = items
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .unzip();
        self.write(ApiCall::new(ApiCallKind::AddBundle, bundle_name, keys, values))
            .await
    }

    pub async fn update_item(
        &self,
        bundle_name: &str,
        key: &str,
        value: &str,
    ) -> Result<WriteOutcome, GameplayDataError> {
        validate_bundle_name(bundle_name)?;
        validate_item_key(key)?;
        self.write(ApiCall::new(
            ApiCallKind::UpdateItem,
            bundle_name,
            vec![key.to_string()],
            vec![value.to_string()],
        ))
        .await
    }

    pub async fn delete_bundle(
        &self,
        bundle_name: &str,
    ) -> Result<WriteOutcome, GameplayDataError> {
        validate_bundle_name(bundle_name)?;
        self.write(ApiCall::new(ApiCallKind::DeleteBundle, bundle_name, vec![], vec![]))
            .await
    }

    pub async fn delete_bundle_items(
        &self,
        bundle_name: &str,
        keys: &[String],
    ) -> Result<WriteOutcome, GameplayDataError> {
        validate_bundle_name(bundle_name)?;
        validate_item_keys(keys)?;
        self.write(ApiCall::new(
            ApiCallKind::DeleteBundleItems,
            bundle_name,
            keys.to_vec(),
            vec![],
        ))
        .await
    }

    /// Deletes every bundle of the signed-in player.
    pub async fn delete_all_data(&self) -> Result<WriteOutcome, GameplayDataError> {
        self.write(ApiCall::new(ApiCallKind::DeleteAllData, "", vec![], vec![]))
            .await
    }

    pub async fn list_bundles(&self) -> Result<Vec<String>, GameplayDataError> {
        match self.read(ApiCall::new(ApiCallKind::ListBundles, "", vec![], vec![])).await? {
            CallResponse::BundleNames(names) => Ok(names),
            _ => Err(TransportError::UnexpectedResponse("list_bundles").into()),
        }
    }

    /// Fetches every item of a bundle. A bundle with no items is an error.
    pub async fn get_bundle(
        &self,
        bundle_name: &str,
    ) -> Result<BTreeMap<String, String>, GameplayDataError> {
        validate_bundle_name(bundle_name)?;
        let call = ApiCall::new(ApiCallKind::GetBundle, bundle_name, vec![], vec![]);
        match self.read(call).await? {
            CallResponse::Items(items) if items.is_empty() => Err(GameplayDataError::General(
                format!("bundle {bundle_name} has no items"),
            )),
            CallResponse::Items(items) => Ok(items),
            _ => Err(TransportError::UnexpectedResponse("get_bundle").into()),
        }
    }

    pub async fn get_bundle_item(
        &self,
        bundle_name: &str,
        key: &str,
    ) -> Result<String, GameplayDataError> {
        validate_bundle_name(bundle_name)?;
        validate_item_key(key)?;
        let call = ApiCall::new(
            ApiCallKind::GetBundleItem,
            bundle_name,
            vec![key.to_string()],
            vec![],
        );
        match self.read(call).await? {
            CallResponse::Item(value) => Ok(value),
            _ => Err(TransportError::UnexpectedResponse("get_bundle_item").into()),
        }
    }

    async fn write(&self, call: ApiCall) -> Result<WriteOutcome, GameplayDataError> {
        // Held until the call is either done or queued. Later writes wait
        // behind queued ones so replay order is kept.
        let _order = self.core.drain_lock.lock().await;
        let pending = !lock(&self.core.queue).is_empty();
        if pending {
            self.core.enqueue(call);
            return Ok(WriteOutcome::Enqueued);
        }

        match self.core.call(&call).await {
            Ok(_) => {
                self.core.set_healthy(true);
                Ok(WriteOutcome::Completed)
            }
            Err(e) if e.is_network() => {
                self.core.set_healthy(false);
                warn!(
                    kind = ?call.kind,
                    bundle = %call.bundle_name,
                    error = %e,
                    "call failed, queued for retry"
                );
                self.core.enqueue(call);
                Ok(WriteOutcome::Enqueued)
            }
            Err(e) => {
                self.core.set_healthy(true);
                Err(e.into())
            }
        }
    }

    async fn read(&self, call: ApiCall) -> Result<CallResponse, GameplayDataError> {
        match self.core.call(&call).await {
            Ok(resp) => {
                self.core.set_healthy(true);
                Ok(resp)
            }
            Err(e) => {
                self.core.set_healthy(!e.is_network());
                debug!(kind = ?call.kind, error = %e, "read failed");
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Retry worker
    // -----------------------------------------------------------------------

    /// Starts the retry worker. Does nothing if it is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_retry_background_thread(&self) {
        let mut worker = lock(&self.worker);
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!("retry worker already running");
            return;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(self.core.clone(), cancel.clone()));
        *worker = Some(Worker { cancel, handle });
    }

    /// Signals the retry worker to stop. Does nothing if it is not running.
    pub fn stop_retry_background_thread(&self) {
        if let Some(worker) = self.take_worker() {
            worker.cancel.cancel();
        }
    }

    pub fn is_background_thread_running(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Discards every queued call. Returns how many were dropped.
    pub fn drop_all_cached_events(&self) -> usize {
        let dropped = lock(&self.core.queue).clear();
        info!(count = dropped.len(), "dropped all queued calls");
        dropped.len()
    }

    fn take_worker(&self) -> Option<Worker> {
        lock(&self.worker).take()
    }

    async fn stop_and_join(&self) -> bool {
        match self.take_worker() {
            Some(worker) => {
                worker.cancel.cancel();
                if let Err(e) = worker.handle.await {
                    warn!("retry worker ended abnormally: {e}");
                }
                true
            }
            None => false,
        }
    }

    /// Stops the worker, runs one full pass over the queue and restarts
    /// the worker if it was running.
    ///
    /// Returns true if every queued call was dealt with.
    pub async fn force_retry(&self) -> bool {
        let was_running = self.stop_and_join().await;
        let outcome = self.core.drain_pass().await;
        if was_running {
            self.start_retry_background_thread();
        }
        info!(
            succeeded = outcome.succeeded,
            dropped = outcome.dropped,
            remaining = outcome.remaining,
            "forced retry finished"
        );
        outcome.is_complete()
    }

    /// Runs `api_call` once pending writes are flushed.
    ///
    /// With healthy network the call runs immediately. Otherwise a forced
    /// retry runs first; if it fails, `on_error` is called instead and
    /// `None` is returned.
    pub async fn try_force_synchronize_and_execute<T, F, Fut, E>(
        &self,
        api_call: F,
        on_error: E,
    ) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        E: FnOnce(ResultCode),
    {
        if self.last_network_health_state() {
            return Some(api_call().await);
        }
        if self.force_retry().await {
            Some(api_call().await)
        } else {
            on_error(ResultCode::UserGameplayDataApiCallFailed);
            None
        }
    }

    // -----------------------------------------------------------------------
    // Offline cache
    // -----------------------------------------------------------------------

    /// Writes the queue to `path` on a blocking thread, then removes the
    /// written calls from memory.
    ///
    /// Stop the worker first so calls are not replayed and persisted at once.
    pub async fn persist_to_cache(&self, path: &Path) -> Result<(), GameplayDataError> {
        let calls = self.pending_calls();
        let target = path.to_path_buf();
        let snapshot = calls.clone();
        tokio::task::spawn_blocking(move || cache::write_cache(&target, &snapshot))
            .await
            .map_err(|e| GameplayDataError::CacheWrite {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })??;

        let mut queue = lock(&self.core.queue);
        for call in &calls {
            queue.remove(call.id);
        }
        info!(path = %path.display(), count = calls.len(), "persisted queued calls");
        Ok(())
    }

    /// Writes the queue to `path` and clears it, blocking the caller.
    pub fn immediate_persist_to_cache(&self, path: &Path) -> Result<(), GameplayDataError> {
        let mut queue = lock(&self.core.queue);
        cache::write_cache(path, &queue.snapshot())?;
        let persisted = queue.clear();
        info!(path = %path.display(), count = persisted.len(), "persisted queued calls");
        Ok(())
    }

    /// Re-enqueues the calls stored at `path` and empties the file.
    ///
    /// Returns how many calls were loaded. A `CacheProcessed` event is
    /// emitted either way.
    pub async fn load_from_cache(&self, path: &Path) -> Result<usize, GameplayDataError> {
        let source = path.to_path_buf();
        let loaded = tokio::task::spawn_blocking(move || {
            let calls = cache::read_cache(&source)?;
            cache::truncate_cache(&source)?;
            Ok::<_, GameplayDataError>(calls)
        })
        .await
        .map_err(|e| GameplayDataError::CacheRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
        .and_then(|r| r);

        match loaded {
            Ok(calls) => {
                let count = calls.len();
                for call in calls {
                    self.core.enqueue(call);
                }
                info!(path = %path.display(), count, "loaded queued calls from cache");
                self.core.emit(GameplayDataEvent::CacheProcessed {
                    is_cache_processed: true,
                });
                Ok(count)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load call cache");
                self.core.emit(GameplayDataEvent::CacheProcessed {
                    is_cache_processed: false,
                });
                Err(e)
            }
        }
    }

    /// Loads `path` if it exists, then starts the retry worker.
    ///
    /// `path` is remembered and written by [`shutdown`](Self::shutdown).
    /// Does nothing if the worker is already running.
    pub async fn enable_automatic_offline_mode_with_caching(
        &self,
        path: &Path,
    ) -> Result<(), GameplayDataError> {
        if self.is_background_thread_running() {
            warn!("retry worker already running, automatic offline mode not enabled");
            return Ok(());
        }
        *lock(&self.offline_cache_path) = Some(path.to_path_buf());

        let loaded = if path.exists() {
            self.load_from_cache(path).await.map(|_| ())
        } else {
            Ok(())
        };
        self.start_retry_background_thread();
        loaded
    }

    /// Stops the worker and persists the queue to the automatic offline
    /// cache path, if one was set.
    pub async fn shutdown(&self) -> Result<(), GameplayDataError> {
        self.stop_and_join().await;
        let path = lock(&self.offline_cache_path).clone();
        match path {
            Some(path) => self.immediate_persist_to_cache(&path),
            None => Ok(()),
        }
    }
}

impl Drop for UserGameplayDataClient {
    fn drop(&mut self) {
        if let Some(worker) = self.take_worker() {
            worker.cancel.cancel();
        }
    }
}
