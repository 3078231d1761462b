//! Gameplay data types shared by the client, queue and cache.

use std::time::Duration;

use chrono::{DateTime, Utc};
use gamekit_types::ResultCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Connection client name reported with network status changes.
pub const CONNECTION_CLIENT: &str = "UserGameplayData";

/// Operation carried by an [`ApiCall`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiCallKind {
    AddBundle,
    UpdateItem,
    DeleteBundle,
    DeleteBundleItems,
    DeleteAllData,
    ListBundles,
    GetBundle,
    GetBundleItem,
}

impl ApiCallKind {
    /// Writes may be queued for retry. Reads never are.
    pub fn is_queueable(self) -> bool {
        matches!(
            self,
            ApiCallKind::AddBundle
                | ApiCallKind::UpdateItem
                | ApiCallKind::DeleteBundle
                | ApiCallKind::DeleteBundleItems
                | ApiCallKind::DeleteAllData
        )
    }
}

/// One gameplay data request, live or queued.
///
/// `keys` and `values` are parallel. Delete calls carry keys only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCall {
    pub id: Uuid,
    pub kind: ApiCallKind,
    pub bundle_name: String,
    pub keys: Vec<String>,
    pub values: Vec<String>,
    /// Failed retry attempts so far.
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl ApiCall {
    pub fn new(
        kind: ApiCallKind,
        bundle_name: impl Into<String>,
        keys: Vec<String>,
        values: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            bundle_name: bundle_name.into(),
            keys,
            values,
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }
}

/// How long the retry worker waits between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetryStrategy {
    /// Wait doubles with each consecutive failed pass.
    #[default]
    Exponential,
    /// Wait is always the retry interval.
    Constant,
}

/// Client tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    pub client_timeout_seconds: u32,
    pub retry_interval_seconds: u32,
    pub max_retry_queue_size: u32,
    pub max_retries: u32,
    pub retry_strategy: RetryStrategy,
    pub max_exponential_retry_threshold: u32,
    pub pagination_size: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            client_timeout_seconds: 3,
            retry_interval_seconds: 5,
            max_retry_queue_size: 256,
            max_retries: 32,
            retry_strategy: RetryStrategy::Exponential,
            max_exponential_retry_threshold: 32,
            pagination_size: 100,
        }
    }
}

impl ClientSettings {
    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.client_timeout_seconds))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.retry_interval_seconds))
    }
}

/// Asynchronous notifications from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum GameplayDataEvent {
    /// Network health flipped.
    NetworkStatusChanged {
        is_connection_ok: bool,
        connection_client: String,
    },
    /// A queued call was discarded and will not be retried.
    CallDropped { call: ApiCall, result: ResultCode },
    /// A cache load finished.
    CacheProcessed { is_cache_processed: bool },
}

/// Successful outcome of a write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The backend accepted the call.
    Completed,
    /// The call was queued and will be retried in the background.
    Enqueued,
}

impl WriteOutcome {
    pub fn result_code(self) -> ResultCode {
        match self {
            WriteOutcome::Completed => ResultCode::Success,
            WriteOutcome::Enqueued => ResultCode::UserGameplayDataApiCallEnqueued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let s = ClientSettings::default();
        assert_eq!(s.client_timeout(), Duration::from_secs(3));
        assert_eq!(s.retry_interval(), Duration::from_secs(5));
        assert_eq!(s.max_retry_queue_size, 256);
        assert_eq!(s.max_retries, 32);
        assert_eq!(s.retry_strategy, RetryStrategy::Exponential);
        assert_eq!(s.max_exponential_retry_threshold, 32);
        assert_eq!(s.pagination_size, 100);
    }

    #[test]
    fn only_writes_are_queueable() {
        assert!(ApiCallKind::AddBundle.is_queueable());
        assert!(ApiCallKind::DeleteAllData.is_queueable());
        assert!(!ApiCallKind::ListBundles.is_queueable());
        assert!(!ApiCallKind::GetBundleItem.is_queueable());
    }

    #[test]
    fn enqueued_reports_warning_code() {
        assert!(WriteOutcome::Completed.result_code().is_success());
        assert!(WriteOutcome::Enqueued.result_code().is_warning());
    }
}
