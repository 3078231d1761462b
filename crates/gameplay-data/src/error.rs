//! Gameplay data error types.

use std::path::PathBuf;

use gamekit_types::ResultCode;

use crate::transport::TransportError;

/// Errors produced by the gameplay data client.
#[derive(Debug, thiserror::Error)]
pub enum GameplayDataError {
    #[error("malformed bundle name {0:?}: expected 1-512 characters of [A-Za-z0-9_.-]")]
    MalformedBundleName(String),

    #[error("malformed bundle item key {0:?}: expected 1-512 characters of [A-Za-z0-9_.-]")]
    MalformedBundleItemKey(String),

    #[error("API call failed: {0}")]
    ApiCallFailed(#[from] TransportError),

    #[error("API call dropped")]
    ApiCallDropped,

    #[error("failed to read cache file {path}: {reason}")]
    CacheRead { path: PathBuf, reason: String },

    #[error("failed to write cache file {path}: {reason}")]
    CacheWrite { path: PathBuf, reason: String },

    #[error("{0}")]
    General(String),
}

impl GameplayDataError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::MalformedBundleName(_) => ResultCode::MalformedBundleName,
            Self::MalformedBundleItemKey(_) => ResultCode::MalformedBundleItemKey,
            Self::ApiCallFailed(_) => ResultCode::UserGameplayDataApiCallFailed,
            Self::ApiCallDropped => ResultCode::UserGameplayDataApiCallDropped,
            Self::CacheRead { .. } => ResultCode::UserGameplayDataCacheReadFailed,
            Self::CacheWrite { .. } => ResultCode::UserGameplayDataCacheWriteFailed,
            Self::General(_) => ResultCode::General,
        }
    }
}
