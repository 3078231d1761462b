//! Backend transport seam.
//!
//! The application implements [`GameplayDataTransport`] on top of its
//! HTTP client. Keeping it a trait lets the client logic run against
//! in-memory mocks in tests.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::types::ApiCall;

/// Per-call options taken from the client settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    pub pagination_size: u32,
}

/// Payload returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResponse {
    /// Write accepted, nothing returned.
    Done,
    BundleNames(Vec<String>),
    Items(BTreeMap<String, String>),
    Item(String),
}

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The backend could not be reached. Queueable.
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered and refused the call. Never retried.
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response for {0}")]
    UnexpectedResponse(&'static str),
}

impl TransportError {
    /// Whether the failure says anything about connectivity.
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Network(_) | TransportError::Timeout(_))
    }
}

/// Executes gameplay data calls against the backend.
pub trait GameplayDataTransport: Send + Sync {
    fn execute<'a>(
        &'a self,
        call: &'a ApiCall,
        options: CallOptions,
    ) -> Pin<Box<dyn Future<Output = Result<CallResponse, TransportError>> + Send + 'a>>;
}
