//! User gameplay data client.
//!
//! Wraps a [`GameplayDataTransport`] with an offline retry queue. Write
//! calls that hit a network failure are queued and replayed in order by
//! a background worker; the queue can be persisted to a cache file and
//! reloaded on the next run.
//!
//! # Call flow
//!
//! 1. **Validate** bundle names and item keys before any network call
//! 2. **Execute** live, or queue if earlier writes are still pending
//! 3. **Retry** queued calls with backoff until they succeed, are
//!    rejected, or exceed the retry budget
//! 4. **Persist** what is left to the cache file on shutdown

pub mod cache;
pub mod client;
pub mod error;
pub mod queue;
pub mod retry;
pub mod transport;
pub mod types;
pub mod validation;

// Re-export primary types for convenience.
pub use client::UserGameplayDataClient;
pub use error::GameplayDataError;
pub use queue::RetryQueue;
pub use transport::{CallOptions, CallResponse, GameplayDataTransport, TransportError};
pub use types::{
    ApiCall, ApiCallKind, ClientSettings, GameplayDataEvent, RetryStrategy, WriteOutcome,
};
