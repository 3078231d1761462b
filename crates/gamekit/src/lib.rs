//! GameKit native core.
//!
//! [`GameKit`] is the single handle an application holds. It owns the
//! settings store for one game, the deployment orchestrator and,
//! optionally, the user gameplay data client. Long-running calls are
//! available both as `async fn`s on the owned components and as
//! callback-style entry points that spawn onto the context's runtime.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod variables;

// Re-export primary types for convenience.
pub use config::GameKitConfig;
pub use context::GameKit;
pub use error::GameKitError;
pub use logging::{LogLevel, LogSinkLayer, init_tracing, init_tracing_with_sink};
pub use variables::SettingsVariables;

pub use gamekit_deploy as deploy;
pub use gamekit_gameplay_data as gameplay_data;
pub use gamekit_settings as settings;
pub use gamekit_types as types;
