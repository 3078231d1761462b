//! Persistent GameKit settings.
//!
//! One YAML file per game (`<root>/<game>/saveInfo.yml`) holds the last
//! used region and environment, custom environments, and per-feature
//! variables for every environment. Reads load the file lazily; writes
//! stay in memory until [`SettingsStore::save`].

pub mod document;
pub mod error;
pub mod store;

// Re-export primary types for convenience.
pub use document::SettingsDocument;
pub use error::SettingsError;
pub use store::{SETTINGS_FILE_NAME, SettingsStore};
