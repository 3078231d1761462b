//! Shared types for the GameKit core.
//!
//! Every other crate in the workspace depends on this one. It holds the
//! feature catalogue, deployment status enums, account and region data,
//! and the numeric result codes reported across the public boundary.

pub mod account;
pub mod feature;
pub mod region;
pub mod result;
pub mod status;

// Re-export primary types for convenience.
pub use account::{AccountCredentials, AccountDetails, AccountInfo};
pub use feature::FeatureType;
pub use region::{AwsRegion, short_region_code};
pub use result::ResultCode;
pub use status::{
    CanExecuteDeploymentActionResult, DeploymentActionBlockedReason, FeatureStatus,
    FeatureStatusSummary,
};
