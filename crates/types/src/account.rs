//! Account identity and credentials.

use serde::{Deserialize, Serialize};

/// Development environment code.
pub const ENV_DEV: &str = "dev";
/// QA environment code.
pub const ENV_QA: &str = "qa";
/// Staging environment code.
pub const ENV_STAGING: &str = "stg";
/// Production environment code.
pub const ENV_PROD: &str = "prd";

/// Environments that always exist, with their descriptions.
pub const BUILT_IN_ENVIRONMENTS: [(&str, &str); 4] = [
    (ENV_DEV, "Development"),
    (ENV_QA, "QA"),
    (ENV_STAGING, "Staging"),
    (ENV_PROD, "Production"),
];

/// Which account, environment and game a deployment session targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub environment: String,
    pub account_id: String,
    pub company_name: String,
    pub game_name: String,
}

/// Secrets and region used to reach the account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub region: String,
    pub access_key: String,
    pub access_secret: String,
    pub account_id: String,
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("access_secret", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Everything a user enters to target an account, in one place.
///
/// Split into [`AccountInfo`] and [`AccountCredentials`] with the named
/// conversions below.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDetails {
    pub environment: String,
    pub account_id: String,
    pub game_name: String,
    pub region: String,
    pub access_key: String,
    pub access_secret: String,
}

impl std::fmt::Debug for AccountDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountDetails")
            .field("environment", &self.environment)
            .field("account_id", &self.account_id)
            .field("game_name", &self.game_name)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

impl AccountDetails {
    /// Builds the account info. An empty environment becomes `dev`.
    pub fn account_info(&self) -> AccountInfo {
        let environment = if self.environment.is_empty() {
            ENV_DEV.to_string()
        } else {
            self.environment.clone()
        };
        AccountInfo {
            environment,
            account_id: self.account_id.clone(),
            company_name: String::new(),
            game_name: self.game_name.clone(),
        }
    }

    pub fn account_credentials(&self) -> AccountCredentials {
        AccountCredentials {
            region: self.region.clone(),
            access_key: self.access_key.clone(),
            access_secret: self.access_secret.clone(),
            account_id: self.account_id.clone(),
        }
    }
}
