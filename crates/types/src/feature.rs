//! Deployable feature catalogue.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A deployable unit of the game backend.
///
/// `Main` is the shared stack every other feature builds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureType {
    Main,
    Identity,
    Authentication,
    Achievements,
    GameStateCloudSaving,
    UserGameplayData,
}

/// Error returned when parsing an unknown feature API name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature: {0}")]
pub struct UnknownFeature(pub String);

impl FeatureType {
    /// Every feature, in deployment order.
    pub const ALL: [FeatureType; 6] = [
        FeatureType::Main,
        FeatureType::Identity,
        FeatureType::Authentication,
        FeatureType::Achievements,
        FeatureType::GameStateCloudSaving,
        FeatureType::UserGameplayData,
    ];

    /// Features shown to users as individually deployable.
    pub const DISPLAYED: [FeatureType; 4] = [
        FeatureType::Identity,
        FeatureType::GameStateCloudSaving,
        FeatureType::Achievements,
        FeatureType::UserGameplayData,
    ];

    /// Human readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            FeatureType::Main => "Main",
            FeatureType::Identity => "Identity & Authentication",
            FeatureType::Authentication => "Authentication",
            FeatureType::Achievements => "Achievements",
            FeatureType::GameStateCloudSaving => "Game State Cloud Saving",
            FeatureType::UserGameplayData => "User Gameplay Data",
        }
    }

    /// Name used in stack names, settings keys and cloud paths.
    pub fn api_name(self) -> &'static str {
        match self {
            FeatureType::Main => "main",
            FeatureType::Identity => "identity",
            FeatureType::Authentication => "authentication",
            FeatureType::Achievements => "achievements",
            FeatureType::GameStateCloudSaving => "gamesaving",
            FeatureType::UserGameplayData => "usergamedata",
        }
    }

    /// CloudWatch dashboard URL for this feature's deployed stack.
    pub fn dashboard_url(self, game_name: &str, environment: &str, region: &str) -> String {
        let feature: String = self
            .display_name()
            .replace('&', "And")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        format!(
            "https://console.aws.amazon.com/cloudwatch/home?region={region}#dashboards:name=GameKit-{game_name}-{environment}-{region}-{feature}"
        )
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for FeatureType {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureType::ALL
            .into_iter()
            .find(|f| f.api_name() == s)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}
