//! On-disk shape of `saveInfo.yml`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Feature API name to variable map.
pub type FeatureVariables = BTreeMap<String, BTreeMap<String, String>>;

/// Contents of one game's settings file.
///
/// Missing fields fall back to empty values so older files still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    #[serde(default)]
    pub gamekit_plugin_version: String,

    #[serde(default)]
    pub game_name: String,

    #[serde(default)]
    pub last_used_region: String,

    #[serde(default)]
    pub last_used_environment: String,

    /// Environment code to description, user-added only.
    #[serde(default)]
    pub custom_environments: BTreeMap<String, String>,

    /// Environment code to per-feature variables.
    #[serde(default)]
    pub environments: BTreeMap<String, FeatureVariables>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let doc: SettingsDocument = serde_yaml::from_str("{}").unwrap();
        assert_eq!(doc, SettingsDocument::default());
    }

    #[test]
    fn field_names_are_camel_case() {
        let doc = SettingsDocument {
            game_name: "mygame".into(),
            last_used_region: "us-west-2".into(),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&doc).unwrap();
        assert!(yaml.contains("gameName: mygame"));
        assert!(yaml.contains("lastUsedRegion: us-west-2"));
        assert!(yaml.contains("gamekitPluginVersion"));
    }
}
