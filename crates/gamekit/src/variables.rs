//! Settings-backed feature variables for deployment pipelines.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use gamekit_deploy::FeatureVariableSource;
use gamekit_settings::SettingsStore;
use gamekit_types::FeatureType;

/// Reads feature variables for the store's current environment.
#[derive(Debug, Clone)]
pub struct SettingsVariables {
    store: Arc<Mutex<SettingsStore>>,
}

impl SettingsVariables {
    pub fn new(store: Arc<Mutex<SettingsStore>>) -> Self {
        Self { store }
    }
}

impl FeatureVariableSource for SettingsVariables {
    fn feature_variables(&self, feature: FeatureType) -> BTreeMap<String, String> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .feature_variables(feature)
    }
}
