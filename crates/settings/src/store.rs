//! Settings store scoped by game name and environment.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use gamekit_types::FeatureType;
use gamekit_types::account::BUILT_IN_ENVIRONMENTS;
use tracing::{debug, warn};

use crate::document::SettingsDocument;
use crate::error::SettingsError;

/// File name of the per-game settings file.
pub const SETTINGS_FILE_NAME: &str = "saveInfo.yml";

/// Extension an unreadable settings file is renamed to before it is
/// replaced.
const BACKUP_EXTENSION: &str = "yml.bak";

/// Key-value settings for one game, read from and written to YAML.
///
/// The file is read on first access. Setters only touch memory;
/// nothing reaches disk until [`save`](Self::save). A file that cannot
/// be parsed is treated as empty and moved aside on the next save.
#[derive(Debug)]
pub struct SettingsStore {
    root: PathBuf,
    plugin_version: String,
    game_name: String,
    environment: String,
    doc: OnceLock<SettingsDocument>,
    /// Set when the file on disk failed to load and still holds the
    /// user's original content.
    unreadable: AtomicBool,
}

impl SettingsStore {
    /// Creates a store rooted at `root` for the given game and environment.
    pub fn new(
        root: impl Into<PathBuf>,
        plugin_version: impl Into<String>,
        game_name: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            plugin_version: plugin_version.into(),
            game_name: game_name.into(),
            environment: environment.into(),
            doc: OnceLock::new(),
            unreadable: AtomicBool::new(false),
        }
    }

    /// Path of the settings file for the current game.
    pub fn settings_file_path(&self) -> PathBuf {
        settings_file_path_in(&self.root, &self.game_name)
    }

    /// Environment code feature variables are currently scoped to.
    pub fn current_environment(&self) -> &str {
        &self.environment
    }

    /// Loads the settings file, replacing any in-memory changes.
    ///
    /// A missing file yields empty settings.
    pub fn reload(&mut self) -> Result<(), SettingsError> {
        let doc = read_document(&self.settings_file_path())?;
        self.doc = OnceLock::from(doc);
        self.unreadable.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn game_name(&self) -> &str {
        let stored = &self.doc().game_name;
        if stored.is_empty() {
            &self.game_name
        } else {
            stored
        }
    }

    pub fn set_game_name(&mut self, game_name: impl Into<String>) {
        let game_name = game_name.into();
        self.update(|doc| doc.game_name = game_name);
    }

    pub fn last_used_region(&self) -> &str {
        &self.doc().last_used_region
    }

    pub fn set_last_used_region(&mut self, region: impl Into<String>) {
        let region = region.into();
        self.update(|doc| doc.last_used_region = region);
    }

    pub fn last_used_environment(&self) -> &str {
        &self.doc().last_used_environment
    }

    pub fn set_last_used_environment(&mut self, environment: impl Into<String>) {
        let environment = environment.into();
        self.update(|doc| doc.last_used_environment = environment);
    }

    /// User-added environments, code to description.
    pub fn custom_environments(&self) -> &BTreeMap<String, String> {
        &self.doc().custom_environments
    }

    /// Built-in and custom environments together.
    pub fn environments(&self) -> BTreeMap<String, String> {
        let mut all: BTreeMap<String, String> = BUILT_IN_ENVIRONMENTS
            .iter()
            .map(|(code, desc)| ((*code).to_string(), (*desc).to_string()))
            .collect();
        all.extend(self.custom_environments().clone());
        all
    }

    pub fn add_custom_environment(
        &mut self,
        code: impl Into<String>,
        description: impl Into<String>,
    ) {
        let (code, description) = (code.into(), description.into());
        self.update(|doc| {
            doc.custom_environments.insert(code, description);
        });
    }

    pub fn delete_custom_environment(&mut self, code: &str) {
        self.update(|doc| {
            doc.custom_environments.remove(code);
        });
    }

    /// Variables for `feature` in the current environment.
    pub fn feature_variables(&self, feature: FeatureType) -> BTreeMap<String, String> {
        self.doc()
            .environments
            .get(&self.environment)
            .and_then(|features| features.get(feature.api_name()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn feature_variable(&self, feature: FeatureType, key: &str) -> Option<String> {
        self.doc()
            .environments
            .get(&self.environment)
            .and_then(|features| features.get(feature.api_name()))
            .and_then(|vars| vars.get(key))
            .cloned()
    }

    /// Sets variables for `feature` in the current environment.
    ///
    /// Existing keys are overwritten; other keys are kept.
    pub fn set_feature_variables<K, V>(
        &mut self,
        feature: FeatureType,
        vars: impl IntoIterator<Item = (K, V)>,
    ) where
        K: Into<String>,
        V: Into<String>,
    {
        let environment = self.environment.clone();
        let vars: Vec<(String, String)> =
            vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.update(|doc| {
            let entry = doc
                .environments
                .entry(environment)
                .or_default()
                .entry(feature.api_name().to_string())
                .or_default();
            entry.extend(vars);
        });
    }

    pub fn delete_feature_variable(&mut self, feature: FeatureType, key: &str) {
        let environment = self.environment.clone();
        self.update(|doc| {
            if let Some(vars) = doc
                .environments
                .get_mut(&environment)
                .and_then(|features| features.get_mut(feature.api_name()))
            {
                vars.remove(key);
            }
        });
    }

    /// Writes the in-memory settings to disk.
    ///
    /// If the existing file could not be loaded it is first renamed to
    /// `saveInfo.yml.bak`, and nothing is written if that fails.
    pub fn save(&mut self) -> Result<(), SettingsError> {
        let plugin_version = self.plugin_version.clone();
        let game_name = self.game_name.clone();
        self.update(|doc| {
            doc.gamekit_plugin_version = plugin_version;
            if doc.game_name.is_empty() {
                doc.game_name = game_name;
            }
        });
        let path = self.settings_file_path();
        if self.unreadable.load(Ordering::SeqCst) {
            back_up(&path)?;
            self.unreadable.store(false, Ordering::SeqCst);
        }
        write_document(&path, self.doc())
    }

    /// Switches to `game_name`/`environment`, records them as last used
    /// together with `region`, and saves.
    pub fn populate_and_save(
        &mut self,
        game_name: &str,
        environment: &str,
        region: &str,
    ) -> Result<(), SettingsError> {
        if game_name != self.game_name {
            debug!(from = %self.game_name, to = %game_name, "switching settings game");
            self.game_name = game_name.to_string();
            self.doc = OnceLock::new();
            self.unreadable.store(false, Ordering::SeqCst);
        }
        self.environment = environment.to_string();

        let (game_name, environment, region) =
            (game_name.to_string(), environment.to_string(), region.to_string());
        self.update(|doc| {
            doc.game_name = game_name;
            doc.last_used_environment = environment;
            doc.last_used_region = region;
        });
        self.save()
    }

    fn doc(&self) -> &SettingsDocument {
        self.doc.get_or_init(|| self.read_or_default())
    }

    fn update(&mut self, f: impl FnOnce(&mut SettingsDocument)) {
        let mut doc = self.doc.take().unwrap_or_else(|| self.read_or_default());
        f(&mut doc);
        self.doc = OnceLock::from(doc);
    }

    fn read_or_default(&self) -> SettingsDocument {
        let path = self.settings_file_path();
        read_document(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "failed to load settings, using defaults");
            self.unreadable.store(true, Ordering::SeqCst);
            SettingsDocument::default()
        })
    }
}

fn settings_file_path_in(root: &Path, game_name: &str) -> PathBuf {
    root.join(game_name).join(SETTINGS_FILE_NAME)
}

fn read_document(path: &Path) -> Result<SettingsDocument, SettingsError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file yet");
            return Ok(SettingsDocument::default());
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if content.trim().is_empty() {
        return Ok(SettingsDocument::default());
    }
    serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn back_up(path: &Path) -> Result<(), SettingsError> {
    let backup = path.with_extension(BACKUP_EXTENSION);
    match std::fs::rename(path, &backup) {
        Ok(()) => {
            warn!(
                path = %path.display(),
                backup = %backup.display(),
                "moved unreadable settings file aside"
            );
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SettingsError::Write {
            path: backup,
            source,
        }),
    }
}

fn write_document(path: &Path, doc: &SettingsDocument) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SettingsError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let yaml = serde_yaml::to_string(doc)?;
    std::fs::write(path, yaml).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "settings saved");
    Ok(())
}
