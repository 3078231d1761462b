//! Settings error types.

use std::path::PathBuf;

use gamekit_types::ResultCode;

/// Errors produced while loading or saving the settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to create settings directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SettingsError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            SettingsError::Read { .. } | SettingsError::Parse { .. } => {
                ResultCode::SettingsFileReadFailed
            }
            SettingsError::CreateDir { .. } => ResultCode::DirectoryCreateFailed,
            SettingsError::Serialize(_) | SettingsError::Write { .. } => {
                ResultCode::SettingsFileWriteFailed
            }
        }
    }
}
