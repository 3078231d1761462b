//! Errors surfaced by the context.

use gamekit_deploy::DeployError;
use gamekit_gameplay_data::GameplayDataError;
use gamekit_settings::SettingsError;
use gamekit_types::ResultCode;

#[derive(Debug, thiserror::Error)]
pub enum GameKitError {
    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    GameplayData(#[from] GameplayDataError),
}

impl GameKitError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            GameKitError::Deploy(e) => e.result_code(),
            GameKitError::Settings(e) => e.result_code(),
            GameKitError::GameplayData(e) => e.result_code(),
        }
    }
}
