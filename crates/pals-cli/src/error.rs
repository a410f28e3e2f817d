use std::io;

use pals_core::sync::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] pals_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("ID cannot be empty")]
    EmptyIdentifier,
    #[error("Visit not found for id/prefix: {0}")]
    VisitNotFound(String),
    #[error("Achievement not found for id/prefix: {0}")]
    AchievementNotFound(String),
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Nothing to change. Pass at least one of --duration, --rating, --consistency, --notes")]
    NothingToEdit,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Set PALS_REMOTE_URL and PALS_API_KEY, or add remote_url and api_key to the config file."
    )]
    SyncNotConfigured,
}
