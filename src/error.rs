/// Error types.
///
/// Nothing in the progression core fails; these cover the edges that touch
/// the outside world (terminal, settings file).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings file is not a JSON object")]
    NotAnObject,
}

#[derive(Error, Debug)]
pub enum GameError {
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}
