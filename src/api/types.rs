//! Error type for the remote licensing API.

use thiserror::Error;

/// User-facing notice when a location has no license information.
pub const INFO_NOT_FOUND: &str = "Информация не найдена";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("no license information for location '{0}'")]
    NotFound(String),
    #[error("invalid API response: {0}")]
    InvalidResponse(String),
    #[error("offline and nothing cached for location '{0}'")]
    Offline(String),
}

impl ApiError {
    /// The short string the dashboard shows in its error box.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(_) => INFO_NOT_FOUND.to_string(),
            other => other.to_string(),
        }
    }
}
