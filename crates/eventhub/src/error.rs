use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing event hub settings: {}", names.join(", "))]
    MissingSettings { names: Vec<&'static str> },

    #[error("invalid shared access key: {reason}")]
    InvalidKey { reason: String },

    #[error(transparent)]
    Activity(#[from] botwire_common::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_key(reason: impl std::fmt::Display) -> Self {
        Self::InvalidKey {
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
