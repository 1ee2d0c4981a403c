use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The payload parsed as JSON but is not a usable activity.
    #[error("invalid activity: {reason}")]
    InvalidActivity { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_activity(reason: impl Into<String>) -> Self {
        Self::InvalidActivity {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
