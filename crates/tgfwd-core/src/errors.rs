use crate::domain::ChatId;

/// Core error type for the forwarder.
///
/// Adapter crates map their platform errors into this type so the supervisor
/// and the shell can tell recoverable failures from fatal ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("cannot resolve chat {chat_id}: {reason}")]
    Resolve { chat_id: ChatId, reason: String },

    #[error("forward failed: {0}")]
    Forward(String),

    #[error("subscription lost: {0}")]
    Subscription(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Authorization failures are the only errors that halt the process.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
