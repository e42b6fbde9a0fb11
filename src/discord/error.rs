//! Error types shared by the Discord REST and gateway adapters.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`DiscordError`] failures.
pub type DiscordResult<T> = Result<T, DiscordError>;

/// Failures that can occur while talking to Discord.
#[derive(Debug, Error)]
pub enum DiscordError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Discord client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A REST request could not be sent.
    #[error("failed to send Discord request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The target resource does not exist (deleted message, unknown channel).
    #[error("Discord resource `{path}` not found")]
    NotFound { path: String },
    /// Discord answered with an unexpected status code.
    #[error("unexpected Discord response status {status} for `{path}`: {body}")]
    RequestStatus {
        path: String,
        status: StatusCode,
        body: String,
    },
    /// Response payload could not be decoded.
    #[error("failed to decode Discord response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A message expected to carry a poll came back without one.
    #[error("message `{message_id}` carries no poll")]
    MissingPoll { message_id: u64 },
    /// The websocket transport failed.
    #[error("gateway websocket error")]
    Websocket {
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },
    /// The gateway sent something that does not follow the protocol.
    #[error("gateway protocol error: {0}")]
    Protocol(String),
    /// The gateway closed the session or asked for a new one.
    #[error("gateway session ended: {0}")]
    SessionEnded(String),
}

impl DiscordError {
    /// Whether the error reports a resource that no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiscordError::NotFound { .. })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DiscordError {
    fn from(source: tokio_tungstenite::tungstenite::Error) -> Self {
        DiscordError::Websocket {
            source: Box::new(source),
        }
    }
}
