use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::{options::OptionError, storage::StorageError},
    discord::error::DiscordError,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The label is already part of the option list.
    #[error("option `{0}` already exists")]
    DuplicateOption(String),
    /// The label is not part of the option list.
    #[error("option `{0}` does not exist")]
    UnknownOption(String),
    /// A poll cannot be built without answers.
    #[error("no poll options are defined")]
    NoOptions,
    /// Nothing can be removed from an empty option list.
    #[error("no options available")]
    NoOptionsAvailable,
    /// The label fails validation.
    #[error("invalid option: {0}")]
    InvalidOption(String),
    /// The option list is full.
    #[error("option list is full ({max} entries)")]
    OptionLimitReached { max: usize },
    /// The platform could not be reached or refused the request.
    #[error("delivery to Discord failed")]
    DeliveryFailed(#[source] DiscordError),
    /// Required configuration is absent or malformed.
    #[error("configuration missing: {0}")]
    ConfigMissing(String),
    /// The overflow thread could not be created; a later vote retries.
    #[error("failed to create discussion thread")]
    ThreadCreateFailed(#[source] DiscordError),
    /// The option list could not be read or written.
    #[error("option storage failed")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Storage(err)
    }
}

impl From<OptionError> for ServiceError {
    fn from(err: OptionError) -> Self {
        match err {
            OptionError::Duplicate(label) => ServiceError::DuplicateOption(label),
            OptionError::Unknown(label) => ServiceError::UnknownOption(label),
            OptionError::LimitReached { max } => ServiceError::OptionLimitReached { max },
            OptionError::Storage(source) => ServiceError::Storage(source),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        let message = err
            .field_errors()
            .into_values()
            .flatten()
            .filter_map(|error| error.message.as_ref().map(|message| message.to_string()))
            .next()
            .unwrap_or_else(|| err.to_string());
        ServiceError::InvalidOption(message)
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::DeliveryFailed(source) => {
                AppError::ServiceUnavailable(source.to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
