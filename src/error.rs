/// Error types for the reminder push service
///
/// `AppError` covers request-fatal failures and maps to HTTP responses.
/// `LookupError` is the non-fatal kind: a failed token lookup or audit
/// insert is logged at the call site and degraded to an empty result.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use thiserror::Error;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing request input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or malformed environment configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Private key import or signing failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Non-success response from the OAuth2 token endpoint
    #[error("Token exchange failed with status {status}: {body}")]
    AuthExchange { status: u16, body: String },

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Crypto(_)
            | AppError::AuthExchange { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Crypto and exchange details are logged where they occur and must
        // not reach the client.
        let message = match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Config(_) => "Internal configuration error".to_string(),
            AppError::Crypto(_) | AppError::AuthExchange { .. } => {
                "Push authentication error".to_string()
            }
            AppError::Internal(_) => "Internal server error".to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody { error: message })
    }
}

/// Non-fatal collaborator error (token lookup, audit insert)
#[derive(Debug, Error)]
#[error("{0}")]
pub struct LookupError(pub String);

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError(err.to_string())
    }
}
