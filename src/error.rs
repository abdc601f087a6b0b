use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    // Configuration errors
    #[error("Missing required environment variable '{var}'")]
    MissingConfig { var: &'static str },

    #[error("Invalid value '{value}' for environment variable '{var}'")]
    InvalidConfig { var: &'static str, value: String },

    // State errors
    #[error("Failed to load records from '{path}': {source}")]
    StateLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse records file '{path}': {source}")]
    StateParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to save records to '{path}': {source}")]
    StateSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Verification pipeline errors
    #[error("Authorization code is missing")]
    MissingAuthorizationCode,

    #[error("OAuth exchange failed: {detail}")]
    OAuthExchangeFailed { detail: String },

    #[error("Failed to persist verification record: {detail}")]
    PersistenceFailed { detail: String },

    #[error("Failed to grant verified role: {detail}")]
    RoleGrantFailed { detail: String },
}

/// Maps pipeline errors onto HTTP responses. The detailed error is logged at
/// the handler boundary; callers only ever see a generic body.
impl IntoResponse for VerifyError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            VerifyError::MissingAuthorizationCode => {
                (StatusCode::BAD_REQUEST, "Authorization code is missing.")
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred during verification.",
            ),
        };
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
