use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Ways generating a playlist can fail. `Display` is the message sent to the caller.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Please provide input")]
    EmptyInput,

    #[error("Gemini AI did not return enough valid songs")]
    InsufficientSongs,

    #[error("Not enough songs found on Spotify")]
    InsufficientMatches,

    /// Anything the AI model or the catalog raised, reported verbatim
    #[error("{0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl GenerateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GenerateError::EmptyInput => StatusCode::BAD_REQUEST,
            GenerateError::InsufficientSongs
            | GenerateError::InsufficientMatches
            | GenerateError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            GenerateError::EmptyInput => {}
            GenerateError::Upstream(e) => error!("Playlist generation failed: {e:#}"),
            other => warn!("Playlist generation rejected: {other}"),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GenerateError::EmptyInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GenerateError::InsufficientSongs.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GenerateError::InsufficientMatches.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_message_is_verbatim() {
        let err = GenerateError::from(anyhow::anyhow!("HTTP 401: The access token expired"));
        assert_eq!(err.to_string(), "HTTP 401: The access token expired");
    }
}
