use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("not signed in or session expired")]
    Unauthorized,

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ApiError {
    /// Map a non-success response to an error, using the body's `error` or
    /// `message` field when present.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: Option<String>,
            message: Option<String>,
        }

        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden { message },
            _ => ApiError::Status {
                status: status.as_u16(),
                message,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_field_becomes_message() {
        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"error": "Valid page number is required"}"#,
        );
        assert_eq!(err.to_string(), "Valid page number is required (HTTP 400)");
    }

    #[test]
    fn admin_gate_maps_to_forbidden() {
        let err = ApiError::from_status(
            StatusCode::FORBIDDEN,
            r#"{"message": "Admin access required!"}"#,
        );
        assert!(matches!(err, ApiError::Forbidden { ref message } if message == "Admin access required!"));
    }

    #[test]
    fn non_json_body_falls_back_to_reason() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, "<html>nope</html>");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not Found (HTTP 404)");
    }

    #[test]
    fn unauthorized_ignores_body() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"message": "Authorization token is missing!"}"#,
        );
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
