use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    TokenNotProvided,
    InvalidToken,
    UserNoLongerExist,
    UserNotAuthenticated,
    PermissionDenied,
}

impl ErrorMessage {
    fn to_str(&self) -> String {
        match self {
            ErrorMessage::TokenNotProvided => "You are not logged in, please provide a token".to_string(),
            ErrorMessage::InvalidToken => "Authentication token is invalid or expired".to_string(),
            ErrorMessage::UserNoLongerExist => "User belonging to this token no longer exists".to_string(),
            ErrorMessage::UserNotAuthenticated => "Authentication required, please log in".to_string(),
            ErrorMessage::PermissionDenied => "You are not allowed to perform this action".to_string(),
        }
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

/// Error envelope returned on every failure path:
/// `{"success": false, "message": ..., "code": ...}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
    pub code: &'static str,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode, code: &'static str) -> Self {
        HttpError {
            message: message.into(),
            status,
            code,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::FORBIDDEN, "FORBIDDEN")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::NOT_FOUND, "NOT_FOUND")
    }

    pub fn conflict(message: impl Into<String>, code: &'static str) -> Self {
        HttpError::new(message, StatusCode::CONFLICT, code)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR")
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HttpError: message: {}, status: {}", self.message, self.status)
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorResponse {
            success: false,
            message: self.message,
            code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_status_and_code() {
        let err = HttpError::forbidden("nope");
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "FORBIDDEN");

        let err = HttpError::conflict("state moved", "INVALID_TRANSITION");
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "INVALID_TRANSITION");
    }

    #[test]
    fn envelope_shape() {
        let body = ErrorResponse {
            success: false,
            message: "m".to_string(),
            code: "NOT_FOUND".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "NOT_FOUND");
    }
}
