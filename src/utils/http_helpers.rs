use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
#[derive(Debug)]
pub struct HTTPError {
    status: StatusCode,
    message: String,
}

impl HTTPError {
    /// Creates a new HTTP error with the given status code and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
        }
    }

    /// A 500 carrying `err`'s message.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        HTTPError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

/// Converts our `HTTPError` into an HTTP response.
impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message }).to_string();
        (
            self.status,
            [("Content-Type", "application/json")],
            body,
        )
            .into_response()
    }
}
