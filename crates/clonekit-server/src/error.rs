use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use clonekit_core::error::ClonekitError;

// ---------------------------------------------------------------------------
// Internal sentinels for explicit status codes
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP status through the `anyhow::Error` chain for
/// failures that have no `ClonekitError` counterpart.
#[derive(Debug)]
struct StatusError {
    status: StatusCode,
    message: String,
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StatusError {}

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn with_status(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(
            StatusError {
                status,
                message: msg.into(),
            }
            .into(),
        )
    }

    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    /// Construct a 409 Conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CONFLICT, msg)
    }

    /// Construct a 404 Not Found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    fn status(&self) -> StatusCode {
        if let Some(s) = self.0.downcast_ref::<StatusError>() {
            return s.status;
        }
        match self.0.downcast_ref::<ClonekitError>() {
            Some(e) => match e {
                ClonekitError::RunNotFound(_)
                | ClonekitError::BinaryNotFound(_)
                | ClonekitError::LogNotFound(_) => StatusCode::NOT_FOUND,
                ClonekitError::InvalidFolder(_)
                | ClonekitError::InvalidLogName(_)
                | ClonekitError::MissingField(_)
                | ClonekitError::InvalidPlatform(_) => StatusCode::BAD_REQUEST,
                ClonekitError::RunActive(_) => StatusCode::CONFLICT,
                ClonekitError::UnknownPlatform(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ClonekitError::InvalidConfig(_)
                | ClonekitError::Io(_)
                | ClonekitError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ClonekitError) -> StatusCode {
        AppError(err.into()).into_response().status()
    }

    #[test]
    fn run_not_found_maps_to_404() {
        assert_eq!(
            status_of(ClonekitError::RunNotFound("r1".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn binary_not_found_maps_to_404() {
        assert_eq!(
            status_of(ClonekitError::BinaryNotFound("r1/app.apk".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn log_not_found_maps_to_404() {
        assert_eq!(
            status_of(ClonekitError::LogNotFound("r1".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn invalid_folder_maps_to_400() {
        assert_eq!(
            status_of(ClonekitError::InvalidFolder("../etc".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_field_maps_to_400() {
        assert_eq!(
            status_of(ClonekitError::MissingField("appName".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn run_active_maps_to_409() {
        assert_eq!(
            status_of(ClonekitError::RunActive("r1".into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn unknown_platform_maps_to_422() {
        assert_eq!(
            status_of(ClonekitError::UnknownPlatform("r1".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn io_error_maps_to_500() {
        let io_err = std::io::Error::other("disk full");
        assert_eq!(
            status_of(ClonekitError::Io(io_err)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn non_core_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn explicit_constructors_carry_their_status() {
        assert_eq!(
            AppError::conflict("busy").into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::not_found("gone").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::bad_request("bad").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn response_body_is_json() {
        let response = AppError(ClonekitError::RunNotFound("r1".into()).into()).into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(
            ct.to_str().unwrap().contains("application/json"),
            "expected JSON content type, got {:?}",
            ct
        );
    }
}
