use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use idsweep_core::Error;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// JSON API error wrapper: validation errors are the caller's fault (400),
/// everything else is a server-side failure (500).
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %self.0, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_map_to_400() {
        let resp = ApiError(Error::InvalidId("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError(Error::HttpError("boom".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
