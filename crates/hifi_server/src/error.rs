//! API Error Mapping
//!
//! Wraps `hifi_core::EngineError`, mapping each variant to the HTTP status
//! a client should see.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use hifi_core::EngineError;

pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::NotLoaded => StatusCode::BAD_REQUEST,
            EngineError::BadRequest(_) => StatusCode::BAD_REQUEST,
            EngineError::DecodeFailed(_) => StatusCode::BAD_REQUEST,
            EngineError::ResampleFailed(_) => StatusCode::BAD_REQUEST,
            EngineError::NoDevicesFound => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::DeviceNotFound(_) => StatusCode::BAD_REQUEST,
            EngineError::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Dsp(_) => StatusCode::BAD_REQUEST,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "status": "error",
            "error": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_not_loaded_maps_to_bad_request() {
        let response = ApiError(EngineError::NotLoaded).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_device_unavailable_maps_to_service_unavailable() {
        let response = ApiError(EngineError::DeviceUnavailable("busy".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_internal_maps_to_500() {
        let response = ApiError(EngineError::Internal("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
