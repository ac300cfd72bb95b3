//! The `{success, data, error}` envelope shared by all endpoints.

use serde::{Deserialize, Serialize};

/// Body of every API response.
///
/// ```json
/// {"success": true, "data": {"ok": true}, "error": null}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let ok = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": 1, "error": null}));

        let err = serde_json::to_value(ApiResponse::<()>::error("NOT_FOUND", "gone")).unwrap();
        assert_eq!(err["error"]["code"], "NOT_FOUND");
        assert!(err["data"].is_null());
    }
}
