use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced at the route boundary.
///
/// Three distinct failure classes, each with its own status code and
/// Turkish user-facing message:
/// - unknown city (resolution failed, discovery exhausted) -> 404
/// - no data (page fetched but no recognizable prayer-time fields) -> 404
/// - upstream failure (retry budget exhausted) -> 500
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bu il desteklenmiyor")]
    UnknownCity { requested: String },

    #[error("Bu şehir için namaz vakti bulunamadı")]
    NoData { city: String },

    #[error("Namaz vakitleri alınamadı")]
    Upstream {
        city: String,
        #[source]
        source: reqwest::Error,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::UnknownCity { requested } => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "success": false,
                    "message": "Bu il desteklenmiyor",
                    "requestedCity": requested,
                    "hint": "Desteklenen illeri görmek için /cities endpoint'ini kullanın",
                })),
            )
                .into_response(),
            ApiError::NoData { city } => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "success": false,
                    "message": "Bu şehir için namaz vakti bulunamadı",
                    "city": city,
                })),
            )
                .into_response(),
            ApiError::Upstream { city, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Namaz vakitleri alınamadı",
                    "city": city,
                    "error": source.to_string(),
                })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_city_is_404() {
        let resp = ApiError::UnknownCity {
            requested: "atlantis".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn no_data_is_404() {
        let resp = ApiError::NoData {
            city: "atlantis".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
