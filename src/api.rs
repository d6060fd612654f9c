use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::coordinator::{ExtractionResult, Extractor};
use crate::fetcher::parse_page_url;
use crate::relay::{ImageRelay, RelayError};

#[derive(Clone)]
pub struct AppState {
    pub extractor: Extractor,
    pub relay: ImageRelay,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExtractRequest {
    /// Absolute http(s) URL of a listing page.
    pub url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    fn bad_request(error: impl Into<String>) -> Response {
        let body = ErrorResponse {
            success: false,
            error: error.into(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RelayQuery {
    /// Image URL to relay.
    pub url: Option<String>,
}

/// Relay rejection body; `error` is the machine-readable reason code.
#[derive(Debug, Serialize, ToSchema)]
pub struct RelayRejection {
    pub error: String,
    pub message: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match self {
            RelayError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            RelayError::UntrustedHost(_)
            | RelayError::NotAnImageResource
            | RelayError::LooksLikeListingPage => StatusCode::FORBIDDEN,
            RelayError::UpstreamFetch { .. } => StatusCode::BAD_GATEWAY,
        };
        let body = RelayRejection {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/extract", post(extract))
        .route("/image-relay", get(image_relay))
        .route("/health", get(health))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/extract",
    tag = "extraction",
    request_body = ExtractRequest,
    responses(
        (status = 200, description = "Extraction attempted; inspect `success`", body = ExtractionResult),
        (status = 400, description = "Missing or malformed url", body = ErrorResponse)
    )
)]
pub async fn extract(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            tracing::info!(error = %rejection.body_text(), "rejected extract request body");
            return ErrorResponse::bad_request("request body must be JSON of the form {\"url\": \"...\"}");
        }
    };
    let url = match payload.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => return ErrorResponse::bad_request("url is required"),
    };
    if let Err(e) = parse_page_url(&url) {
        return ErrorResponse::bad_request(e.to_string());
    }

    let result = state.extractor.extract(&url).await;
    (StatusCode::OK, Json(result)).into_response()
}

#[utoipa::path(
    get,
    path = "/image-relay",
    tag = "images",
    params(RelayQuery),
    responses(
        (status = 200, description = "Image bytes with the upstream content type"),
        (status = 400, description = "invalid-url", body = RelayRejection),
        (status = 403, description = "untrusted-host, not-an-image-resource or looks-like-listing-page", body = RelayRejection),
        (status = 502, description = "upstream-fetch-failed", body = RelayRejection)
    )
)]
pub async fn image_relay(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RelayQuery>,
) -> Response {
    let raw = query.url.unwrap_or_default();
    match state.relay.resolve(&raw).await {
        Ok(image) => (
            [
                (header::CONTENT_TYPE, image.content_type),
                (header::CACHE_CONTROL, image.cache_control.to_string()),
            ],
            image.bytes,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_errors_map_to_status_codes() {
        let cases = [
            (RelayError::InvalidUrl("x".into()), StatusCode::BAD_REQUEST),
            (RelayError::UntrustedHost("evil.com".into()), StatusCode::FORBIDDEN),
            (RelayError::NotAnImageResource, StatusCode::FORBIDDEN),
            (RelayError::LooksLikeListingPage, StatusCode::FORBIDDEN),
            (RelayError::UpstreamFetch { status_code: Some(404) }, StatusCode::BAD_GATEWAY),
            (RelayError::UpstreamFetch { status_code: None }, StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
