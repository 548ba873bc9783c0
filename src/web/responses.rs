//! HTTP response helpers
//!
//! Successful renders are raw PNG bodies. Every failure is a plain-text body of
//! the form `"<status code>: <message>"`.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::errors::AppError;
use crate::render::PNG_CONTENT_TYPE;
use crate::services::RenderOutcome;

/// Header reporting whether the image came from the cache
pub const CACHE_STATUS_HEADER: &str = "x-cache";

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Build the 200 response for a served render
pub fn png_response(outcome: RenderOutcome) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(PNG_CONTENT_TYPE)),
            (
                header::HeaderName::from_static(CACHE_STATUS_HEADER),
                HeaderValue::from_static(outcome.cache_status.as_str()),
            ),
        ],
        Body::from(outcome.png),
    )
        .into_response()
}

/// Plain-text error response, `"<code>: <message>"`
pub fn text_error(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
        format!("{}: {}", status.as_u16(), message),
    )
        .into_response()
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> Response {
    let status = if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        error!("Render request failed: {}", error);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    text_error(status, error)
}
