//! Render endpoint

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::Response,
};

use crate::utils::validation::RawRenderParams;
use crate::web::{
    AppState,
    responses::{handle_error, png_response, text_error},
};

/// `GET /?x=<f64>&y=<f64>&zoom=<u64>&res=<small|medium|big|ultra>`
///
/// Responds with the PNG, or `400: <message>` when a parameter is invalid.
/// Requests beyond the admission ceiling wait here for a free slot.
pub async fn render_image(
    State(state): State<AppState>,
    query: Result<Query<RawRenderParams>, QueryRejection>,
) -> Response {
    let Query(raw) = match query {
        Ok(query) => query,
        Err(rejection) => return text_error(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match state.render_service.handle(raw).await {
        Ok(outcome) => png_response(outcome),
        Err(e) => handle_error(e),
    }
}
