//! HTTP middleware

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{Instrument, error, info, info_span, warn};

use super::responses::CACHE_STATUS_HEADER;
use crate::utils::human_format::format_elapsed;

/// Request logging middleware
///
/// Everything logged while a request is handled, down to the cache and the
/// heavy worker, runs inside an `http` span carrying a fresh request id and
/// the requested `res` tier. The completion line adds status, elapsed time
/// and whether the image was a cache `HIT` or `MISS`.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let path = request.uri().path().to_owned();
    let tier = request
        .uri()
        .query()
        .and_then(|query| query_value(query, "res"))
        .unwrap_or("-")
        .to_owned();

    let span = info_span!("http", %request_id, %path, res = %tier);

    async move {
        let start = Instant::now();
        let response = next.run(request).await;

        let status = response.status();
        let cache = response
            .headers()
            .get(CACHE_STATUS_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        let elapsed = format_elapsed(start.elapsed());

        if status.is_server_error() {
            error!(status = status.as_u16(), %elapsed, "Request failed");
        } else if status.is_client_error() {
            warn!(status = status.as_u16(), %elapsed, "Request rejected");
        } else {
            info!(status = status.as_u16(), %elapsed, %cache, "Request served");
        }

        response
    }
    .instrument(span)
    .await
}

/// First value of `key` in a raw query string, undecoded
fn query_value<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find_map(|(k, v)| (k == key).then_some(v))
}
