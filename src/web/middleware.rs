//! axum middleware recording request metrics for every route.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use http::header::CONTENT_LENGTH;
use http::HeaderMap;
use tracing::warn;

use super::body::{MeteredBody, ResponseTracker};
use crate::metrics::MetricsRecorder;
use crate::utils::log_throttle::should_emit;

const UNMATCHED_ROUTE_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// State handed to [`track_metrics`]: the `service` label and where to record.
#[derive(Clone)]
pub struct HttpMetricsState<R> {
    service: Arc<str>,
    recorder: R,
}

impl<R: MetricsRecorder> HttpMetricsState<R> {
    pub fn new(service: impl Into<Arc<str>>, recorder: R) -> Self {
        HttpMetricsState {
            service: service.into(),
            recorder,
        }
    }
}

/// Wraps every route (and fallback) currently in `router` with [`track_metrics`].
///
/// Routes added after this call are not instrumented.
pub fn instrument_router<S, R>(router: Router<S>, state: HttpMetricsState<R>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    R: MetricsRecorder,
{
    router.layer(middleware::from_fn_with_state(state, track_metrics::<R>))
}

/// Records size, duration and outcome of one HTTP request.
///
/// The request size is observed before the handler runs, and only when the
/// request declares a positive `Content-Length`. The response body is wrapped
/// in a [`MeteredBody`], which records the request count, duration and bytes
/// written once the body has been sent.
pub async fn track_metrics<R: MetricsRecorder>(
    State(state): State<HttpMetricsState<R>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().as_str().to_string();
    let handler = handler_label(&request);

    if let Some(size) = content_length(request.headers()) {
        state
            .recorder
            .record_http_request_size(&state.service, &method, &handler, size as f64);
    }

    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let tracker = ResponseTracker {
        recorder: state.recorder,
        service: state.service,
        method,
        handler,
        status: parts.status,
        start,
        bytes_written: 0,
    };
    Response::from_parts(parts, Body::new(MeteredBody::new(body, tracker)))
}

/// The route template the request matched, or its raw path when no route matched.
///
/// Raw paths are unbounded label values; a throttled warning marks each occurrence.
pub fn handler_label(request: &Request) -> String {
    if let Some(matched) = request.extensions().get::<MatchedPath>() {
        return matched.as_str().to_string();
    }

    let path = request.uri().path();
    if let Some(suppressed) = should_emit("http.unmatched_route", UNMATCHED_ROUTE_LOG_INTERVAL) {
        warn!(
            path = path,
            suppressed = suppressed,
            "Request matched no route template; labelling metrics with the raw path"
        );
    }
    path.to_string()
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|len| *len > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn content_length_must_be_positive() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), None);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        assert_eq!(content_length(&headers), None);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1024"));
        assert_eq!(content_length(&headers), Some(1024));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(content_length(&headers), None);
    }

    #[test]
    fn unmatched_request_uses_raw_path() {
        let request = Request::builder()
            .uri("/product/OLJCESPC7Z?currency=EUR")
            .body(Body::empty())
            .unwrap();
        assert_eq!(handler_label(&request), "/product/OLJCESPC7Z");
    }
}
