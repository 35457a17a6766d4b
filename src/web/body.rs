//! Response body wrapper that counts the bytes written to the client.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use bytes::Bytes;
use http::StatusCode;
use http_body::{Frame, SizeHint};

use crate::metrics::MetricsRecorder;

/// Per-request record of an in-flight HTTP response.
///
/// Records the request count, duration and response size once, when it is
/// dropped.
pub(crate) struct ResponseTracker<R: MetricsRecorder> {
    pub(crate) recorder: R,
    pub(crate) service: Arc<str>,
    pub(crate) method: String,
    pub(crate) handler: String,
    pub(crate) status: StatusCode,
    pub(crate) start: Instant,
    pub(crate) bytes_written: u64,
}

impl<R: MetricsRecorder> Drop for ResponseTracker<R> {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        let status_code = self.status.as_str();

        self.recorder
            .record_http_request(&self.service, &self.method, &self.handler, status_code);
        self.recorder
            .record_http_duration(&self.service, &self.method, &self.handler, duration);
        self.recorder.record_http_response_size(
            &self.service,
            &self.method,
            &self.handler,
            self.bytes_written as f64,
        );
    }
}

/// Forwards every frame of the wrapped body unchanged while counting data bytes.
///
/// The tracker is released when the stream ends, errors, or the body is
/// dropped early, so each response is recorded exactly once.
pub struct MeteredBody<R: MetricsRecorder> {
    inner: Body,
    tracker: Option<ResponseTracker<R>>,
}

// No field is structurally pinned: `inner` is re-pinned with `Pin::new`.
impl<R: MetricsRecorder> Unpin for MeteredBody<R> {}

impl<R: MetricsRecorder> MeteredBody<R> {
    pub(crate) fn new(inner: Body, tracker: ResponseTracker<R>) -> Self {
        MeteredBody {
            inner,
            tracker: Some(tracker),
        }
    }
}

impl<R: MetricsRecorder> http_body::Body for MeteredBody<R> {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let (Some(data), Some(tracker)) = (frame.data_ref(), this.tracker.as_mut()) {
                    tracker.bytes_written += data.len() as u64;
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => {
                this.tracker.take();
            }
            Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
