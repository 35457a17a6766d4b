//! Response body wrapper that records a gRPC call once its stream ends.

use std::error::Error;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use http_body::{Frame, SizeHint};
use tonic::Code;

use super::interceptor::record_call;
use super::status::{classify_error, code_from_headers};
use crate::metrics::MetricsRecorder;

/// Outcome of one call routed through [`super::GrpcMetrics`].
///
/// Records when dropped. The code is the `grpc-status` of the trailers, or of
/// the header of a trailers-only response. A stream that ended without one is
/// `OK`; one dropped before its end was abandoned by the client and is
/// `CANCELLED`.
pub(crate) struct CallTracker<R: MetricsRecorder> {
    pub(crate) recorder: R,
    pub(crate) service: Arc<str>,
    pub(crate) method: String,
    pub(crate) start: Instant,
    pub(crate) code: Option<Code>,
    pub(crate) ended: bool,
}

impl<R: MetricsRecorder> Drop for CallTracker<R> {
    fn drop(&mut self) {
        let code = match (self.code, self.ended) {
            (Some(code), _) => code,
            (None, true) => Code::Ok,
            (None, false) => Code::Cancelled,
        };
        record_call(
            &self.recorder,
            &self.service,
            &self.method,
            code,
            code != Code::Ok,
            self.start,
        );
    }
}

/// Forwards every frame of a gRPC response unchanged and records the call
/// when the stream finishes, fails, or is dropped.
pub struct GrpcMetricsBody<B, R: MetricsRecorder> {
    inner: B,
    tracker: Option<CallTracker<R>>,
}

// No field is structurally pinned: `inner` is re-pinned with `Pin::new`.
impl<B: Unpin, R: MetricsRecorder> Unpin for GrpcMetricsBody<B, R> {}

impl<B, R: MetricsRecorder> fmt::Debug for GrpcMetricsBody<B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcMetricsBody").finish_non_exhaustive()
    }
}

impl<B, R: MetricsRecorder> GrpcMetricsBody<B, R> {
    pub(crate) fn new(inner: B, tracker: CallTracker<R>) -> Self {
        GrpcMetricsBody {
            inner,
            tracker: Some(tracker),
        }
    }
}

impl<B, R> http_body::Body for GrpcMetricsBody<B, R>
where
    B: http_body::Body + Unpin,
    B::Error: Error + 'static,
    R: MetricsRecorder,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            // Trailers close the call; record before they reach the client.
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(trailers) = frame.trailers_ref() {
                    if let Some(mut tracker) = this.tracker.take() {
                        tracker.code = code_from_headers(trailers).or(tracker.code);
                        tracker.ended = true;
                    }
                }
            }
            Poll::Ready(Some(Err(err))) => {
                if let Some(mut tracker) = this.tracker.take() {
                    tracker.code = Some(classify_error(err));
                    tracker.ended = true;
                }
            }
            Poll::Ready(None) => {
                if let Some(mut tracker) = this.tracker.take() {
                    tracker.ended = true;
                }
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
