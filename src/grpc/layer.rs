//! Tower middleware applying the call metrics to a tonic server.
//!
//! ```ignore
//! Server::builder()
//!     .layer(GrpcMetricsLayer::new("checkoutservice", Metrics::global().clone()))
//!     .add_service(my_service)
//!     .serve(addr)
//!     .await?;
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use http::{Request, Response};
use tower::{BoxError, Layer, Service};

use super::body::{CallTracker, GrpcMetricsBody};
use super::interceptor::record_call;
use super::status::{classify_error, code_from_headers};
use crate::metrics::MetricsRecorder;

/// Layer producing [`GrpcMetrics`] services.
#[derive(Clone)]
pub struct GrpcMetricsLayer<R> {
    service: Arc<str>,
    recorder: R,
}

impl<R: MetricsRecorder> GrpcMetricsLayer<R> {
    pub fn new(service: impl Into<Arc<str>>, recorder: R) -> Self {
        GrpcMetricsLayer {
            service: service.into(),
            recorder,
        }
    }
}

impl<S, R: Clone> Layer<S> for GrpcMetricsLayer<R> {
    type Service = GrpcMetrics<S, R>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcMetrics {
            inner,
            service: self.service.clone(),
            recorder: self.recorder.clone(),
        }
    }
}

/// Records the outcome of every call routed through the inner service.
///
/// The method label is the request path (`/package.Service/Method`). The
/// call is recorded when its response body finishes or is dropped, so a
/// streaming response counts once its stream is over and the duration covers
/// the whole call. The outcome is the `grpc-status` trailer, or the header of
/// a trailers-only response. Errors from the inner service itself are
/// classified from their source chain and recorded immediately.
#[derive(Clone)]
pub struct GrpcMetrics<S, R> {
    inner: S,
    service: Arc<str>,
    recorder: R,
}

impl<S, R, ReqBody, ResBody> Service<Request<ReqBody>> for GrpcMetrics<S, R>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    R: MetricsRecorder,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<GrpcMetricsBody<ResBody, R>>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // The clone is not guaranteed ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let service = self.service.clone();
        let recorder = self.recorder.clone();
        let method = request.uri().path().to_string();

        Box::pin(async move {
            let start = Instant::now();
            match inner.call(request).await.map_err(Into::into) {
                Ok(response) => {
                    let tracker = CallTracker {
                        recorder,
                        service,
                        method,
                        start,
                        code: code_from_headers(response.headers()),
                        ended: false,
                    };
                    Ok(response.map(|body| GrpcMetricsBody::new(body, tracker)))
                }
                Err(err) => {
                    record_call(&recorder, &service, &method, classify_error(&*err), true, start);
                    Err(err)
                }
            }
        })
    }
}
