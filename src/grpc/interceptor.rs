//! Unary call interceptor recording request, duration and error metrics.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tonic::{Code, Request, Response, Status};
use tracing::debug;

use super::status::code_label;
use crate::metrics::MetricsRecorder;

/// Information about the unary call being intercepted.
#[derive(Debug, Clone)]
pub struct UnaryCallInfo {
    /// Full method name, e.g. `/hipstershop.CheckoutService/PlaceOrder`.
    pub full_method: String,
}

impl UnaryCallInfo {
    pub fn new(full_method: impl Into<String>) -> Self {
        UnaryCallInfo {
            full_method: full_method.into(),
        }
    }
}

/// Wraps unary handlers with request metrics.
///
/// The interceptor only observes: the handler runs exactly once and its
/// response or status is handed back untouched.
#[derive(Clone)]
pub struct UnaryInterceptor<R> {
    service: Arc<str>,
    recorder: R,
}

impl<R: MetricsRecorder> UnaryInterceptor<R> {
    pub fn new(service: impl Into<Arc<str>>, recorder: R) -> Self {
        UnaryInterceptor {
            service: service.into(),
            recorder,
        }
    }

    /// Runs `handler` with `request` and records the outcome of the call.
    pub async fn intercept<Req, Res, H, Fut>(
        &self,
        request: Request<Req>,
        info: &UnaryCallInfo,
        handler: H,
    ) -> Result<Response<Res>, Status>
    where
        H: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Res>, Status>>,
    {
        let start = Instant::now();
        let result = handler(request).await;

        let code = match &result {
            Ok(_) => Code::Ok,
            Err(status) => status.code(),
        };
        record_call(
            &self.recorder,
            &self.service,
            &info.full_method,
            code,
            result.is_err(),
            start,
        );

        result
    }
}

/// Records one finished call. `failed` marks calls whose handler returned an
/// error, which are also counted in the error family.
pub(crate) fn record_call<R: MetricsRecorder>(
    recorder: &R,
    service: &str,
    method: &str,
    code: Code,
    failed: bool,
    start: Instant,
) {
    let duration = start.elapsed().as_secs_f64();
    let status_code = code_label(code);

    if failed {
        recorder.record_grpc_error(service, method, status_code);
    }
    recorder.record_grpc_request(service, method, status_code);
    recorder.record_grpc_duration(service, method, duration);

    debug!(
        service = service,
        method = method,
        status_code = status_code,
        duration_secs = duration,
        "gRPC call finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingRecorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingRecorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl MetricsRecorder for RecordingRecorder {
        fn record_grpc_request(&self, service: &str, method: &str, status_code: &str) {
            self.push(format!("request {service} {method} {status_code}"));
        }

        fn record_grpc_duration(&self, service: &str, method: &str, duration_secs: f64) {
            assert!(duration_secs >= 0.0);
            self.push(format!("duration {service} {method}"));
        }

        fn record_grpc_error(&self, service: &str, method: &str, error_code: &str) {
            self.push(format!("error {service} {method} {error_code}"));
        }

        fn record_http_request(&self, _: &str, _: &str, _: &str, _: &str) {}
        fn record_http_duration(&self, _: &str, _: &str, _: &str, _: f64) {}
        fn record_http_request_size(&self, _: &str, _: &str, _: &str, _: f64) {}
        fn record_http_response_size(&self, _: &str, _: &str, _: &str, _: f64) {}
    }

    #[tokio::test]
    async fn success_records_request_and_duration_only() {
        let recorder = RecordingRecorder::default();
        let interceptor = UnaryInterceptor::new("checkoutservice", recorder.clone());
        let info = UnaryCallInfo::new("/shop.Checkout/PlaceOrder");

        let response = interceptor
            .intercept(Request::new(21u32), &info, |req| async move {
                Ok(Response::new(req.into_inner() * 2))
            })
            .await
            .unwrap();

        assert_eq!(response.into_inner(), 42);
        assert_eq!(
            recorder.events(),
            vec![
                "request checkoutservice /shop.Checkout/PlaceOrder OK",
                "duration checkoutservice /shop.Checkout/PlaceOrder",
            ]
        );
    }

    #[tokio::test]
    async fn error_is_returned_unchanged_and_counted() {
        let recorder = RecordingRecorder::default();
        let interceptor = UnaryInterceptor::new("checkoutservice", recorder.clone());
        let info = UnaryCallInfo::new("/shop.Checkout/PlaceOrder");

        let status = interceptor
            .intercept(Request::new(()), &info, |_req| async {
                Err::<Response<()>, _>(Status::failed_precondition("cart is empty"))
            })
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::FailedPrecondition);
        assert_eq!(status.message(), "cart is empty");
        assert_eq!(
            recorder.events(),
            vec![
                "error checkoutservice /shop.Checkout/PlaceOrder FAILED_PRECONDITION",
                "request checkoutservice /shop.Checkout/PlaceOrder FAILED_PRECONDITION",
                "duration checkoutservice /shop.Checkout/PlaceOrder",
            ]
        );
    }

    #[tokio::test]
    async fn handler_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let interceptor = UnaryInterceptor::new("svc", RecordingRecorder::default());
        let info = UnaryCallInfo::new("/svc.S/M");

        let counter = calls.clone();
        let _ = interceptor
            .intercept(Request::new(()), &info, move |_req| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<Response<()>, _>(Status::unavailable("down"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
