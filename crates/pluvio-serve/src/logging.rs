//! Request logging for the prediction service.
//!
//! Every request gets an `x-request-id` (taken from the caller or generated),
//! runs inside a span carrying it, and has its status and latency logged. The
//! id is echoed on the response.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::{HeaderValue, Request, Response};
use tower::{Layer, Service};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLoggerLayer;

impl<S> Layer<S> for RequestLoggerLayer {
    type Service = RequestLogger<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogger { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestLogger<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestLogger<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);
        let header = HeaderValue::from_str(&request_id).ok();
        if let Some(value) = &header {
            request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
        }

        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let span = tracing::info_span!("request", request_id = %request_id, method = %method, path = %path);
        let started = Instant::now();

        let future = self.inner.call(request);
        Box::pin(
            async move {
                let mut result = future.await;
                let elapsed_ms = started.elapsed().as_millis();
                match &mut result {
                    Ok(response) => {
                        if let Some(value) = header {
                            response.headers_mut().insert(REQUEST_ID_HEADER, value);
                        }
                        let status = response.status();
                        if status.is_server_error() {
                            warn!(status = status.as_u16(), elapsed_ms, "Request failed");
                        } else {
                            info!(status = status.as_u16(), elapsed_ms, "Request completed");
                        }
                    }
                    Err(_) => warn!(elapsed_ms, "Request errored before a response"),
                }
                result
            }
            .instrument(span),
        )
    }
}
