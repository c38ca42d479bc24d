//! Request ID propagation.
//!
//! Every outgoing request carries a UUID v4 correlation id unless the caller
//! already set one.

use uuid::Uuid;

use crate::interceptor::InterceptorFn;

/// Conventional request id header.
pub const X_REQUEST_ID: &str = "X-Request-ID";

/// Interceptor that sets `header` to a fresh UUID when absent.
pub fn request_id_interceptor(header: impl Into<String>) -> InterceptorFn {
    let header = header.into();
    InterceptorFn::new(move |request, next| {
        if request.headers().has(&header) {
            return next.run(request);
        }
        let id = Uuid::new_v4().to_string();
        tracing::trace!(request_id = %id, url = %request.url(), "Assigned request id");
        let headers = request.headers().set(&header, id);
        next.run(request.with_updated_headers(headers))
    })
}
