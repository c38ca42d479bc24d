//! Default headers from configuration.

use crate::http::HttpHeaders;
use crate::interceptor::InterceptorFn;

/// Interceptor that adds each of `defaults` the request does not carry.
pub fn default_headers_interceptor(defaults: HttpHeaders) -> InterceptorFn {
    InterceptorFn::new(move |request, next| {
        let mut headers = request.headers().clone();
        let mut changed = false;
        for (name, values) in defaults.iter() {
            if !headers.has(name) {
                headers = headers.set_all(name, values.iter().cloned());
                changed = true;
            }
        }
        if changed {
            next.run(request.with_updated_headers(headers))
        } else {
            next.run(request)
        }
    })
}
