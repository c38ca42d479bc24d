//! Composable client features.

use std::fmt;
use std::sync::Arc;

use crate::backend::{HttpBackend, HyperBackend};
use crate::config::ClientConfig;
use crate::http::HttpResult;
use crate::interceptor::{HttpInterceptor, InterceptorFn, XsrfOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpFeatureKind {
    Backend,
    Interceptors,
    LegacyInterceptors,
    XsrfProtection,
}

/// One unit of client configuration.
#[derive(Clone)]
pub enum HttpFeature {
    /// Replace the backend.
    Backend(Arc<dyn HttpBackend>),
    /// Append functional interceptors.
    Interceptors(Vec<InterceptorFn>),
    /// Append legacy interceptors as one chain slot.
    LegacyInterceptors(Vec<Arc<dyn HttpInterceptor>>),
    /// Append the XSRF interceptor.
    XsrfProtection(XsrfOptions),
}

impl HttpFeature {
    pub fn kind(&self) -> HttpFeatureKind {
        match self {
            Self::Backend(_) => HttpFeatureKind::Backend,
            Self::Interceptors(_) => HttpFeatureKind::Interceptors,
            Self::LegacyInterceptors(_) => HttpFeatureKind::LegacyInterceptors,
            Self::XsrfProtection(_) => HttpFeatureKind::XsrfProtection,
        }
    }
}

impl fmt::Debug for HttpFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(backend) => f.debug_tuple("Backend").field(&backend.name()).finish(),
            Self::Interceptors(list) => f.debug_tuple("Interceptors").field(&list.len()).finish(),
            Self::LegacyInterceptors(list) => {
                f.debug_tuple("LegacyInterceptors").field(&list.len()).finish()
            }
            Self::XsrfProtection(options) => f.debug_tuple("XsrfProtection").field(options).finish(),
        }
    }
}

pub fn with_backend(backend: impl HttpBackend + 'static) -> HttpFeature {
    HttpFeature::Backend(Arc::new(backend))
}

/// Network backend configured from `config`.
pub fn with_hyper(config: &ClientConfig) -> HttpResult<HttpFeature> {
    Ok(with_backend(HyperBackend::from_config(config)?))
}

pub fn with_interceptors(interceptors: Vec<InterceptorFn>) -> HttpFeature {
    HttpFeature::Interceptors(interceptors)
}

pub fn with_legacy_interceptors(interceptors: Vec<Arc<dyn HttpInterceptor>>) -> HttpFeature {
    HttpFeature::LegacyInterceptors(interceptors)
}

pub fn with_xsrf_protection(options: XsrfOptions) -> HttpFeature {
    HttpFeature::XsrfProtection(options)
}
