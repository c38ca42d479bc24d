//! Backend and interceptor wiring.
//!
//! # Data Flow
//! ```text
//! ClientConfig ──→ HttpSetup::from_config ──┐
//! HttpSetup::global (default) ──────────────┤
//!                                           ├─→ with_features([...])
//!                                           └─→ build_handler() → InterceptorHandler
//! ```
//!
//! # Design Decisions
//! - The process-wide setup is created once, on first use; `install` can
//!   replace the default only before that
//! - Features apply in order: a later backend replaces an earlier one,
//!   interceptor lists concatenate
//! - Clients get a copy of the setup; changing one never affects another

mod feature;

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::backend::{HttpBackend, HttpHandler, HyperBackend};
use crate::config::ClientConfig;
use crate::http::{HttpHeaders, HttpResult};
use crate::interceptor::{
    default_headers_interceptor, legacy_interceptor_fn, logging_interceptor,
    request_id_interceptor, retry_interceptor, xsrf_interceptor, InterceptorFn,
    InterceptorHandler,
};

pub use feature::{
    with_backend, with_hyper, with_interceptors, with_legacy_interceptors, with_xsrf_protection,
    HttpFeature, HttpFeatureKind,
};

static GLOBAL: OnceLock<HttpSetup> = OnceLock::new();

/// Backend plus the ordered interceptor list a client is built from.
#[derive(Clone)]
pub struct HttpSetup {
    backend: Arc<dyn HttpBackend>,
    interceptors: Vec<InterceptorFn>,
}

impl HttpSetup {
    pub fn new(backend: Arc<dyn HttpBackend>) -> Self {
        Self {
            backend,
            interceptors: Vec::new(),
        }
    }

    /// Network backend plus the interceptors `config` enables.
    ///
    /// Order: default headers, request id, logging, retry (closest to the
    /// backend, so logging sees the outcome after retries).
    pub fn from_config(config: &ClientConfig) -> HttpResult<Self> {
        let mut setup = Self::new(Arc::new(HyperBackend::from_config(config)?));

        if !config.default_headers.is_empty() {
            let defaults: HttpHeaders = config.default_headers.iter().collect();
            setup.interceptors.push(default_headers_interceptor(defaults));
        }
        if config.request_id.enabled {
            setup
                .interceptors
                .push(request_id_interceptor(config.request_id.header_name.clone()));
        }
        setup
            .interceptors
            .push(logging_interceptor(config.observability.metrics_enabled));
        if config.retries.enabled {
            setup.interceptors.push(retry_interceptor(config.retries.clone()));
        }

        tracing::debug!(
            base_url = ?config.base_url,
            interceptors = setup.interceptors.len(),
            "Client setup created from config"
        );
        Ok(setup)
    }

    /// Process-wide default: the network backend, no interceptors.
    pub fn global() -> &'static HttpSetup {
        GLOBAL.get_or_init(|| HttpSetup::new(Arc::new(HyperBackend::new())))
    }

    /// Make `self` the process-wide default. Fails once `global` was used.
    pub fn install(self) -> Result<(), HttpSetup> {
        GLOBAL.set(self)
    }

    pub fn apply(&mut self, feature: HttpFeature) {
        tracing::trace!(kind = ?feature.kind(), "Applying client feature");
        match feature {
            HttpFeature::Backend(backend) => self.backend = backend,
            HttpFeature::Interceptors(list) => self.interceptors.extend(list),
            HttpFeature::LegacyInterceptors(list) => {
                self.interceptors.push(legacy_interceptor_fn(list))
            }
            HttpFeature::XsrfProtection(options) => {
                self.interceptors.push(xsrf_interceptor(options))
            }
        }
    }

    pub fn with_features(mut self, features: impl IntoIterator<Item = HttpFeature>) -> Self {
        for feature in features {
            self.apply(feature);
        }
        self
    }

    pub fn backend(&self) -> &Arc<dyn HttpBackend> {
        &self.backend
    }

    pub fn interceptors(&self) -> &[InterceptorFn] {
        &self.interceptors
    }

    /// Handler running this setup's interceptors in front of its backend.
    pub fn build_handler(&self) -> InterceptorHandler {
        let backend: Arc<dyn HttpHandler> = Arc::new(self.backend.clone());
        InterceptorHandler::new(backend, self.interceptors.clone())
    }
}

impl fmt::Debug for HttpSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSetup")
            .field("backend", &self.backend.name())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
