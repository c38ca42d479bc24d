//! XSRF token propagation.
//!
//! # Responsibilities
//! - Read the XSRF token from a cookie string
//! - Attach it as a header to mutating, same-origin requests
//!
//! # Design Decisions
//! - GET and HEAD are never touched
//! - Absolute `http://` / `https://` URLs are treated as cross-origin and skipped
//! - A header already set on the request wins
//! - Cookie parsing is cached against the last cookie string seen

use std::fmt;
use std::sync::{Arc, Mutex};

use percent_encoding::percent_decode_str;

use crate::config::XsrfConfig;
use crate::http::HttpMethod;
use crate::interceptor::InterceptorFn;

/// Source of the current XSRF token.
pub trait XsrfTokenExtractor: Send + Sync {
    fn token(&self) -> Option<String>;
}

type CookieSource = dyn Fn() -> String + Send + Sync;

#[derive(Default)]
struct CookieCache {
    last_cookie: Option<String>,
    token: Option<String>,
    parse_count: usize,
}

/// Extracts the token from a `name=value; other=value` cookie string.
pub struct CookieTokenExtractor {
    cookie_name: String,
    source: Arc<CookieSource>,
    cache: Mutex<CookieCache>,
}

impl CookieTokenExtractor {
    pub fn new<F>(cookie_name: impl Into<String>, source: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            cookie_name: cookie_name.into(),
            source: Arc::new(source),
            cache: Mutex::new(CookieCache::default()),
        }
    }

    /// Number of times the cookie string was actually parsed.
    pub fn parse_count(&self) -> usize {
        self.cache
            .lock()
            .map(|cache| cache.parse_count)
            .unwrap_or_default()
    }
}

impl XsrfTokenExtractor for CookieTokenExtractor {
    fn token(&self) -> Option<String> {
        let cookies = (self.source)();
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if cache.last_cookie.as_deref() != Some(cookies.as_str()) {
            cache.parse_count += 1;
            cache.token = parse_cookie_value(&cookies, &self.cookie_name);
            cache.last_cookie = Some(cookies);
        }
        cache.token.clone()
    }
}

impl fmt::Debug for CookieTokenExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieTokenExtractor")
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

/// Value of cookie `name` in `cookies`, percent-decoded.
pub fn parse_cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name)
            .then(|| percent_decode_str(value.trim()).decode_utf8_lossy().into_owned())
    })
}

/// Settings for `xsrf_interceptor`.
#[derive(Clone)]
pub struct XsrfOptions {
    pub header_name: String,
    pub extractor: Arc<dyn XsrfTokenExtractor>,
}

impl XsrfOptions {
    /// Options reading `config.cookie_name` from `cookies`.
    pub fn from_config<F>(config: &XsrfConfig, cookies: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            header_name: config.header_name.clone(),
            extractor: Arc::new(CookieTokenExtractor::new(config.cookie_name.clone(), cookies)),
        }
    }
}

impl fmt::Debug for XsrfOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XsrfOptions")
            .field("header_name", &self.header_name)
            .finish()
    }
}

fn is_absolute(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Interceptor that attaches the XSRF token header.
pub fn xsrf_interceptor(options: XsrfOptions) -> InterceptorFn {
    InterceptorFn::new(move |request, next| {
        if matches!(request.method(), HttpMethod::Get | HttpMethod::Head)
            || is_absolute(request.url())
        {
            return next.run(request);
        }

        match options.extractor.token() {
            Some(token) if !request.headers().has(&options.header_name) => {
                tracing::trace!(header = %options.header_name, "Attaching XSRF token");
                let headers = request.headers().set(&options.header_name, token);
                next.run(request.with_updated_headers(headers))
            }
            _ => next.run(request),
        }
    })
}
