//! Error channel for request streams.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::http::response::HttpErrorResponse;

/// Errors delivered on a request's event stream or returned from `handle`.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// Non-2xx response, undecodable 2xx body, or transport failure (status 0).
    #[error("{0}")]
    Response(Box<HttpErrorResponse>),

    /// Failure raised by an interceptor.
    #[error("Interceptor error: {0}")]
    Interceptor(Arc<dyn StdError + Send + Sync>),

    /// The backend cannot issue this kind of request.
    #[error("{feature} is not supported by the {backend} backend")]
    Unsupported {
        feature: String,
        backend: &'static str,
    },

    /// The request cannot be encoded for the wire.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The stream completed without a terminal response.
    #[error("Request completed without a response")]
    NoResponse,
}

/// Result type for handler operations.
pub type HttpResult<T> = Result<T, HttpError>;

impl HttpError {
    /// Wrap an arbitrary error raised inside an interceptor.
    pub fn interceptor<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Interceptor(Arc::new(error))
    }

    pub fn as_response(&self) -> Option<&HttpErrorResponse> {
        match self {
            Self::Response(response) => Some(response),
            _ => None,
        }
    }

    /// Status of the failed response, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        self.as_response().map(|response| response.status)
    }
}

impl From<HttpErrorResponse> for HttpError {
    fn from(response: HttpErrorResponse) -> Self {
        Self::Response(Box::new(response))
    }
}
