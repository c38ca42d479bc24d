//! Per-request side-channel values for interceptors.
//!
//! # Design Decisions
//! - Tokens are keyed by a process-unique id, so two tokens with the same
//!   label never collide
//! - The context is shared by every clone of the request it was created for;
//!   a value set by one interceptor is visible downstream
//! - Defaults are materialized lazily on first `get` and then cached

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Typed key into an `HttpContext`.
pub struct HttpContextToken<T> {
    id: u64,
    label: &'static str,
    default: fn() -> T,
    _marker: PhantomData<fn() -> T>,
}

impl<T> HttpContextToken<T> {
    pub fn new(label: &'static str, default: fn() -> T) -> Self {
        Self {
            id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
            label,
            default,
            _marker: PhantomData,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl<T> fmt::Debug for HttpContextToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpContextToken")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

impl<T> PartialEq for HttpContextToken<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for HttpContextToken<T> {}

type Slot = Box<dyn Any + Send + Sync>;

/// Interior-mutable map of context tokens to values.
#[derive(Clone, Default)]
pub struct HttpContext {
    values: Arc<Mutex<HashMap<u64, Slot>>>,
}

impl HttpContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `token`. Returns `self` for chaining.
    pub fn set<T>(&self, token: &HttpContextToken<T>, value: T) -> &Self
    where
        T: Send + Sync + 'static,
    {
        self.lock().insert(token.id, Box::new(value));
        self
    }

    /// Value stored under `token`, or its default (which is then stored).
    pub fn get<T>(&self, token: &HttpContextToken<T>) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut values = self.lock();
        if let Some(value) = values.get(&token.id).and_then(|v| v.downcast_ref::<T>()) {
            return value.clone();
        }
        let value = (token.default)();
        values.insert(token.id, Box::new(value.clone()));
        value
    }

    pub fn has<T>(&self, token: &HttpContextToken<T>) -> bool {
        self.lock().contains_key(&token.id)
    }

    pub fn delete<T>(&self, token: &HttpContextToken<T>) -> &Self {
        self.lock().remove(&token.id);
        self
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Slot>> {
        // A poisoned map still holds consistent entries; keep using it.
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for HttpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpContext")
            .field("len", &self.len())
            .finish()
    }
}
