//! URL query parameters.
//!
//! # Design Decisions
//! - Same immutable, multi-valued shape as `HttpHeaders`, but keys are
//!   case-sensitive
//! - Encoding is pluggable through `ParamCodec`; the default keeps
//!   `@ : $ , ; + = ? /` readable in the query string
//! - Serialization follows key insertion order

use std::fmt;
use std::sync::Arc;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped by the standard codec: everything `encodeURIComponent`
/// escapes, minus the reserved characters that stay readable in a query.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'@')
    .remove(b':')
    .remove(b'$')
    .remove(b',')
    .remove(b';')
    .remove(b'+')
    .remove(b'=')
    .remove(b'?')
    .remove(b'/');

/// Encodes and decodes query parameter keys and values.
pub trait ParamCodec: Send + Sync + fmt::Debug {
    fn encode_key(&self, key: &str) -> String;
    fn encode_value(&self, value: &str) -> String;
    fn decode_key(&self, key: &str) -> String;
    fn decode_value(&self, value: &str) -> String;
}

/// Percent-encoding codec used unless another one is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCodec;

impl StandardCodec {
    fn encode(raw: &str) -> String {
        utf8_percent_encode(raw, QUERY_COMPONENT).to_string()
    }

    fn decode(raw: &str) -> String {
        percent_decode_str(raw).decode_utf8_lossy().into_owned()
    }
}

impl ParamCodec for StandardCodec {
    fn encode_key(&self, key: &str) -> String {
        Self::encode(key)
    }

    fn encode_value(&self, value: &str) -> String {
        Self::encode(value)
    }

    fn decode_key(&self, key: &str) -> String {
        Self::decode(key)
    }

    fn decode_value(&self, value: &str) -> String {
        Self::decode(value)
    }
}

/// Immutable set of query parameters.
#[derive(Debug, Clone)]
pub struct HttpParams {
    entries: Arc<Vec<(String, Vec<String>)>>,
    codec: Arc<dyn ParamCodec>,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self::with_codec(Arc::new(StandardCodec))
    }
}

impl PartialEq for HttpParams {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl HttpParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty parameter set using a custom codec.
    pub fn with_codec(codec: Arc<dyn ParamCodec>) -> Self {
        Self {
            entries: Arc::new(Vec::new()),
            codec,
        }
    }

    /// Parse a query string (`a=b&c=d`, optional leading `?`).
    pub fn parse(query: &str) -> Self {
        Self::parse_with_codec(query, Arc::new(StandardCodec))
    }

    pub fn parse_with_codec(query: &str, codec: Arc<dyn ParamCodec>) -> Self {
        let mut entries: Vec<(String, Vec<String>)> = Vec::new();
        let query = query.strip_prefix('?').unwrap_or(query);
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            push_value(
                &mut entries,
                codec.decode_key(key),
                codec.decode_value(value),
            );
        }
        Self {
            entries: Arc::new(entries),
            codec,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.find(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.find(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn append(&self, key: &str, value: impl ToString) -> Self {
        self.append_all([(key, value)])
    }

    /// Append several `(key, value)` pairs at once.
    pub fn append_all<I, K, V>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        let mut next = self.clone();
        let entries = Arc::make_mut(&mut next.entries);
        for (key, value) in pairs {
            push_value(entries, key.as_ref().to_string(), value.to_string());
        }
        next
    }

    pub fn set(&self, key: &str, value: impl ToString) -> Self {
        self.set_all(key, [value])
    }

    /// Replace every value of `key`.
    pub fn set_all<I, V>(&self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let values: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        let mut next = self.clone();
        let entries = Arc::make_mut(&mut next.entries);
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = values,
            None => entries.push((key.to_string(), values)),
        }
        next
    }

    /// Remove `key` entirely.
    pub fn delete(&self, key: &str) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.entries).retain(|(k, _)| k != key);
        next
    }

    /// Remove one value of `key`; the key goes away with its last value.
    pub fn delete_value(&self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        let mut next = self.clone();
        let entries = Arc::make_mut(&mut next.entries);
        if let Some((_, values)) = entries.iter_mut().find(|(k, _)| k == key) {
            values.retain(|v| *v != value);
        }
        entries.retain(|(_, values)| !values.is_empty());
        next
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encoded query string, without a leading `?`.
    pub fn to_query_string(&self) -> String {
        self.entries
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(key, values)| {
                let key = self.codec.encode_key(key);
                values
                    .iter()
                    .map(|value| format!("{key}={}", self.codec.encode_value(value)))
                    .collect::<Vec<_>>()
                    .join("&")
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    fn find(&self, key: &str) -> Option<&Vec<String>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values)
    }
}

fn push_value(entries: &mut Vec<(String, Vec<String>)>, key: String, value: String) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, values)) => values.push(value),
        None => entries.push((key, vec![value])),
    }
}

impl fmt::Display for HttpParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl<K, V> FromIterator<(K, V)> for HttpParams
where
    K: AsRef<str>,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        HttpParams::new().append_all(iter)
    }
}
