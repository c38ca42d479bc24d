//! Immutable, case-insensitive, multi-valued header container.
//!
//! # Design Decisions
//! - Every mutator returns a new `HttpHeaders`; storage is an `Arc`-shared
//!   vector cloned on write, so sharing one instance across requests is free
//! - Lookups fold ASCII case; the first-seen spelling of a name is kept for
//!   iteration and for the wire
//! - Insertion order is preserved

use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::http::error::HttpError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    /// Lowercased name used for lookups.
    key: String,
    /// Name as first seen.
    name: String,
    values: Vec<String>,
}

/// Immutable set of HTTP headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    entries: Arc<Vec<HeaderEntry>>,
}

impl HttpHeaders {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw header block (`Name: value` lines, LF or CRLF separated).
    ///
    /// Lines without a colon are skipped. Repeated names accumulate values.
    pub fn parse(block: &str) -> Self {
        let mut entries = Vec::new();
        for line in block.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            push_value(&mut entries, name, value.trim_start().trim_end_matches('\r'));
        }
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Returns the first value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name)
            .and_then(|entry| entry.values.first())
            .map(String::as_str)
    }

    /// Returns every value of `name`.
    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        self.find(name).map(|entry| entry.values.as_slice())
    }

    pub fn has(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Replace all values of `name` with `value`.
    pub fn set(&self, name: &str, value: impl Into<String>) -> Self {
        self.set_all(name, [value.into()])
    }

    /// Replace all values of `name` with `values`.
    pub fn set_all<I, V>(&self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let mut next = self.clone();
        let entries = Arc::make_mut(&mut next.entries);
        let key = name.to_ascii_lowercase();
        match entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.values = values,
            None => entries.push(HeaderEntry {
                key,
                name: name.to_string(),
                values,
            }),
        }
        next
    }

    /// Add `value` after the existing values of `name`.
    pub fn append(&self, name: &str, value: impl Into<String>) -> Self {
        self.append_all(name, [value.into()])
    }

    /// Add `values` after the existing values of `name`.
    pub fn append_all<I, V>(&self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let mut next = self.clone();
        let entries = Arc::make_mut(&mut next.entries);
        for value in values {
            push_value(entries, name, value.into());
        }
        next
    }

    /// Remove `name` and all of its values.
    pub fn delete(&self, name: &str) -> Self {
        let key = name.to_ascii_lowercase();
        if !self.entries.iter().any(|entry| entry.key == key) {
            return self.clone();
        }
        let entries = self
            .entries
            .iter()
            .filter(|entry| entry.key != key)
            .cloned()
            .collect();
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Header names, in their first-seen spelling.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// `(name, values)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|entry| (entry.name.as_str(), entry.values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to an `http::HeaderMap`, joining repeated values with `,`.
    pub fn to_header_map(&self) -> Result<HeaderMap, HttpError> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for entry in self.entries.iter() {
            let name = HeaderName::from_bytes(entry.name.as_bytes()).map_err(|_| {
                HttpError::InvalidRequest(format!("invalid header name `{}`", entry.name))
            })?;
            let value = HeaderValue::from_str(&entry.values.join(",")).map_err(|_| {
                HttpError::InvalidRequest(format!("invalid value for header `{}`", entry.name))
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }

    fn find(&self, name: &str) -> Option<&HeaderEntry> {
        self.entries
            .iter()
            .find(|entry| entry.key.eq_ignore_ascii_case(name))
    }
}

fn push_value(entries: &mut Vec<HeaderEntry>, name: &str, value: impl Into<String>) {
    let key = name.to_ascii_lowercase();
    match entries.iter_mut().find(|entry| entry.key == key) {
        Some(entry) => entry.values.push(value.into()),
        None => entries.push(HeaderEntry {
            key,
            name: name.to_string(),
            values: vec![value.into()],
        }),
    }
}

impl<K, V> FromIterator<(K, V)> for HttpHeaders
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entries = Vec::new();
        for (name, value) in iter {
            push_value(&mut entries, name.as_ref(), value);
        }
        Self {
            entries: Arc::new(entries),
        }
    }
}

impl From<&HeaderMap> for HttpHeaders {
    fn from(map: &HeaderMap) -> Self {
        map.iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let headers = HttpHeaders::new().set("Content-Type", "text/html");

        for name in ["content-type", "CONTENT-TYPE", "Content-Type", "cOnTeNt-TyPe"] {
            assert_eq!(headers.get(name), Some("text/html"));
            assert!(headers.has(name));
        }
    }

    #[test]
    fn test_mutators_leave_original_untouched() {
        let original = HttpHeaders::new().set("X-Tag", "a");

        let set = original.set("X-Tag", "b");
        let appended = original.append("X-Tag", "c");
        let deleted = original.delete("X-Tag");

        assert_eq!(original.get_all("x-tag"), Some(&["a".to_string()][..]));
        assert_eq!(set.get("X-Tag"), Some("b"));
        assert_eq!(appended.get_all("X-Tag").map(<[String]>::len), Some(2));
        assert!(!deleted.has("X-Tag"));
    }

    #[test]
    fn test_first_seen_casing_is_kept() {
        let headers = HttpHeaders::new()
            .append("X-Custom", "1")
            .append("x-custom", "2");

        assert_eq!(headers.keys().collect::<Vec<_>>(), vec!["X-Custom"]);
        assert_eq!(
            headers.get_all("X-CUSTOM"),
            Some(&["1".to_string(), "2".to_string()][..])
        );
    }

    #[test]
    fn test_parse_header_block() {
        let headers = HttpHeaders::parse(
            "Content-Type: application/json\r\nSet-Cookie: a=1\r\nnot a header\r\nSet-Cookie: b=2\r\nX-Empty:\r\n",
        );

        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(
            headers.get_all("set-cookie"),
            Some(&["a=1".to_string(), "b=2".to_string()][..])
        );
        assert_eq!(headers.get("x-empty"), Some(""));
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_get_missing() {
        let headers = HttpHeaders::new();
        assert_eq!(headers.get("X-Missing"), None);
        assert_eq!(headers.get_all("X-Missing"), None);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_header_map_round_trip_joins_values() {
        let headers = HttpHeaders::new()
            .append("Accept", "text/html")
            .append("Accept", "application/json");

        let map = headers.to_header_map().unwrap();
        assert_eq!(map.get("accept").unwrap(), "text/html,application/json");

        let back = HttpHeaders::from(&map);
        assert_eq!(back.get("Accept"), Some("text/html,application/json"));
    }

    #[test]
    fn test_invalid_header_name_is_rejected() {
        let headers = HttpHeaders::new().set("bad header", "x");
        assert!(matches!(
            headers.to_header_map(),
            Err(HttpError::InvalidRequest(_))
        ));
    }
}
