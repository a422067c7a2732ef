//! Call metadata carrier.
//!
//! [`Metadata`] is the key/value container attached to every call. It
//! carries cross-process context such as credentials, trace identifiers,
//! and custom tags between the gateway, the RPC transport, and the
//! interceptor stages.
//!
//! Keys are case-insensitive: they are lowercased on every write and on
//! every lookup. A key may hold several values; insertion order is kept
//! both for keys and for the values of a single key.
//!
//! # Example
//!
//! ```
//! use janus_core::Metadata;
//!
//! let mut md = Metadata::new();
//! md.insert("App_Key", "janus");
//! md.append("x-tag", "a");
//! md.append("X-Tag", "b");
//!
//! assert_eq!(md.get("app_key"), Some("janus"));
//! assert_eq!(md.get_all("x-tag"), ["a", "b"]);
//! ```

use http::header::{HeaderMap, HeaderName, HeaderValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tonic::metadata::MetadataMap;

/// Transport headers that never surface as application metadata.
const RESERVED_HEADERS: &[&str] = &[
    "te",
    "host",
    "content-type",
    "content-length",
    "user-agent",
    "grpc-timeout",
    "grpc-encoding",
    "grpc-accept-encoding",
    "grpc-status",
    "grpc-message",
    "grpc-status-details-bin",
];

/// Ordered, case-insensitive, multi-value metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: IndexMap<String, Vec<String>>,
}

impl Metadata {
    /// Creates an empty carrier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&normalize(key))
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value stored under `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(&normalize(key))
            .map_or(&[], Vec::as_slice)
    }

    /// Replaces all values of `key` with a single value.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(normalize(key.as_ref()), vec![value.into()]);
    }

    /// Adds a value to `key`, keeping the existing ones.
    pub fn append(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(normalize(key.as_ref()))
            .or_default()
            .push(value.into());
    }

    /// Removes `key`, returning its values.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.entries.shift_remove(&normalize(key))
    }

    /// Returns `true` if `key` has at least one value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize(key))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no key is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over every `(key, value)` pair, flattening multi-value keys.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(key, values)| {
            values
                .iter()
                .map(move |value| (key.as_str(), value.as_str()))
        })
    }

    /// Iterates over the distinct keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Builds metadata from HTTP/2 request headers.
    ///
    /// Pseudo headers, transport headers, and values that are not visible
    /// ASCII are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut metadata = Self::new();
        for (name, value) in headers {
            let key = name.as_str();
            if key.starts_with(':') || RESERVED_HEADERS.contains(&key) {
                continue;
            }
            if let Ok(value) = value.to_str() {
                metadata.append(key, value);
            }
        }
        metadata
    }

    /// Builds metadata from an incoming tonic request's metadata.
    pub fn from_metadata_map(map: &MetadataMap) -> Self {
        Self::from_headers(&map.clone().into_headers())
    }

    /// Converts to HTTP headers, skipping entries that are not valid header
    /// names or values.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(self.len());
        for (key, value) in self.iter() {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::debug!(key, "skipping metadata entry that is not a valid header"),
            }
        }
        headers
    }

    /// Converts to tonic metadata for an outgoing call.
    pub fn to_metadata_map(&self) -> MetadataMap {
        MetadataMap::from_headers(self.to_headers())
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Self::new();
        for (key, value) in iter {
            metadata.append(key, value);
        }
        metadata
    }
}

impl Extend<(String, String)> for Metadata {
    fn extend<I: IntoIterator<Item = (String, String)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.append(key, value);
        }
    }
}

fn normalize(key: &str) -> String {
    key.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut md = Metadata::new();
        md.insert("App_Key", "janus");

        assert_eq!(md.get("APP_KEY"), Some("janus"));
        assert!(md.contains_key("app_key"));
        assert_eq!(md.keys().collect::<Vec<_>>(), vec!["app_key"]);
    }

    #[test]
    fn test_append_keeps_order() {
        let mut md = Metadata::new();
        md.append("x-tag", "one");
        md.append("X-TAG", "two");
        md.append("other", "three");

        assert_eq!(md.get_all("x-tag"), ["one", "two"]);
        assert_eq!(md.get("x-tag"), Some("one"));
        assert_eq!(
            md.iter().collect::<Vec<_>>(),
            vec![("x-tag", "one"), ("x-tag", "two"), ("other", "three")]
        );
    }

    #[test]
    fn test_insert_replaces() {
        let mut md = Metadata::new();
        md.append("k", "1");
        md.append("k", "2");
        md.insert("K", "3");

        assert_eq!(md.get_all("k"), ["3"]);
        assert_eq!(md.len(), 1);
    }

    #[test]
    fn test_remove_preserves_remaining_order() {
        let mut md: Metadata = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        assert_eq!(md.remove("B"), Some(vec!["2".to_string()]));
        assert_eq!(md.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(md.remove("missing").is_none());
    }

    #[test]
    fn test_from_headers_skips_transport_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/grpc"));
        headers.insert("te", HeaderValue::from_static("trailers"));
        headers.insert("grpc-timeout", HeaderValue::from_static("5S"));
        headers.insert("app_key", HeaderValue::from_static("janus"));
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));

        let md = Metadata::from_headers(&headers);

        assert_eq!(md.len(), 2);
        assert_eq!(md.get("app_key"), Some("janus"));
        assert_eq!(md.get_all("x-tag"), ["a", "b"]);
        assert!(!md.contains_key("content-type"));
    }

    #[test]
    fn test_metadata_map_conversion() {
        let mut md = Metadata::new();
        md.insert("app_key", "janus");
        md.insert("bad key", "dropped");

        let map = md.to_metadata_map();
        assert_eq!(map.get("app_key").and_then(|v| v.to_str().ok()), Some("janus"));
        assert_eq!(map.len(), 1);

        let back = Metadata::from_metadata_map(&map);
        assert_eq!(back.get("app_key"), Some("janus"));
    }
}
