use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Call metadata: request headers, response headers, or trailers.
///
/// Keys are normalized to lowercase on the way in, so lookups are
/// case-insensitive. Iteration order is sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Metadata {
    entries: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert a value, returning the previous value for that key.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries
            .insert(name.into().to_ascii_lowercase(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(&name.to_ascii_lowercase())
    }

    /// Overlay `other` onto `self`; keys in `other` win.
    pub fn merge(&mut self, other: &Metadata) {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.entries
    }
}

impl From<BTreeMap<String, String>> for Metadata {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Metadata> for BTreeMap<String, String> {
    fn from(md: Metadata) -> Self {
        md.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut md = Metadata::new();
        for (k, v) in iter {
            md.insert(k, v);
        }
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_is_case_insensitive() {
        let mut md = Metadata::new();
        md.insert("X-Request-Id", "abc");
        assert_eq!(md.get("x-request-id"), Some("abc"));
        assert_eq!(md.get("X-REQUEST-ID"), Some("abc"));
    }

    #[test]
    fn get_missing() {
        assert_eq!(Metadata::new().get("authorization"), None);
    }

    #[test]
    fn merge_overrides_existing_keys() {
        let mut base = Metadata::new().with("user-agent", "callbridge").with("tenant", "a");
        let overlay = Metadata::new().with("Tenant", "b");

        base.merge(&overlay);

        assert_eq!(base.len(), 2);
        assert_eq!(base.get("tenant"), Some("b"));
        assert_eq!(base.get("user-agent"), Some("callbridge"));
    }

    #[test]
    fn deserialize_normalizes_keys() {
        let md: Metadata = serde_json::from_str(r#"{"Content-Type":"application/grpc"}"#).unwrap();
        assert_eq!(md.iter().next(), Some(("content-type", "application/grpc")));
    }

    #[test]
    fn serialize_as_plain_map() {
        let md = Metadata::new().with("a", "1");
        assert_eq!(serde_json::to_string(&md).unwrap(), r#"{"a":"1"}"#);
    }
}
