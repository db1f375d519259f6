// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Call metadata
//!
//! Keys are case-insensitive and stored lowercase. Keys ending in `-bin`
//! hold binary values, every other key holds an ASCII string.

use std::collections::{BTreeMap, HashMap};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub const BINARY_SUFFIX: &str = "-bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Ascii(String),
    Binary(Vec<u8>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Ascii(s) => Some(s),
            MetadataValue::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MetadataValue::Ascii(s) => s.as_bytes(),
            MetadataValue::Binary(b) => b,
        }
    }
}

pub fn is_binary_key(key: &str) -> bool {
    key.ends_with(BINARY_SUFFIX)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, MetadataValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds metadata from string pairs; `-bin` values are base64 decoded
    /// and silently skipped when they are not valid base64
    pub fn from_map(map: HashMap<String, String>) -> Self {
        let mut metadata = Self::new();
        for (key, value) in map {
            let key = key.to_ascii_lowercase();
            if is_binary_key(&key) {
                if let Ok(bytes) = STANDARD.decode(value.as_bytes()) {
                    metadata.entries.insert(key, MetadataValue::Binary(bytes));
                }
            } else {
                metadata.entries.insert(key, MetadataValue::Ascii(value));
            }
        }
        metadata
    }

    /// Inserts an ASCII value, returning the previous one
    ///
    /// A `-bin` key receives the raw bytes of `value`.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<MetadataValue> {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        let value = if is_binary_key(&key) {
            MetadataValue::Binary(value.into_bytes())
        } else {
            MetadataValue::Ascii(value)
        };
        self.entries.insert(key, value)
    }

    /// Inserts a binary value under `key`, appending `-bin` if missing
    pub fn insert_bin(&mut self, key: impl Into<String>, value: Vec<u8>) -> Option<MetadataValue> {
        let mut key = key.into().to_ascii_lowercase();
        if !is_binary_key(&key) {
            key.push_str(BINARY_SUFFIX);
        }
        self.entries.insert(key, MetadataValue::Binary(value))
    }

    /// ASCII value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .and_then(MetadataValue::as_str)
    }

    /// Binary value of `key`
    pub fn get_bin(&self, key: &str) -> Option<&[u8]> {
        match self.entries.get(&key.to_ascii_lowercase()) {
            Some(MetadataValue::Binary(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        self.entries.remove(&key.to_ascii_lowercase())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries of `other` take precedence
    pub fn merge(&mut self, other: Metadata) {
        self.entries.extend(other.entries);
    }

    /// String rendering; binary values are base64 encoded
    pub fn to_map(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    MetadataValue::Ascii(s) => s.clone(),
                    MetadataValue::Binary(b) => STANDARD.encode(b),
                };
                (k.clone(), rendered)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut md = Metadata::new();
        md.insert("X-Request-Id", "abc");
        assert_eq!(md.get("x-request-id"), Some("abc"));
        assert!(md.contains_key("X-REQUEST-ID"));
        assert_eq!(md.keys().collect::<Vec<_>>(), vec!["x-request-id"]);
    }

    #[test]
    fn test_binary_entries() {
        let mut md = Metadata::new();
        md.insert_bin("payload", vec![0, 159, 146, 150]);
        assert!(md.contains_key("payload-bin"));
        assert_eq!(md.get_bin("payload-bin"), Some(&[0u8, 159, 146, 150][..]));
        // binary values are not visible as strings
        assert_eq!(md.get("payload-bin"), None);
    }

    #[test]
    fn test_map_roundtrip_uses_base64_for_binary() {
        let mut md = Metadata::new();
        md.insert("plain", "value");
        md.insert_bin("blob-bin", vec![1, 2, 3]);

        let map = md.to_map();
        assert_eq!(map.get("blob-bin"), Some(&"AQID".to_string()));

        let back = Metadata::from_map(map);
        assert_eq!(back, md);
    }

    #[test]
    fn test_merge_overrides() {
        let mut a = Metadata::new();
        a.insert("k", "1");
        a.insert("only-a", "x");
        let mut b = Metadata::new();
        b.insert("k", "2");
        a.merge(b);
        assert_eq!(a.get("k"), Some("2"));
        assert_eq!(a.len(), 2);
        assert!(a.remove("only-a").is_some());
        assert_eq!(a.len(), 1);
    }
}
