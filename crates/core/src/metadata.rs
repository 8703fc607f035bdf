//! `Upload-Metadata` header parsing.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Client-supplied metadata attached to an upload at creation.
///
/// Parsed from the tus `Upload-Metadata` header: a comma-separated list of
/// `key` or `key base64value` pairs. Keyless entries map to the empty
/// string; entries that do not fit that shape (bad base64, non-UTF-8
/// payload, more than two tokens) are skipped. Duplicate keys: last
/// occurrence wins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadMetadata(HashMap<String, String>);

impl UploadMetadata {
    /// Parse the raw header value.
    pub fn parse(header: &str) -> Self {
        let mut entries = HashMap::new();

        for pair in header.split(',') {
            let mut tokens = pair.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            let encoded = tokens.next();
            if tokens.next().is_some() {
                continue;
            }

            let value = match encoded {
                None => String::new(),
                Some(v) => {
                    let Ok(raw) = STANDARD.decode(v) else {
                        continue;
                    };
                    let Ok(text) = String::from_utf8(raw) else {
                        continue;
                    };
                    text
                }
            };

            entries.insert(key.to_string(), value);
        }

        Self(entries)
    }

    /// Look up a decoded value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over key/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for UploadMetadata {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        // "filename" => "cat.jpg", "type" => "image/jpeg"
        let parsed = UploadMetadata::parse("filename Y2F0LmpwZw==,type aW1hZ2UvanBlZw==");
        assert_eq!(parsed.get("filename"), Some("cat.jpg"));
        assert_eq!(parsed.get("type"), Some("image/jpeg"));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn keyless_entry_maps_to_empty_string() {
        let parsed = UploadMetadata::parse("is_confidential");
        assert_eq!(parsed.get("is_confidential"), Some(""));
    }

    #[test]
    fn skips_unparseable_entries() {
        let parsed = UploadMetadata::parse("good Zm9v,bad !!!not-base64!!!,also bad extra token");
        assert_eq!(parsed.get("good"), Some("foo"));
        assert!(parsed.get("bad").is_none());
        assert!(parsed.get("also").is_none());
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn skips_non_utf8_payload() {
        // 0xff 0xfe is not valid UTF-8
        let parsed = UploadMetadata::parse("blob //4=");
        assert!(parsed.get("blob").is_none());
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let parsed = UploadMetadata::parse("name Zm9v,name YmFy");
        assert_eq!(parsed.get("name"), Some("bar"));
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn empty_header_yields_empty_map() {
        assert!(UploadMetadata::parse("").is_empty());
        assert!(UploadMetadata::parse(" , ,").is_empty());
    }
}
