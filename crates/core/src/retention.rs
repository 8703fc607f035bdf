//! Record retention policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// TTL applied to a metadata record when it is written.
///
/// An explicit tri-state in place of the conventional `-1` sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RecordTtl {
    /// Defer to the store's configured default TTL.
    #[default]
    StoreDefault,
    /// Keep the record with no expiry.
    Unbounded,
    /// Expire the record after this many seconds (zero expires immediately).
    Expire { seconds: u64 },
}

impl RecordTtl {
    /// Resolve to a concrete duration, given the store's default TTL.
    /// `None` means the record never expires.
    pub fn resolve(self, store_default: Option<Duration>) -> Option<Duration> {
        match self {
            Self::StoreDefault => store_default,
            Self::Unbounded => None,
            Self::Expire { seconds } => Some(Duration::from_secs(seconds)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_default_resolves_to_store_policy() {
        let default = Some(Duration::from_secs(60));
        assert_eq!(RecordTtl::StoreDefault.resolve(default), default);
        assert_eq!(RecordTtl::StoreDefault.resolve(None), None);
    }

    #[test]
    fn unbounded_ignores_store_default() {
        assert_eq!(
            RecordTtl::Unbounded.resolve(Some(Duration::from_secs(60))),
            None
        );
    }

    #[test]
    fn expire_is_exact() {
        assert_eq!(
            RecordTtl::Expire { seconds: 0 }.resolve(None),
            Some(Duration::ZERO)
        );
        assert_eq!(
            RecordTtl::Expire { seconds: 30 }.resolve(Some(Duration::from_secs(60))),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn deserializes_tagged_policy() {
        let ttl: RecordTtl = serde_json::from_str(r#"{"policy":"unbounded"}"#).unwrap();
        assert_eq!(ttl, RecordTtl::Unbounded);

        let ttl: RecordTtl = serde_json::from_str(r#"{"policy":"expire","seconds":15}"#).unwrap();
        assert_eq!(ttl, RecordTtl::Expire { seconds: 15 });
    }
}
