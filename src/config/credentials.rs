//! API credential handling

use std::fmt;

/// An API key for the vendor API
///
/// `Debug` is redacted so keys never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw key, treating an empty string as no key
    #[must_use]
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Pick the credential to use: explicit > provider-specific > generic
///
/// The first non-empty value wins. Returns `None` when nothing usable is
/// configured; the client rejects the request later, at call time.
#[must_use]
pub fn resolve_credential(
    explicit: Option<&str>,
    provider_specific: Option<&str>,
    generic: Option<&str>,
) -> Option<ApiKey> {
    [explicit, provider_specific, generic]
        .into_iter()
        .flatten()
        .find_map(ApiKey::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_wins() {
        let key = resolve_credential(Some("explicit"), Some("anthropic"), Some("generic"));
        assert_eq!(key.unwrap().expose(), "explicit");
    }

    #[test]
    fn test_provider_specific_before_generic() {
        let key = resolve_credential(None, Some("anthropic"), Some("generic"));
        assert_eq!(key.unwrap().expose(), "anthropic");

        let key = resolve_credential(None, None, Some("generic"));
        assert_eq!(key.unwrap().expose(), "generic");
    }

    #[test]
    fn test_empty_values_fall_through() {
        let key = resolve_credential(Some(""), Some(""), Some("generic"));
        assert_eq!(key.unwrap().expose(), "generic");

        assert!(resolve_credential(Some(""), None, Some("")).is_none());
        assert!(resolve_credential(None, None, None).is_none());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = ApiKey::new("sk-ant-secret").unwrap();
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
    }
}
