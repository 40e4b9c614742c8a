//! Real-time endpoint resolution.
//!
//! An explicit `LIVEQUERY_SERVER_URL` wins and must use a WebSocket scheme.
//! Without one, the endpoint is derived from `SERVER_URL` and written back
//! to the [`ConfigStore`] so later resolutions see the same value.

use crate::config::{ConfigKey, ConfigStore};
use crate::error::LiveQueryError;

/// Resolves the real-time endpoint from `config`.
///
/// # Errors
///
/// Returns [`LiveQueryError::Configuration`] if the explicit endpoint does
/// not start with `ws`, or if neither an explicit endpoint nor a base
/// `SERVER_URL` is configured.
pub fn resolve_endpoint(config: &ConfigStore) -> Result<String, LiveQueryError> {
    if let Some(explicit) = non_blank(config.get(ConfigKey::LiveQueryServerUrl)) {
        if !has_ws_scheme(&explicit) {
            return Err(LiveQueryError::Configuration(format!(
                "{} must use a ws:// or wss:// scheme, got {explicit}",
                ConfigKey::LiveQueryServerUrl
            )));
        }
        return Ok(explicit);
    }

    let Some(base) = non_blank(config.get(ConfigKey::ServerUrl)) else {
        return Err(LiveQueryError::Configuration(format!(
            "neither {} nor {} is set",
            ConfigKey::LiveQueryServerUrl,
            ConfigKey::ServerUrl
        )));
    };

    let derived = derive_endpoint(&base);
    config.set(ConfigKey::LiveQueryServerUrl, derived.clone());
    tracing::debug!(server_url = %base, live_query_url = %derived, "derived live query endpoint");
    Ok(derived)
}

/// Derives a real-time endpoint from a base API URL by replacing a leading
/// `http://` or `https://` with `ws://`.
///
/// `https://api.example.com/1` becomes `ws://api.example.com/1`.
#[must_use]
pub fn derive_endpoint(server_url: &str) -> String {
    let host = strip_prefix_ignore_case(server_url, "https://")
        .or_else(|| strip_prefix_ignore_case(server_url, "http://"))
        .unwrap_or(server_url);
    format!("ws://{host}")
}

fn has_ws_scheme(url: &str) -> bool {
    url.get(..2).is_some_and(|scheme| scheme.eq_ignore_ascii_case("ws"))
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn derives_from_https_base() {
        assert_eq!(derive_endpoint("https://api.example.com/1"), "ws://api.example.com/1");
    }

    #[test]
    fn derives_from_http_base() {
        assert_eq!(derive_endpoint("http://localhost:1337/parse"), "ws://localhost:1337/parse");
    }

    #[test]
    fn scheme_match_is_case_insensitive() {
        assert_eq!(derive_endpoint("HTTPS://api.example.com"), "ws://api.example.com");
    }

    #[test]
    fn schemeless_base_gets_ws_prefix() {
        assert_eq!(derive_endpoint("api.example.com/1"), "ws://api.example.com/1");
    }

    #[test]
    fn derived_endpoint_is_persisted() {
        let config = ConfigStore::new().with(ConfigKey::ServerUrl, "https://api.example.com/1");

        let Ok(first) = resolve_endpoint(&config) else {
            panic!("resolution failed");
        };
        assert_eq!(first, "ws://api.example.com/1");
        assert_eq!(
            config.get(ConfigKey::LiveQueryServerUrl).as_deref(),
            Some("ws://api.example.com/1")
        );

        // A changed base no longer matters once the endpoint is stored.
        config.set(ConfigKey::ServerUrl, "https://other.example.com");
        let Ok(second) = resolve_endpoint(&config) else {
            panic!("resolution failed");
        };
        assert_eq!(second, first);
    }

    #[test]
    fn explicit_ws_endpoint_is_used_as_is() {
        let config = ConfigStore::new()
            .with(ConfigKey::ServerUrl, "https://api.example.com/1")
            .with(ConfigKey::LiveQueryServerUrl, " wss://live.example.com ");
        assert_eq!(
            resolve_endpoint(&config).ok().as_deref(),
            Some("wss://live.example.com")
        );
    }

    #[test]
    fn explicit_http_endpoint_is_rejected() {
        let config = ConfigStore::new().with(ConfigKey::LiveQueryServerUrl, "http://bad.example.com");
        let Err(err) = resolve_endpoint(&config) else {
            panic!("expected configuration error");
        };
        assert!(matches!(err, LiveQueryError::Configuration(_)));
    }

    #[test]
    fn blank_explicit_endpoint_falls_back_to_derivation() {
        let config = ConfigStore::new()
            .with(ConfigKey::ServerUrl, "http://api.example.com")
            .with(ConfigKey::LiveQueryServerUrl, "   ");
        assert_eq!(
            resolve_endpoint(&config).ok().as_deref(),
            Some("ws://api.example.com")
        );
    }

    #[test]
    fn missing_everything_is_a_configuration_error() {
        let config = ConfigStore::new();
        assert!(matches!(
            resolve_endpoint(&config),
            Err(LiveQueryError::Configuration(_))
        ));
    }
}
