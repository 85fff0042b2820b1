//! Upstream API definitions.
//!
//! Connection settings live in `upstreams.toml`; secrets and base-URL
//! overrides come from the environment at resolve time.

use std::collections::BTreeMap;
use std::time::Duration;

use astro_sync_client::{UpstreamConfig, http::DEFAULT_TIMEOUT};
use serde::Deserialize;

use crate::SourceError;

/// One upstream API.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamDefinition {
    /// Key referenced by [`crate::target::SyncTarget::upstream`].
    pub name: String,
    pub base_url: String,
    /// Query parameter carrying the API key.
    #[serde(default)]
    pub auth_param: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub key_env: Option<String>,
    /// Key used when `key_env` is unset.
    #[serde(default)]
    pub default_key: Option<String>,
    #[serde(default)]
    pub trailing_slash: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamFile {
    upstream: Vec<UpstreamDefinition>,
}

/// Parses the `[[upstream]]` array of an upstreams TOML file.
///
/// # Errors
///
/// Returns [`SourceError`] if the TOML is malformed.
pub fn parse_upstreams_toml(toml_str: &str) -> Result<Vec<UpstreamDefinition>, SourceError> {
    let file: UpstreamFile = toml::from_str(toml_str)?;
    Ok(file.upstream)
}

impl UpstreamDefinition {
    /// Environment variable that overrides the base URL,
    /// e.g. `ASTRO_SYNC_NASA_URL`.
    #[must_use]
    pub fn url_env(&self) -> String {
        format!("ASTRO_SYNC_{}_URL", self.name.to_uppercase())
    }

    /// Resolves against the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if an auth parameter is configured
    /// but no key can be found.
    pub fn resolve(&self) -> Result<UpstreamConfig, SourceError> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    /// Resolves using `lookup` for environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if an auth parameter is configured
    /// but no key can be found.
    pub fn resolve_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<UpstreamConfig, SourceError> {
        let base_url = lookup(&self.url_env()).unwrap_or_else(|| self.base_url.clone());
        let timeout = self
            .timeout_secs
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

        let mut config = UpstreamConfig::new(&self.name, &base_url)
            .with_timeout(timeout)
            .with_trailing_slash(self.trailing_slash);
        for (key, value) in &self.headers {
            config = config.with_header(key, value);
        }

        if let Some(param) = &self.auth_param {
            let key = self
                .key_env
                .as_deref()
                .and_then(&lookup)
                .filter(|k| !k.trim().is_empty())
                .or_else(|| self.default_key.clone())
                .ok_or_else(|| {
                    SourceError::config(format!(
                        "upstream '{}' needs an API key ({})",
                        self.name,
                        self.key_env.as_deref().unwrap_or("no key_env configured")
                    ))
                })?;
            config = config.with_auth(param, &key);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
        [[upstream]]
        name = "nasa"
        base_url = "https://api.nasa.gov"
        auth_param = "api_key"
        key_env = "NASA_API_KEY"
        default_key = "DEMO_KEY"

        [[upstream]]
        name = "snapi"
        base_url = "https://api.spaceflightnewsapi.net/v4"
        trailing_slash = true
        timeout_secs = 10
    "#;

    #[test]
    fn falls_back_to_default_key() {
        let nasa = &parse_upstreams_toml(TOML).unwrap()[0];
        let config = nasa.resolve_with(|_| None).unwrap();
        let auth = config.auth.unwrap();
        assert_eq!(auth.param, "api_key");
        assert_eq!(auth.key, "DEMO_KEY");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn environment_overrides_key_and_url() {
        let nasa = &parse_upstreams_toml(TOML).unwrap()[0];
        let config = nasa
            .resolve_with(|var| match var {
                "NASA_API_KEY" => Some("secret".to_string()),
                "ASTRO_SYNC_NASA_URL" => Some("http://127.0.0.1:9000".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.auth.unwrap().key, "secret");
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn missing_key_without_default_is_a_config_error() {
        let mut nasa = parse_upstreams_toml(TOML).unwrap().remove(0);
        nasa.default_key = None;
        assert!(matches!(
            nasa.resolve_with(|_| None),
            Err(SourceError::Config { .. })
        ));
    }

    #[test]
    fn keyless_upstream_keeps_its_settings() {
        let snapi = &parse_upstreams_toml(TOML).unwrap()[1];
        let config = snapi.resolve_with(|_| None).unwrap();
        assert!(config.auth.is_none());
        assert!(config.trailing_slash);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }
}
