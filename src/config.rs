use crate::error::{ProxyError, Result};
use crate::providers::{GatewayPreset, Provider};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
}

/// Where the agent service lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    /// `providerID` sent when the model identifier has no `provider/` namespace.
    #[serde(default = "default_provider_id")]
    pub default_provider_id: String,
    /// Request timeout for upstream calls. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Enabled providers. The first one is the fallback route.
    #[serde(default = "default_providers")]
    pub providers: Vec<Provider>,
    #[serde(default = "default_openrouter_key_env")]
    pub openrouter_api_key_env: String,
    #[serde(default = "default_gemini_key_env")]
    pub gemini_api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openrouter_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_backend_url() -> String {
    "http://localhost:4096".to_string()
}

fn default_provider_id() -> String {
    crate::translate::request::DEFAULT_PROVIDER_ID.to_string()
}

fn default_providers() -> Vec<Provider> {
    vec![Provider::Native]
}

fn default_openrouter_key_env() -> String {
    GatewayPreset::for_provider(Provider::OpenRouter)
        .map(|p| p.default_api_key_env)
        .unwrap_or("OPENROUTER_API_KEY")
        .to_string()
}

fn default_gemini_key_env() -> String {
    GatewayPreset::for_provider(Provider::Gemini)
        .map(|p| p.default_api_key_env)
        .unwrap_or("GEMINI_API_KEY")
        .to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backend: BackendConfig::default(),
            routing: RoutingConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            default_provider_id: default_provider_id(),
            timeout_secs: None,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            openrouter_api_key_env: default_openrouter_key_env(),
            gemini_api_key_env: default_gemini_key_env(),
            openrouter_base_url: None,
            gemini_base_url: None,
        }
    }
}

impl ProxyConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir > built-in defaults
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in &config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Apply `HOST`, `PORT` and `OPENCODE_API` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .parse()
                .map_err(|_| ProxyError::config(format!("PORT must be a port number, got '{port}'")))?;
        }
        if let Some(url) = lookup("OPENCODE_API") {
            self.backend.base_url = url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.routing.providers.is_empty() {
            return Err(ProxyError::config(
                "routing.providers must name at least one provider",
            ));
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(ProxyError::config("backend.base_url must not be empty"));
        }
        Ok(())
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend.timeout_secs.map(Duration::from_secs)
    }
}

impl RoutingConfig {
    /// Environment variable holding the key for `provider`. `None` for the
    /// agent service, which needs no credential.
    #[must_use]
    pub fn api_key_env(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Native => None,
            Provider::OpenRouter => Some(&self.openrouter_api_key_env),
            Provider::Gemini => Some(&self.gemini_api_key_env),
        }
    }

    /// Effective base URL for a gateway: config override or preset default.
    #[must_use]
    pub fn base_url_for(&self, provider: Provider) -> Option<String> {
        let configured = match provider {
            Provider::Native => None,
            Provider::OpenRouter => self.openrouter_base_url.clone(),
            Provider::Gemini => self.gemini_base_url.clone(),
        };
        configured.or_else(|| GatewayPreset::for_provider(provider).map(|p| p.base_url.to_string()))
    }

    /// Read the gateway key from its environment variable at call time.
    pub fn resolve_api_key(&self, provider: Provider) -> Result<String> {
        let var = self.api_key_env(provider).ok_or_else(|| {
            ProxyError::config(format!("provider '{}' takes no API key", provider))
        })?;
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(ProxyError::missing_credential(var)),
        }
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("opencode-proxy.toml"));

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("opencode-proxy").join("config.toml"));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("opencode-proxy").join("config.toml"));
        paths.push(home.join(".opencode-proxy.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 9000

[backend]
base_url = "http://opencode:4096"
default_provider_id = "anthropic"
timeout_secs = 30

[routing]
providers = ["native", "openrouter", "gemini"]
gemini_api_key_env = "MY_GEMINI_KEY"
"#
        )
        .unwrap();

        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.backend.base_url, "http://opencode:4096");
        assert_eq!(config.backend.default_provider_id, "anthropic");
        assert_eq!(config.backend_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.routing.providers,
            vec![Provider::Native, Provider::OpenRouter, Provider::Gemini]
        );
        assert_eq!(config.routing.openrouter_api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(
            config.routing.api_key_env(Provider::Gemini),
            Some("MY_GEMINI_KEY")
        );
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = ProxyConfig::load(f.path()).unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.backend.base_url, "http://localhost:4096");
        assert_eq!(config.backend.default_provider_id, "openrouter");
        assert_eq!(config.backend_timeout(), None);
        assert_eq!(config.routing.providers, vec![Provider::Native]);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "[routing]\nproviders = [\"bedrock\"]").unwrap();
        assert!(matches!(
            ProxyConfig::load(f.path()),
            Err(ProxyError::Toml(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("HOST", "127.0.0.1"),
            ("PORT", "3000"),
            ("OPENCODE_API", "http://agent:4096"),
        ]
        .into_iter()
        .collect();

        let mut config = ProxyConfig::default();
        config
            .apply_overrides_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
        assert_eq!(config.backend.base_url, "http://agent:4096");
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = ProxyConfig::default();
        let err = config
            .apply_overrides_from(|k| (k == "PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ProxyError::Config { .. }));
    }

    #[test]
    fn test_validate_requires_a_provider() {
        let mut config = ProxyConfig::default();
        config.routing.providers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gateway_base_urls() {
        let mut routing = RoutingConfig::default();
        assert_eq!(
            routing.base_url_for(Provider::OpenRouter).as_deref(),
            Some("https://openrouter.ai/api/v1")
        );
        assert_eq!(
            routing.base_url_for(Provider::Gemini).as_deref(),
            Some("https://generativelanguage.googleapis.com/v1beta/openai")
        );
        assert_eq!(routing.base_url_for(Provider::Native), None);

        routing.openrouter_base_url = Some("http://127.0.0.1:9999/v1".to_string());
        assert_eq!(
            routing.base_url_for(Provider::OpenRouter).as_deref(),
            Some("http://127.0.0.1:9999/v1")
        );
    }

    #[test]
    fn test_missing_key_names_variable() {
        let routing = RoutingConfig {
            openrouter_api_key_env: "OPENCODE_PROXY_TEST_UNSET_KEY_4471".to_string(),
            ..RoutingConfig::default()
        };

        let err = routing.resolve_api_key(Provider::OpenRouter).unwrap_err();
        assert!(matches!(err, ProxyError::MissingCredential { .. }));
        assert!(err.to_string().contains("OPENCODE_PROXY_TEST_UNSET_KEY_4471"));
    }
}
