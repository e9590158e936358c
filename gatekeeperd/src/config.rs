use std::fmt;
use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{bail, Context, Result};
use shared::protocol::{
    DEFAULT_MAC_FIELD, DEFAULT_NAME_PREFIX, DEFAULT_PORT_FIELD, DEFAULT_PORT_FLOOR,
    ENV_LISTEN_HOST, ENV_LISTEN_PORT, ENV_PORT_FIELD, ENV_PORT_FLOOR, ENV_REGISTRY_TIMEOUT,
    ENV_REGISTRY_TOKEN, ENV_REGISTRY_URL,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisioningConfig {
    #[serde(default = "default_port_floor")]
    pub port_floor: u16,
    #[serde(default = "default_port_field")]
    pub port_field: String,
    #[serde(default = "default_mac_field")]
    pub mac_field: String,
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_probe_slug")]
    pub device_type: String,
    #[serde(default = "default_probe_slug")]
    pub device_role: String,
    #[serde(default = "default_pending_site")]
    pub pending_site: String,
    #[serde(default = "default_pending_status")]
    pub pending_status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_timeout() -> u64 {
    10
}

fn default_port_floor() -> u16 {
    DEFAULT_PORT_FLOOR
}

fn default_port_field() -> String {
    DEFAULT_PORT_FIELD.to_string()
}

fn default_mac_field() -> String {
    DEFAULT_MAC_FIELD.to_string()
}

fn default_name_prefix() -> String {
    DEFAULT_NAME_PREFIX.to_string()
}

fn default_probe_slug() -> String {
    "network-probe".to_string()
}

fn default_pending_site() -> String {
    "pending".to_string()
}

fn default_pending_status() -> String {
    "planned".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            port_floor: default_port_floor(),
            port_field: default_port_field(),
            mac_field: default_mac_field(),
            name_prefix: default_name_prefix(),
            device_type: default_probe_slug(),
            device_role: default_probe_slug(),
            pending_site: default_pending_site(),
            pending_status: default_pending_status(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

// Keeps the token out of startup logs.
impl fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("url", &self.url)
            .field("token", &if self.token.is_empty() { "<unset>" } else { "<redacted>" })
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Overlay values from the environment. `lookup` stands in for `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_REGISTRY_URL) {
            self.registry.url = url;
        }
        if let Some(token) = lookup(ENV_REGISTRY_TOKEN) {
            self.registry.token = token;
        }
        if let Some(timeout) = lookup(ENV_REGISTRY_TIMEOUT) {
            self.registry.timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("{} is not a number of seconds: {}", ENV_REGISTRY_TIMEOUT, timeout))?;
        }
        if let Some(floor) = lookup(ENV_PORT_FLOOR) {
            self.provisioning.port_floor = floor
                .trim()
                .parse()
                .with_context(|| format!("{} is not a valid port: {}", ENV_PORT_FLOOR, floor))?;
        }
        if let Some(field) = lookup(ENV_PORT_FIELD) {
            self.provisioning.port_field = field;
        }

        let host = lookup(ENV_LISTEN_HOST);
        let port = lookup(ENV_LISTEN_PORT);
        if host.is_some() || port.is_some() {
            let (current_host, current_port) = self
                .api
                .listen
                .rsplit_once(':')
                .map(|(h, p)| (h.to_string(), p.to_string()))
                .unwrap_or_else(|| (self.api.listen.clone(), "8000".to_string()));
            self.api.listen = format!(
                "{}:{}",
                host.unwrap_or(current_host),
                port.unwrap_or(current_port)
            );
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry.url.trim().is_empty() {
            bail!("registry URL is not set (set {} or [registry] url)", ENV_REGISTRY_URL);
        }
        if self.provisioning.port_floor == 0 {
            bail!("port floor must be at least 1");
        }
        if self.registry.timeout_secs == 0 {
            bail!("registry timeout must be at least one second");
        }
        if self.provisioning.port_field.trim().is_empty() {
            bail!("port custom field name must not be empty");
        }
        Ok(())
    }
}
