//! Configuration file parsing for tapbridge
//!
//! Parses an optional `tapbridge.toml` using serde. Every section and key is
//! optional; anything left out falls back to the stock Linux toolchain.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Load configuration from a file
pub fn load(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: Config = toml::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

/// Load the config at `path` if one was given, otherwise use the defaults
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load(p),
        None => Ok(Config::default()),
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// External tools invoked for each concern
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Defaults for provisioning flags
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let tools = [
            ("link", &self.tools.link),
            ("route", &self.tools.route),
            ("dhcp_client", &self.tools.dhcp_client),
            ("resolver", &self.tools.resolver),
        ];

        for (key, value) in tools {
            if value.trim().is_empty() {
                return Err(Error::ConfigValidation(format!(
                    "tools.{} must not be empty",
                    key
                )));
            }
        }

        if self.defaults.tap_owner.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "defaults.tap_owner must not be empty".into(),
            ));
        }

        Ok(())
    }
}

/// External collaborators, each invoked as a black box
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    /// Link-state and address management tool
    #[serde(default = "default_link_tool")]
    pub link: String,

    /// Routing-table tool
    #[serde(default = "default_link_tool")]
    pub route: String,

    /// DHCP client, invoked with the interface name as its only argument
    #[serde(default = "default_dhcp_client")]
    pub dhcp_client: String,

    /// DNS-resolver association tool
    #[serde(default = "default_resolver")]
    pub resolver: String,
}

fn default_link_tool() -> String {
    "ip".to_string()
}

fn default_dhcp_client() -> String {
    "dhclient".to_string()
}

fn default_resolver() -> String {
    "resolvectl".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            link: default_link_tool(),
            route: default_link_tool(),
            dhcp_client: default_dhcp_client(),
            resolver: default_resolver(),
        }
    }
}

/// Defaults applied when the matching CLI flag is not given
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    /// Principal owning newly created TAP devices
    #[serde(default = "default_tap_owner")]
    pub tap_owner: String,

    /// Create TAP devices with multi-queue support
    #[serde(default)]
    pub multi_queue: bool,
}

fn default_tap_owner() -> String {
    "root".to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            tap_owner: default_tap_owner(),
            multi_queue: false,
        }
    }
}
