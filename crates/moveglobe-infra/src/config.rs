//! Declared infrastructure: which server, which SSH key, which firewall.
//!
//! Every field has a default matching the production deployment, so an empty
//! (or absent) TOML file describes the stock setup.

use hcloud_api::FirewallRule;
use hcloud_core::ids::ServerId;
use hcloud_core::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use validator::{Validate, ValidationError};

use crate::reconcile::DesiredState;

/// Server the firewall is attached to.
pub const DEFAULT_SERVER_ID: u64 = 66_631_999;
/// Name of the managed firewall.
pub const DEFAULT_FIREWALL_NAME: &str = "moveglobe-firewall";
/// Name given to the deploy key on creation.
pub const DEFAULT_SSH_KEY_NAME: &str = "moveglobe-deploy";
/// Location of the deploy public key.
pub const DEFAULT_PUBLIC_KEY_PATH: &str = "~/.ssh/hetzner_deploy.pub";
/// SSH, HTTP, HTTPS, Dokku SSH, Node.js app.
pub const DEFAULT_OPEN_PORTS: [&str; 5] = ["22", "80", "443", "2222", "5000"];
/// Every IPv4 and IPv6 source.
pub const ANY_SOURCE: [&str; 2] = ["0.0.0.0/0", "::/0"];

#[derive(Debug, Clone, Deserialize, PartialEq, Validate)]
pub struct InfraConfig {
    #[serde(default = "default_server_id")]
    pub server_id: ServerId,
    #[validate(nested)]
    #[serde(default)]
    pub ssh_key: SshKeyConfig,
    #[validate(nested)]
    #[serde(default)]
    pub firewall: FirewallConfig,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            server_id: default_server_id(),
            ssh_key: SshKeyConfig::default(),
            firewall: FirewallConfig::default(),
        }
    }
}

const fn default_server_id() -> ServerId {
    ServerId::new(DEFAULT_SERVER_ID)
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Validate)]
pub struct SshKeyConfig {
    #[validate(custom(function = "not_blank"))]
    #[serde(default = "default_ssh_key_name")]
    pub name: String,
    #[serde(default = "default_public_key_path")]
    pub public_key_path: PathBuf,
}

impl Default for SshKeyConfig {
    fn default() -> Self {
        Self {
            name: default_ssh_key_name(),
            public_key_path: default_public_key_path(),
        }
    }
}

fn default_ssh_key_name() -> String {
    DEFAULT_SSH_KEY_NAME.to_string()
}

fn default_public_key_path() -> PathBuf {
    PathBuf::from(DEFAULT_PUBLIC_KEY_PATH)
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Validate)]
pub struct FirewallConfig {
    #[validate(custom(function = "not_blank"))]
    #[serde(default = "default_firewall_name")]
    pub name: String,
    #[validate(length(min = 1))]
    #[serde(default = "default_rules")]
    pub rules: Vec<FirewallRule>,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            name: default_firewall_name(),
            rules: default_rules(),
        }
    }
}

fn default_firewall_name() -> String {
    DEFAULT_FIREWALL_NAME.to_string()
}

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Inbound TCP from anywhere on each of [`DEFAULT_OPEN_PORTS`].
#[must_use]
pub fn default_rules() -> Vec<FirewallRule> {
    DEFAULT_OPEN_PORTS
        .iter()
        .map(|port| FirewallRule::inbound_tcp(*port, &ANY_SOURCE))
        .collect()
}

impl InfraConfig {
    /// Load from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the file cannot be read, parsed or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "loaded infrastructure config");
        Ok(config)
    }

    /// Parse and validate TOML content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] on malformed or invalid content.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.check()?;
        Ok(config)
    }

    /// Check names and rules are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] naming the offending fields.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))
    }

    /// Resolve the full desired state, reading the public key from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the key file is missing or empty.
    pub fn desired_state(&self) -> Result<DesiredState> {
        Ok(DesiredState {
            server_id: self.server_id,
            ssh_key_name: self.ssh_key.name.clone(),
            public_key: self.ssh_key.read_public_key()?,
            firewall_name: self.firewall.name.clone(),
            firewall_rules: self.firewall.rules.clone(),
        })
    }
}

impl SshKeyConfig {
    /// Key path with a leading `~` replaced by `$HOME`.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.public_key_path)
    }

    /// Private key path used in the SSH hint (public key path minus `.pub`).
    #[must_use]
    pub fn identity_path(&self) -> PathBuf {
        let path = &self.public_key_path;
        match path.extension() {
            Some(ext) if ext == "pub" => path.with_extension(""),
            _ => path.clone(),
        }
    }

    /// Read the public key, trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the file is unreadable or empty.
    pub fn read_public_key(&self) -> Result<String> {
        let path = self.resolved_path();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::ConfigError(format!("Failed to read public key {}: {e}", path.display()))
        })?;
        let key = content.trim();
        if key.is_empty() {
            return Err(Error::ConfigError(format!(
                "Public key file {} is empty",
                path.display()
            )));
        }
        Ok(key.to_string())
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
