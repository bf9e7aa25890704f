//! Configuration types for the DNS sync system
//!
//! [`SyncConfig`] is the fully resolved configuration the daemon runs with.
//! It is produced from [`RawConfig`], the on-disk TOML shape in which every
//! field is optional, overlaid with environment variables for anything the
//! file leaves unset.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Environment variable names consulted by [`RawConfig::resolve`]
pub mod env {
    /// Repository holding the desired-state document
    pub const REPO_URL: &str = "REPO_URL";
    /// SSH private key used to clone the repository
    pub const SSH_KEY: &str = "SSH_KEY";
    /// Path of the desired-state document inside the repository
    pub const DNS_CONFIG_PATH: &str = "DNS_CONFIG_PATH";
    /// Comma-separated target addresses
    pub const PIHOLE_URLS: &str = "PIHOLE_URLS";
    /// Comma-separated target passwords, paired with `PIHOLE_URLS` by position
    pub const PIHOLE_PASSWORDS: &str = "PIHOLE_PASSWORDS";
    /// `granular` or `bulk`
    pub const STRATEGY: &str = "DNS_SYNC_STRATEGY";
    /// `true` to plan without mutating
    pub const DRY_RUN: &str = "DNS_SYNC_DRY_RUN";
    /// Per-request timeout in seconds
    pub const TIMEOUT_SECS: &str = "DNS_SYNC_TIMEOUT_SECS";
}

/// Default repository URL
pub const DEFAULT_REPO_URL: &str = "git@github.com:melvyndekort/homelab.git";

/// Default SSH key path
pub const DEFAULT_SSH_KEY: &str = "/ssh-key";

/// Default desired-state document path, relative to the repository root
pub const DEFAULT_DNS_CONFIG_PATH: &str = "dns-config.toml";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How the reconciler converges a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Delete what is extra, add what is missing, one call per record
    #[default]
    Granular,
    /// Replace each record list wholesale when it differs
    Bulk,
}

impl FromStr for SyncStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "granular" => Ok(SyncStrategy::Granular),
            "bulk" => Ok(SyncStrategy::Bulk),
            other => Err(Error::config(format!(
                "Unknown sync strategy '{}'. Valid strategies: granular, bulk",
                other
            ))),
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStrategy::Granular => write!(f, "granular"),
            SyncStrategy::Bulk => write!(f, "bulk"),
        }
    }
}

/// One managed DNS-filtering appliance
///
/// The Debug implementation does not expose the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTarget {
    /// Base address (`http(s)://host[:port]` or `file:///path/to/pihole.toml`)
    #[serde(alias = "url")]
    pub address: String,

    /// Credential for the target
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub password: String,
}

impl SyncTarget {
    /// Create a target, stripping any trailing `/` from the address
    pub fn new(address: impl Into<String>, password: impl Into<String>) -> Self {
        let address = address.into().trim().trim_end_matches('/').to_string();
        Self {
            address,
            password: password.into(),
        }
    }

    /// The address scheme (`http`, `https`, `file`, ...), lowercased
    pub fn scheme(&self) -> Option<String> {
        self.address
            .split_once("://")
            .map(|(scheme, _)| scheme.to_lowercase())
    }
}

impl fmt::Debug for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncTarget")
            .field("address", &self.address)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Repository holding the desired-state document
    pub repo_url: String,

    /// SSH key used for cloning
    pub ssh_key: String,

    /// Path of the desired-state document, relative to the repository root
    pub dns_config_path: String,

    /// Targets to reconcile, in order
    pub targets: Vec<SyncTarget>,

    /// Convergence strategy
    pub strategy: SyncStrategy,

    /// Plan and log, but do not mutate
    pub dry_run: bool,

    /// Per-request timeout for target calls
    pub timeout_secs: u64,
}

impl SyncConfig {
    /// Validate the configuration
    ///
    /// An empty target list is valid: the run reconciles nothing.
    pub fn validate(&self) -> Result<()> {
        if self.repo_url.trim().is_empty() {
            return Err(Error::config("repo_url cannot be empty"));
        }

        if self.dns_config_path.trim().is_empty() {
            return Err(Error::config("dns_config_path cannot be empty"));
        }

        if self.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be > 0"));
        }

        for (position, target) in self.targets.iter().enumerate() {
            if target.address.is_empty() {
                return Err(Error::config(format!(
                    "Target #{} has an empty address",
                    position + 1
                )));
            }
            if target.scheme().is_none() {
                return Err(Error::config(format!(
                    "Target address '{}' has no scheme (expected http://, https:// or file://)",
                    target.address
                )));
            }
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repo_url: DEFAULT_REPO_URL.to_string(),
            ssh_key: DEFAULT_SSH_KEY.to_string(),
            dns_config_path: DEFAULT_DNS_CONFIG_PATH.to_string(),
            targets: Vec::new(),
            strategy: SyncStrategy::default(),
            dry_run: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Configuration file contents, every field optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    /// Repository URL
    pub repo_url: Option<String>,
    /// SSH key path
    pub ssh_key: Option<String>,
    /// Desired-state document path
    pub dns_config_path: Option<String>,
    /// Targets; `piholes` is accepted as an alias
    #[serde(alias = "piholes")]
    pub targets: Option<Vec<SyncTarget>>,
    /// Convergence strategy
    pub strategy: Option<SyncStrategy>,
    /// Dry-run flag
    pub dry_run: Option<bool>,
    /// Per-request timeout
    pub timeout_secs: Option<u64>,
}

impl RawConfig {
    /// Parse a TOML configuration file body
    ///
    /// An empty body is an empty configuration.
    pub fn from_toml_str(body: &str) -> Result<Self> {
        toml::from_str(body).map_err(|e| Error::config(format!("Invalid configuration file: {}", e)))
    }

    /// Fill unset fields from the environment, then from defaults
    ///
    /// `lookup` is the environment accessor (`std::env::var(..).ok()` in
    /// production). Targets only come from `PIHOLE_URLS`/`PIHOLE_PASSWORDS`
    /// when the file has no target list at all.
    pub fn resolve<F>(self, lookup: F) -> Result<SyncConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SyncConfig::default();

        let strategy = match self.strategy {
            Some(strategy) => strategy,
            None => match lookup(env::STRATEGY) {
                Some(value) => value.parse()?,
                None => defaults.strategy,
            },
        };

        let dry_run = match self.dry_run {
            Some(dry_run) => dry_run,
            None => match lookup(env::DRY_RUN) {
                Some(value) => parse_bool(env::DRY_RUN, &value)?,
                None => defaults.dry_run,
            },
        };

        let timeout_secs = match self.timeout_secs {
            Some(timeout) => timeout,
            None => match lookup(env::TIMEOUT_SECS) {
                Some(value) => value.trim().parse().map_err(|_| {
                    Error::config(format!(
                        "{} must be a positive integer. Got: {}",
                        env::TIMEOUT_SECS,
                        value
                    ))
                })?,
                None => defaults.timeout_secs,
            },
        };

        let targets = match self.targets {
            Some(targets) => targets
                .into_iter()
                .map(|target| SyncTarget::new(target.address, target.password))
                .collect(),
            None => targets_from_env(&lookup),
        };

        Ok(SyncConfig {
            repo_url: self
                .repo_url
                .or_else(|| lookup(env::REPO_URL))
                .unwrap_or(defaults.repo_url),
            ssh_key: self
                .ssh_key
                .or_else(|| lookup(env::SSH_KEY))
                .unwrap_or(defaults.ssh_key),
            dns_config_path: self
                .dns_config_path
                .or_else(|| lookup(env::DNS_CONFIG_PATH))
                .unwrap_or(defaults.dns_config_path),
            targets,
            strategy,
            dry_run,
            timeout_secs,
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::config(format!(
            "{} must be a boolean (true/false). Got: {}",
            name, value
        ))),
    }
}

fn targets_from_env<F>(lookup: &F) -> Vec<SyncTarget>
where
    F: Fn(&str) -> Option<String>,
{
    let urls = lookup(env::PIHOLE_URLS).unwrap_or_default();
    if urls.trim().is_empty() {
        return Vec::new();
    }

    let passwords = lookup(env::PIHOLE_PASSWORDS).unwrap_or_default();
    urls.split(',')
        .zip(passwords.split(','))
        .map(|(url, password)| SyncTarget::new(url.trim(), password.trim()))
        .collect()
}
