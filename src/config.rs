//! Configuration for the bridge.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags
//! 2. Environment variables (ARTS_ANSIBLE_HOST, ARTS_HMAC_KEY, ...)
//! 3. Config file (.arts/config.yaml, or --config / ARTS_CONFIG)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .arts/config.yaml
//!
//! Everything is resolved once at start-up into an immutable
//! [`ResolvedConfig`]. Missing credentials or secret are a start-up error.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;

use crate::core::DeliveryPolicy;

const DEFAULT_PORT: u16 = 9090;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub ansible: AnsibleSection,
    #[serde(default)]
    pub server: ServerSection,
    pub hmac_key: Option<String>,
    #[serde(default)]
    pub callback_delivery: Option<DeliveryPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnsibleSection {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub forward_run_context: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub interface: Option<IpAddr>,
    pub port: Option<u16>,
    pub private_listen: Option<SocketAddr>,
    pub shutdown_grace_secs: Option<u64>,
}

/// Settings supplied on the command line or through the environment
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Config file (defaults to .arts/config.yaml in this or a parent directory)
    #[arg(long, env = "ARTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// AWX / Automation Controller base URL
    #[arg(long, env = "ARTS_ANSIBLE_HOST")]
    pub ansible_host: Option<String>,

    /// Service account used to mint tokens
    #[arg(long, env = "ARTS_ANSIBLE_USER")]
    pub ansible_user: Option<String>,

    /// Service account password
    #[arg(long, env = "ARTS_ANSIBLE_PASSWORD", hide_env_values = true)]
    pub ansible_password: Option<String>,

    /// Shared secret for workspace signatures
    #[arg(long, env = "ARTS_HMAC_KEY", hide_env_values = true)]
    pub hmac_key: Option<String>,

    /// Interface to listen on
    #[arg(long, env = "ARTS_INTERFACE")]
    pub interface: Option<IpAddr>,

    /// Port to listen on
    #[arg(long, env = "ARTS_PORT")]
    pub port: Option<u16>,

    /// Serve /private routes on this address instead of the public listener
    #[arg(long, env = "ARTS_PRIVATE_LISTEN")]
    pub private_listen: Option<SocketAddr>,

    /// How long shutdown waits for acknowledged attempts to finish
    #[arg(long, env = "ARTS_SHUTDOWN_GRACE_SECS")]
    pub shutdown_grace_secs: Option<u64>,

    /// Per-request timeout for AWX and callback calls
    #[arg(long, env = "ARTS_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Pass run and workspace identifiers to AWX as extra_vars
    #[arg(long, env = "ARTS_FORWARD_RUN_CONTEXT")]
    pub forward_run_context: Option<bool>,
}

/// Connection settings for the automation platform
#[derive(Clone)]
pub struct PlatformConfig {
    /// Base URL without trailing slash
    pub host: String,
    pub username: String,
    pub password: String,
    pub request_timeout: Duration,
    pub forward_run_context: bool,
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("forward_run_context", &self.forward_run_context)
            .finish()
    }
}

/// Listener addresses and shutdown behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub private_listen: Option<SocketAddr>,
    /// Upper bound on waiting for in-flight attempts at shutdown
    pub shutdown_grace: Duration,
}

/// Resolved configuration, immutable for the life of the process
#[derive(Clone)]
pub struct ResolvedConfig {
    pub platform: PlatformConfig,
    pub server: ServerConfig,
    pub hmac_key: String,
    pub callback_delivery: DeliveryPolicy,
    /// Path to config file (if one was used)
    pub config_file: Option<PathBuf>,
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("platform", &self.platform)
            .field("server", &self.server)
            .field("hmac_key", &"<redacted>")
            .field("callback_delivery", &self.callback_delivery)
            .field("config_file", &self.config_file)
            .finish()
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".arts").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration from all sources
pub fn load(overrides: Overrides) -> Result<ResolvedConfig> {
    let config_file = overrides.config.clone().or_else(find_config_file);

    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(overrides, file, config_file)
}

/// Merge overrides over the file over defaults
pub fn resolve(
    overrides: Overrides,
    file: ConfigFile,
    config_file: Option<PathBuf>,
) -> Result<ResolvedConfig> {
    let host = required(
        overrides.ansible_host.or(file.ansible.host),
        "ansible host (--ansible-host / ARTS_ANSIBLE_HOST)",
    )?;
    let username = required(
        overrides.ansible_user.or(file.ansible.user),
        "ansible user (--ansible-user / ARTS_ANSIBLE_USER)",
    )?;
    let password = required(
        overrides.ansible_password.or(file.ansible.password),
        "ansible password (--ansible-password / ARTS_ANSIBLE_PASSWORD)",
    )?;
    let hmac_key = required(
        overrides.hmac_key.or(file.hmac_key),
        "HMAC key (--hmac-key / ARTS_HMAC_KEY)",
    )?;

    let host = normalize_host(&host)?;

    let request_timeout_secs = overrides
        .request_timeout_secs
        .or(file.ansible.request_timeout_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if request_timeout_secs == 0 {
        anyhow::bail!("request timeout must be at least one second");
    }

    let interface = overrides
        .interface
        .or(file.server.interface)
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let port = overrides.port.or(file.server.port).unwrap_or(DEFAULT_PORT);

    Ok(ResolvedConfig {
        platform: PlatformConfig {
            host,
            username,
            password,
            request_timeout: Duration::from_secs(request_timeout_secs),
            forward_run_context: overrides
                .forward_run_context
                .or(file.ansible.forward_run_context)
                .unwrap_or(false),
        },
        server: ServerConfig {
            listen: SocketAddr::new(interface, port),
            private_listen: overrides.private_listen.or(file.server.private_listen),
            shutdown_grace: Duration::from_secs(
                overrides
                    .shutdown_grace_secs
                    .or(file.server.shutdown_grace_secs)
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            ),
        },
        hmac_key,
        callback_delivery: file.callback_delivery.unwrap_or_default(),
        config_file,
    })
}

/// Blank values count as missing
fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => anyhow::bail!("missing required setting: {}", name),
    }
}

/// Validate the platform URL and strip any trailing slash
fn normalize_host(host: &str) -> Result<String> {
    let url = reqwest::Url::parse(host)
        .with_context(|| format!("ansible host is not a valid URL: {}", host))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        anyhow::bail!("ansible host must be an http(s) URL: {}", host);
    }

    Ok(host.trim_end_matches('/').to_string())
}
