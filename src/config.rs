//! Configuration management for CGP Rip
//!
//! Runtime settings come from the environment (optionally via `.env`). The
//! session token is persisted separately in a small JSON file written by the
//! `configure` command.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::{Result, RipError};

pub const DEFAULT_VENDOR_BASE: &str = "https://library.cgpbooks.co.uk";
pub const DEFAULT_CONTENT_BASE: &str = "https://library.cgpbooks.co.uk/digitalcontent";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/105.0.0.0 Safari/537.36 OPR/91.0.4516.36";
pub const DEFAULT_SESSION_FILE: &str = "config.json";

/// Upper bound on in-flight page fetches
pub const MAX_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub vendor: VendorConfig,
    pub rip: RipConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VendorConfig {
    /// Base for the `digitalaccess` login endpoint
    pub base_url: String,
    /// Base for book assets (`{content_base}/{book_id}/assets/...`)
    pub content_base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RipConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            vendor: VendorConfig::default(),
            rip: RipConfig::default(),
        }
    }
}

impl Default for VendorConfig {
    fn default() -> Self {
        VendorConfig {
            base_url: DEFAULT_VENDOR_BASE.to_string(),
            content_base_url: DEFAULT_CONTENT_BASE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for RipConfig {
    fn default() -> Self {
        RipConfig {
            concurrency: 8,
            timeout_secs: 600,
            quality: 4,
        }
    }
}

impl RipConfig {
    /// Concurrency clamped to `1..=MAX_CONCURRENCY`
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

impl Config {
    pub fn from_env() -> std::result::Result<Self, env::VarError> {
        let defaults = Config::default();
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port),
            },
            vendor: VendorConfig {
                base_url: env::var("VENDOR_BASE_URL").unwrap_or(defaults.vendor.base_url),
                content_base_url: env::var("CONTENT_BASE_URL")
                    .unwrap_or(defaults.vendor.content_base_url),
                user_agent: env::var("VENDOR_USER_AGENT").unwrap_or(defaults.vendor.user_agent),
                request_timeout_secs: parse_var(
                    "VENDOR_REQUEST_TIMEOUT_SECS",
                    defaults.vendor.request_timeout_secs,
                ),
            },
            rip: RipConfig {
                concurrency: parse_var("RIP_CONCURRENCY", defaults.rip.concurrency),
                timeout_secs: parse_var("RIP_TIMEOUT_SECS", defaults.rip.timeout_secs),
                quality: parse_var("RIP_QUALITY", defaults.rip.quality),
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable {}={:?}", name, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Persisted session settings (`config.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(rename = "ASP.NET_SessionId", default)]
    pub session_id: String,
}

impl SessionConfig {
    /// Load the session file, failing with a "not configured" hint when absent
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Err(RipError::Config(format!(
                "Not configured: {} does not exist. Please run configure first.",
                path.display()
            )));
        }

        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Merge `session_id` into the file at `path`, creating it if needed.
    /// An empty `session_id` keeps whatever the file already holds.
    pub async fn configure(path: &Path, session_id: &str) -> Result<Self> {
        let mut config = if tokio::fs::try_exists(path).await? {
            let raw = tokio::fs::read_to_string(path).await?;
            serde_json::from_str(&raw)?
        } else {
            SessionConfig::default()
        };

        if !session_id.is_empty() {
            config.session_id = session_id.to_string();
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_string(&config)?).await?;
        tracing::info!("Wrote session configuration to {}", path.display());

        Ok(config)
    }
}
