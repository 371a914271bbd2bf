//! Application state for the relay server

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::vendor::VendorClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    client: VendorClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let client = VendorClient::new(&config.vendor)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: Config, client: VendorClient) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, client }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the vendor client
    pub fn client(&self) -> &VendorClient {
        &self.inner.client
    }
}
