// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::net::SocketAddr;

use serde::Deserialize;
use thiserror::Error;

use crate::infrastructure::appstore::DEFAULT_APPSTORE_URL;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:4200";
const DEFAULT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid listen address {addr}: {source}")]
    InvalidListenAddr {
        addr: String,
        source: std::net::AddrParseError,
    },

    #[error("invalid value for {var}: {value}")]
    InvalidEnvValue { var: String, value: String },

    #[error("bus capacity must be greater than zero")]
    ZeroBusCapacity,
}

/// Dashboard runtime configuration.
///
/// Values come from the environment with sensible defaults; a config file is
/// deserialized into the same shape when provided.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Address the HTTP API binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Remote app-store manifest location.
    #[serde(default = "default_appstore_url")]
    pub appstore_url: String,

    /// Notification bus buffer depth per subscriber.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_appstore_url() -> String {
    DEFAULT_APPSTORE_URL.to_string()
}

fn default_bus_capacity() -> usize {
    DEFAULT_BUS_CAPACITY
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            appstore_url: default_appstore_url(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

impl DashboardConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("AEGIS_DASHBOARD_LISTEN") {
            config.listen_addr = addr;
        }
        if let Ok(url) = std::env::var("AEGIS_DASHBOARD_APPSTORE_URL") {
            config.appstore_url = url;
        }
        if let Ok(capacity) = std::env::var("AEGIS_DASHBOARD_BUS_CAPACITY") {
            config.bus_capacity =
                capacity
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnvValue {
                        var: "AEGIS_DASHBOARD_BUS_CAPACITY".to_string(),
                        value: capacity,
                    })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.bus_capacity == 0 {
            return Err(ConfigError::ZeroBusCapacity);
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|source| ConfigError::InvalidListenAddr {
                addr: self.listen_addr.clone(),
                source,
            })
    }
}
