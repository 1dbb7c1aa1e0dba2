use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::lock::InMemoryLockManager;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub locking: LockingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockingConfig {
    /// Upper bound for one whole acquisition; unset means wait indefinitely
    pub acquire_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: Some(5000),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Environment variables with prefix "FSTORE_", e.g. FSTORE_SERVER__PORT.
        // Field names contain underscores, so sections are split on "__".
        config = config.add_source(
            config::Environment::with_prefix("FSTORE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.locking.acquire_timeout_ms.map(Duration::from_millis)
    }

    /// Lock table configured with this config's acquisition timeout
    pub fn lock_manager(&self) -> InMemoryLockManager {
        match self.acquire_timeout() {
            Some(timeout) => InMemoryLockManager::with_timeout(timeout),
            None => InMemoryLockManager::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server_address(), "127.0.0.1:3001");
        assert_eq!(config.acquire_timeout(), Some(Duration::from_millis(5000)));
        assert_eq!(
            config.lock_manager().acquire_timeout(),
            Some(Duration::from_millis(5000))
        );
    }

    #[test]
    fn test_no_timeout_waits_indefinitely() {
        let config = AppConfig {
            locking: LockingConfig {
                acquire_timeout_ms: None,
            },
            ..Default::default()
        };
        assert_eq!(config.lock_manager().acquire_timeout(), None);
    }
}
