//! Process configuration.
//!
//! Layered, later sources win:
//! 1. Defaults in code
//! 2. `config/<environment>.toml` (optional)
//! 3. `STOCKLEDGER__*` environment variables, `__` separating sections
//!    (e.g. `STOCKLEDGER__SERVER__PORT=9000`, `STOCKLEDGER__LEDGER__CONFLICT_RETRIES=3`)

use config::{ConfigError, Environment, File};
use serde::Deserialize;

use stockledger_infra::LedgerConfig;

pub const ENV_PREFIX: &str = "STOCKLEDGER";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Selects the config file (development, production, ...).
    pub environment: String,
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load from files and environment. Call `dotenvy::dotenv()` first to pick
    /// up a local `.env`.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var(format!("{ENV_PREFIX}__ENVIRONMENT"))
            .unwrap_or_else(|_| "development".into());
        let defaults = LedgerConfig::default();

        config::Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("ledger.conflict_retries", i64::from(defaults.conflict_retries))?
            .set_default("ledger.storage_retries", i64::from(defaults.storage_retries))?
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_any_source() {
        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.ledger, LedgerConfig::default());
        assert!(!cfg.server.host.is_empty());
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9001,
        };
        assert_eq!(server.bind_addr(), "127.0.0.1:9001");
    }
}
