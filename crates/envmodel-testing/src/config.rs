//! Connection settings for test databases.

use envmodel_core::{ConfigError, Error, Result};
use envmodel_query::{DbAdapter, adapter_for_driver};

pub const DRIVER_VAR: &str = "HEXYA_DB_DRIVER";
pub const USER_VAR: &str = "HEXYA_DB_USER";
pub const PASSWORD_VAR: &str = "HEXYA_DB_PASSWORD";
pub const PREFIX_VAR: &str = "HEXYA_DB_PREFIX";
pub const DEBUG_VAR: &str = "HEXYA_DEBUG";

/// Where and how test databases are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Driver name, also used to pick the dialect adapter
    pub driver: String,
    pub user: String,
    pub password: String,
    /// Prefix of every test database name
    pub prefix: String,
    /// Verbose logging for the test run
    pub debug: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: "postgres".to_string(),
            user: "hexya".to_string(),
            password: "hexya".to_string(),
            prefix: "hexya".to_string(),
            debug: false,
        }
    }
}

impl DatabaseConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`. Unset and empty values fall
    /// back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            driver: read(DRIVER_VAR).unwrap_or(defaults.driver),
            user: read(USER_VAR).unwrap_or(defaults.user),
            password: read(PASSWORD_VAR).unwrap_or(defaults.password),
            prefix: read(PREFIX_VAR).unwrap_or(defaults.prefix),
            debug: read(DEBUG_VAR).is_some(),
        }
    }

    #[must_use]
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Name of the test database for `module`: `{prefix}_{module}_tests`.
    ///
    /// The name ends up in DDL, so both parts are restricted to ASCII
    /// letters, digits and underscores.
    pub fn database_name(&self, module: &str) -> Result<String> {
        for (what, part) in [("prefix", self.prefix.as_str()), ("module", module)] {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(Error::Config(ConfigError {
                    message: format!("invalid test database {what} '{part}'"),
                    source: None,
                }));
            }
        }
        Ok(format!("{}_{}_tests", self.prefix, module))
    }

    /// Dialect adapter for the configured driver.
    pub fn adapter(&self) -> Result<Box<dyn DbAdapter>> {
        adapter_for_driver(&self.driver)
    }
}
