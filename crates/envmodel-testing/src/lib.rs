//! Test database harness for envmodel.
//!
//! Module test suites get a dedicated database named
//! `{prefix}_{module}_tests`, created fresh before the run and dropped after
//! it, even when a test panics.
//!
//! ```rust,ignore
//! use envmodel_testing::{DatabaseConfig, SqliteFileProvisioner, run_tests};
//!
//! let config = DatabaseConfig::from_env().with_driver("sqlite");
//! run_tests(&config, "sales", SqliteFileProvisioner::new("/tmp"), |db| {
//!     let executor = db.executor().expect("connected");
//!     // build a Database on top of `executor` and run the suite
//! })?;
//! ```
//!
//! Settings come from `HEXYA_DB_DRIVER`, `HEXYA_DB_USER`,
//! `HEXYA_DB_PASSWORD`, `HEXYA_DB_PREFIX` and `HEXYA_DEBUG`.

pub mod config;
pub mod provision;

pub use config::DatabaseConfig;
pub use provision::{Provisioner, SqliteFileProvisioner, TestDatabase, run_tests};

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static LOGGING: Once = Once::new();

/// Install the test log subscriber, once per process.
///
/// `debug` selects the `debug` level; otherwise only errors are shown.
/// `RUST_LOG` takes precedence when set.
pub fn init_logging(debug: bool) {
    LOGGING.call_once(|| {
        let level = if debug { "debug" } else { "error" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        // Another subscriber may already be installed by the test binary
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(true);
        init_logging(false);
        tracing::debug!("logging initialized");
        assert!(LOGGING.is_completed());
    }
}
