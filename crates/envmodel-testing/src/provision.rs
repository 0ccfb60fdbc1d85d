//! Creating and tearing down per-module test databases.
//!
//! [`TestDatabase`] is an RAII guard: once provisioned, the database is
//! dropped again whichever way the test run ends. [`run_tests`] wraps a
//! whole test run, tearing down before a panic is allowed to continue.

use crate::config::DatabaseConfig;
use crate::init_logging;
use envmodel_core::{Executor, Result};
use envmodel_sqlite::SqliteConnection;
use std::io::ErrorKind;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Server-side database management for one driver.
pub trait Provisioner {
    type Connection: Executor + 'static;

    /// Drop `name` if it exists.
    fn drop_if_exists(&self, config: &DatabaseConfig, name: &str) -> Result<()>;

    fn create_database(&self, config: &DatabaseConfig, name: &str) -> Result<()>;

    fn connect(&self, config: &DatabaseConfig, name: &str) -> Result<Self::Connection>;

    fn drop_database(&self, config: &DatabaseConfig, name: &str) -> Result<()>;
}

/// SQLite test databases as files `{name}.db` under a base directory.
#[derive(Debug, Clone)]
pub struct SqliteFileProvisioner {
    base_dir: PathBuf,
}

impl SqliteFileProvisioner {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.db"))
    }
}

impl Provisioner for SqliteFileProvisioner {
    type Connection = SqliteConnection;

    fn drop_if_exists(&self, _config: &DatabaseConfig, name: &str) -> Result<()> {
        match std::fs::remove_file(self.path_of(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn create_database(&self, _config: &DatabaseConfig, name: &str) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_of(name))?;
        Ok(())
    }

    fn connect(&self, _config: &DatabaseConfig, name: &str) -> Result<SqliteConnection> {
        SqliteConnection::open_file(path_string(&self.path_of(name)))
    }

    fn drop_database(&self, _config: &DatabaseConfig, name: &str) -> Result<()> {
        std::fs::remove_file(self.path_of(name))?;
        Ok(())
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// A provisioned test database, dropped when the guard goes away.
pub struct TestDatabase<P: Provisioner> {
    config: DatabaseConfig,
    name: String,
    provisioner: P,
    connection: Option<Arc<P::Connection>>,
}

impl<P: Provisioner> TestDatabase<P> {
    /// Drop any leftover database for `module`, create a fresh one and
    /// connect to it.
    pub fn provision(config: &DatabaseConfig, module: &str, provisioner: P) -> Result<Self> {
        let name = config.database_name(module)?;
        info!(module, database = %name, driver = %config.driver, "Initializing test database");

        provisioner.drop_if_exists(config, &name)?;
        provisioner.create_database(config, &name)?;
        let connection = match provisioner.connect(config, &name) {
            Ok(conn) => conn,
            Err(e) => {
                if let Err(drop_err) = provisioner.drop_database(config, &name) {
                    warn!(database = %name, error = %drop_err, "Cleanup after failed connect failed");
                }
                return Err(e);
            }
        };

        Ok(Self {
            config: config.clone(),
            name,
            provisioner,
            connection: Some(Arc::new(connection)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Shared handle to the open connection.
    pub fn connection(&self) -> Option<Arc<P::Connection>> {
        self.connection.clone()
    }

    /// The connection as an executor, ready for `Database::new`.
    pub fn executor(&self) -> Option<Arc<dyn Executor>> {
        self.connection
            .clone()
            .map(|conn| conn as Arc<dyn Executor>)
    }

    /// Close the connection and drop the database, reporting failures.
    pub fn teardown(mut self) -> Result<()> {
        self.teardown_inner()
    }

    fn teardown_inner(&mut self) -> Result<()> {
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };
        if Arc::strong_count(&connection) > 1 {
            warn!(database = %self.name, "Connection still shared at teardown");
        }
        drop(connection);
        info!(database = %self.name, "Tearing down test database");
        self.provisioner.drop_database(&self.config, &self.name)
    }
}

impl<P: Provisioner> Drop for TestDatabase<P> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown_inner() {
            warn!(database = %self.name, error = %e, "Test database teardown failed");
        }
    }
}

/// Provision the database for `module`, run `f`, then tear down.
///
/// A panic inside `f` is caught, the database is torn down, and the panic
/// is resumed unchanged.
pub fn run_tests<P, F, T>(
    config: &DatabaseConfig,
    module: &str,
    provisioner: P,
    f: F,
) -> Result<T>
where
    P: Provisioner,
    F: FnOnce(&TestDatabase<P>) -> T,
{
    init_logging(config.debug);
    let db = TestDatabase::provision(config, module, provisioner)?;
    let outcome = catch_unwind(AssertUnwindSafe(|| f(&db)));
    let torn_down = db.teardown();
    match outcome {
        Ok(value) => torn_down.map(|()| value),
        Err(panic) => resume_unwind(panic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envmodel_core::Value;

    fn sqlite_config() -> DatabaseConfig {
        DatabaseConfig::default().with_driver("sqlite")
    }

    #[test]
    fn test_provision_and_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = SqliteFileProvisioner::new(dir.path());
        let path = provisioner.path_of("hexya_sales_tests");

        let db = TestDatabase::provision(&sqlite_config(), "sales", provisioner).unwrap();
        assert_eq!(db.name(), "hexya_sales_tests");
        assert!(path.exists());

        let conn = db.connection().unwrap();
        conn.execute("CREATE TABLE t (v INTEGER)", &[]).unwrap();
        conn.execute("INSERT INTO t VALUES (?1)", &[Value::BigInt(5)])
            .unwrap();
        drop(conn);

        db.teardown().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_provision_replaces_leftover_database() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = SqliteFileProvisioner::new(dir.path());
        let path = provisioner.path_of("hexya_stock_tests");
        std::fs::write(&path, b"stale").unwrap();

        let db = TestDatabase::provision(&sqlite_config(), "stock", provisioner).unwrap();
        let conn = db.executor().unwrap();
        let rows = conn
            .query("SELECT COUNT(*) AS n FROM sqlite_master", &[])
            .unwrap();
        assert_eq!(rows[0].get_named::<i64>("n").unwrap(), 0);
    }

    #[test]
    fn test_drop_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = SqliteFileProvisioner::new(dir.path());
        let path = provisioner.path_of("hexya_hr_tests");
        {
            let _db = TestDatabase::provision(&sqlite_config(), "hr", provisioner).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_module_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = SqliteFileProvisioner::new(dir.path());
        assert!(TestDatabase::provision(&sqlite_config(), "../evil", provisioner).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_run_tests_returns_value() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = SqliteFileProvisioner::new(dir.path());
        let path = provisioner.path_of("hexya_crm_tests");

        let seen = run_tests(&sqlite_config(), "crm", provisioner, |db| {
            let conn = db.connection().unwrap();
            conn.execute_raw("CREATE TABLE t (v INTEGER)").unwrap();
            db.name().to_string()
        })
        .unwrap();

        assert_eq!(seen, "hexya_crm_tests");
        assert!(!path.exists());
    }

    #[test]
    fn test_run_tests_tears_down_then_resumes_panic() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = SqliteFileProvisioner::new(dir.path());
        let path = provisioner.path_of("hexya_web_tests");

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _: Result<()> = run_tests(&sqlite_config(), "web", provisioner, |_db| {
                panic!("test failure");
            });
        }));

        let payload = outcome.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"test failure"));
        assert!(!path.exists());
    }
}
