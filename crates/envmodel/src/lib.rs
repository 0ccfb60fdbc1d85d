//! envmodel - immutable execution environments and record caches for an ORM.
//!
//! envmodel provides:
//!
//! - A copy-on-write [`Context`] of request-scoped key/value pairs
//! - [`Environment`]s carrying identity, context, a shared cache and a call
//!   stack, derived with `with_context`, `with_new_context`, `with_env` and
//!   `sudo`
//! - A per-request record [`Cache`] holding only database-confirmed values
//! - [`Domain`] filters translated per dialect, with unsupported operators
//!   rejected before any SQL runs
//! - A blocking SQLite executor and a test database harness
//!
//! # Quick Start
//!
//! ```ignore
//! use envmodel::prelude::*;
//!
//! let registry = ModelRegistry::new().with_model(
//!     ModelMeta::new("User", "users").field("name").field("email"),
//! );
//! let db = envmodel::open_sqlite(&SqliteConfig::memory(), registry)?;
//!
//! let env = db.new_environment(2);
//! let jane = env
//!     .pool("User")?
//!     .search(&Domain::field("email").equals("jane.smith@example.com"))?;
//!
//! // Search returns ids; load fills the cache
//! jane.load(&[])?;
//! let (name, hit) = jane.get("name", true)?;
//! assert!(!hit);
//!
//! // Same records, superuser identity, same cache
//! let admin = jane.sudo(None);
//! ```

use std::sync::Arc;

pub use envmodel_core::{
    ColumnInfo, Error, Executor, FieldKind, FieldMeta, ID_FIELD, IsolationLevel, ModelMeta,
    ModelRegistry, Result, Row, Value,
};

pub use envmodel_query::{
    DbAdapter, Dialect, Domain, DomainOperator, MysqlAdapter, PostgresAdapter, Predicate,
    SqliteAdapter, adapter_for_driver,
};

pub use envmodel_env::{
    Cache, CallFrame, Context, ContextDerivable, Database, EnvSettings, Environment,
    RecordCollection, SUPERUSER_ID,
};

pub use envmodel_sqlite::{OpenFlags, SqliteConfig, SqliteConnection};

/// Open a SQLite database and wrap it in a [`Database`] using the SQLite
/// operator table.
pub fn open_sqlite(config: &SqliteConfig, registry: ModelRegistry) -> Result<Arc<Database>> {
    let conn = SqliteConnection::open(config)?;
    tracing::debug!(path = %conn.path(), models = registry.len(), "SQLite database ready");
    Ok(Arc::new(Database::new(
        Arc::new(conn),
        Box::new(SqliteAdapter),
        registry,
    )))
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        // Environment layer
        Context,
        ContextDerivable,
        Database,
        // Filters
        Domain,
        DomainOperator,
        EnvSettings,
        Environment,
        // Core types
        Error,
        Executor,
        ModelMeta,
        ModelRegistry,
        RecordCollection,
        Result,
        // SQLite
        SqliteConfig,
        SqliteConnection,
        Value,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn test_open_sqlite_memory() {
        let registry = ModelRegistry::new().with_model(ModelMeta::new("User", "users"));
        let db = open_sqlite(&SqliteConfig::memory(), registry).unwrap();
        assert_eq!(db.adapter().dialect(), Dialect::Sqlite);
        assert!(db.registry().model("User").is_ok());

        let env = db.new_environment(SUPERUSER_ID);
        assert_eq!(env.sudo(None).uid(), SUPERUSER_ID);
    }

    #[test]
    fn test_open_sqlite_bad_path() {
        let config = SqliteConfig::file("/nonexistent-dir/x.db").flags(OpenFlags::read_write());
        assert!(matches!(
            open_sqlite(&config, ModelRegistry::new()),
            Err(Error::Connection(_))
        ));
    }
}
