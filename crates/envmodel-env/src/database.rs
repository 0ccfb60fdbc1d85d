//! The database handle environments are created from.
//!
//! A [`Database`] bundles everything an environment needs to reach the
//! store: the blocking executor, the dialect adapter, the model registry and
//! the [`EnvSettings`]. It is shared between environments behind an `Arc`.

use crate::environment::Environment;
use envmodel_core::{Executor, IsolationLevel, ModelRegistry, Result, Row, Value};
use envmodel_query::DbAdapter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default identity of the superuser.
pub const SUPERUSER_ID: i64 = 1;

/// Settings consumed by environment derivations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvSettings {
    /// Identity `sudo` switches to when no uid is given.
    pub superuser_id: i64,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            superuser_id: SUPERUSER_ID,
        }
    }
}

/// Shared handle to one database.
pub struct Database {
    executor: Arc<dyn Executor>,
    adapter: Box<dyn DbAdapter>,
    registry: ModelRegistry,
    settings: EnvSettings,
}

impl Database {
    pub fn new(
        executor: Arc<dyn Executor>,
        adapter: Box<dyn DbAdapter>,
        registry: ModelRegistry,
    ) -> Self {
        Self {
            executor,
            adapter,
            registry,
            settings: EnvSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EnvSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn adapter(&self) -> &dyn DbAdapter {
        self.adapter.as_ref()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn settings(&self) -> EnvSettings {
        self.settings
    }

    /// A fresh environment for `uid`: empty context, cache and call stack.
    pub fn new_environment(self: &Arc<Self>, uid: i64) -> Environment {
        Environment::new(Arc::clone(self), uid)
    }

    /// Run `f` in a fresh environment inside a transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err` or
    /// panics.
    #[tracing::instrument(level = "debug", skip(self, f))]
    pub fn execute_in_new_environment<T, F>(self: &Arc<Self>, uid: i64, f: F) -> Result<T>
    where
        F: FnOnce(&Environment) -> Result<T>,
    {
        let tx = Transaction::begin(self.executor.as_ref())?;
        let env = self.new_environment(uid);
        let value = f(&env)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `f` in a fresh environment inside a transaction that is always
    /// rolled back.
    #[tracing::instrument(level = "debug", skip(self, f))]
    pub fn simulate_in_new_environment<T, F>(self: &Arc<Self>, uid: i64, f: F) -> Result<T>
    where
        F: FnOnce(&Environment) -> Result<T>,
    {
        let tx = Transaction::begin(self.executor.as_ref())?;
        let env = self.new_environment(uid);
        let result = f(&env);
        match (result, tx.rollback()) {
            (Ok(value), rolled_back) => rolled_back.map(|()| value),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(rollback_err)) => {
                tracing::warn!(error = %rollback_err, "Rollback after failed simulation failed");
                Err(e)
            }
        }
    }

    pub(crate) fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        tracing::trace!(sql = %sql, params = params.len(), "Executing query");
        self.executor.query(sql, params)
    }

    pub(crate) fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        tracing::trace!(sql = %sql, params = params.len(), "Executing statement");
        self.executor.execute(sql, params)
    }

    pub(crate) fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        tracing::trace!(sql = %sql, params = params.len(), "Executing insert");
        self.executor.insert(sql, params)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.adapter.dialect())
            .field("models", &self.registry.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Open transaction that rolls back unless committed.
struct Transaction<'a> {
    executor: &'a dyn Executor,
    finished: bool,
}

impl<'a> Transaction<'a> {
    fn begin(executor: &'a dyn Executor) -> Result<Self> {
        executor.begin(IsolationLevel::default())?;
        tracing::debug!("Transaction started");
        Ok(Self {
            executor,
            finished: false,
        })
    }

    /// A failed commit leaves the guard armed, so dropping it rolls back.
    fn commit(mut self) -> Result<()> {
        self.executor.commit()?;
        self.finished = true;
        tracing::debug!("Transaction committed");
        Ok(())
    }

    fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.executor.rollback()?;
        tracing::debug!("Transaction rolled back");
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.executor.rollback() {
            Ok(()) => tracing::debug!("Transaction rolled back on early exit"),
            Err(e) => tracing::warn!(error = %e, "Rollback on early exit failed"),
        }
    }
}
