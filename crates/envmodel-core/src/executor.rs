//! Blocking statement execution.
//!
//! This module defines the contract every database handle offers to the
//! environment layer:
//!
//! - [`Executor`] - run queries and statements, scope transactions
//! - [`IsolationLevel`] - SQL transaction isolation levels
//!
//! Every call blocks the caller until the database answers. Failures surface
//! immediately as [`Error::Query`](crate::Error::Query); nothing is retried.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;
use std::sync::Arc;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Read uncommitted: transactions can see uncommitted changes from others.
    ReadUncommitted,

    /// Read committed: transactions only see committed changes from others.
    /// This is the default for PostgreSQL.
    #[default]
    ReadCommitted,

    /// Repeatable read: transactions see a consistent snapshot of the database.
    RepeatableRead,

    /// Serializable: transactions appear to execute sequentially.
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL syntax for this isolation level.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// A database handle capable of executing statements.
///
/// Implementations must be `Send + Sync`; callers that share one handle
/// between threads still serialize their transactions themselves.
///
/// # Example
///
/// ```rust,ignore
/// let rows = db.query("SELECT id FROM users WHERE email = ?1", &[Value::from("jane")])?;
///
/// db.begin(IsolationLevel::default())?;
/// db.execute("UPDATE users SET name = ?1 WHERE id = ?2", &[Value::from("Jane"), Value::BigInt(1)])?;
/// db.commit()?;
/// ```
pub trait Executor: Send + Sync {
    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement (UPDATE, DELETE, DDL) and return rows affected.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute an INSERT and return the id of the inserted row.
    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64>;

    /// Begin a transaction.
    fn begin(&self, isolation: IsolationLevel) -> Result<()>;

    /// Commit the current transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the current transaction.
    fn rollback(&self) -> Result<()>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        (**self).insert(sql, params)
    }

    fn begin(&self, isolation: IsolationLevel) -> Result<()> {
        (**self).begin(isolation)
    }

    fn commit(&self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&self) -> Result<()> {
        (**self).rollback()
    }
}
