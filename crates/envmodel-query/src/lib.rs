//! Domain predicates and SQL generation for envmodel.
//!
//! `envmodel-query` is the **query construction layer**. It turns model
//! metadata and domain predicates into SQL plus parameters.
//!
//! # Role In The Architecture
//!
//! - **Domains**: [`Domain`] trees of `(field, operator, value)` leaves.
//! - **Adapters**: one [`DbAdapter`] per engine maps each [`DomainOperator`]
//!   to a SQL template (PostgreSQL, SQLite, MySQL).
//! - **Statements**: SELECT/INSERT/UPDATE/DELETE builders and the
//!   many-to-many link-table statements.
//!
//! Nothing here talks to a database. The resulting statements run through
//! the `Executor` trait from `envmodel-core`.

pub mod dialect;
pub mod domain;
pub mod operator;
pub mod statement;

pub use dialect::{
    DbAdapter, Dialect, MysqlAdapter, PostgresAdapter, SqliteAdapter, adapter_for_driver,
};
pub use domain::{Domain, FieldCondition, Predicate};
pub use operator::DomainOperator;
pub use statement::{DeleteBuilder, InsertBuilder, LinkTable, SelectBuilder, UpdateBuilder};
