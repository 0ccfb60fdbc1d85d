//! Core types and traits for envmodel.
//!
//! This crate provides the foundations shared by every other crate:
//!
//! - `Value` for dynamically typed context entries, cached fields and parameters
//! - `Row` for query results
//! - `Executor` trait for blocking database access
//! - `ModelRegistry` for "does field X exist on model M" lookups
//! - `Error` covering context, cache, domain and query failures

pub mod error;
pub mod executor;
pub mod registry;
pub mod row;
pub mod value;

pub use error::{
    CacheMissError, ConfigError, ConnectionError, ConnectionErrorKind, ContextError,
    ContextErrorKind, DomainError, DomainErrorKind, Error, QueryError, QueryErrorKind,
    RecordError, RecordErrorKind, Result, SchemaError, SchemaErrorKind, TypeError,
};
pub use executor::{Executor, IsolationLevel};
pub use registry::{FieldKind, FieldMeta, ID_FIELD, ModelMeta, ModelRegistry};
pub use row::{ColumnInfo, FromValue, Row};
pub use value::{Value, value_from_json, value_to_json};
