//! Error types for environment, cache and query operations.

use std::fmt;

/// The primary error type for all envmodel operations.
#[derive(Debug)]
pub enum Error {
    /// Context key lookup or coercion failed
    Context(ContextError),
    /// A cache-only read found no cached value
    CacheMiss(CacheMissError),
    /// Domain (predicate) construction errors
    Domain(DomainError),
    /// Query execution errors
    Query(QueryError),
    /// Connection-related errors (connect, disconnect)
    Connection(ConnectionError),
    /// Configuration errors
    Config(ConfigError),
    /// Model or field lookups against the registry
    Schema(SchemaError),
    /// Record collection shape errors
    Record(RecordError),
    /// Type conversion errors
    Type(TypeError),
    /// I/O errors
    Io(std::io::Error),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct ContextError {
    pub kind: ContextErrorKind,
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextErrorKind {
    /// Key is absent from the context
    NotFound,
    /// Value exists but has another type
    TypeMismatch,
}

#[derive(Debug, Clone)]
pub struct CacheMissError {
    pub model: String,
    pub id: i64,
    pub field: String,
}

#[derive(Debug, Clone)]
pub struct DomainError {
    pub kind: DomainErrorKind,
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainErrorKind {
    /// The adapter has no SQL mapping for the operator
    UnsupportedOperator,
    /// The operand cannot be bound for the operator
    InvalidValue,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Database is busy or locked
    Busy,
    /// Transaction state misuse (commit without begin, ...)
    Transaction,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection already closed
    Closed,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub model: String,
    pub field: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Model is not registered
    ModelNotFound,
    /// Field does not exist on the model
    FieldNotFound,
    /// Field exists but has the wrong kind for the operation
    WrongFieldKind,
}

#[derive(Debug, Clone)]
pub struct RecordError {
    pub kind: RecordErrorKind,
    pub model: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordErrorKind {
    /// Operation needs exactly one record
    NotSingleton,
    /// Record no longer exists in the backing store
    MissingRecord,
}

#[derive(Debug, Clone)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

impl Error {
    /// Is this a cache-only read that found nothing?
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Error::CacheMiss(_))
    }

    /// Is this an operator the adapter cannot translate?
    pub fn is_unsupported_operator(&self) -> bool {
        matches!(
            self,
            Error::Domain(DomainError {
                kind: DomainErrorKind::UnsupportedOperator,
                ..
            })
        )
    }

    /// Is this a context lookup failure of the given kind?
    pub fn is_context(&self, kind: ContextErrorKind) -> bool {
        matches!(self, Error::Context(e) if e.kind == kind)
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Build a query error without an underlying source.
    pub fn query(kind: QueryErrorKind, sql: Option<&str>, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind,
            sql: sql.map(str::to_string),
            message: message.into(),
            source: None,
        })
    }
}

impl ContextError {
    pub fn not_found(key: &str) -> Self {
        Self {
            kind: ContextErrorKind::NotFound,
            key: key.to_string(),
            message: format!("key '{key}' is not set in context"),
        }
    }

    pub fn type_mismatch(key: &str, expected: &str, actual: &str) -> Self {
        Self {
            kind: ContextErrorKind::TypeMismatch,
            key: key.to_string(),
            message: format!("key '{key}' holds {actual}, expected {expected}"),
        }
    }
}

impl DomainError {
    pub fn unsupported(operator: &str, dialect: &str) -> Self {
        Self {
            kind: DomainErrorKind::UnsupportedOperator,
            field: None,
            message: format!("operator '{operator}' is not supported by the {dialect} adapter"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Context(e) => write!(f, "Context error: {}", e.message),
            Error::CacheMiss(e) => write!(f, "Cache miss: {e}"),
            Error::Domain(e) => write!(f, "Domain error: {e}"),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Schema(e) => write!(f, "Schema error: {e}"),
            Error::Record(e) => write!(f, "Record error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {e}"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for CacheMissError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}' of {}({}) is not cached",
            self.field, self.model, self.id
        )
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} (field '{}')", self.message, field),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.field) {
            (SchemaErrorKind::ModelNotFound, _) => write!(f, "unknown model '{}'", self.model),
            (SchemaErrorKind::FieldNotFound, Some(field)) => {
                write!(f, "model '{}' has no field '{}'", self.model, field)
            }
            (SchemaErrorKind::WrongFieldKind, Some(field)) => {
                write!(f, "field '{}' of model '{}' has the wrong kind", field, self.model)
            }
            (_, None) => write!(f, "invalid field lookup on model '{}'", self.model),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ContextError> for Error {
    fn from(err: ContextError) -> Self {
        Error::Context(err)
    }
}

impl From<CacheMissError> for Error {
    fn from(err: CacheMissError) -> Self {
        Error::CacheMiss(err)
    }
}

impl From<DomainError> for Error {
    fn from(err: DomainError) -> Self {
        Error::Domain(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<RecordError> for Error {
    fn from(err: RecordError) -> Self {
        Error::Record(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

/// Result type alias for envmodel operations.
pub type Result<T> = std::result::Result<T, Error>;
