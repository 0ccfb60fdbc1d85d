//! Database dialects and their operator tables.
//!
//! Each supported engine gets one adapter implementing [`DbAdapter`]. The
//! adapters are pure lookups: the same operator always yields the same
//! template, whoever runs the query and whatever their context holds.

use crate::operator::DomainOperator;
use envmodel_core::{ConfigError, DomainError, Error, Result};

/// SQL dialect for generating dialect-specific SQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Check if this dialect supports ILIKE.
    pub const fn supports_ilike(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Quote an identifier for this dialect.
    ///
    /// Embedded quote characters are doubled:
    /// - For Postgres/SQLite: `"` becomes `""`
    /// - For MySQL: `` ` `` becomes ``` `` ```
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                let escaped = name.replace('"', "\"\"");
                format!("\"{}\"", escaped)
            }
            Dialect::Mysql => {
                let escaped = name.replace('`', "``");
                format!("`{}`", escaped)
            }
        }
    }

    /// Most bound parameters one statement may carry.
    ///
    /// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER` is 32766; Postgres and
    /// MySQL count parameters in a 16-bit field.
    pub const fn max_params(self) -> usize {
        match self {
            Dialect::Postgres | Dialect::Mysql => 65_535,
            Dialect::Sqlite => 32_766,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
        }
    }
}

/// Operator translation contract of one database dialect.
///
/// Templates contain exactly one `?` standing for the bound operand. The
/// forms `%?%` (operand wrapped in wildcards) and `(?)` (operand expanded
/// to a list) are spelled out literally.
pub trait DbAdapter: Send + Sync + std::fmt::Debug {
    /// The dialect used for placeholders and identifier quoting.
    fn dialect(&self) -> Dialect;

    /// SQL template for `operator`, or `None` when the adapter cannot
    /// express it.
    fn operator_sql(&self, operator: DomainOperator) -> Option<&'static str>;

    /// Placeholder for the given parameter index (1-based).
    fn placeholder(&self, index: usize) -> String {
        self.dialect().placeholder(index)
    }

    fn quote_identifier(&self, name: &str) -> String {
        self.dialect().quote_identifier(name)
    }

    /// Most bound parameters one statement may carry.
    fn max_params(&self) -> usize {
        self.dialect().max_params()
    }

    /// Like [`operator_sql`](Self::operator_sql) but fails loudly.
    fn require_operator(&self, operator: DomainOperator) -> Result<&'static str> {
        self.operator_sql(operator).ok_or_else(|| {
            Error::Domain(DomainError::unsupported(
                operator.as_str(),
                self.dialect().name(),
            ))
        })
    }
}

/// PostgreSQL operator table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresAdapter;

impl DbAdapter for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn operator_sql(&self, operator: DomainOperator) -> Option<&'static str> {
        match operator {
            DomainOperator::Equals => Some("= ?"),
            DomainOperator::NotEquals => Some("!= ?"),
            DomainOperator::Like => Some("LIKE %?%"),
            DomainOperator::NotLike => Some("NOT LIKE %?%"),
            DomainOperator::LikePattern => Some("LIKE ?"),
            DomainOperator::ILike => Some("ILIKE %?%"),
            DomainOperator::NotILike => Some("NOT ILIKE %?%"),
            DomainOperator::ILikePattern => Some("ILIKE ?"),
            DomainOperator::In => Some("IN (?)"),
            DomainOperator::NotIn => Some("NOT IN (?)"),
            DomainOperator::Lower => Some("< ?"),
            DomainOperator::LowerOrEqual => Some("<= ?"),
            DomainOperator::Greater => Some("> ?"),
            DomainOperator::GreaterOrEqual => Some(">= ?"),
            DomainOperator::ChildOf => None,
        }
    }
}

/// SQLite operator table.
///
/// SQLite has no ILIKE; its LIKE is already case-insensitive for ASCII.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteAdapter;

impl DbAdapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn operator_sql(&self, operator: DomainOperator) -> Option<&'static str> {
        match operator {
            DomainOperator::Equals => Some("= ?"),
            DomainOperator::NotEquals => Some("<> ?"),
            DomainOperator::Like | DomainOperator::ILike => Some("LIKE %?%"),
            DomainOperator::NotLike | DomainOperator::NotILike => Some("NOT LIKE %?%"),
            DomainOperator::LikePattern | DomainOperator::ILikePattern => Some("LIKE ?"),
            DomainOperator::In => Some("IN (?)"),
            DomainOperator::NotIn => Some("NOT IN (?)"),
            DomainOperator::Lower => Some("< ?"),
            DomainOperator::LowerOrEqual => Some("<= ?"),
            DomainOperator::Greater => Some("> ?"),
            DomainOperator::GreaterOrEqual => Some(">= ?"),
            DomainOperator::ChildOf => None,
        }
    }
}

/// MySQL operator table.
///
/// With the default case-insensitive collations LIKE covers the ilike family.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlAdapter;

impl DbAdapter for MysqlAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn operator_sql(&self, operator: DomainOperator) -> Option<&'static str> {
        match operator {
            DomainOperator::Equals => Some("= ?"),
            DomainOperator::NotEquals => Some("<> ?"),
            DomainOperator::Like | DomainOperator::ILike => Some("LIKE %?%"),
            DomainOperator::NotLike | DomainOperator::NotILike => Some("NOT LIKE %?%"),
            DomainOperator::LikePattern | DomainOperator::ILikePattern => Some("LIKE ?"),
            DomainOperator::In => Some("IN (?)"),
            DomainOperator::NotIn => Some("NOT IN (?)"),
            DomainOperator::Lower => Some("< ?"),
            DomainOperator::LowerOrEqual => Some("<= ?"),
            DomainOperator::Greater => Some("> ?"),
            DomainOperator::GreaterOrEqual => Some(">= ?"),
            DomainOperator::ChildOf => None,
        }
    }
}

/// Select the adapter for a configured driver name.
pub fn adapter_for_driver(driver: &str) -> Result<Box<dyn DbAdapter>> {
    match driver.trim().to_lowercase().as_str() {
        "postgres" | "postgresql" => Ok(Box::new(PostgresAdapter)),
        "sqlite" | "sqlite3" => Ok(Box::new(SqliteAdapter)),
        "mysql" => Ok(Box::new(MysqlAdapter)),
        other => Err(Error::Config(ConfigError {
            message: format!("no database adapter for driver '{other}'"),
            source: None,
        })),
    }
}
