//! SQLite connection implementation.
//!
//! This module provides safe wrappers around SQLite's C API and implements
//! the blocking [`Executor`] contract from envmodel-core.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers
#![allow(clippy::if_not_else)] // Clearer for error handling

use crate::ffi;
use crate::types;
use envmodel_core::{
    ColumnInfo, Error, Executor, IsolationLevel, Result, Row, Value,
    error::{ConnectionError, ConnectionErrorKind, QueryErrorKind},
};
use std::ffi::{CStr, CString, c_int};
use std::fmt;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// Inner state of the SQLite connection, protected by a mutex.
struct SqliteInner {
    db: *mut ffi::sqlite3,
    in_transaction: bool,
}

// SAFETY: the handle is only touched while the owning Mutex is held.
unsafe impl Send for SqliteInner {}

/// A blocking connection to a SQLite database.
///
/// All access to the underlying handle goes through an internal mutex, so a
/// connection can be shared behind an `Arc` and used as an [`Executor`].
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

// SqliteConnection is Send + Sync because all access goes through the Mutex
unsafe impl Send for SqliteConnection {}
unsafe impl Sync for SqliteConnection {}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str())
            .map_err(|_| connect_error("Invalid path: contains null byte".to_string()))?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if !db.is_null() {
                // SAFETY: db is valid, errmsg returns a valid C string
                unsafe {
                    let msg = last_error_message(db);
                    ffi::sqlite3_close(db);
                    msg
                }
            } else {
                ffi::error_string(rc).to_string()
            };

            return Err(connect_error(format!("Failed to open database: {}", msg)));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        debug!(path = %config.path, version = ffi::version(), "Opened SQLite database");

        Ok(Self {
            inner: Mutex::new(SqliteInner {
                db,
                in_transaction: false,
            }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Open an in-memory database ready to be shared as an [`Executor`].
    pub fn shared_memory() -> Result<Arc<Self>> {
        Self::open_memory().map(Arc::new)
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a transaction opened through [`Executor::begin`] is active.
    pub fn in_transaction(&self) -> bool {
        self.lock().in_transaction
    }

    /// Execute SQL directly without preparing (for DDL, scripts, etc.)
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.lock();
        exec_script(inner.db, sql)
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> i64 {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(inner.db) }
    }

    /// Get the number of rows changed by the last statement.
    pub fn changes(&self) -> i32 {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_changes(inner.db) }
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Prepare and execute a query, returning all rows.
    fn query_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let inner = self.lock();
        let stmt = prepare_stmt(inner.db, sql)?;
        bind_all(inner.db, stmt, sql, params)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt) };
        let mut col_names = Vec::with_capacity(col_count as usize);
        for i in 0..col_count {
            // SAFETY: stmt is valid, i is in range
            let name =
                unsafe { types::column_name(stmt, i) }.unwrap_or_else(|| format!("col{}", i));
            col_names.push(name);
        }
        let columns = Arc::new(ColumnInfo::new(col_names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            let rc = unsafe { ffi::sqlite3_step(stmt) };
            match rc {
                ffi::SQLITE_ROW => {
                    let mut values = Vec::with_capacity(col_count as usize);
                    for i in 0..col_count {
                        // SAFETY: stmt is valid, we just got SQLITE_ROW
                        values.push(unsafe { types::read_column(stmt, i) });
                    }
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => {
                    let err = step_error(inner.db, sql);
                    // SAFETY: stmt is valid
                    unsafe { ffi::sqlite3_finalize(stmt) };
                    return Err(err);
                }
            }
        }

        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_finalize(stmt) };

        trace!(sql, rows = rows.len(), "SQLite query");
        Ok(rows)
    }

    /// Prepare and execute a statement, returning rows affected.
    fn execute_stmt(&self, inner: &SqliteInner, sql: &str, params: &[Value]) -> Result<u64> {
        let stmt = prepare_stmt(inner.db, sql)?;
        bind_all(inner.db, stmt, sql, params)?;

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(stmt) };
        let result = match rc {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid
                let changes = unsafe { ffi::sqlite3_changes(inner.db) };
                Ok(changes as u64)
            }
            _ => Err(step_error(inner.db, sql)),
        };

        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_finalize(stmt) };

        if let Ok(changes) = result {
            trace!(sql, changes, "SQLite execute");
        }
        result
    }

    fn set_transaction(&self, expect_open: bool, sql: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.in_transaction != expect_open {
            let message = if expect_open {
                "Not in a transaction"
            } else {
                "Already in a transaction"
            };
            return Err(Error::query(
                QueryErrorKind::Transaction,
                Some(sql),
                message,
            ));
        }

        exec_script(inner.db, sql)?;
        inner.in_transaction = !expect_open;
        debug!(path = %self.path, statement = sql, "SQLite transaction state changed");
        Ok(())
    }
}

impl Executor for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.query_rows(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let inner = self.lock();
        self.execute_stmt(&inner, sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        // Hold the lock across both calls so the rowid belongs to this insert
        let inner = self.lock();
        self.execute_stmt(&inner, sql, params)?;
        // SAFETY: db is valid
        Ok(unsafe { ffi::sqlite3_last_insert_rowid(inner.db) })
    }

    fn begin(&self, isolation: IsolationLevel) -> Result<()> {
        // SQLite has no isolation levels; approximate with transaction types
        let begin_sql = match isolation {
            IsolationLevel::Serializable => "BEGIN EXCLUSIVE",
            IsolationLevel::RepeatableRead | IsolationLevel::ReadCommitted => "BEGIN IMMEDIATE",
            IsolationLevel::ReadUncommitted => "BEGIN DEFERRED",
        };
        self.set_transaction(false, begin_sql)
    }

    fn commit(&self) -> Result<()> {
        self.set_transaction(true, "COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.set_transaction(true, "ROLLBACK")
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !inner.db.is_null() {
            // SAFETY: db is valid and no statement outlives a call
            unsafe {
                ffi::sqlite3_close_v2(inner.db);
            }
            inner.db = ptr::null_mut();
        }
    }
}

// Helper functions

fn connect_error(message: String) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Connect,
        message,
        source: None,
    })
}

/// # Safety
/// `db` must be a valid connection handle.
unsafe fn last_error_message(db: *mut ffi::sqlite3) -> String {
    // SAFETY: guaranteed by the caller
    unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)).to_string_lossy().into_owned() }
}

fn exec_script(db: *mut ffi::sqlite3, sql: &str) -> Result<()> {
    let c_sql = CString::new(sql)
        .map_err(|_| Error::query(QueryErrorKind::Syntax, Some(sql), "SQL contains null byte"))?;

    let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };

    if rc != ffi::SQLITE_OK {
        let msg = if !errmsg.is_null() {
            // SAFETY: errmsg is a valid C string allocated by SQLite
            unsafe {
                let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                ffi::sqlite3_free(errmsg.cast());
                msg
            }
        } else {
            ffi::error_string(rc).to_string()
        };

        return Err(Error::query(error_code_to_kind(rc), Some(sql), msg));
    }

    Ok(())
}

fn prepare_stmt(db: *mut ffi::sqlite3, sql: &str) -> Result<*mut ffi::sqlite3_stmt> {
    let c_sql = CString::new(sql)
        .map_err(|_| Error::query(QueryErrorKind::Syntax, Some(sql), "SQL contains null byte"))?;

    let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe {
        ffi::sqlite3_prepare_v2(
            db,
            c_sql.as_ptr(),
            c_sql.as_bytes().len() as c_int,
            &mut stmt,
            ptr::null_mut(),
        )
    };

    if rc != ffi::SQLITE_OK {
        return Err(step_error(db, sql));
    }

    Ok(stmt)
}

/// Bind every parameter, finalizing the statement on failure.
fn bind_all(
    db: *mut ffi::sqlite3,
    stmt: *mut ffi::sqlite3_stmt,
    sql: &str,
    params: &[Value],
) -> Result<()> {
    for (i, param) in params.iter().enumerate() {
        // SAFETY: stmt is valid, index is 1-based
        let rc = unsafe { types::bind_value(stmt, (i + 1) as c_int, param) };
        if rc != ffi::SQLITE_OK {
            // SAFETY: db is valid
            let msg = unsafe { last_error_message(db) };
            // SAFETY: stmt is valid
            unsafe { ffi::sqlite3_finalize(stmt) };
            return Err(Error::query(
                QueryErrorKind::Database,
                Some(sql),
                format!("Failed to bind parameter {}: {}", i + 1, msg),
            ));
        }
    }
    Ok(())
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe { (last_error_message(db), ffi::sqlite3_errcode(db)) };
    Error::query(error_code_to_kind(code), Some(sql), msg)
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH | ffi::SQLITE_READONLY => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        _ => QueryErrorKind::Database,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory() {
        let conn = SqliteConnection::open_memory().unwrap();
        assert_eq!(conn.path(), ":memory:");
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_execute_raw() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        conn.execute_raw("INSERT INTO test (name) VALUES ('Alice')")
            .unwrap();
        assert_eq!(conn.last_insert_rowid(), 1);
        assert_eq!(conn.changes(), 1);
    }

    #[test]
    fn test_query() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        conn.execute_raw("INSERT INTO test (name) VALUES ('Alice'), ('Bob')")
            .unwrap();

        let rows = conn
            .query("SELECT id, name FROM test ORDER BY id", &[])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_named::<i64>("id").unwrap(), 1);
        assert_eq!(rows[0].get_named::<String>("name").unwrap(), "Alice");
        assert_eq!(rows[1].get_named::<String>("name").unwrap(), "Bob");
    }

    #[test]
    fn test_parameterized_query() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
            .unwrap();
        conn.execute(
            "INSERT INTO test (name, age) VALUES (?1, ?2)",
            &[Value::Text("Alice".into()), Value::Int(30)],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO test (name, age) VALUES (?1, ?2)",
            &[Value::Text("Bob".into()), Value::Int(25)],
        )
        .unwrap();

        let rows = conn
            .query("SELECT name FROM test WHERE age > ?1", &[Value::Int(26)])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<String>("name").unwrap(), "Alice");
    }

    #[test]
    fn test_null_handling() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        conn.execute("INSERT INTO test (name) VALUES (?1)", &[Value::Null])
            .unwrap();

        let rows = conn.query("SELECT name FROM test", &[]).unwrap();
        assert_eq!(rows[0].get_by_name("name"), Some(&Value::Null));
        assert_eq!(rows[0].get_named::<Option<String>>("name").unwrap(), None);
    }

    #[test]
    fn test_insert_returns_rowid() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        let first = conn
            .insert("INSERT INTO test (name) VALUES (?1)", &[Value::Text("a".into())])
            .unwrap();
        let second = conn
            .insert("INSERT INTO test (name) VALUES (?1)", &[Value::Text("b".into())])
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_transaction() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();

        conn.begin(IsolationLevel::default()).unwrap();
        assert!(conn.in_transaction());
        conn.execute("INSERT INTO test (name) VALUES ('Alice')", &[])
            .unwrap();
        conn.rollback().unwrap();
        assert!(!conn.in_transaction());

        let rows = conn.query("SELECT * FROM test", &[]).unwrap();
        assert!(rows.is_empty());

        conn.begin(IsolationLevel::Serializable).unwrap();
        conn.execute("INSERT INTO test (name) VALUES ('Bob')", &[])
            .unwrap();
        conn.commit().unwrap();

        let rows = conn.query("SELECT * FROM test", &[]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_transaction_state_errors() {
        let conn = SqliteConnection::open_memory().unwrap();

        let err = conn.commit().unwrap_err();
        assert!(matches!(
            err,
            Error::Query(ref q) if q.kind == QueryErrorKind::Transaction
        ));

        conn.begin(IsolationLevel::ReadCommitted).unwrap();
        let err = conn.begin(IsolationLevel::ReadCommitted).unwrap_err();
        assert!(matches!(
            err,
            Error::Query(ref q) if q.kind == QueryErrorKind::Transaction
        ));
        conn.rollback().unwrap();
        assert!(conn.rollback().is_err());
    }

    #[test]
    fn test_type_conversions() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw(
            "CREATE TABLE types (b INTEGER, i INTEGER, f REAL, s TEXT, data BLOB, tags TEXT)",
        )
        .unwrap();

        conn.execute(
            "INSERT INTO types VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            &[
                Value::Bool(true),
                Value::BigInt(1_234_567_890_123),
                Value::Double(2.5),
                Value::Text("hello".into()),
                Value::Bytes(vec![1, 2, 3]),
                Value::Array(vec![Value::Text("a".into()), Value::BigInt(2)]),
            ],
        )
        .unwrap();

        let rows = conn.query("SELECT * FROM types", &[]).unwrap();
        let row = &rows[0];
        assert!(row.get_named::<bool>("b").unwrap());
        assert_eq!(row.get_named::<i64>("i").unwrap(), 1_234_567_890_123);
        assert!((row.get_named::<f64>("f").unwrap() - 2.5).abs() < 1e-9);
        assert_eq!(row.get_named::<String>("s").unwrap(), "hello");
        assert_eq!(row.get_by_name("data"), Some(&Value::Bytes(vec![1, 2, 3])));
        assert_eq!(row.get_named::<String>("tags").unwrap(), r#"["a",2]"#);
    }

    #[test]
    fn test_integers_read_back_as_bigint() {
        let conn = SqliteConnection::open_memory().unwrap();
        let rows = conn.query("SELECT 7 AS n", &[]).unwrap();
        assert_eq!(rows[0].get_by_name("n"), Some(&Value::BigInt(7)));
    }

    #[test]
    fn test_constraint_error_kind() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE u (email TEXT UNIQUE)").unwrap();
        conn.execute("INSERT INTO u VALUES ('a@x')", &[]).unwrap();
        let err = conn.execute("INSERT INTO u VALUES ('a@x')", &[]).unwrap_err();
        match err {
            Error::Query(q) => {
                assert_eq!(q.kind, QueryErrorKind::Constraint);
                assert_eq!(q.sql.as_deref(), Some("INSERT INTO u VALUES ('a@x')"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error_reported_as_query_error() {
        let conn = SqliteConnection::open_memory().unwrap();
        let err = conn.query("SELEC 1", &[]).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
        assert_eq!(err.sql(), Some("SELEC 1"));
    }

    #[test]
    fn test_open_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.db");
        let path = path.to_string_lossy().into_owned();

        // Read-only open of a missing file fails
        let missing = SqliteConnection::open(&SqliteConfig::file(&path).flags(OpenFlags::read_only()));
        assert!(matches!(missing, Err(Error::Connection(_))));

        {
            let conn = SqliteConnection::open_file(&path).unwrap();
            conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY)")
                .unwrap();
        }

        let ro = SqliteConnection::open(&SqliteConfig::file(&path).flags(OpenFlags::read_only()))
            .unwrap();
        assert!(ro.query("SELECT * FROM test", &[]).unwrap().is_empty());
        let err = ro.execute("INSERT INTO test DEFAULT VALUES", &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::Query(ref q) if q.kind == QueryErrorKind::Permission
        ));
    }

    #[test]
    fn test_shared_across_threads() {
        let conn = SqliteConnection::shared_memory().unwrap();
        conn.execute_raw("CREATE TABLE n (v INTEGER)").unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let conn = Arc::clone(&conn);
                std::thread::spawn(move || {
                    conn.execute("INSERT INTO n VALUES (?1)", &[Value::BigInt(i)])
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let rows = conn.query("SELECT COUNT(*) AS c FROM n", &[]).unwrap();
        assert_eq!(rows[0].get_named::<i64>("c").unwrap(), 4);
    }
}
