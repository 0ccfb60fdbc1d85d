//! Execution environments and record caching for envmodel.
//!
//! `envmodel-env` is the **environment layer**. Every data operation runs in
//! an [`Environment`] carrying the current user identity, a request-scoped
//! [`Context`] and a [`Cache`] of field values read from the database.
//!
//! # Role In The Architecture
//!
//! - **Context**: immutable key/value bag; derivations copy on write.
//! - **Environment**: identity + context + cache + call stack. Derivations
//!   (`with_context`, `with_new_context`, `with_env`, `sudo`) return new
//!   environments and always start with an empty call stack.
//! - **Cache**: `(model, id) -> field -> value`, plus loaded many-to-many
//!   links. Only database-confirmed values are ever cached.
//! - **Record collections**: ids of one model bound to one environment; reads
//!   consult the cache before querying, writes invalidate.
//!
//! # Sharing
//!
//! `with_context`, `with_new_context` and `sudo` keep the cache of the
//! environment they derive from; `with_env` adopts the cache of the target
//! environment. The cache sits behind a lock so shared use stays memory
//! safe, but one logical request should own a cache at a time.
//!
//! # Example
//!
//! ```ignore
//! let db = Arc::new(Database::new(executor, Box::new(SqliteAdapter), registry));
//! let env = db.new_environment(2);
//!
//! let jane = env
//!     .pool("User")?
//!     .search(&Domain::field("email").equals("jane.smith@example.com"))?;
//! let (name, hit) = jane.get("name", false)?; // queried, now cached
//! assert!(hit);
//! let (name, hit) = jane.get("name", true)?; // cache only
//! assert!(!hit);
//!
//! let admin = jane.sudo(None); // same ids, superuser identity
//! ```

pub mod cache;
pub mod context;
pub mod database;
pub mod environment;
pub mod records;

pub use cache::{Cache, CacheRef, M2mKey};
pub use context::Context;
pub use database::{Database, EnvSettings, SUPERUSER_ID};
pub use environment::{CallFrame, ContextDerivable, Environment};
pub use records::RecordCollection;
