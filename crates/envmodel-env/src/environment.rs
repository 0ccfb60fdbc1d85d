//! Execution environments.
//!
//! An [`Environment`] carries the current user identity, a [`Context`], a
//! shared [`Cache`] and a call stack. It is never mutated after creation;
//! every derivation returns a new value whose call stack starts empty.

use crate::cache::Cache;
use crate::context::Context;
use crate::database::Database;
use crate::records::RecordCollection;
use envmodel_core::{Result, Value};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One nested method invocation recorded on an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    /// Name of the invoked method
    pub method: String,
    /// Identity the method ran as
    pub uid: i64,
}

/// Capability shared by everything bound to an environment.
///
/// Each method returns a new value bound to the derived environment and
/// leaves the receiver untouched.
pub trait ContextDerivable: Sized {
    /// Set one context key.
    fn with_context(&self, key: impl Into<String>, value: impl Into<Value>) -> Self;

    /// Replace the context wholesale.
    fn with_new_context(&self, context: Context) -> Self;

    /// Adopt the identity, context and cache of `env`.
    fn with_env(&self, env: &Environment) -> Self;

    /// Switch identity to `uid`, or to the superuser when `None`.
    fn sudo(&self, uid: impl Into<Option<i64>>) -> Self;
}

/// Identity, context, cache and call stack of one logical request.
#[derive(Clone)]
pub struct Environment {
    uid: i64,
    context: Context,
    cache: Arc<RwLock<Cache>>,
    call_stack: Vec<CallFrame>,
    db: Arc<Database>,
}

impl Environment {
    pub(crate) fn new(db: Arc<Database>, uid: i64) -> Self {
        Self {
            uid,
            context: Context::new(),
            cache: Arc::new(RwLock::new(Cache::new())),
            call_stack: Vec::new(),
            db,
        }
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn call_stack(&self) -> &[CallFrame] {
        &self.call_stack
    }

    /// How many frames of `method` are currently on the call stack.
    pub fn frames_named(&self, method: &str) -> usize {
        self.call_stack.iter().filter(|f| f.method == method).count()
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Read access to the cache.
    pub fn cache(&self) -> RwLockReadGuard<'_, Cache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn cache_mut(&self) -> RwLockWriteGuard<'_, Cache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Do both environments use the same cache?
    pub fn shares_cache_with(&self, other: &Environment) -> bool {
        Arc::ptr_eq(&self.cache, &other.cache)
    }

    /// Drop everything cached for this environment and those sharing its cache.
    pub fn invalidate_cache(&self) {
        self.cache_mut().clear();
    }

    /// An empty collection of `model` bound to this environment.
    pub fn pool(&self, model: &str) -> Result<RecordCollection> {
        let meta = self.db.registry().model(model)?;
        Ok(RecordCollection::new(self.clone(), meta, Vec::new()))
    }

    /// A copy with `method` pushed on the call stack.
    pub(crate) fn with_frame(&self, method: &str) -> Self {
        let mut next = self.clone();
        next.call_stack.push(CallFrame {
            method: method.to_string(),
            uid: self.uid,
        });
        next
    }

    fn derive(&self, uid: i64, context: Context) -> Self {
        Self {
            uid,
            context,
            cache: Arc::clone(&self.cache),
            call_stack: Vec::new(),
            db: Arc::clone(&self.db),
        }
    }
}

impl ContextDerivable for Environment {
    fn with_context(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.derive(self.uid, self.context.with_key(key, value))
    }

    fn with_new_context(&self, context: Context) -> Self {
        self.derive(self.uid, context)
    }

    fn with_env(&self, env: &Environment) -> Self {
        env.derive(env.uid, env.context.clone())
    }

    fn sudo(&self, uid: impl Into<Option<i64>>) -> Self {
        let uid = uid
            .into()
            .unwrap_or_else(|| self.db.settings().superuser_id);
        self.derive(uid, self.context.clone())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("uid", &self.uid)
            .field("context", &self.context)
            .field("call_stack", &self.call_stack)
            .finish_non_exhaustive()
    }
}
