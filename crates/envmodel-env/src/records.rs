//! Record collections bound to an environment.
//!
//! A [`RecordCollection`] is a model plus an ordered set of record ids,
//! bound to one [`Environment`]. Reads go through the environment's cache;
//! writes go to the database and invalidate what they touched.

use crate::context::Context;
use crate::environment::{ContextDerivable, Environment};
use envmodel_core::{
    CacheMissError, Error, FieldKind, FieldMeta, ID_FIELD, ModelMeta, RecordError,
    RecordErrorKind, Result, Row, Value,
};
use envmodel_query::{
    DbAdapter, DeleteBuilder, Domain, InsertBuilder, LinkTable, SelectBuilder, UpdateBuilder,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::slice::Chunks;
use std::sync::Arc;

/// Ids of one model bound to one environment.
#[derive(Clone)]
pub struct RecordCollection {
    env: Environment,
    model: Arc<ModelMeta>,
    ids: Vec<i64>,
}

impl RecordCollection {
    pub(crate) fn new(env: Environment, model: Arc<ModelMeta>, ids: Vec<i64>) -> Self {
        let mut seen = HashSet::with_capacity(ids.len());
        let ids = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        Self { env, model, ids }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn model(&self) -> &ModelMeta {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Bound ids in order.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// A collection of the same model and environment bound to `ids`.
    pub fn browse(&self, ids: impl IntoIterator<Item = i64>) -> Self {
        Self::new(
            self.env.clone(),
            Arc::clone(&self.model),
            ids.into_iter().collect(),
        )
    }

    /// The single bound id, or an error when the collection is not a singleton.
    pub fn ensure_one(&self) -> Result<i64> {
        match self.ids.as_slice() {
            [id] => Ok(*id),
            ids => Err(Error::Record(RecordError {
                kind: RecordErrorKind::NotSingleton,
                model: self.model.name().to_string(),
                message: format!("expected a single record, got {}", ids.len()),
            })),
        }
    }

    /// One singleton collection per bound id.
    pub fn records(&self) -> Vec<RecordCollection> {
        self.ids.iter().map(|&id| self.browse([id])).collect()
    }

    /// A copy whose environment has `method` pushed on its call stack.
    #[must_use]
    pub fn with_frame(&self, method: &str) -> Self {
        Self {
            env: self.env.with_frame(method),
            model: Arc::clone(&self.model),
            ids: self.ids.clone(),
        }
    }

    /// Make sure `fields` (all stored fields when empty) are cached for every
    /// bound id, querying only the records that have gaps.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.model.name(), ids = self.ids.len()))]
    pub fn load(&self, fields: &[&str]) -> Result<Self> {
        let mut wanted: Vec<String> = vec![ID_FIELD.to_string()];
        if fields.is_empty() {
            wanted.extend(self.model.stored_fields().skip(1).map(str::to_string));
        } else {
            for f in fields {
                self.model.column_of(f)?;
                if !wanted.iter().any(|w| w == f) {
                    wanted.push((*f).to_string());
                }
            }
        }

        let gaps: Vec<i64> = {
            let cache = self.env.cache();
            self.ids
                .iter()
                .copied()
                .filter(|&id| !cache.has_fields(self.model.name(), id, wanted.as_slice()))
                .collect()
        };
        if gaps.is_empty() {
            tracing::debug!("All requested fields already cached");
            return Ok(self.clone());
        }
        tracing::debug!(gaps = gaps.len(), fields = ?wanted, "Loading missing fields");

        let db = self.env.database();
        let mut found = HashSet::with_capacity(gaps.len());
        for batch in id_batches(db.adapter(), &gaps, 0) {
            let (sql, params) = SelectBuilder::new(&self.model)
                .fields(wanted.iter().skip(1).cloned())
                .filter(Domain::field(ID_FIELD).is_in(batch.to_vec()))
                .build(db.adapter())?;
            let rows = db.query(&sql, &params)?;
            found.extend(self.cache_rows(&rows)?);
        }

        for id in gaps.iter().filter(|id| !found.contains(*id)) {
            tracing::warn!(model = %self.model.name(), id, "Record no longer exists");
        }
        Ok(self.clone())
    }

    /// Read one field of a singleton.
    ///
    /// Returns the value and whether a database query was needed. With
    /// `cache_only`, an uncached field fails with a cache miss instead of
    /// being fetched.
    pub fn get(&self, field: &str, cache_only: bool) -> Result<(Value, bool)> {
        let id = self.ensure_one()?;
        self.model.column_of(field)?;

        if let Some(value) = self.cached(id, field) {
            return Ok((value, false));
        }
        if cache_only {
            return Err(self.cache_miss(id, field));
        }
        self.load(&[field])?;
        match self.cached(id, field) {
            Some(value) => Ok((value, true)),
            None => Err(self.missing_record(id)),
        }
    }

    /// Every stored field of every bound record, in id order.
    pub fn fetch_all(&self) -> Result<Vec<BTreeMap<String, Value>>> {
        self.load(&[])?;
        let cache = self.env.cache();
        let mut out = Vec::with_capacity(self.ids.len());
        for &id in &self.ids {
            let Some(record) = cache.record(self.model.name(), id) else {
                continue;
            };
            out.push(
                self.model
                    .stored_fields()
                    .filter_map(|f| record.get(f).map(|v| (f.to_string(), v.clone())))
                    .collect(),
            );
        }
        Ok(out)
    }

    /// Records of this model matching `domain`, ordered by id.
    ///
    /// Only ids are selected; the cache is left untouched until fields are
    /// loaded. The whole domain is translated before any SQL runs; an
    /// operator the adapter cannot express aborts the search without
    /// touching the database.
    #[tracing::instrument(level = "debug", skip(self, domain), fields(model = %self.model.name()))]
    pub fn search(&self, domain: &Domain) -> Result<Self> {
        let db = self.env.database();
        let (sql, params) = SelectBuilder::new(&self.model)
            .fields(std::iter::empty::<String>())
            .filter(domain.clone())
            .order_by_id()
            .build(db.adapter())?;
        let rows = db.query(&sql, &params)?;

        let ids = rows
            .iter()
            .map(|row| row.get_named::<i64>(ID_FIELD))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(found = ids.len(), "Search complete");
        Ok(self.browse(ids))
    }

    /// Insert one record and return it, with its stored fields cached as
    /// read back from the database.
    #[tracing::instrument(level = "debug", skip(self, values), fields(model = %self.model.name()))]
    pub fn create<I, K, V>(&self, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let db = self.env.database();
        let builder = values
            .into_iter()
            .fold(InsertBuilder::new(&self.model), |b, (k, v)| b.set(k, v));
        let (sql, params) = builder.build(db.adapter())?;
        let id = db.insert(&sql, &params)?;
        tracing::debug!(id, "Record created");

        let created = self.browse([id]);
        created.load(&[])?;
        Ok(created)
    }

    /// Update every bound record, then drop the written fields from the cache.
    ///
    /// The fields are dropped even when an update fails, since earlier
    /// batches may already have been applied.
    #[tracing::instrument(level = "debug", skip(self, values), fields(model = %self.model.name(), ids = self.ids.len()))]
    pub fn write<I, K, V>(&self, values: I) -> Result<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values: Vec<(String, Value)> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if self.ids.is_empty() || values.is_empty() {
            return Ok(0);
        }

        let outcome = self.update_rows(&values);
        {
            let mut cache = self.env.cache_mut();
            for &id in &self.ids {
                for (field, _) in &values {
                    cache.invalidate_field(self.model.name(), id, field);
                }
            }
        }
        let affected = outcome?;
        tracing::debug!(affected, "Records written");
        Ok(affected)
    }

    fn update_rows(&self, values: &[(String, Value)]) -> Result<u64> {
        let db = self.env.database();
        let mut affected = 0;
        for batch in id_batches(db.adapter(), &self.ids, values.len()) {
            let (sql, params) = values
                .iter()
                .fold(UpdateBuilder::new(&self.model), |b, (k, v)| b.set(k.clone(), v.clone()))
                .filter(Domain::field(ID_FIELD).is_in(batch.to_vec()))
                .build(db.adapter())?;
            affected += db.execute(&sql, &params)?;
        }
        Ok(affected)
    }

    /// Delete every bound record along with its link rows.
    ///
    /// Cache entries of the bound records are dropped whether or not every
    /// statement succeeded.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.model.name(), ids = self.ids.len()))]
    pub fn unlink(&self) -> Result<u64> {
        if self.ids.is_empty() {
            return Ok(0);
        }
        let outcome = self.delete_rows();
        {
            let mut cache = self.env.cache_mut();
            for &id in &self.ids {
                cache.invalidate(self.model.name(), id);
                cache.invalidate_m2m(self.model.name(), id);
            }
            cache.invalidate_m2m_to(self.model.name());
        }
        let deleted = outcome?;
        tracing::debug!(deleted, "Records unlinked");
        Ok(deleted)
    }

    fn delete_rows(&self) -> Result<u64> {
        let db = self.env.database();
        for field in self.model.fields() {
            if matches!(field.kind, FieldKind::Many2Many { .. }) {
                let link = LinkTable::of(&self.model, field)?;
                for batch in id_batches(db.adapter(), &self.ids, 0) {
                    let (sql, params) = link.delete(db.adapter(), batch);
                    db.execute(&sql, &params)?;
                }
            }
        }
        let mut deleted = 0;
        for batch in id_batches(db.adapter(), &self.ids, 0) {
            let (sql, params) = DeleteBuilder::new(&self.model)
                .filter(Domain::field(ID_FIELD).is_in(batch.to_vec()))
                .build(db.adapter())?;
            deleted += db.execute(&sql, &params)?;
        }
        Ok(deleted)
    }

    /// Cache the many-to-many links of `field` for every bound id.
    ///
    /// An id without link rows is cached as an empty set.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.model.name()))]
    pub fn load_m2m(&self, field: &str) -> Result<Self> {
        let meta = self.model.get_field(field)?;
        let link = LinkTable::of(&self.model, meta)?;
        let related = related_model(meta);

        let gaps: Vec<i64> = {
            let cache = self.env.cache();
            self.ids
                .iter()
                .copied()
                .filter(|&id| cache.m2m_links(self.model.name(), id, related).is_none())
                .collect()
        };
        if gaps.is_empty() {
            return Ok(self.clone());
        }

        let db = self.env.database();
        let mut linked: HashMap<i64, Vec<i64>> = gaps.iter().map(|&id| (id, Vec::new())).collect();
        for batch in id_batches(db.adapter(), &gaps, 0) {
            let (sql, params) = link.select(db.adapter(), batch);
            for row in &db.query(&sql, &params)? {
                let local = row.get_named::<i64>(link.local_column)?;
                let remote = row.get_named::<i64>(link.remote_column)?;
                linked.entry(local).or_default().push(remote);
            }
        }

        let mut cache = self.env.cache_mut();
        for (id, remotes) in linked {
            cache.set_m2m_links(self.model.name(), id, related, remotes);
        }
        Ok(self.clone())
    }

    /// Linked ids of a singleton's many-to-many `field`, and whether a query
    /// was needed.
    pub fn get_m2m(&self, field: &str, cache_only: bool) -> Result<(Vec<i64>, bool)> {
        let id = self.ensure_one()?;
        let meta = self.model.get_field(field)?;
        LinkTable::of(&self.model, meta)?;
        let related = related_model(meta);

        let cached = |env: &Environment| {
            env.cache()
                .m2m_links(self.model.name(), id, related)
                .map(|set| set.iter().copied().collect::<Vec<_>>())
        };
        if let Some(ids) = cached(&self.env) {
            return Ok((ids, false));
        }
        if cache_only {
            return Err(self.cache_miss(id, field));
        }
        self.load_m2m(field)?;
        cached(&self.env)
            .map(|ids| (ids, true))
            .ok_or_else(|| self.missing_record(id))
    }

    /// Replace the links of `field` for every bound id.
    ///
    /// The cached links are dropped even when a statement fails part way.
    #[tracing::instrument(level = "debug", skip(self, linked), fields(model = %self.model.name()))]
    pub fn set_m2m(&self, field: &str, linked: &[i64]) -> Result<()> {
        let meta = self.model.get_field(field)?;
        let link = LinkTable::of(&self.model, meta)?;
        let related = related_model(meta);

        let outcome = self.replace_links(&link, linked);
        {
            let mut cache = self.env.cache_mut();
            for &id in &self.ids {
                cache.invalidate_m2m(self.model.name(), id);
            }
            cache.invalidate_m2m_to(self.model.name());
            // The reverse direction may be cached from the related side.
            cache.invalidate_m2m_to(related);
        }
        outcome
    }

    fn replace_links(&self, link: &LinkTable<'_>, linked: &[i64]) -> Result<()> {
        let db = self.env.database();
        for batch in id_batches(db.adapter(), &self.ids, 0) {
            let (sql, params) = link.delete(db.adapter(), batch);
            db.execute(&sql, &params)?;
        }
        for &id in &self.ids {
            for &remote in linked {
                let (sql, params) = link.insert(db.adapter(), id, remote);
                db.execute(&sql, &params)?;
            }
        }
        Ok(())
    }

    /// The records linked through a many-to-many `field` of a singleton.
    pub fn related(&self, field: &str) -> Result<RecordCollection> {
        let meta = self.model.get_field(field)?;
        let related = related_model(meta);
        let (ids, _) = self.get_m2m(field, false)?;
        let target = self.env.database().registry().model(related)?;
        Ok(RecordCollection::new(self.env.clone(), target, ids))
    }

    fn cached(&self, id: i64, field: &str) -> Option<Value> {
        self.env.cache().get(self.model.name(), id, field).cloned()
    }

    fn cache_rows(&self, rows: &[Row]) -> Result<HashSet<i64>> {
        let mut parsed = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.get_named::<i64>(ID_FIELD)?;
            let values: Vec<(String, Value)> = row
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            parsed.push((id, values));
        }

        let mut cache = self.env.cache_mut();
        let mut found = HashSet::with_capacity(parsed.len());
        for (id, values) in parsed {
            cache.set_row(self.model.name(), id, values);
            found.insert(id);
        }
        Ok(found)
    }

    fn cache_miss(&self, id: i64, field: &str) -> Error {
        Error::CacheMiss(CacheMissError {
            model: self.model.name().to_string(),
            id,
            field: field.to_string(),
        })
    }

    fn missing_record(&self, id: i64) -> Error {
        Error::Record(RecordError {
            kind: RecordErrorKind::MissingRecord,
            model: self.model.name().to_string(),
            message: format!("record {id} does not exist"),
        })
    }

    fn rebind(&self, env: Environment) -> Self {
        Self {
            env,
            model: Arc::clone(&self.model),
            ids: self.ids.clone(),
        }
    }
}

/// `ids` split so that each statement keeps `reserved` parameters for
/// itself and stays within the adapter's limit.
fn id_batches<'i>(adapter: &dyn DbAdapter, ids: &'i [i64], reserved: usize) -> Chunks<'i, i64> {
    ids.chunks(adapter.max_params().saturating_sub(reserved).max(1))
}

fn related_model(field: &FieldMeta) -> &str {
    match &field.kind {
        FieldKind::Many2Many { related_model, .. } => related_model,
        FieldKind::Stored => "",
    }
}

impl ContextDerivable for RecordCollection {
    fn with_context(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.rebind(self.env.with_context(key, value))
    }

    fn with_new_context(&self, context: Context) -> Self {
        self.rebind(self.env.with_new_context(context))
    }

    fn with_env(&self, env: &Environment) -> Self {
        self.rebind(self.env.with_env(env))
    }

    fn sudo(&self, uid: impl Into<Option<i64>>) -> Self {
        self.rebind(self.env.sudo(uid))
    }
}

impl fmt::Debug for RecordCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.model.name(), self.ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use envmodel_core::{Executor, IsolationLevel, ModelRegistry};
    use envmodel_query::{Dialect, DomainOperator, PostgresAdapter, SqliteAdapter};
    use std::sync::Mutex;

    /// Executor serving canned rows and recording every statement.
    #[derive(Default)]
    struct Scripted {
        rows: Mutex<Vec<Vec<Row>>>,
        statements: Mutex<Vec<String>>,
        next_id: Mutex<i64>,
    }

    impl Scripted {
        fn with_rows(rows: Vec<Vec<Row>>) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Self::default()
            }
        }

        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    impl Executor for Scripted {
        fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            self.statements.lock().unwrap().push(sql.to_string());
            let mut rows = self.rows.lock().unwrap();
            Ok(if rows.is_empty() { Vec::new() } else { rows.remove(0) })
        }
        fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
            self.statements.lock().unwrap().push(sql.to_string());
            Ok(1)
        }
        fn insert(&self, sql: &str, _params: &[Value]) -> Result<i64> {
            self.statements.lock().unwrap().push(sql.to_string());
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(*next)
        }
        fn begin(&self, _isolation: IsolationLevel) -> Result<()> {
            Ok(())
        }
        fn commit(&self) -> Result<()> {
            Ok(())
        }
        fn rollback(&self) -> Result<()> {
            Ok(())
        }
    }

    fn user_row(id: i64, name: &str, email: &str) -> Row {
        Row::new(
            vec!["id".into(), "name".into(), "email".into()],
            vec![
                Value::BigInt(id),
                Value::Text(name.into()),
                Value::Text(email.into()),
            ],
        )
    }

    fn setup(rows: Vec<Vec<Row>>) -> (Arc<Scripted>, Environment) {
        let exec = Arc::new(Scripted::with_rows(rows));
        let registry = ModelRegistry::new().with_model(
            ModelMeta::new("User", "users")
                .field("name")
                .field("email")
                .many2many("tags", "Tag", "user_tags", "user_id", "tag_id"),
        );
        let db = Arc::new(Database::new(exec.clone(), Box::new(SqliteAdapter), registry));
        (exec, db.new_environment(1))
    }

    /// SQLite operators with room for two parameters per statement.
    #[derive(Debug)]
    struct TwoParams;

    impl DbAdapter for TwoParams {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }
        fn operator_sql(&self, operator: DomainOperator) -> Option<&'static str> {
            SqliteAdapter.operator_sql(operator)
        }
        fn max_params(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_id_lists_split_at_parameter_limit() {
        let exec = Arc::new(Scripted::default());
        let registry = ModelRegistry::new().with_model(
            ModelMeta::new("User", "users")
                .field("name")
                .many2many("tags", "Tag", "user_tags", "user_id", "tag_id"),
        );
        let db = Arc::new(Database::new(exec.clone(), Box::new(TwoParams), registry));
        let users = db.new_environment(1).pool("User").unwrap().browse(1..=5);

        users.load(&["name"]).unwrap();
        let loads = exec.statements();
        assert_eq!(loads.len(), 3);
        assert!(loads[0].ends_with(r#"WHERE "id" IN (?1, ?2)"#), "{}", loads[0]);
        assert!(loads[2].ends_with(r#"WHERE "id" IN (?1)"#), "{}", loads[2]);

        // One slot goes to the written value
        assert_eq!(users.write([("name", "x")]).unwrap(), 5);
        assert_eq!(exec.statements().len(), 3 + 5);

        // Link rows then records, three batches each
        assert_eq!(users.unlink().unwrap(), 3);
        assert_eq!(exec.statements().len(), 3 + 5 + 6);
    }

    #[test]
    fn test_browse_deduplicates_in_order() {
        let (_, env) = setup(Vec::new());
        let users = env.pool("User").unwrap().browse([3, 1, 3, 2]);
        assert_eq!(users.ids(), &[3, 1, 2]);
        assert_eq!(users.len(), 3);
        assert_eq!(users.records().len(), 3);
        assert!(users.ensure_one().is_err());
        assert_eq!(users.browse([9]).ensure_one().unwrap(), 9);
    }

    #[test]
    fn test_load_queries_only_gaps() {
        let (exec, env) = setup(vec![vec![user_row(1, "Jane", "jane@example.com")]]);
        let users = env.pool("User").unwrap().browse([1]);

        users.load(&[]).unwrap();
        users.load(&["name"]).unwrap();
        assert_eq!(exec.statements().len(), 1);
        assert!(
            env.cache()
                .check_if_in_cache("User", &[1], &["id", "name", "email"])
        );
    }

    #[test]
    fn test_get_reports_database_hits() {
        let (exec, env) = setup(vec![vec![Row::new(
            vec!["id".into(), "name".into()],
            vec![Value::BigInt(4), Value::Text("Ann".into())],
        )]]);
        let user = env.pool("User").unwrap().browse([4]);

        let err = user.get("name", true).unwrap_err();
        assert!(err.is_cache_miss());
        assert!(exec.statements().is_empty());

        assert_eq!(user.get("name", false).unwrap(), (Value::Text("Ann".into()), true));
        assert_eq!(user.get("name", true).unwrap(), (Value::Text("Ann".into()), false));
    }

    #[test]
    fn test_get_missing_record() {
        let (_, env) = setup(Vec::new());
        let ghost = env.pool("User").unwrap().browse([99]);
        assert!(matches!(
            ghost.get("name", false),
            Err(Error::Record(RecordError { kind: RecordErrorKind::MissingRecord, .. }))
        ));
    }

    #[test]
    fn test_unsupported_operator_issues_no_sql() {
        let (exec, env) = setup(Vec::new());
        let domain = Domain::field("name")
            .equals("Jane")
            .and(Domain::field("id").child_of(1_i64));
        let err = env.pool("User").unwrap().search(&domain).unwrap_err();
        assert!(err.is_unsupported_operator());
        assert!(exec.statements().is_empty());
    }

    #[test]
    fn test_search_selects_ids_only() {
        let (exec, env) = setup(vec![vec![
            user_row(1, "Jane", "jane@example.com"),
            user_row(2, "John", "john@example.com"),
        ]]);
        let found = env
            .pool("User")
            .unwrap()
            .search(&Domain::field("name").like("J"))
            .unwrap();
        assert_eq!(found.ids(), &[1, 2]);
        assert_eq!(
            exec.statements()[0],
            "SELECT \"id\" FROM \"users\" WHERE \"name\" LIKE ?1 ORDER BY \"id\""
        );
        assert!(env.cache().is_empty());
        assert!(found.records()[1].get("email", true).unwrap_err().is_cache_miss());
    }

    #[test]
    fn test_write_invalidates_written_fields() {
        let (exec, env) = setup(vec![vec![user_row(1, "Jane", "jane@example.com")]]);
        let user = env.pool("User").unwrap().browse([1]);
        user.load(&[]).unwrap();

        user.write([("name", "Jane A. Smith")]).unwrap();
        assert!(user.get("name", true).unwrap_err().is_cache_miss());
        assert!(user.get("email", true).is_ok());
        assert!(exec.statements()[1].starts_with("UPDATE \"users\" SET \"name\" = ?1"));
    }

    #[test]
    fn test_unlink_drops_cache_and_links() {
        let (exec, env) = setup(vec![vec![user_row(1, "Jane", "jane@example.com")]]);
        let user = env.pool("User").unwrap().browse([1]);
        user.load(&[]).unwrap();
        env.cache_mut().set_m2m_links("User", 1, "Tag", [5]);

        user.unlink().unwrap();
        assert!(env.cache().is_empty());
        let statements = exec.statements();
        assert!(statements[1].starts_with("DELETE FROM \"user_tags\""));
        assert!(statements[2].starts_with("DELETE FROM \"users\""));
    }

    #[test]
    fn test_create_reads_back_row() {
        let (exec, env) = setup(vec![vec![user_row(1, "Jane", "jane@example.com")]]);
        let user = env
            .pool("User")
            .unwrap()
            .create([("name", "Jane"), ("email", "jane@example.com")])
            .unwrap();
        assert_eq!(user.ids(), &[1]);
        assert_eq!(user.get("name", true).unwrap().0, Value::Text("Jane".into()));
        assert_eq!(exec.statements().len(), 2);
    }

    #[test]
    fn test_m2m_loaded_empty_is_cached() {
        let link_rows = vec![Row::new(
            vec!["user_id".into(), "tag_id".into()],
            vec![Value::BigInt(1), Value::BigInt(8)],
        )];
        let (exec, env) = setup(vec![link_rows]);
        let users = env.pool("User").unwrap().browse([1, 2]);

        assert!(users.browse([1]).get_m2m("tags", true).unwrap_err().is_cache_miss());
        users.load_m2m("tags").unwrap();
        assert_eq!(users.browse([1]).get_m2m("tags", true).unwrap(), (vec![8], false));
        assert_eq!(users.browse([2]).get_m2m("tags", true).unwrap(), (vec![], false));
        users.load_m2m("tags").unwrap();
        assert_eq!(exec.statements().len(), 1);
    }

    #[test]
    fn test_derivations_rebind() {
        let (_, env) = setup(Vec::new());
        let users = env.pool("User").unwrap().browse([1]).with_frame("write");
        assert_eq!(users.env().frames_named("write"), 1);

        let fr = users.with_context("lang", "fr_FR");
        assert_eq!(fr.ids(), users.ids());
        assert!(fr.env().call_stack().is_empty());
        assert!(!users.env().context().has_key("lang"));

        let admin = users.sudo(None);
        assert_eq!(admin.env().uid(), 1);
        let other = users.sudo(7_i64);
        assert_eq!(other.env().uid(), 7);
        assert_eq!(users.env().uid(), 1);
    }

    #[test]
    fn test_postgres_adapter_renders_dollar_placeholders() {
        let exec = Arc::new(Scripted::default());
        let db = Arc::new(Database::new(
            exec.clone(),
            Box::new(PostgresAdapter),
            ModelRegistry::new().with_model(ModelMeta::new("User", "users").field("name")),
        ));
        let env = db.new_environment(1);
        env.pool("User").unwrap().browse([1, 2]).load(&["name"]).unwrap();
        assert_eq!(
            exec.statements()[0],
            "SELECT \"id\", \"name\" FROM \"users\" WHERE \"id\" IN ($1, $2)"
        );
    }
}
