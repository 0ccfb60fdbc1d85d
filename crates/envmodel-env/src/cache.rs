//! Per-environment record cache.
//!
//! The cache maps a (model, id) pair to the field values read for that
//! record, plus a side table of many-to-many link membership. An entry only
//! ever holds values that were read from, or confirmed by, the database.

use envmodel_core::Value;
use std::collections::{BTreeSet, HashMap};

/// Composite key addressing one record's cached fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheRef {
    pub model: String,
    pub id: i64,
}

impl CacheRef {
    pub fn new(model: impl Into<String>, id: i64) -> Self {
        Self {
            model: model.into(),
            id,
        }
    }
}

/// Key of one loaded many-to-many relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct M2mKey {
    pub model: String,
    pub id: i64,
    pub related_model: String,
}

/// Cached field values and link membership.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    data: HashMap<CacheRef, HashMap<String, Value>>,
    m2m_links: HashMap<M2mKey, BTreeSet<i64>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when neither field data nor links are cached.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.m2m_links.is_empty()
    }

    /// Cached field data, keyed by record.
    pub fn data(&self) -> &HashMap<CacheRef, HashMap<String, Value>> {
        &self.data
    }

    /// Loaded link membership, keyed by relationship.
    pub fn m2m_data(&self) -> &HashMap<M2mKey, BTreeSet<i64>> {
        &self.m2m_links
    }

    /// Does every id have every field cached?
    pub fn check_if_in_cache<S: AsRef<str>>(&self, model: &str, ids: &[i64], fields: &[S]) -> bool {
        ids.iter().all(|&id| self.has_fields(model, id, fields))
    }

    /// Does the record have every field cached?
    pub fn has_fields<S: AsRef<str>>(&self, model: &str, id: i64, fields: &[S]) -> bool {
        match self.data.get(&CacheRef::new(model, id)) {
            Some(values) => fields.iter().all(|f| values.contains_key(f.as_ref())),
            None => fields.is_empty(),
        }
    }

    /// The cached value of one field, if any.
    ///
    /// The cache never queries, so it has no hit flag of its own;
    /// [`RecordCollection::get`](crate::RecordCollection::get) reports
    /// whether it had to load.
    pub fn get(&self, model: &str, id: i64, field: &str) -> Option<&Value> {
        self.data.get(&CacheRef::new(model, id))?.get(field)
    }

    /// All cached fields of one record.
    pub fn record(&self, model: &str, id: i64) -> Option<&HashMap<String, Value>> {
        self.data.get(&CacheRef::new(model, id))
    }

    /// Store one field value.
    pub fn set(&mut self, model: &str, id: i64, field: impl Into<String>, value: Value) {
        self.data
            .entry(CacheRef::new(model, id))
            .or_default()
            .insert(field.into(), value);
    }

    /// Store several fields of one record in one step.
    pub fn set_row<I, K>(&mut self, model: &str, id: i64, values: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let entry = self.data.entry(CacheRef::new(model, id)).or_default();
        entry.extend(values.into_iter().map(|(k, v)| (k.into(), v)));
    }

    /// Drop every cached field of a record.
    pub fn invalidate(&mut self, model: &str, id: i64) {
        self.data.remove(&CacheRef::new(model, id));
    }

    /// Drop one cached field of a record.
    pub fn invalidate_field(&mut self, model: &str, id: i64, field: &str) {
        let key = CacheRef::new(model, id);
        if let Some(values) = self.data.get_mut(&key) {
            values.remove(field);
            if values.is_empty() {
                self.data.remove(&key);
            }
        }
    }

    /// Record the complete set of ids linked to `(model, id)` on `related_model`.
    pub fn set_m2m_links<I>(&mut self, model: &str, id: i64, related_model: &str, linked: I)
    where
        I: IntoIterator<Item = i64>,
    {
        self.m2m_links.insert(
            M2mKey {
                model: model.to_string(),
                id,
                related_model: related_model.to_string(),
            },
            linked.into_iter().collect(),
        );
    }

    /// Linked ids, or `None` when the relationship was never loaded.
    ///
    /// `Some` of an empty set means "loaded, and nothing is linked".
    pub fn m2m_links(&self, model: &str, id: i64, related_model: &str) -> Option<&BTreeSet<i64>> {
        self.m2m_links.get(&M2mKey {
            model: model.to_string(),
            id,
            related_model: related_model.to_string(),
        })
    }

    /// Forget every relationship loaded for `(model, id)`.
    pub fn invalidate_m2m(&mut self, model: &str, id: i64) {
        self.m2m_links.retain(|k, _| !(k.model == model && k.id == id));
    }

    /// Forget every relationship pointing at records of `related_model`.
    pub fn invalidate_m2m_to(&mut self, related_model: &str) {
        self.m2m_links.retain(|k, _| k.related_model != related_model);
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.data.clear();
        self.m2m_links.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cache_is_empty() {
        let cache = Cache::new();
        assert!(cache.is_empty());
        assert!(cache.data().is_empty());
        assert!(cache.m2m_data().is_empty());
    }

    #[test]
    fn test_set_then_get() {
        let mut cache = Cache::new();
        cache.set("User", 1, "name", Value::Text("Jane A. Smith".into()));
        assert_eq!(
            cache.get("User", 1, "name"),
            Some(&Value::Text("Jane A. Smith".into()))
        );
        assert_eq!(cache.get("User", 1, "email"), None);
        assert_eq!(cache.get("User", 2, "name"), None);
        assert_eq!(cache.get("Post", 1, "name"), None);
    }

    #[test]
    fn test_check_if_in_cache_needs_every_field_of_every_id() {
        let mut cache = Cache::new();
        cache.set_row(
            "User",
            1,
            [("id", Value::BigInt(1)), ("name", Value::Text("Jane".into()))],
        );
        cache.set_row("User", 2, [("id", Value::BigInt(2))]);

        assert!(cache.check_if_in_cache("User", &[1], &["id", "name"]));
        assert!(!cache.check_if_in_cache("User", &[1, 2], &["id", "name"]));
        assert!(cache.check_if_in_cache("User", &[1, 2], &["id"]));
        assert!(!cache.check_if_in_cache("User", &[3], &["id"]));
        assert!(cache.check_if_in_cache::<&str>("User", &[3], &[]));
    }

    #[test]
    fn test_invalidation() {
        let mut cache = Cache::new();
        cache.set_row(
            "User",
            1,
            [("id", Value::BigInt(1)), ("name", Value::Text("Jane".into()))],
        );

        cache.invalidate_field("User", 1, "name");
        assert!(!cache.has_fields("User", 1, &["name"]));
        assert!(cache.has_fields("User", 1, &["id"]));

        cache.invalidate_field("User", 1, "id");
        assert!(cache.record("User", 1).is_none());

        cache.set("User", 1, "name", Value::Null);
        cache.invalidate("User", 1);
        assert!(cache.data().is_empty());
    }

    #[test]
    fn test_m2m_absence_is_not_emptiness() {
        let mut cache = Cache::new();
        assert!(cache.m2m_links("User", 1, "Tag").is_none());

        cache.set_m2m_links("User", 1, "Tag", Vec::new());
        assert_eq!(cache.m2m_links("User", 1, "Tag").map(BTreeSet::len), Some(0));

        cache.set_m2m_links("User", 2, "Tag", [4, 3]);
        let linked: Vec<_> = cache.m2m_links("User", 2, "Tag").unwrap().iter().copied().collect();
        assert_eq!(linked, vec![3, 4]);

        cache.invalidate_m2m("User", 1);
        assert!(cache.m2m_links("User", 1, "Tag").is_none());
        assert!(cache.m2m_links("User", 2, "Tag").is_some());

        cache.invalidate_m2m_to("Tag");
        assert!(cache.m2m_data().is_empty());
    }

    #[test]
    fn test_clear() {
        let mut cache = Cache::new();
        cache.set("User", 1, "id", Value::BigInt(1));
        cache.set_m2m_links("User", 1, "Tag", [1]);
        cache.clear();
        assert!(cache.is_empty());
    }
}
