//! Statement builders for SELECT, INSERT, UPDATE and DELETE on model tables,
//! plus the link-table statements behind many-to-many fields.
//!
//! Builders validate field names against the model metadata and translate
//! filters through a [`DbAdapter`]; they never touch a connection.

use crate::dialect::{DbAdapter, Dialect};
use crate::domain::Domain;
use envmodel_core::{
    Error, FieldKind, FieldMeta, ID_FIELD, ModelMeta, Result, SchemaError, SchemaErrorKind, Value,
};

/// SELECT query builder.
///
/// Selected columns are aliased back to their field names, so rows can be
/// read by field.
#[derive(Debug, Clone)]
pub struct SelectBuilder<'a> {
    model: &'a ModelMeta,
    fields: Vec<String>,
    filter: Domain,
    order_by_id: bool,
    limit: Option<u64>,
}

impl<'a> SelectBuilder<'a> {
    /// Select every stored field of `model`.
    pub fn new(model: &'a ModelMeta) -> Self {
        Self {
            model,
            fields: model.stored_fields().map(str::to_string).collect(),
            filter: Domain::all(),
            order_by_id: false,
            limit: None,
        }
    }

    /// Restrict the selected fields. `id` is always selected.
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected = vec![ID_FIELD.to_string()];
        for f in fields {
            let f = f.into();
            if !selected.contains(&f) {
                selected.push(f);
            }
        }
        self.fields = selected;
        self
    }

    /// AND another domain into the filter.
    #[must_use]
    pub fn filter(mut self, domain: Domain) -> Self {
        self.filter = std::mem::take(&mut self.filter).and(domain);
        self
    }

    #[must_use]
    pub fn order_by_id(mut self) -> Self {
        self.order_by_id = true;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Build the SELECT SQL and parameters.
    pub fn build(&self, adapter: &dyn DbAdapter) -> Result<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let where_sql = self.filter.to_sql(adapter, self.model, &mut params)?;

        let columns = self
            .fields
            .iter()
            .map(|f| {
                let column = self.model.column_of(f)?;
                let quoted = adapter.quote_identifier(column);
                Ok(if column == f {
                    quoted
                } else {
                    format!("{quoted} AS {}", adapter.quote_identifier(f))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            adapter.quote_identifier(self.model.table())
        );
        if !self.filter.is_all() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        if self.order_by_id {
            sql.push_str(" ORDER BY ");
            sql.push_str(&adapter.quote_identifier(self.model.column_of(ID_FIELD)?));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok((sql, params))
    }
}

/// INSERT query builder.
#[derive(Debug, Clone)]
pub struct InsertBuilder<'a> {
    model: &'a ModelMeta,
    values: Vec<(String, Value)>,
}

impl<'a> InsertBuilder<'a> {
    pub fn new(model: &'a ModelMeta) -> Self {
        Self {
            model,
            values: Vec::new(),
        }
    }

    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((field.into(), value.into()));
        self
    }

    /// Build the INSERT SQL and parameters.
    ///
    /// PostgreSQL gets a `RETURNING` clause for the new id.
    pub fn build(&self, adapter: &dyn DbAdapter) -> Result<(String, Vec<Value>)> {
        let table = adapter.quote_identifier(self.model.table());
        let id_column = adapter.quote_identifier(self.model.column_of(ID_FIELD)?);

        let mut sql = if self.values.is_empty() {
            match adapter.dialect() {
                Dialect::Mysql => format!("INSERT INTO {table} () VALUES ()"),
                Dialect::Postgres | Dialect::Sqlite => {
                    format!("INSERT INTO {table} DEFAULT VALUES")
                }
            }
        } else {
            let mut columns = Vec::with_capacity(self.values.len());
            let mut placeholders = Vec::with_capacity(self.values.len());
            for (i, (field, _)) in self.values.iter().enumerate() {
                columns.push(adapter.quote_identifier(self.model.column_of(field)?));
                placeholders.push(adapter.placeholder(i + 1));
            }
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        if adapter.dialect() == Dialect::Postgres {
            sql.push_str(&format!(" RETURNING {id_column}"));
        }

        let params = self.values.iter().map(|(_, v)| v.clone()).collect();
        Ok((sql, params))
    }
}

/// UPDATE query builder.
#[derive(Debug, Clone)]
pub struct UpdateBuilder<'a> {
    model: &'a ModelMeta,
    set: Vec<(String, Value)>,
    filter: Domain,
}

impl<'a> UpdateBuilder<'a> {
    pub fn new(model: &'a ModelMeta) -> Self {
        Self {
            model,
            set: Vec::new(),
            filter: Domain::all(),
        }
    }

    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn filter(mut self, domain: Domain) -> Self {
        self.filter = std::mem::take(&mut self.filter).and(domain);
        self
    }

    /// Build the UPDATE SQL and parameters.
    pub fn build(&self, adapter: &dyn DbAdapter) -> Result<(String, Vec<Value>)> {
        if self.set.is_empty() {
            return Err(Error::Custom(format!(
                "UPDATE on {} needs at least one field",
                self.model.name()
            )));
        }

        let mut params = Vec::with_capacity(self.set.len());
        let mut assignments = Vec::with_capacity(self.set.len());
        for (field, value) in &self.set {
            if field == ID_FIELD {
                return Err(Error::Custom(format!(
                    "the id of {} records cannot be written",
                    self.model.name()
                )));
            }
            let column = adapter.quote_identifier(self.model.column_of(field)?);
            params.push(value.clone());
            assignments.push(format!("{column} = {}", adapter.placeholder(params.len())));
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            adapter.quote_identifier(self.model.table()),
            assignments.join(", ")
        );
        if !self.filter.is_all() {
            let where_sql = self.filter.to_sql(adapter, self.model, &mut params)?;
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        Ok((sql, params))
    }
}

/// DELETE query builder.
#[derive(Debug, Clone)]
pub struct DeleteBuilder<'a> {
    model: &'a ModelMeta,
    filter: Domain,
}

impl<'a> DeleteBuilder<'a> {
    pub fn new(model: &'a ModelMeta) -> Self {
        Self {
            model,
            filter: Domain::all(),
        }
    }

    #[must_use]
    pub fn filter(mut self, domain: Domain) -> Self {
        self.filter = std::mem::take(&mut self.filter).and(domain);
        self
    }

    /// Build the DELETE SQL and parameters.
    pub fn build(&self, adapter: &dyn DbAdapter) -> Result<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let mut sql = format!(
            "DELETE FROM {}",
            adapter.quote_identifier(self.model.table())
        );
        if !self.filter.is_all() {
            let where_sql = self.filter.to_sql(adapter, self.model, &mut params)?;
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        Ok((sql, params))
    }
}

/// Link-table statements of one many-to-many field.
#[derive(Debug, Clone, Copy)]
pub struct LinkTable<'a> {
    pub relation_table: &'a str,
    pub local_column: &'a str,
    pub remote_column: &'a str,
}

impl<'a> LinkTable<'a> {
    /// Link-table description of `field`, which must be many-to-many.
    pub fn of(model: &ModelMeta, field: &'a FieldMeta) -> Result<Self> {
        match &field.kind {
            FieldKind::Many2Many {
                relation_table,
                local_column,
                remote_column,
                ..
            } => Ok(Self {
                relation_table,
                local_column,
                remote_column,
            }),
            FieldKind::Stored => Err(Error::Schema(SchemaError {
                kind: SchemaErrorKind::WrongFieldKind,
                model: model.name().to_string(),
                field: Some(field.name.clone()),
            })),
        }
    }

    /// `SELECT local, remote FROM links WHERE local IN (...)`
    pub fn select(&self, adapter: &dyn DbAdapter, ids: &[i64]) -> (String, Vec<Value>) {
        let local = adapter.quote_identifier(self.local_column);
        let remote = adapter.quote_identifier(self.remote_column);
        let (cond, params) = self.local_in(adapter, ids);
        let sql = format!(
            "SELECT {local}, {remote} FROM {} WHERE {cond} ORDER BY {local}, {remote}",
            adapter.quote_identifier(self.relation_table)
        );
        (sql, params)
    }

    /// `DELETE FROM links WHERE local IN (...)`
    pub fn delete(&self, adapter: &dyn DbAdapter, ids: &[i64]) -> (String, Vec<Value>) {
        let (cond, params) = self.local_in(adapter, ids);
        let sql = format!(
            "DELETE FROM {} WHERE {cond}",
            adapter.quote_identifier(self.relation_table)
        );
        (sql, params)
    }

    /// `INSERT INTO links (local, remote) VALUES (...)`
    pub fn insert(&self, adapter: &dyn DbAdapter, local_id: i64, remote_id: i64) -> (String, Vec<Value>) {
        let sql = format!(
            "INSERT INTO {} ({}, {}) VALUES ({}, {})",
            adapter.quote_identifier(self.relation_table),
            adapter.quote_identifier(self.local_column),
            adapter.quote_identifier(self.remote_column),
            adapter.placeholder(1),
            adapter.placeholder(2)
        );
        (sql, vec![Value::BigInt(local_id), Value::BigInt(remote_id)])
    }

    fn local_in(&self, adapter: &dyn DbAdapter, ids: &[i64]) -> (String, Vec<Value>) {
        if ids.is_empty() {
            return ("1 = 0".to_string(), Vec::new());
        }
        let placeholders: Vec<_> = (1..=ids.len()).map(|i| adapter.placeholder(i)).collect();
        let cond = format!(
            "{} IN ({})",
            adapter.quote_identifier(self.local_column),
            placeholders.join(", ")
        );
        (cond, ids.iter().map(|&id| Value::BigInt(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MysqlAdapter, PostgresAdapter, SqliteAdapter};

    fn users() -> ModelMeta {
        ModelMeta::new("User", "users")
            .field("name")
            .column("email", "email_address")
            .many2many("tags", "Tag", "user_tags", "user_id", "tag_id")
    }

    #[test]
    fn test_select_all_fields_with_aliases() {
        let model = users();
        let (sql, params) = SelectBuilder::new(&model)
            .filter(Domain::field("name").equals("Jane"))
            .order_by_id()
            .build(&SqliteAdapter)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"id\", \"name\", \"email_address\" AS \"email\" FROM \"users\" \
             WHERE \"name\" = ?1 ORDER BY \"id\""
        );
        assert_eq!(params, vec![Value::Text("Jane".into())]);
    }

    #[test]
    fn test_select_subset_always_has_id() {
        let model = users();
        let (sql, params) = SelectBuilder::new(&model)
            .fields(["name"])
            .limit(1)
            .build(&PostgresAdapter)
            .unwrap();
        assert_eq!(sql, "SELECT \"id\", \"name\" FROM \"users\" LIMIT 1");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_rejects_link_field() {
        let model = users();
        let err = SelectBuilder::new(&model).fields(["tags"]).build(&PostgresAdapter);
        assert!(matches!(err, Err(Error::Schema(_))));
    }

    #[test]
    fn test_insert_per_dialect() {
        let model = users();
        let insert = InsertBuilder::new(&model)
            .set("name", "Jane")
            .set("email", "jane.smith@example.com");

        let (sql, params) = insert.build(&PostgresAdapter).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"users\" (\"name\", \"email_address\") VALUES ($1, $2) RETURNING \"id\""
        );
        assert_eq!(params.len(), 2);

        let (sql, _) = insert.build(&MysqlAdapter).unwrap();
        assert_eq!(sql, "INSERT INTO `users` (`name`, `email_address`) VALUES (?, ?)");

        let (sql, _) = InsertBuilder::new(&model).build(&SqliteAdapter).unwrap();
        assert_eq!(sql, "INSERT INTO \"users\" DEFAULT VALUES");
    }

    #[test]
    fn test_update_numbers_filter_after_assignments() {
        let model = users();
        let (sql, params) = UpdateBuilder::new(&model)
            .set("name", "Jane A. Smith")
            .filter(Domain::field("id").is_in(vec![1_i64, 2]))
            .build(&PostgresAdapter)
            .unwrap();
        assert_eq!(
            sql,
            "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" IN ($2, $3)"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_update_guards() {
        let model = users();
        assert!(UpdateBuilder::new(&model).build(&PostgresAdapter).is_err());
        assert!(
            UpdateBuilder::new(&model)
                .set("id", 5_i64)
                .build(&PostgresAdapter)
                .is_err()
        );
    }

    #[test]
    fn test_delete() {
        let model = users();
        let (sql, params) = DeleteBuilder::new(&model)
            .filter(Domain::field("id").equals(3_i64))
            .build(&SqliteAdapter)
            .unwrap();
        assert_eq!(sql, "DELETE FROM \"users\" WHERE \"id\" = ?1");
        assert_eq!(params, vec![Value::BigInt(3)]);
    }

    #[test]
    fn test_link_statements() {
        let model = users();
        let field = model.get_field("tags").unwrap();
        let link = LinkTable::of(&model, field).unwrap();

        let (sql, params) = link.select(&SqliteAdapter, &[1, 2]);
        assert_eq!(
            sql,
            "SELECT \"user_id\", \"tag_id\" FROM \"user_tags\" WHERE \"user_id\" IN (?1, ?2) \
             ORDER BY \"user_id\", \"tag_id\""
        );
        assert_eq!(params.len(), 2);

        let (sql, params) = link.delete(&SqliteAdapter, &[]);
        assert_eq!(sql, "DELETE FROM \"user_tags\" WHERE 1 = 0");
        assert!(params.is_empty());

        let (sql, params) = link.insert(&PostgresAdapter, 1, 7);
        assert_eq!(sql, "INSERT INTO \"user_tags\" (\"user_id\", \"tag_id\") VALUES ($1, $2)");
        assert_eq!(params, vec![Value::BigInt(1), Value::BigInt(7)]);

        let name = model.get_field("name").unwrap();
        assert!(LinkTable::of(&model, name).is_err());
    }
}
