//! Model metadata lookups.
//!
//! The environment layer does not own model definitions; it only asks two
//! questions of them: "does field X exist on model M" and "which column
//! stores X". [`ModelRegistry`] answers both.

use crate::error::{Error, Result, SchemaError, SchemaErrorKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the identity field every model carries.
pub const ID_FIELD: &str = "id";

/// How a field is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A column of the model's own table.
    Stored,
    /// A link table joining this model to `related_model`.
    Many2Many {
        /// The model on the other side of the link
        related_model: String,
        /// The link table name (e.g., `"user_tags"`)
        relation_table: String,
        /// Column in the link table pointing to this model
        local_column: String,
        /// Column in the link table pointing to the related model
        remote_column: String,
    },
}

/// Metadata about a model field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    /// Field name used in domains and cache entries
    pub name: String,
    /// Database column name (may differ from field name)
    pub column: String,
    /// Storage kind
    pub kind: FieldKind,
}

impl FieldMeta {
    pub fn is_stored(&self) -> bool {
        matches!(self.kind, FieldKind::Stored)
    }
}

/// Metadata about one model: its table and its fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMeta {
    name: String,
    table: String,
    fields: Vec<FieldMeta>,
}

impl ModelMeta {
    /// Create a model with only its `id` field.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: vec![FieldMeta {
                name: ID_FIELD.to_string(),
                column: ID_FIELD.to_string(),
                kind: FieldKind::Stored,
            }],
        }
    }

    /// Add a stored field whose column has the same name.
    #[must_use]
    pub fn field(self, name: impl Into<String>) -> Self {
        let name = name.into();
        let column = name.clone();
        self.column(name, column)
    }

    /// Add a stored field backed by a differently named column.
    #[must_use]
    pub fn column(self, name: impl Into<String>, column: impl Into<String>) -> Self {
        self.with_field(FieldMeta {
            name: name.into(),
            column: column.into(),
            kind: FieldKind::Stored,
        })
    }

    /// Add a many-to-many field stored in a link table.
    #[must_use]
    pub fn many2many(
        mut self,
        name: impl Into<String>,
        related_model: impl Into<String>,
        relation_table: impl Into<String>,
        local_column: impl Into<String>,
        remote_column: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.with_field(FieldMeta {
            column: name.clone(),
            name,
            kind: FieldKind::Many2Many {
                related_model: related_model.into(),
                relation_table: relation_table.into(),
                local_column: local_column.into(),
                remote_column: remote_column.into(),
            },
        })
    }

    /// Redefining a field replaces it in place. `id` is fixed.
    fn with_field(mut self, field: FieldMeta) -> Self {
        if field.name == ID_FIELD {
            return self;
        }
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn get_field(&self, name: &str) -> Result<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name).ok_or_else(|| {
            Error::Schema(SchemaError {
                kind: SchemaErrorKind::FieldNotFound,
                model: self.name.clone(),
                field: Some(name.to_string()),
            })
        })
    }

    /// Does the model have a field with this name?
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Storage column of a stored field.
    pub fn column_of(&self, name: &str) -> Result<&str> {
        let field = self.get_field(name)?;
        if !field.is_stored() {
            return Err(Error::Schema(SchemaError {
                kind: SchemaErrorKind::WrongFieldKind,
                model: self.name.clone(),
                field: Some(name.to_string()),
            }));
        }
        Ok(&field.column)
    }

    /// Names of all stored fields, `id` first.
    pub fn stored_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.is_stored())
            .map(|f| f.name.as_str())
    }
}

/// Registry resolving model names to their metadata.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<ModelMeta>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, replacing any previous definition with the same name.
    #[must_use]
    pub fn with_model(mut self, model: ModelMeta) -> Self {
        self.register(model);
        self
    }

    pub fn register(&mut self, model: ModelMeta) {
        self.models.insert(model.name.clone(), Arc::new(model));
    }

    /// Resolve a model by name.
    pub fn model(&self, name: &str) -> Result<Arc<ModelMeta>> {
        self.models.get(name).cloned().ok_or_else(|| {
            Error::Schema(SchemaError {
                kind: SchemaErrorKind::ModelNotFound,
                model: name.to_string(),
                field: None,
            })
        })
    }

    /// Field metadata of `field` on `model`.
    pub fn field(&self, model: &str, field: &str) -> Result<FieldMeta> {
        Ok(self.model(model)?.get_field(field)?.clone())
    }

    /// Storage column of `field` on `model`.
    pub fn column(&self, model: &str, field: &str) -> Result<String> {
        Ok(self.model(model)?.column_of(field)?.to_string())
    }

    /// Names of the stored fields of `model`, `id` first.
    pub fn stored_fields(&self, model: &str) -> Result<Vec<String>> {
        Ok(self
            .model(model)?
            .stored_fields()
            .map(str::to_string)
            .collect())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> ModelMeta {
        ModelMeta::new("User", "users")
            .field("name")
            .column("email", "email_address")
            .many2many("tags", "Tag", "user_tags", "user_id", "tag_id")
    }

    #[test]
    fn id_is_always_first() {
        let model = users();
        let stored: Vec<_> = model.stored_fields().collect();
        assert_eq!(stored, vec!["id", "name", "email"]);
    }

    #[test]
    fn redefined_fields_are_not_duplicated() {
        let model = users()
            .field("id")
            .column("id", "pk")
            .column("name", "full_name");
        let stored: Vec<_> = model.stored_fields().collect();
        assert_eq!(stored, vec!["id", "name", "email"]);
        assert_eq!(model.column_of("id").unwrap(), "id");
        assert_eq!(model.column_of("name").unwrap(), "full_name");
    }

    #[test]
    fn column_lookups() {
        let registry = ModelRegistry::new().with_model(users());
        assert_eq!(registry.column("User", "email").unwrap(), "email_address");
        assert_eq!(registry.column("User", "name").unwrap(), "name");
        assert_eq!(registry.stored_fields("User").unwrap(), vec!["id", "name", "email"]);
        assert!(!registry.field("User", "tags").unwrap().is_stored());

        match registry.column("User", "tags") {
            Err(Error::Schema(e)) => assert_eq!(e.kind, SchemaErrorKind::WrongFieldKind),
            other => panic!("expected wrong field kind, got {other:?}"),
        }
        match registry.column("User", "phone") {
            Err(Error::Schema(e)) => assert_eq!(e.kind, SchemaErrorKind::FieldNotFound),
            other => panic!("expected missing field, got {other:?}"),
        }
        match registry.model("Post") {
            Err(Error::Schema(e)) => assert_eq!(e.kind, SchemaErrorKind::ModelNotFound),
            other => panic!("expected missing model, got {other:?}"),
        }
    }

    #[test]
    fn many2many_metadata() {
        let model = users();
        let tags = model.get_field("tags").unwrap();
        assert!(!tags.is_stored());
        match &tags.kind {
            FieldKind::Many2Many {
                related_model,
                relation_table,
                ..
            } => {
                assert_eq!(related_model, "Tag");
                assert_eq!(relation_table, "user_tags");
            }
            FieldKind::Stored => panic!("tags should be a link field"),
        }
    }
}
