//! Domain predicate trees and their translation to SQL.
//!
//! A domain is a boolean combination of leaf predicates `(field, operator,
//! value)`. Translation goes through a [`DbAdapter`], so the same domain
//! renders differently on each engine while keeping one meaning.

use crate::dialect::DbAdapter;
use crate::operator::DomainOperator;
use envmodel_core::{DomainError, DomainErrorKind, Error, ModelMeta, Result, Value};
use serde::{Deserialize, Serialize};

/// A single `(field, operator, value)` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub operator: DomainOperator,
    pub value: Value,
}

/// A predicate tree over the fields of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Leaf(Predicate),
    /// All children hold. Empty means "every record".
    And(Vec<Domain>),
    /// At least one child holds. Empty means "no record".
    Or(Vec<Domain>),
    Not(Box<Domain>),
}

impl Default for Domain {
    fn default() -> Self {
        Domain::all()
    }
}

impl Domain {
    /// The domain matching every record.
    pub fn all() -> Self {
        Domain::And(Vec::new())
    }

    /// Start a leaf on `field`.
    pub fn field(name: impl Into<String>) -> FieldCondition {
        FieldCondition { field: name.into() }
    }

    /// Build a leaf directly.
    pub fn leaf(field: impl Into<String>, operator: DomainOperator, value: impl Into<Value>) -> Self {
        Domain::Leaf(Predicate {
            field: field.into(),
            operator,
            value: value.into(),
        })
    }

    /// Negate a domain.
    pub fn not(inner: Domain) -> Self {
        Domain::Not(Box::new(inner))
    }

    /// Conjunction, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: Domain) -> Self {
        match (self, other) {
            (Domain::And(mut a), Domain::And(b)) => {
                a.extend(b);
                Domain::And(a)
            }
            (Domain::And(mut a), other) => {
                a.push(other);
                Domain::And(a)
            }
            (this, Domain::And(mut b)) => {
                b.insert(0, this);
                Domain::And(b)
            }
            (this, other) => Domain::And(vec![this, other]),
        }
    }

    /// Disjunction, flattening nested `Or`s.
    #[must_use]
    pub fn or(self, other: Domain) -> Self {
        match (self, other) {
            (Domain::Or(mut a), Domain::Or(b)) => {
                a.extend(b);
                Domain::Or(a)
            }
            (Domain::Or(mut a), other) => {
                a.push(other);
                Domain::Or(a)
            }
            (this, other) => Domain::Or(vec![this, other]),
        }
    }

    /// Does this domain match every record?
    pub fn is_all(&self) -> bool {
        matches!(self, Domain::And(children) if children.is_empty())
    }

    /// Leaves in depth-first order.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            Domain::Leaf(p) => out.push(p),
            Domain::And(children) | Domain::Or(children) => {
                for child in children {
                    child.collect_predicates(out);
                }
            }
            Domain::Not(inner) => inner.collect_predicates(out),
        }
    }

    /// Translate into a WHERE fragment for `model`.
    ///
    /// Bound operands are appended to `params`; placeholder numbering
    /// continues from the parameters already present. Nothing is appended
    /// when translation fails.
    pub fn to_sql(
        &self,
        adapter: &dyn DbAdapter,
        model: &ModelMeta,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        // Validate every operator up front so a bad leaf deep in the tree
        // fails before any fragment is produced.
        for predicate in self.predicates() {
            adapter.require_operator(predicate.operator).map_err(|e| match e {
                Error::Domain(mut de) => {
                    de.field = Some(predicate.field.clone());
                    Error::Domain(de)
                }
                e => e,
            })?;
        }

        let mut local = Vec::new();
        let offset = params.len();
        let sql = self.render(adapter, model, offset, &mut local)?;
        params.extend(local);
        Ok(sql)
    }

    fn render(
        &self,
        adapter: &dyn DbAdapter,
        model: &ModelMeta,
        offset: usize,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        match self {
            Domain::Leaf(p) => render_predicate(adapter, model, p, offset, params),
            Domain::And(children) => {
                render_group(adapter, model, children, " AND ", "1 = 1", offset, params)
            }
            Domain::Or(children) => {
                render_group(adapter, model, children, " OR ", "1 = 0", offset, params)
            }
            Domain::Not(inner) => {
                let sql = inner.render(adapter, model, offset, params)?;
                Ok(format!("NOT ({sql})"))
            }
        }
    }
}

fn render_group(
    adapter: &dyn DbAdapter,
    model: &ModelMeta,
    children: &[Domain],
    joiner: &str,
    empty: &str,
    offset: usize,
    params: &mut Vec<Value>,
) -> Result<String> {
    match children {
        [] => Ok(empty.to_string()),
        [only] => only.render(adapter, model, offset, params),
        _ => {
            let parts = children
                .iter()
                .map(|c| c.render(adapter, model, offset, params).map(|s| format!("({s})")))
                .collect::<Result<Vec<_>>>()?;
            Ok(parts.join(joiner))
        }
    }
}

fn invalid_value(field: &str, message: String) -> Error {
    Error::Domain(DomainError {
        kind: DomainErrorKind::InvalidValue,
        field: Some(field.to_string()),
        message,
    })
}

fn render_predicate(
    adapter: &dyn DbAdapter,
    model: &ModelMeta,
    predicate: &Predicate,
    offset: usize,
    params: &mut Vec<Value>,
) -> Result<String> {
    let Predicate {
        field,
        operator,
        value,
    } = predicate;
    let column = adapter.quote_identifier(model.column_of(field)?);
    let template = adapter.require_operator(*operator)?;

    if value.is_null() {
        match operator {
            DomainOperator::Equals => return Ok(format!("{column} IS NULL")),
            DomainOperator::NotEquals => return Ok(format!("{column} IS NOT NULL")),
            _ => {}
        }
    }

    if let Some(wrapped) = template.strip_suffix("%?%") {
        let text = value.to_pattern_text().ok_or_else(|| {
            invalid_value(
                field,
                format!("operator '{operator}' needs a text operand, got {}", value.type_name()),
            )
        })?;
        params.push(Value::Text(format!("%{text}%")));
        let ph = adapter.placeholder(offset + params.len());
        return Ok(format!("{column} {wrapped}{ph}"));
    }

    if let Some(wrapped) = template.strip_suffix("(?)") {
        let items: Vec<Value> = match value {
            Value::Array(items) => items.clone(),
            Value::Null => {
                return Err(invalid_value(
                    field,
                    format!("operator '{operator}' needs a list operand, got NULL"),
                ));
            }
            scalar => vec![scalar.clone()],
        };
        if items.is_empty() {
            return Ok(match operator {
                DomainOperator::NotIn => "1 = 1".to_string(),
                _ => "1 = 0".to_string(),
            });
        }
        let mut placeholders = Vec::with_capacity(items.len());
        for item in items {
            params.push(item);
            placeholders.push(adapter.placeholder(offset + params.len()));
        }
        return Ok(format!("{column} {wrapped}({})", placeholders.join(", ")));
    }

    if matches!(value, Value::Array(_)) {
        return Err(invalid_value(
            field,
            format!("operator '{operator}' does not accept a list operand"),
        ));
    }
    if operator.is_pattern() && value.to_pattern_text().is_none() {
        return Err(invalid_value(
            field,
            format!("operator '{operator}' needs a text operand, got {}", value.type_name()),
        ));
    }

    params.push(value.clone());
    let ph = adapter.placeholder(offset + params.len());
    Ok(format!("{column} {}", template.replacen('?', &ph, 1)))
}

/// Leaf builder returned by [`Domain::field`].
#[derive(Debug, Clone)]
pub struct FieldCondition {
    field: String,
}

impl FieldCondition {
    pub fn op(self, operator: DomainOperator, value: impl Into<Value>) -> Domain {
        Domain::leaf(self.field, operator, value)
    }

    pub fn equals(self, value: impl Into<Value>) -> Domain {
        self.op(DomainOperator::Equals, value)
    }

    pub fn not_equals(self, value: impl Into<Value>) -> Domain {
        self.op(DomainOperator::NotEquals, value)
    }

    /// Substring match.
    pub fn like(self, value: impl Into<Value>) -> Domain {
        self.op(DomainOperator::Like, value)
    }

    pub fn not_like(self, value: impl Into<Value>) -> Domain {
        self.op(DomainOperator::NotLike, value)
    }

    /// Match a caller-supplied LIKE pattern verbatim.
    pub fn like_pattern(self, pattern: impl Into<Value>) -> Domain {
        self.op(DomainOperator::LikePattern, pattern)
    }

    pub fn ilike(self, value: impl Into<Value>) -> Domain {
        self.op(DomainOperator::ILike, value)
    }

    pub fn not_ilike(self, value: impl Into<Value>) -> Domain {
        self.op(DomainOperator::NotILike, value)
    }

    pub fn ilike_pattern(self, pattern: impl Into<Value>) -> Domain {
        self.op(DomainOperator::ILikePattern, pattern)
    }

    pub fn is_in(self, values: impl Into<Value>) -> Domain {
        self.op(DomainOperator::In, values)
    }

    pub fn not_in(self, values: impl Into<Value>) -> Domain {
        self.op(DomainOperator::NotIn, values)
    }

    pub fn lt(self, value: impl Into<Value>) -> Domain {
        self.op(DomainOperator::Lower, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Domain {
        self.op(DomainOperator::LowerOrEqual, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Domain {
        self.op(DomainOperator::Greater, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Domain {
        self.op(DomainOperator::GreaterOrEqual, value)
    }

    pub fn child_of(self, value: impl Into<Value>) -> Domain {
        self.op(DomainOperator::ChildOf, value)
    }
}
