//! Vendor-neutral comparison operators used in domain leaves.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A comparison operator of the domain algebra.
///
/// The set is closed. Each database adapter maps every operator to a SQL
/// template, except `ChildOf`, which is reserved and unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomainOperator {
    /// `=`
    #[serde(rename = "=")]
    Equals,
    /// `!=`
    #[serde(rename = "!=")]
    NotEquals,
    /// Substring match, value wrapped as `%value%`
    #[serde(rename = "like")]
    Like,
    /// Negated substring match
    #[serde(rename = "not like")]
    NotLike,
    /// Raw LIKE pattern supplied by the caller
    #[serde(rename = "=like")]
    LikePattern,
    /// Case-insensitive substring match
    #[serde(rename = "ilike")]
    ILike,
    /// Negated case-insensitive substring match
    #[serde(rename = "not ilike")]
    NotILike,
    /// Raw case-insensitive pattern supplied by the caller
    #[serde(rename = "=ilike")]
    ILikePattern,
    /// Membership in a list
    #[serde(rename = "in")]
    In,
    /// Non-membership in a list
    #[serde(rename = "not in")]
    NotIn,
    /// `<`
    #[serde(rename = "<")]
    Lower,
    /// `<=`
    #[serde(rename = "<=")]
    LowerOrEqual,
    /// `>`
    #[serde(rename = ">")]
    Greater,
    /// `>=`
    #[serde(rename = ">=")]
    GreaterOrEqual,
    /// Hierarchical containment (reserved)
    #[serde(rename = "child_of")]
    ChildOf,
}

impl DomainOperator {
    /// All operators, in declaration order.
    pub const ALL: [DomainOperator; 15] = [
        DomainOperator::Equals,
        DomainOperator::NotEquals,
        DomainOperator::Like,
        DomainOperator::NotLike,
        DomainOperator::LikePattern,
        DomainOperator::ILike,
        DomainOperator::NotILike,
        DomainOperator::ILikePattern,
        DomainOperator::In,
        DomainOperator::NotIn,
        DomainOperator::Lower,
        DomainOperator::LowerOrEqual,
        DomainOperator::Greater,
        DomainOperator::GreaterOrEqual,
        DomainOperator::ChildOf,
    ];

    /// The textual form used in serialized domains.
    pub const fn as_str(self) -> &'static str {
        match self {
            DomainOperator::Equals => "=",
            DomainOperator::NotEquals => "!=",
            DomainOperator::Like => "like",
            DomainOperator::NotLike => "not like",
            DomainOperator::LikePattern => "=like",
            DomainOperator::ILike => "ilike",
            DomainOperator::NotILike => "not ilike",
            DomainOperator::ILikePattern => "=ilike",
            DomainOperator::In => "in",
            DomainOperator::NotIn => "not in",
            DomainOperator::Lower => "<",
            DomainOperator::LowerOrEqual => "<=",
            DomainOperator::Greater => ">",
            DomainOperator::GreaterOrEqual => ">=",
            DomainOperator::ChildOf => "child_of",
        }
    }

    /// Parse the textual form (case-insensitive, surrounding spaces ignored).
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|op| op.as_str() == needle)
    }

    /// Does the operator take a list operand?
    pub const fn is_multi(self) -> bool {
        matches!(self, DomainOperator::In | DomainOperator::NotIn)
    }

    /// Does the operator expect a pattern operand?
    pub const fn is_pattern(self) -> bool {
        matches!(
            self,
            DomainOperator::Like
                | DomainOperator::NotLike
                | DomainOperator::LikePattern
                | DomainOperator::ILike
                | DomainOperator::NotILike
                | DomainOperator::ILikePattern
        )
    }
}

impl fmt::Display for DomainOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
