//! # Predicate - Row Filtering
//!
//! A predicate is a boolean expression evaluated against a decoded [`Row`].
//! The engine only depends on the [`RowFilter`] trait, so new expression
//! kinds (or plain closures) plug in without touching it.
//!
//! ```rust
//! use codec::{row, Value};
//! use predicate::{Predicate, RowFilter};
//!
//! let p = Predicate::equal("topic_forum_id", 3).and(Predicate::equal("topic_locked", 0).not());
//! let r = row([("topic_forum_id", Value::from(3)), ("topic_locked", Value::from(1))]);
//! assert!(p.evaluate(&r));
//! ```
//!
//! An absent predicate (`None`) matches every row; see [`matches`].

use std::fmt;

use codec::{Row, Value};

/// Anything that can accept or reject a row.
pub trait RowFilter {
    fn evaluate(&self, row: &Row) -> bool;
}

impl<F> RowFilter for F
where
    F: Fn(&Row) -> bool,
{
    fn evaluate(&self, row: &Row) -> bool {
        self(row)
    }
}

/// Evaluates an optional filter; `None` matches everything.
#[must_use]
pub fn matches(filter: Option<&dyn RowFilter>, row: &Row) -> bool {
    filter.map_or(true, |f| f.evaluate(row))
}

/// Expression tree over column values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The row's value for `column` equals `value` (see [`Value::loosely_eq`]).
    /// A row without the column never matches.
    Equal { column: String, value: Value },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn equal(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Equal {
            column: column.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Conjunction of all `preds`; `None` when the list is empty.
    pub fn all<I: IntoIterator<Item = Predicate>>(preds: I) -> Option<Self> {
        preds.into_iter().reduce(Predicate::and)
    }

    /// Disjunction of all `preds`; `None` when the list is empty.
    pub fn any<I: IntoIterator<Item = Predicate>>(preds: I) -> Option<Self> {
        preds.into_iter().reduce(Predicate::or)
    }

    /// Column names referenced anywhere in the expression.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Equal { column, .. } => {
                if !out.contains(&column.as_str()) {
                    out.push(column);
                }
            }
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
            Predicate::Not(p) => p.collect_columns(out),
        }
    }
}

impl RowFilter for Predicate {
    fn evaluate(&self, row: &Row) -> bool {
        match self {
            Predicate::Equal { column, value } => row
                .get(column)
                .map_or(false, |actual| actual.loosely_eq(value)),
            Predicate::And(a, b) => a.evaluate(row) && b.evaluate(row),
            Predicate::Or(a, b) => a.evaluate(row) || b.evaluate(row),
            Predicate::Not(p) => !p.evaluate(row),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equal { column, value } => write!(f, "{column} = {value}"),
            Predicate::And(a, b) => write!(f, "({a} AND {b})"),
            Predicate::Or(a, b) => write!(f, "({a} OR {b})"),
            Predicate::Not(p) => write!(f, "NOT {p}"),
        }
    }
}
