//! Rank query composition.
//!
//! Filters become [`Predicate`]s, each carrying its own bound [`Param`]. A
//! [`PredicateList`] joins any subset of them with a single `WHERE` and `AND`
//! in between, numbering placeholders for the target [`Dialect`]. No value is
//! ever written into the SQL text.
//!
//! SQLite has no timestamp type: stored values are text in whatever format
//! the writer used, so time predicates compare `julianday()` of both sides
//! rather than the raw strings.

use crate::cache::EntityId;
use crate::db::Dialect;
use time::UtcDateTime;

const SELECT_RANKS: &str = "SELECT id, book_id, category_id, rank, timestamp, change FROM rank";

fn order_by(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Sqlite => " ORDER BY julianday(timestamp), id",
        Dialect::Postgres => " ORDER BY timestamp, id",
    }
}

/// A value bound to a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Id(EntityId),
    Timestamp(UtcDateTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    AtLeast,
    Before,
}
impl Comparison {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::AtLeast => ">=",
            Self::Before => "<",
        }
    }
}

/// A single `column <op> <placeholder>` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    column: &'static str,
    comparison: Comparison,
    param: Param,
}
impl Predicate {
    /// Render with `placeholder` standing in for the bound value.
    fn to_sql(&self, dialect: Dialect, placeholder: &str) -> String {
        let op = self.comparison.as_sql();
        match (dialect, self.param) {
            (Dialect::Sqlite, Param::Timestamp(_)) => {
                format!("julianday({}) {op} julianday({placeholder})", self.column)
            },
            _ => format!("{} {op} {placeholder}", self.column),
        }
    }

    pub fn book(id: EntityId) -> Self {
        Self { column: "book_id", comparison: Comparison::Eq, param: Param::Id(id) }
    }

    pub fn category(id: EntityId) -> Self {
        Self { column: "category_id", comparison: Comparison::Eq, param: Param::Id(id) }
    }

    /// Inclusive lower bound.
    pub fn starting_at(start: UtcDateTime) -> Self {
        Self { column: "timestamp", comparison: Comparison::AtLeast, param: Param::Timestamp(start) }
    }

    /// Exclusive upper bound.
    pub fn ending_before(end: UtcDateTime) -> Self {
        Self { column: "timestamp", comparison: Comparison::Before, param: Param::Timestamp(end) }
    }
}

/// Ordered conjunction of predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateList(Vec<Predicate>);
impl PredicateList {
    /// Append a predicate if there is one.
    pub fn and(mut self, predicate: Option<Predicate>) -> Self {
        self.0.extend(predicate);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as a `WHERE` clause (with leading space), or nothing when empty.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = String::new();
        for (index, predicate) in self.0.iter().enumerate() {
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            sql.push_str(&predicate.to_sql(dialect, &dialect.placeholder(index + 1)));
        }
        sql
    }

    /// Parameters in placeholder order.
    pub fn params(&self) -> impl Iterator<Item = Param> + '_ {
        self.0.iter().map(|predicate| predicate.param)
    }
}

/// Sales-rank retrieval query with optional filters.
///
/// Filters are always applied in the order book, category, start, end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankQuery {
    book: Option<EntityId>,
    category: Option<EntityId>,
    start: Option<UtcDateTime>,
    end: Option<UtcDateTime>,
}
impl RankQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn book(mut self, id: Option<EntityId>) -> Self {
        self.book = id;
        self
    }

    pub fn category(mut self, id: Option<EntityId>) -> Self {
        self.category = id;
        self
    }

    pub fn start(mut self, start: Option<UtcDateTime>) -> Self {
        self.start = start;
        self
    }

    pub fn end(mut self, end: Option<UtcDateTime>) -> Self {
        self.end = end;
        self
    }

    pub fn predicates(&self) -> PredicateList {
        PredicateList::default()
            .and(self.book.map(Predicate::book))
            .and(self.category.map(Predicate::category))
            .and(self.start.map(Predicate::starting_at))
            .and(self.end.map(Predicate::ending_before))
    }

    /// Full SQL text plus the parameters to bind, in order.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Param>) {
        let predicates = self.predicates();
        let sql = format!("{SELECT_RANKS}{}{}", predicates.to_sql(dialect), order_by(dialect));
        (sql, predicates.params().collect())
    }
}
