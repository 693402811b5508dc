use crate::cache::EntityId;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{PrimitiveDateTime, UtcDateTime};

/// How filter bounds are written for SQLite (`DATETIME` has no native type).
///
/// Rows may be stored in any SQLite date format; queries compare both sides
/// through `julianday()`, which accepts this one too.
const SQLITE_TIMESTAMP: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RankRow {
    pub(crate) id: i32,
    pub(crate) book_id: i32,
    pub(crate) category_id: i32,
    pub(crate) rank: i32,
    pub(crate) timestamp: PrimitiveDateTime,
    pub(crate) change: Option<i32>,
}
impl RankRow {
    pub(crate) fn book_id(&self) -> EntityId {
        EntityId(self.book_id)
    }

    pub(crate) fn category_id(&self) -> EntityId {
        EntityId(self.category_id)
    }

    /// Stored timestamps carry no offset; they are UTC by convention.
    pub(crate) fn timestamp(&self) -> UtcDateTime {
        UtcDateTime::new(self.timestamp.date(), self.timestamp.time())
    }
}

/// Text form of a timestamp for comparison against SQLite `DATETIME` columns.
pub(crate) fn sqlite_timestamp(timestamp: UtcDateTime) -> Result<String> {
    timestamp.format(SQLITE_TIMESTAMP).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

/// Offset-free form of a timestamp for PostgreSQL `timestamp` columns.
pub(crate) fn postgres_timestamp(timestamp: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(timestamp.date(), timestamp.time())
}
