//! Rank assembly: raw rank rows joined against the entity cache.

use crate::cache::{EntityCache, EntityKind};
use crate::error::{ErrorKind, Result};
use crate::models::RankRow;
use book_tracker_models::SalesRank;
use exn::{OptionExt, ResultExt};

/// Resolve every row's book and category through the cache.
///
/// All-or-nothing: a single unresolvable reference fails the whole batch, so
/// callers never see a rank without its book or category.
pub(crate) fn assemble(rows: Vec<RankRow>, cache: &EntityCache) -> Result<Vec<SalesRank>> {
    rows.into_iter().map(|row| assemble_one(row, cache)).collect()
}

fn assemble_one(row: RankRow, cache: &EntityCache) -> Result<SalesRank> {
    let book = cache.books.get_by_id(row.book_id()).ok_or_raise(|| {
        tracing::warn!(rank_id = row.id, book_id = row.book_id, "Rank references an uncached book");
        ErrorKind::MissingReference(EntityKind::Book, row.book_id)
    })?;
    let category = cache.categories.get_by_id(row.category_id()).ok_or_raise(|| {
        tracing::warn!(rank_id = row.id, category_id = row.category_id, "Rank references an uncached category");
        ErrorKind::MissingReference(EntityKind::Category, row.category_id)
    })?;
    Ok(SalesRank {
        book,
        category,
        rank: u32::try_from(row.rank).or_raise(|| ErrorKind::InvalidData("rank"))?,
        timestamp: row.timestamp(),
        change: row.change,
    })
}
