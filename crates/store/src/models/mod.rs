mod book;
mod category;
mod rank;

pub(crate) use self::book::BookRow;
pub(crate) use self::category::CategoryRow;
pub(crate) use self::rank::{RankRow, postgres_timestamp, sqlite_timestamp};
