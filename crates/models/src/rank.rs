use crate::{Book, Category};
use std::sync::Arc;
use time::UtcDateTime;

/// A single timestamped sales-rank observation for a (book, category) pair.
///
/// Book and category are shared with the store's entity cache, so cloning a
/// rank (or a whole result set) does not copy entity data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesRank {
    pub book: Arc<Book>,
    pub category: Arc<Category>,
    /// Position in the category (1 is the top).
    pub rank: u32,
    pub timestamp: UtcDateTime,
    /// Signed movement relative to the previous observation, if there was one.
    pub change: Option<i32>,
}

/// Aggregate of rank movement for a book at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotentialSale {
    pub book: Arc<Book>,
    pub timestamp: UtcDateTime,
    pub average_change: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::utc_datetime;

    #[test]
    fn test_cloned_ranks_share_entities() {
        let rank = SalesRank {
            book: Arc::new(Book::new("Book 1", "123", "url-1")),
            category: Arc::new(Category::new("Category 1")),
            rank: 10,
            timestamp: utc_datetime!(2017-07-17 00:00),
            change: Some(2),
        };
        let copy = rank.clone();
        assert!(Arc::ptr_eq(&rank.book, &copy.book));
        assert!(Arc::ptr_eq(&rank.category, &copy.category));
        assert_eq!(rank, copy);
    }
}
