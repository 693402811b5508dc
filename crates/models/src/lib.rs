//! Domain types for book sales-rank tracking.
//!
//! Books and categories are identified by name. The numeric identifiers used
//! by the backing store never leave the store crate; callers only ever see the
//! business keys.

mod entity;
mod rank;

pub use crate::entity::{Book, Category};
pub use crate::rank::{PotentialSale, SalesRank};
use async_trait::async_trait;
use time::UtcDateTime;

/// Read-only retrieval interface over a sales-rank store.
///
/// Name filters are optional; `None` (or an empty string) disables the filter.
/// Time ranges are half-open: `start` is inclusive, `end` is exclusive.
#[async_trait]
pub trait BookTracker: Send + Sync {
    type Error;

    /// All books known to the store.
    async fn get_books(&self) -> Result<Vec<Book>, Self::Error>;

    /// All categories known to the store.
    async fn get_categories(&self) -> Result<Vec<Category>, Self::Error>;

    /// Sales-rank observations matching every supplied filter.
    async fn get_sales_ranks(
        &self,
        book: Option<&str>,
        category: Option<&str>,
        start: Option<UtcDateTime>,
        end: Option<UtcDateTime>,
    ) -> Result<Vec<SalesRank>, Self::Error>;

    /// Potential sales derived from rank movement for a book.
    async fn get_potential_sales(
        &self,
        book: Option<&str>,
        start: Option<UtcDateTime>,
        end: Option<UtcDateTime>,
    ) -> Result<Vec<PotentialSale>, Self::Error>;
}
