//! The store session.
//!
//! A [`Store`] owns one lazily-established connection and one entity cache.
//! Books and categories are cached on their first bulk load and extended by
//! single lookups afterwards; rank queries resolve their name filters and
//! their rows through that cache.

use crate::assemble::assemble;
use crate::cache::{EntityCache, EntityId, EntityKind};
use crate::db::{Connection, Dialect, Pool, Session, with_pool};
use crate::error::{ErrorKind, Result};
use crate::models::{BookRow, CategoryRow, RankRow, postgres_timestamp, sqlite_timestamp};
use crate::query::{Param, RankQuery};
use async_trait::async_trait;
use book_tracker_config::{ConfigProvider, ProviderHandle};
use book_tracker_models::{Book, BookTracker, Category, PotentialSale, SalesRank};
use exn::OptionExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use time::UtcDateTime;
use tokio::sync::RwLock;
use tracing::instrument;

const SELECT_BOOKS: &str = "SELECT id, name, isbn, url FROM book ORDER BY id";
const SELECT_CATEGORIES: &str = "SELECT id, name FROM category ORDER BY id";

fn select_book_by_name(dialect: Dialect) -> String {
    format!("SELECT id, name, isbn, url FROM book WHERE name = {}", dialect.placeholder(1))
}

fn select_category_by_name(dialect: Dialect) -> String {
    format!("SELECT id, name FROM category WHERE name = {}", dialect.placeholder(1))
}

fn select_book_by_id(dialect: Dialect) -> String {
    format!("SELECT id, name, isbn, url FROM book WHERE id = {}", dialect.placeholder(1))
}

fn select_category_by_id(dialect: Dialect) -> String {
    format!("SELECT id, name FROM category WHERE id = {}", dialect.placeholder(1))
}

/// An empty name filter means "no filter".
fn name_filter(name: Option<&str>) -> Option<&str> {
    name.filter(|name| !name.is_empty())
}

/// Read-path store over SQLite or PostgreSQL.
///
/// Safe to share between tasks: the connection is guarded by a mutex and the
/// cache by a read/write lock, which is only ever held for in-memory work and
/// never across a database round-trip.
pub struct Store {
    connection: Connection,
    cache: RwLock<EntityCache>,
}
impl Store {
    /// Create a store that will ask `provider` for its configuration when it
    /// first connects. Nothing is opened until an operation needs it.
    pub fn new(provider: impl ConfigProvider + 'static) -> Self {
        Self::from_handle(Arc::new(provider))
    }

    pub fn from_handle(provider: ProviderHandle) -> Self {
        Self { connection: Connection::new(provider), cache: RwLock::new(EntityCache::default()) }
    }

    /// Connect and warm both entity caches.
    #[instrument("initializing store", skip(self))]
    pub async fn init(&self) -> Result<()> {
        let session = self.connection.session().await?;
        self.load_books(&session).await?;
        self.load_categories(&session).await?;
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    /// Close the connection. The cache survives; the next operation reconnects.
    pub async fn close(&self) {
        self.connection.close().await;
    }

    // =========================================================================
    // Bulk loads
    // =========================================================================

    async fn load_books(&self, session: &Session) -> Result<Vec<Book>> {
        let rows: Vec<BookRow> = with_pool!(&session.pool, pool => {
            session.bounded(sqlx::query_as::<_, BookRow>(SELECT_BOOKS).fetch_all(pool)).await?
        });
        let entries: Vec<(EntityId, Book)> = rows.into_iter().map(Into::into).collect();
        let books: Vec<Book> = entries.iter().map(|(_, book)| book.clone()).collect();
        self.cache.write().await.books.replace_all(entries);
        tracing::debug!(rows = books.len(), "Book cache reloaded");
        Ok(books)
    }

    async fn load_categories(&self, session: &Session) -> Result<Vec<Category>> {
        let rows: Vec<CategoryRow> = with_pool!(&session.pool, pool => {
            session.bounded(sqlx::query_as::<_, CategoryRow>(SELECT_CATEGORIES).fetch_all(pool)).await?
        });
        let entries = rows.into_iter().map(TryInto::try_into).collect::<Result<Vec<(EntityId, Category)>>>()?;
        let categories: Vec<Category> = entries.iter().map(|(_, category)| category.clone()).collect();
        self.cache.write().await.categories.replace_all(entries);
        tracing::debug!(rows = categories.len(), "Category cache reloaded");
        Ok(categories)
    }

    /// Bulk load whichever kinds have never been loaded in this session.
    async fn warm(&self, session: &Session) -> Result<()> {
        let (books_loaded, categories_loaded) = {
            let cache = self.cache.read().await;
            (cache.books.is_loaded(), cache.categories.is_loaded())
        };
        if !books_loaded {
            self.load_books(session).await?;
        }
        if !categories_loaded {
            self.load_categories(session).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Single lookups
    // =========================================================================

    /// Look up a book by name, fetching and caching it on a miss.
    ///
    /// Returns [`ErrorKind::UnknownEntity`] if the store has no such book.
    #[instrument(skip(self))]
    pub async fn book_by_name(&self, name: &str) -> Result<Arc<Book>> {
        if let Some(book) = self.cache.read().await.books.get_by_name(name) {
            return Ok(book);
        }
        let session = self.connection.session().await?;
        self.fetch_book(&session, name).await.map(|(_, book)| book)
    }

    /// Look up a category by name, fetching and caching it on a miss.
    ///
    /// Returns [`ErrorKind::UnknownEntity`] if the store has no such category.
    #[instrument(skip(self))]
    pub async fn category_by_name(&self, name: &str) -> Result<Arc<Category>> {
        if let Some(category) = self.cache.read().await.categories.get_by_name(name) {
            return Ok(category);
        }
        let session = self.connection.session().await?;
        self.fetch_category(&session, name).await.map(|(_, category)| category)
    }

    async fn book_id(&self, session: &Session, name: &str) -> Result<EntityId> {
        if let Some(id) = self.cache.read().await.books.id_of(name) {
            return Ok(id);
        }
        self.fetch_book(session, name).await.map(|(id, _)| id)
    }

    async fn category_id(&self, session: &Session, name: &str) -> Result<EntityId> {
        if let Some(id) = self.cache.read().await.categories.id_of(name) {
            return Ok(id);
        }
        self.fetch_category(session, name).await.map(|(id, _)| id)
    }

    /// Cache miss: single-row select with the name as a bound parameter.
    async fn fetch_book(&self, session: &Session, name: &str) -> Result<(EntityId, Arc<Book>)> {
        let sql = select_book_by_name(session.pool.dialect());
        let row: Option<BookRow> = with_pool!(&session.pool, pool => {
            session.bounded(sqlx::query_as::<_, BookRow>(&sql).bind(name).fetch_optional(pool)).await?
        });
        let (id, book) = row.map(<(EntityId, Book)>::from).ok_or_raise(|| ErrorKind::UnknownEntity(EntityKind::Book, name.to_string()))?;
        tracing::debug!(%id, "Book fetched on cache miss");
        let mut cache = self.cache.write().await;
        let book = cache.books.insert(id, book).ok_or_raise(|| ErrorKind::Conflict(EntityKind::Book, name.to_string()))?;
        // A concurrent miss may have cached this name first; its id wins.
        Ok((cache.books.id_of(name).unwrap_or(id), book))
    }

    async fn fetch_category(&self, session: &Session, name: &str) -> Result<(EntityId, Arc<Category>)> {
        let sql = select_category_by_name(session.pool.dialect());
        let row: Option<CategoryRow> = with_pool!(&session.pool, pool => {
            session.bounded(sqlx::query_as::<_, CategoryRow>(&sql).bind(name).fetch_optional(pool)).await?
        });
        let row = row.ok_or_raise(|| ErrorKind::UnknownEntity(EntityKind::Category, name.to_string()))?;
        let (id, category) = <(EntityId, Category)>::try_from(row)?;
        tracing::debug!(%id, "Category fetched on cache miss");
        let mut cache = self.cache.write().await;
        let category = cache
            .categories
            .insert(id, category)
            .ok_or_raise(|| ErrorKind::Conflict(EntityKind::Category, name.to_string()))?;
        Ok((cache.categories.id_of(name).unwrap_or(id), category))
    }

    /// Fetch books and categories referenced by `rows` that the cache has
    /// never seen, e.g. ones added to the store after the last bulk load.
    ///
    /// Ids that are not in the store either stay missing, and assembly
    /// reports them.
    async fn fetch_missing(&self, session: &Session, rows: &[RankRow]) -> Result<()> {
        let (books, categories) = {
            let cache = self.cache.read().await;
            let books: BTreeSet<EntityId> =
                rows.iter().map(RankRow::book_id).filter(|id| cache.books.get_by_id(*id).is_none()).collect();
            let categories: BTreeSet<EntityId> = rows
                .iter()
                .map(RankRow::category_id)
                .filter(|id| cache.categories.get_by_id(*id).is_none())
                .collect();
            (books, categories)
        };
        for id in books {
            let sql = select_book_by_id(session.pool.dialect());
            let row: Option<BookRow> = with_pool!(&session.pool, pool => {
                session.bounded(sqlx::query_as::<_, BookRow>(&sql).bind(id.0).fetch_optional(pool)).await?
            });
            if let Some(row) = row {
                let (id, book) = <(EntityId, Book)>::from(row);
                tracing::debug!(%id, "Book fetched for rank assembly");
                self.cache.write().await.books.insert(id, book);
            }
        }
        for id in categories {
            let sql = select_category_by_id(session.pool.dialect());
            let row: Option<CategoryRow> = with_pool!(&session.pool, pool => {
                session.bounded(sqlx::query_as::<_, CategoryRow>(&sql).bind(id.0).fetch_optional(pool)).await?
            });
            if let Some(row) = row {
                let (id, category) = <(EntityId, Category)>::try_from(row)?;
                tracing::debug!(%id, "Category fetched for rank assembly");
                self.cache.write().await.categories.insert(id, category);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Ranks
    // =========================================================================

    async fn fetch_ranks(&self, session: &Session, query: &RankQuery) -> Result<Vec<RankRow>> {
        let (sql, params) = query.build(session.pool.dialect());
        tracing::trace!(sql = %sql, params = params.len(), "Querying ranks");
        Ok(match &session.pool {
            Pool::Sqlite(pool) => {
                let mut ranks = sqlx::query_as::<_, RankRow>(&sql);
                for param in params {
                    ranks = match param {
                        Param::Id(id) => ranks.bind(id.0),
                        Param::Timestamp(timestamp) => ranks.bind(sqlite_timestamp(timestamp)?),
                    };
                }
                session.bounded(ranks.fetch_all(pool)).await?
            },
            Pool::Postgres(pool) => {
                let mut ranks = sqlx::query_as::<_, RankRow>(&sql);
                for param in params {
                    ranks = match param {
                        Param::Id(id) => ranks.bind(id.0),
                        Param::Timestamp(timestamp) => ranks.bind(postgres_timestamp(timestamp)),
                    };
                }
                session.bounded(ranks.fetch_all(pool)).await?
            },
        })
    }
}

#[async_trait]
impl BookTracker for Store {
    type Error = crate::error::Error;

    #[instrument(skip(self))]
    async fn get_books(&self) -> Result<Vec<Book>> {
        let session = self.connection.session().await?;
        self.load_books(&session).await
    }

    #[instrument(skip(self))]
    async fn get_categories(&self) -> Result<Vec<Category>> {
        let session = self.connection.session().await?;
        self.load_categories(&session).await
    }

    #[instrument(skip(self))]
    async fn get_sales_ranks(
        &self,
        book: Option<&str>,
        category: Option<&str>,
        start: Option<UtcDateTime>,
        end: Option<UtcDateTime>,
    ) -> Result<Vec<SalesRank>> {
        let session = self.connection.session().await?;
        self.warm(&session).await?;
        let book_id = match name_filter(book) {
            Some(name) => Some(self.book_id(&session, name).await?),
            None => None,
        };
        let category_id = match name_filter(category) {
            Some(name) => Some(self.category_id(&session, name).await?),
            None => None,
        };
        let query = RankQuery::new().book(book_id).category(category_id).start(start).end(end);
        let rows = self.fetch_ranks(&session, &query).await?;
        self.fetch_missing(&session, &rows).await?;
        let ranks = assemble(rows, &*self.cache.read().await)?;
        tracing::debug!(rows = ranks.len(), "Sales ranks retrieved");
        Ok(ranks)
    }

    /// Potential-sale computation is not implemented by this store; the book
    /// filter is still validated so callers get the same errors they will get
    /// once it is.
    #[instrument(skip(self))]
    async fn get_potential_sales(
        &self,
        book: Option<&str>,
        start: Option<UtcDateTime>,
        end: Option<UtcDateTime>,
    ) -> Result<Vec<PotentialSale>> {
        let session = self.connection.session().await?;
        if let Some(name) = name_filter(book) {
            self.book_id(&session, name).await?;
        }
        Ok(Vec::new())
    }
}
