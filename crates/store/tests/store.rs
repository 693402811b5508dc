use book_tracker_config::{Backend, Config, ConfigProvider};
use book_tracker_store::error::ErrorKind;
use book_tracker_store::{BookTracker, EntityKind, Store};
use rstest::rstest;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use time::UtcDateTime;
use time::macros::utc_datetime;

const SCHEMA: &str = r#"
    CREATE TABLE book (
        id INTEGER NOT NULL,
        name VARCHAR(256) NOT NULL,
        isbn VARCHAR(13) NOT NULL,
        url VARCHAR(1024) NOT NULL,
        track BOOLEAN,
        PRIMARY KEY (id),
        UNIQUE (name),
        CHECK (track IN (0, 1))
    );
    CREATE TABLE category (
        id INTEGER NOT NULL,
        name VARCHAR(1024),
        PRIMARY KEY (id)
    );
    CREATE TABLE rank (
        id INTEGER NOT NULL,
        book_id INTEGER NOT NULL,
        category_id INTEGER NOT NULL,
        rank INTEGER NOT NULL,
        timestamp DATETIME NOT NULL,
        change INTEGER,
        PRIMARY KEY (id),
        FOREIGN KEY(book_id) REFERENCES book (id),
        FOREIGN KEY(category_id) REFERENCES category (id)
    );
"#;

const DATA: &str = r#"
    INSERT INTO book VALUES(1, 'Book 1', '123', 'url-1', 1);
    INSERT INTO book VALUES(2, 'Book 2', '456', 'url-2', 1);
    INSERT INTO category VALUES(1, 'Category 1');
    INSERT INTO category VALUES(2, 'Category 2');
    INSERT INTO category VALUES(3, 'Category 3');
    INSERT INTO rank VALUES(1, 1, 1, 10, '2017-07-17 00:00:00.000000', 2);
    INSERT INTO rank VALUES(2, 1, 2, 20, '2017-07-17 00:00:00.000000', 2);
    INSERT INTO rank VALUES(3, 2, 1, 80, '2017-07-17 00:00:00.000000', 5);
    INSERT INTO rank VALUES(4, 2, 3, 90, '2017-07-17 00:00:00.000000', 5);
    INSERT INTO rank VALUES(5, 1, 1, 12, '2017-07-17 01:00:00.000000', 2);
    INSERT INTO rank VALUES(6, 1, 2, 22, '2017-07-17 01:00:00.000000', 2);
    INSERT INTO rank VALUES(7, 2, 1, 75, '2017-07-17 01:00:00.000000', -5);
    INSERT INTO rank VALUES(8, 2, 3, 85, '2017-07-17 01:00:00.000000', -5);
    INSERT INTO rank VALUES(9, 1, 1, 14, '2017-07-17 02:00:00.000000', 2);
    INSERT INTO rank VALUES(10, 1, 2, 24, '2017-07-17 02:00:00.000000', 2);
    INSERT INTO rank VALUES(11, 2, 1, 100, '2017-07-17 02:00:00.000000', 25);
    INSERT INTO rank VALUES(12, 2, 3, 100, '2017-07-17 02:00:00.000000', 15);
"#;

const ONE_AM: UtcDateTime = utc_datetime!(2017-07-17 01:00);
const TWO_AM: UtcDateTime = utc_datetime!(2017-07-17 02:00);

/// A seeded SQLite database that lives as long as the fixture.
struct Fixture {
    _dir: TempDir,
    path: PathBuf,
}
impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book-tracker.db");
        let fixture = Self { _dir: dir, path };
        fixture.execute(SCHEMA).await;
        fixture.execute(DATA).await;
        fixture
    }

    /// Modify the database behind the store's back.
    async fn execute(&self, sql: &str) {
        let pool = open(&self.path).await;
        sqlx::raw_sql(sql).execute(&pool).await.unwrap();
        pool.close().await;
    }

    fn config(&self) -> Config {
        Config::new(Backend::file(&self.path)).with_timeout(Duration::from_secs(5))
    }

    fn store(&self) -> Store {
        Store::new(self.config())
    }
}

async fn open(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
    SqlitePool::connect_with(options).await.unwrap()
}

#[tokio::test]
async fn test_get_books() {
    let fixture = Fixture::new().await;
    let books = fixture.store().get_books().await.unwrap();
    assert_eq!(books.len(), 2);
    assert_eq!(books[0].name, "Book 1");
    assert_eq!(books[0].isbn, "123");
    assert_eq!(books[1].url, "url-2");
}

#[tokio::test]
async fn test_get_categories() {
    let fixture = Fixture::new().await;
    let categories = fixture.store().get_categories().await.unwrap();
    let names: Vec<_> = categories.iter().map(|category| category.name.as_str()).collect();
    assert_eq!(names, ["Category 1", "Category 2", "Category 3"]);
}

#[rstest]
#[case(None, None, None, None, 12)]
#[case(Some(""), Some(""), None, None, 12)]
#[case(Some("Book 1"), None, None, None, 6)]
#[case(None, Some("Category 1"), None, None, 6)]
#[case(Some("Book 2"), Some("Category 3"), None, None, 3)]
#[case(None, None, Some(ONE_AM), None, 8)]
#[case(None, None, None, Some(ONE_AM), 4)]
#[case(Some("Book 1"), None, Some(ONE_AM), Some(TWO_AM), 2)]
#[case(Some("Book 1"), Some("Category 3"), None, None, 0)]
#[tokio::test]
async fn test_get_sales_ranks_filters(
    #[case] book: Option<&str>,
    #[case] category: Option<&str>,
    #[case] start: Option<UtcDateTime>,
    #[case] end: Option<UtcDateTime>,
    #[case] expected: usize,
) {
    let fixture = Fixture::new().await;
    let ranks = fixture.store().get_sales_ranks(book, category, start, end).await.unwrap();
    assert_eq!(ranks.len(), expected);
    for rank in &ranks {
        if let Some(book) = book.filter(|name| !name.is_empty()) {
            assert_eq!(rank.book.name, book);
        }
        if let Some(category) = category.filter(|name| !name.is_empty()) {
            assert_eq!(rank.category.name, category);
        }
        assert!(start.is_none_or(|start| rank.timestamp >= start));
        assert!(end.is_none_or(|end| rank.timestamp < end));
    }
}

#[tokio::test]
async fn test_sales_ranks_are_ordered_and_share_entities() {
    let fixture = Fixture::new().await;
    let ranks = fixture.store().get_sales_ranks(None, None, None, None).await.unwrap();
    assert!(ranks.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));
    let first = &ranks[0];
    assert_eq!(first.book.name, "Book 1");
    assert_eq!(first.category.name, "Category 1");
    assert_eq!(first.rank, 10);
    assert_eq!(first.change, Some(2));
    assert_eq!(first.timestamp, utc_datetime!(2017-07-17 00:00));
    assert_eq!(ranks[6].change, Some(-5));
    // Every rank for Book 1 points at the one cached Book 1.
    let book_one: Vec<_> = ranks.iter().filter(|rank| rank.book.name == "Book 1").collect();
    assert!(book_one.windows(2).all(|pair| Arc::ptr_eq(&pair[0].book, &pair[1].book)));
}

#[rstest]
#[case(Some("Nope"), None, EntityKind::Book)]
#[case(None, Some("Nope"), EntityKind::Category)]
#[tokio::test]
async fn test_unknown_filter_name(
    #[case] book: Option<&str>,
    #[case] category: Option<&str>,
    #[case] kind: EntityKind,
) {
    let fixture = Fixture::new().await;
    let err = fixture.store().get_sales_ranks(book, category, None, None).await.unwrap_err();
    assert_eq!(*err, ErrorKind::UnknownEntity(kind, "Nope".to_string()));
}

#[tokio::test]
async fn test_potential_sales() {
    let fixture = Fixture::new().await;
    let store = fixture.store();
    assert!(store.get_potential_sales(None, None, None).await.unwrap().is_empty());
    assert!(store.get_potential_sales(Some("Book 2"), Some(ONE_AM), None).await.unwrap().is_empty());
    let err = store.get_potential_sales(Some("Nope"), None, None).await.unwrap_err();
    assert_eq!(*err, ErrorKind::UnknownEntity(EntityKind::Book, "Nope".to_string()));
}

#[tokio::test]
async fn test_lookup_on_miss_then_bulk_reload_drops_stale_entries() {
    let fixture = Fixture::new().await;
    let store = fixture.store();
    store.init().await.unwrap();

    // Added after the bulk load: found by a single lookup.
    fixture.execute("INSERT INTO book VALUES(3, 'Book 3', '789', 'url-3', 1)").await;
    let book = store.book_by_name("Book 3").await.unwrap();
    assert_eq!(book.isbn, "789");

    // Renamed in the store: the next bulk load supersedes the lookup.
    fixture.execute("UPDATE book SET name = 'Book Three' WHERE id = 3").await;
    let books = store.get_books().await.unwrap();
    assert_eq!(books.len(), 3);
    assert_eq!(store.book_by_name("Book Three").await.unwrap().isbn, "789");
    let err = store.book_by_name("Book 3").await.unwrap_err();
    assert_eq!(*err, ErrorKind::UnknownEntity(EntityKind::Book, "Book 3".to_string()));
}

#[tokio::test]
async fn test_ranks_for_entities_added_after_warmup() {
    let fixture = Fixture::new().await;
    let store = fixture.store();
    store.init().await.unwrap();
    fixture
        .execute(
            "INSERT INTO book VALUES(3, 'Book 3', '789', 'url-3', 1);
             INSERT INTO rank VALUES(13, 3, 1, 5, '2017-07-17 03:00:00.000000', NULL);",
        )
        .await;
    let ranks = store.get_sales_ranks(Some("Book 3"), None, None, None).await.unwrap();
    assert_eq!(ranks.len(), 1);
    assert_eq!(ranks[0].change, None);
    assert_eq!(ranks[0].category.name, "Category 1");
}

#[tokio::test]
async fn test_unfiltered_ranks_fetch_entities_added_after_warmup() {
    let fixture = Fixture::new().await;
    let store = fixture.store();
    store.init().await.unwrap();
    fixture
        .execute(
            "INSERT INTO book VALUES(3, 'Book 3', '789', 'url-3', 1);
             INSERT INTO category VALUES(4, 'Category 4');
             INSERT INTO rank VALUES(13, 3, 4, 5, '2017-07-17 03:00:00.000000', 1);",
        )
        .await;
    for _ in 0..2 {
        let ranks = store.get_sales_ranks(None, None, None, None).await.unwrap();
        assert_eq!(ranks.len(), 13);
        let last = ranks.last().unwrap();
        assert_eq!(last.book.name, "Book 3");
        assert_eq!(last.category.name, "Category 4");
    }
    // The fetched entities are now cached and resolvable by name.
    assert_eq!(store.book_by_name("Book 3").await.unwrap().isbn, "789");
}

#[rstest]
#[case("2017-07-17 03:00:00")]
#[case("2017-07-17 03:00:00.000")]
#[tokio::test]
async fn test_time_bounds_ignore_stored_text_format(#[case] stored: &str) {
    let fixture = Fixture::new().await;
    fixture.execute(&format!("INSERT INTO rank VALUES(13, 1, 1, 9, '{stored}', 1)")).await;
    let store = fixture.store();
    let three = utc_datetime!(2017-07-17 03:00);

    let from_three = store.get_sales_ranks(None, None, Some(three), None).await.unwrap();
    assert_eq!(from_three.len(), 1);
    assert_eq!(from_three[0].timestamp, three);

    let before_three = store.get_sales_ranks(None, None, None, Some(three)).await.unwrap();
    assert_eq!(before_three.len(), 12);
    assert!(before_three.iter().all(|rank| rank.timestamp < three));

    // Still ordered by time next to rows in the six-digit format.
    let all = store.get_sales_ranks(Some("Book 1"), Some("Category 1"), None, None).await.unwrap();
    assert_eq!(all.last().unwrap().rank, 9);
}

#[tokio::test]
async fn test_names_are_bound_not_inlined() {
    let fixture = Fixture::new().await;
    fixture
        .execute(
            "INSERT INTO book VALUES(3, 'O''Brien''s Book', '789', 'url-3', 1);
             INSERT INTO rank VALUES(13, 3, 2, 7, '2017-07-17 03:00:00.000000', 1);",
        )
        .await;
    let store = fixture.store();
    let ranks = store.get_sales_ranks(Some("O'Brien's Book"), None, None, None).await.unwrap();
    assert_eq!(ranks.len(), 1);
    assert_eq!(ranks[0].book.name, "O'Brien's Book");
    let err = store.get_sales_ranks(Some("x' OR '1'='1"), None, None, None).await.unwrap_err();
    assert!(matches!(*err, ErrorKind::UnknownEntity(EntityKind::Book, _)));
}

#[tokio::test]
async fn test_category_by_name() {
    let fixture = Fixture::new().await;
    let store = fixture.store();
    assert_eq!(store.category_by_name("Category 2").await.unwrap().name, "Category 2");
    let err = store.category_by_name("Category 9").await.unwrap_err();
    assert_eq!(*err, ErrorKind::UnknownEntity(EntityKind::Category, "Category 9".to_string()));
}

#[tokio::test]
async fn test_null_category_name_is_invalid_data() {
    let fixture = Fixture::new().await;
    fixture.execute("INSERT INTO category VALUES(4, NULL)").await;
    let err = fixture.store().get_categories().await.unwrap_err();
    assert_eq!(*err, ErrorKind::InvalidData("category name"));
}

#[tokio::test]
async fn test_connects_lazily_and_reconnects_after_close() {
    let fixture = Fixture::new().await;
    let store = fixture.store();
    assert!(!store.is_connected().await);
    store.get_books().await.unwrap();
    assert!(store.is_connected().await);
    store.close().await;
    assert!(!store.is_connected().await);
    // Cache survives a close; the connection is reopened on demand.
    assert_eq!(store.get_sales_ranks(Some("Book 2"), None, None, None).await.unwrap().len(), 6);
    assert!(store.is_connected().await);
}

#[tokio::test]
async fn test_missing_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(Config::new(Backend::file(dir.path().join("missing.db"))));
    let err = store.get_books().await.unwrap_err();
    assert_eq!(*err, ErrorKind::Connection);
    assert!(!store.is_connected().await);
    // Nothing was created on disk.
    assert!(!dir.path().join("missing.db").exists());
}

struct Unavailable;
impl ConfigProvider for Unavailable {
    fn get_config(&self) -> book_tracker_config::error::Result<Config> {
        Err(exn::Exn::from(book_tracker_config::error::ErrorKind::Load))
    }
}

#[tokio::test]
async fn test_unavailable_config() {
    let store = Store::new(Unavailable);
    let err = store.get_categories().await.unwrap_err();
    assert_eq!(*err, ErrorKind::Config);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_store() {
    let fixture = Fixture::new().await;
    let store = Arc::new(fixture.store());
    let (books, ranks, categories) = tokio::join!(
        store.get_books(),
        store.get_sales_ranks(Some("Book 1"), Some("Category 2"), None, None),
        store.get_categories(),
    );
    assert_eq!(books.unwrap().len(), 2);
    assert_eq!(ranks.unwrap().len(), 3);
    assert_eq!(categories.unwrap().len(), 3);
}
