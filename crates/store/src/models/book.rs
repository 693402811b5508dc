use crate::cache::EntityId;
use book_tracker_models::Book;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BookRow {
    id: i32,
    name: String,
    isbn: String,
    url: String,
}
impl From<BookRow> for (EntityId, Book) {
    fn from(row: BookRow) -> Self {
        (EntityId(row.id), Book { name: row.name, isbn: row.isbn, url: row.url })
    }
}
