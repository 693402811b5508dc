/// A tracked book.
///
/// The name is the unique business key within a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Book {
    pub name: String,
    pub isbn: String,
    pub url: String,
}
impl Book {
    pub fn new(name: impl Into<String>, isbn: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), isbn: isbn.into(), url: url.into() }
    }
}
impl AsRef<Book> for Book {
    fn as_ref(&self) -> &Book {
        self
    }
}

/// A store category (e.g. a bestseller list) that books are ranked in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category {
    pub name: String,
}
impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
impl AsRef<Category> for Category {
    fn as_ref(&self) -> &Category {
        self
    }
}
