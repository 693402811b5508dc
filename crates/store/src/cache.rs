//! Bidirectional entity cache.
//!
//! Rank rows only carry numeric identifiers, while callers filter by name.
//! Each entity kind gets an [`EntityIndex`]: an arena of entities addressed by
//! a stable handle, plus name→handle and id→handle maps. Both maps point at
//! the same slot, so there is exactly one copy of every entity.
//!
//! Entries are append-only for the lifetime of a session. The only way an
//! entry disappears or changes is a bulk load of the same kind, which
//! supersedes everything previously known about that kind.

use book_tracker_models::{Book, Category};
use derive_more::Display;
use std::collections::HashMap;
use std::sync::Arc;

/// The kinds of entity a rank row references.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    #[display("book")]
    Book,
    #[display("category")]
    Category,
}

/// Opaque store identifier of a book or category.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub i32);

/// Something the cache can index by name.
pub trait Entity: Clone {
    const KIND: EntityKind;
    fn name(&self) -> &str;
}
impl Entity for Book {
    const KIND: EntityKind = EntityKind::Book;
    fn name(&self) -> &str {
        &self.name
    }
}
impl Entity for Category {
    const KIND: EntityKind = EntityKind::Category;
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Handle(usize);

#[derive(Debug)]
struct Slot<T> {
    id: EntityId,
    entity: Arc<T>,
}

/// Arena of one entity kind with name and id lookups.
#[derive(Debug)]
pub struct EntityIndex<T> {
    slots: Vec<Slot<T>>,
    by_name: HashMap<String, Handle>,
    by_id: HashMap<EntityId, Handle>,
    loaded: bool,
}
impl<T> Default for EntityIndex<T> {
    fn default() -> Self {
        Self { slots: Vec::new(), by_name: HashMap::new(), by_id: HashMap::new(), loaded: false }
    }
}
impl<T: Entity> EntityIndex<T> {
    /// Whether a bulk load has populated this index at least once.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Replace the whole index with the result of a bulk load.
    ///
    /// If the result contains the same name twice, the first row wins.
    pub fn replace_all(&mut self, rows: impl IntoIterator<Item = (EntityId, T)>) {
        let mut fresh = Self { loaded: true, ..Self::default() };
        for (id, entity) in rows {
            if fresh.by_name.contains_key(entity.name()) {
                tracing::warn!(kind = %T::KIND, name = entity.name(), %id, "Duplicate name in bulk load; keeping the first row");
                continue;
            }
            fresh.push(id, entity);
        }
        *self = fresh;
    }

    /// Add a single entity found by a lookup.
    ///
    /// Existing entries are never replaced: if the name is already cached the
    /// cached entity is returned. Returns `None` when `id` is already cached
    /// under a different name, i.e. the store changed since the last bulk load.
    pub fn insert(&mut self, id: EntityId, entity: T) -> Option<Arc<T>> {
        if let Some(&handle) = self.by_name.get(entity.name()) {
            return Some(self.slots[handle.0].entity.clone());
        }
        if let Some(&handle) = self.by_id.get(&id) {
            let cached = &self.slots[handle.0];
            tracing::warn!(kind = %T::KIND, %id, cached = cached.entity.name(), name = entity.name(), "Identifier already cached under another name");
            return None;
        }
        Some(self.push(id, entity))
    }

    fn push(&mut self, id: EntityId, entity: T) -> Arc<T> {
        let handle = Handle(self.slots.len());
        let entity = Arc::new(entity);
        self.by_name.insert(entity.name().to_string(), handle);
        self.by_id.insert(id, handle);
        self.slots.push(Slot { id, entity: entity.clone() });
        entity
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<T>> {
        self.by_name.get(name).map(|handle| self.slots[handle.0].entity.clone())
    }

    pub fn get_by_id(&self, id: EntityId) -> Option<Arc<T>> {
        self.by_id.get(&id).map(|handle| self.slots[handle.0].entity.clone())
    }

    pub fn id_of(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).map(|handle| self.slots[handle.0].id)
    }
}

/// Per-session cache of books and categories.
#[derive(Debug, Default)]
pub struct EntityCache {
    pub books: EntityIndex<Book>,
    pub categories: EntityIndex<Category>,
}
