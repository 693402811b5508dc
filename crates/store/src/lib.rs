//! Read-path store for book sales-rank tracking.
//!
//! This crate connects to either a SQLite file or a PostgreSQL server (chosen
//! by `book-tracker-config`) and implements [`BookTracker`] on top of it.
//!
//! # Architecture
//! - **Connection**: opened lazily on the first operation, health-checked,
//!   and retried once on a retryable failure. Every round-trip is bounded by
//!   the configured timeout.
//! - **Entity cache**: books and categories indexed by both name and store
//!   id. A bulk load of a kind replaces that kind entirely; single lookups on
//!   a miss only ever add entries.
//! - **Rank queries**: any subset of the book, category, start and end
//!   filters, always as bound parameters, with rows joined back to the cached
//!   entities before they are returned.

pub mod cache;
mod assemble;
mod db;
pub mod error;
mod models;
pub mod query;
mod resolve;
mod store;

pub use crate::cache::{EntityId, EntityKind};
pub use crate::db::Dialect;
pub use crate::resolve::{ConnectionInfo, Driver, resolve};
pub use crate::store::Store;
pub use book_tracker_config as config;
pub use book_tracker_models::{Book, BookTracker, Category, PotentialSale, SalesRank};
