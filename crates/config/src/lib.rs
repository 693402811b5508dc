//! Configuration for the book tracker store.
//!
//! Settings are read from a TOML file and overridden by `BOOK_TRACKER_*`
//! environment variables, then resolved into a [`Config`] holding an explicit
//! [`Backend`]. The store never reads configuration itself; it asks a
//! [`ConfigProvider`] every time it (re)connects.

mod backend;
pub mod error;
mod settings;

pub use crate::backend::{Backend, NetworkBackend};
pub use crate::settings::{Config, FileConfigProvider, Settings};
use crate::error::Result;
use std::sync::Arc;

/// Source of store configuration.
pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<Config>;
}

/// A fixed, already-resolved configuration.
impl ConfigProvider for Config {
    fn get_config(&self) -> Result<Config> {
        Ok(self.clone())
    }
}

pub type ProviderHandle = Arc<dyn ConfigProvider + Send + Sync>;
