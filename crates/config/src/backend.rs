//! Backend selection.
//!
//! The store can sit on top of a single SQLite file or a PostgreSQL server.
//! Which one is decided exactly once, when the configuration is loaded, so
//! everything downstream matches on [`Backend`] instead of probing fields.

use std::fmt;
use std::path::PathBuf;

/// The storage technology backing a store session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// A SQLite database file, opened from `path` as-is.
    File { path: PathBuf },
    /// A PostgreSQL server.
    Network(NetworkBackend),
}
impl Backend {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }
}
impl From<NetworkBackend> for Backend {
    fn from(network: NetworkBackend) -> Self {
        Self::Network(network)
    }
}

/// Connection parameters for a networked store.
///
/// `sslmode` is passed through verbatim (`"disable"`, `"require"`, ...); it is
/// only interpreted when the connection is opened.
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkBackend {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
}
impl fmt::Debug for NetworkBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkBackend")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("dbname", &self.dbname)
            .field("sslmode", &self.sslmode)
            .finish()
    }
}
