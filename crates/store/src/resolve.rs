//! Backend resolution: turns a [`Backend`] into a driver and connection target.

use crate::error::{ErrorKind, Result};
use book_tracker_config::{Backend, NetworkBackend};
use derive_more::Display;
use exn::ResultExt;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::sqlite::SqliteConnectOptions;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Database driver selected for a backend.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    #[display("sqlite3")]
    Sqlite,
    #[display("postgres")]
    Postgres,
}

/// Driver plus the connection target handed to it.
///
/// For a file backend the target is the path, verbatim. For a network backend
/// it is a `key=value` connection string. [`Display`](fmt::Display) never
/// prints the password; use [`target`](Self::target) for the raw value.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub driver: Driver,
    target: String,
    password: Option<String>,
}
impl ConnectionInfo {
    pub fn target(&self) -> &str {
        &self.target
    }
}
impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.password {
            Some(password) if !password.is_empty() => {
                let redacted = self.target.replace(&format!("password={password}"), "password=[REDACTED]");
                write!(f, "{}:{redacted}", self.driver)
            },
            _ => write!(f, "{}:{}", self.driver, self.target),
        }
    }
}
impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionInfo").field(&self.to_string()).finish()
    }
}

/// Decide driver and connection target for a backend.
pub fn resolve(backend: &Backend) -> ConnectionInfo {
    match backend {
        Backend::File { path } => ConnectionInfo {
            driver: Driver::Sqlite,
            target: path.to_string_lossy().into_owned(),
            password: None,
        },
        Backend::Network(network) => ConnectionInfo {
            driver: Driver::Postgres,
            target: connection_string(network),
            password: Some(network.password.clone()),
        },
    }
}

fn connection_string(network: &NetworkBackend) -> String {
    format!(
        "host={} port={} user={} password={} dbname={} sslmode={}",
        network.host, network.port, network.user, network.password, network.dbname, network.sslmode,
    )
}

/// Driver-specific connection options for a backend.
pub(crate) enum ConnectOptions {
    Sqlite(SqliteConnectOptions),
    Postgres(PgConnectOptions),
}
impl ConnectOptions {
    pub(crate) fn for_backend(backend: &Backend, busy_timeout: Duration) -> Result<Self> {
        Ok(match backend {
            Backend::File { path } => Self::Sqlite(
                SqliteConnectOptions::new()
                    .filename(path)
                    // A missing file is a misconfiguration, not an empty store.
                    .create_if_missing(false)
                    .foreign_keys(true)
                    .busy_timeout(busy_timeout),
            ),
            Backend::Network(network) => Self::Postgres(
                PgConnectOptions::new()
                    .host(&network.host)
                    .port(network.port)
                    .username(&network.user)
                    .password(&network.password)
                    .database(&network.dbname)
                    .ssl_mode(PgSslMode::from_str(&network.sslmode).or_raise(|| ErrorKind::Config)?),
            ),
        })
    }
}
