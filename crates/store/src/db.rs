//! Connection management.
//!
//! The store connects lazily: nothing touches the database until the first
//! operation asks for a [`Session`]. The connection state is an explicit
//! two-state machine ([`State`]), and every connect attempt ends in exactly
//! one [`State::transition`].

use crate::error::{ErrorKind, Result};
use crate::resolve::{ConnectOptions, resolve};
use book_tracker_config::ProviderHandle;
use exn::ResultExt;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Connection as _;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;

// Pool connections are cheap for SQLite and the read path is mostly
// sequential, so keep this small.
const MAX_CONNECTIONS: u32 = 4;
// One retry. Queries are never retried.
const CONNECT_ATTEMPTS: u32 = 2;

/// Which placeholder syntax and parameter encoding a pool expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}
impl Dialect {
    /// Placeholder for the `n`th (1-based) bound parameter.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Sqlite => "?".to_string(),
            Self::Postgres => format!("${n}"),
        }
    }
}

/// A connection pool for whichever backend was configured.
#[derive(Debug, Clone)]
pub enum Pool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}
impl Pool {
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Sqlite(_) => Dialect::Sqlite,
            Self::Postgres(_) => Dialect::Postgres,
        }
    }

    async fn ping(&self) -> sqlx::Result<()> {
        match self {
            Self::Sqlite(pool) => pool.acquire().await?.ping().await,
            Self::Postgres(pool) => pool.acquire().await?.ping().await,
        }
    }

    async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
        }
    }
}

/// Run the same block against whichever pool variant is live.
///
/// Each arm is type-checked on its own, so the body may use driver-specific
/// row and argument types.
macro_rules! with_pool {
    ($pool:expr, $p:ident => $body:expr) => {
        match $pool {
            $crate::db::Pool::Sqlite($p) => $body,
            $crate::db::Pool::Postgres($p) => $body,
        }
    };
}
pub(crate) use with_pool;

/// A live connection pool plus the per-operation time budget.
#[derive(Debug, Clone)]
pub struct Session {
    pub pool: Pool,
    pub timeout: Duration,
}
impl Session {
    /// Bound a store round-trip by the configured timeout.
    pub async fn bounded<T, E>(&self, operation: impl Future<Output = std::result::Result<T, E>>) -> Result<T>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        tokio::time::timeout(self.timeout, operation)
            .await
            .or_raise(|| ErrorKind::Timeout)?
            .or_raise(|| ErrorKind::Query)
    }

    /// Liveness check, bounded like any other round-trip.
    pub async fn ping(&self) -> Result<()> {
        self.bounded(self.pool.ping()).await
    }
}

/// Connection state.
#[derive(Debug, Default)]
pub enum State {
    #[default]
    Disconnected,
    Connected(Session),
}
impl State {
    /// Apply the outcome of a connect attempt. Success moves to `Connected`;
    /// failure always lands in `Disconnected`, never in a half-open state.
    pub fn transition(&mut self, outcome: Result<Session>) -> Result<Session> {
        match outcome {
            Ok(session) => {
                *self = Self::Connected(session.clone());
                Ok(session)
            },
            Err(err) => {
                *self = Self::Disconnected;
                Err(err)
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

/// Owns the lazily-established connection for a store session.
pub struct Connection {
    provider: ProviderHandle,
    state: Mutex<State>,
}
impl Connection {
    pub fn new(provider: ProviderHandle) -> Self {
        Self { provider, state: Mutex::new(State::Disconnected) }
    }

    /// The live session, connecting first if there is none.
    ///
    /// The state lock is held across the connect, so concurrent callers wait
    /// for a single attempt instead of racing their own.
    pub async fn session(&self) -> Result<Session> {
        let mut state = self.state.lock().await;
        if let State::Connected(session) = &*state {
            return Ok(session.clone());
        }
        let outcome = self.connect_with_retry().await;
        state.transition(outcome)
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_connected()
    }

    /// Close the pool (if any) and return to `Disconnected`. The next
    /// operation reconnects.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let State::Connected(session) = std::mem::take(&mut *state) {
            session.pool.close().await;
            tracing::debug!("Store connection closed");
        }
    }

    async fn connect_with_retry(&self) -> Result<Session> {
        let mut attempt = 1;
        loop {
            match self.connect().await {
                Ok(session) => return Ok(session),
                Err(err) if attempt < CONNECT_ATTEMPTS && err.is_retryable() => {
                    tracing::warn!(attempt, error = %*err, "Connecting to store failed; retrying once");
                    attempt += 1;
                },
                Err(err) => return Err(err),
            }
        }
    }

    #[instrument("connecting to store", skip(self))]
    async fn connect(&self) -> Result<Session> {
        let config = self.provider.get_config().or_raise(|| ErrorKind::Config)?;
        let info = resolve(&config.backend);
        tracing::info!(driver = %info.driver, target = %info, "Opening store connection");
        let pool = match ConnectOptions::for_backend(&config.backend, config.timeout)? {
            ConnectOptions::Sqlite(options) => Pool::Sqlite(
                SqlitePoolOptions::new()
                    .max_connections(MAX_CONNECTIONS)
                    .acquire_timeout(config.timeout)
                    .connect_with(options)
                    .await
                    .or_raise(|| ErrorKind::Connection)?,
            ),
            ConnectOptions::Postgres(options) => Pool::Postgres(
                PgPoolOptions::new()
                    .max_connections(MAX_CONNECTIONS)
                    .acquire_timeout(config.timeout)
                    .connect_with(options)
                    .await
                    .or_raise(|| ErrorKind::Connection)?,
            ),
        };
        let session = Session { pool, timeout: config.timeout };
        // A pool that cannot answer in time is discarded.
        if let Err(err) = session.ping().await {
            session.pool.close().await;
            return Err(err).or_raise(|| ErrorKind::Connection);
        }
        Ok(session)
    }
}
