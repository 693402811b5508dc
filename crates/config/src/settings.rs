//! Raw settings and their resolution into a [`Config`].

use crate::error::{ErrorKind, Result};
use crate::{Backend, ConfigProvider, NetworkBackend};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

const ENV_PREFIX: &str = "BOOK_TRACKER_";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_SSLMODE: &str = "disable";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings exactly as they appear in the configuration sources.
///
/// Every field is optional here; which ones are required depends on the
/// backend, and that is only known once [`Config::try_from`] runs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub dbname: Option<String>,
    pub password: Option<String>,
    pub sslmode: Option<String>,
    pub filename: Option<PathBuf>,
    /// Upper bound for every round-trip to the store, in seconds.
    pub timeout_secs: Option<u64>,
}
impl Settings {
    /// TOML file at `path`, overridden by `BOOK_TRACKER_*` environment variables.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new().merge(Toml::file(path.as_ref())).merge(Env::prefixed(ENV_PREFIX))
    }

    fn has_network_fields(&self) -> bool {
        self.host.is_some()
            || self.port.is_some()
            || self.user.is_some()
            || self.dbname.is_some()
            || self.password.is_some()
            || self.sslmode.is_some()
    }
}

/// Resolved store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: Backend,
    pub timeout: Duration,
}
impl Config {
    pub fn new(backend: impl Into<Backend>) -> Self {
        Self { backend: backend.into(), timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load and resolve configuration from the file at `path` (plus environment).
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_figment(&Settings::figment(path))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let settings: Settings = figment.extract().or_raise(|| ErrorKind::Load)?;
        Self::try_from(settings)
    }
}
impl TryFrom<Settings> for Config {
    type Error = crate::error::Error;
    fn try_from(settings: Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        if timeout.is_zero() {
            exn::bail!(ErrorKind::Invalid("timeout_secs"));
        }
        let backend = match settings.filename.clone().filter(|path| !path.as_os_str().is_empty()) {
            Some(path) => {
                if settings.has_network_fields() {
                    tracing::warn!(path = %path.display(), "Both a filename and network settings are configured; using the file backend");
                }
                Backend::File { path }
            },
            None => Backend::Network(NetworkBackend {
                host: required(settings.host, "host")?,
                port: settings.port.unwrap_or(DEFAULT_PORT),
                user: required(settings.user, "user")?,
                password: settings.password.unwrap_or_default(),
                dbname: required(settings.dbname, "dbname")?,
                sslmode: settings.sslmode.unwrap_or_else(|| DEFAULT_SSLMODE.to_string()),
            }),
        };
        Ok(Self { backend, timeout })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    value.filter(|v| !v.is_empty()).ok_or_raise(|| ErrorKind::MissingField(field))
}

/// Reads the configuration file on every call, so a reconnect picks up edits.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}
impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `config.toml` inside the platform configuration directory
    /// (e.g. `~/.config/book-tracker/config.toml` on Linux).
    pub fn default_location() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "book-tracker").ok_or_raise(|| ErrorKind::NoConfigDirectory)?;
        Ok(Self::new(dirs.config_dir().join("config.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
impl ConfigProvider for FileConfigProvider {
    fn get_config(&self) -> Result<Config> {
        Config::load(&self.path)
    }
}
