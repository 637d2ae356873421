pub mod charts;

use crate::error::{ConfigError, InitializationError};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

pub const ENV_VAR_PREFIX: &str = "CHARTS__";
pub const SETTINGS_FILE: &str = "Settings.toml";

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub extractor: ExtractorConfig,
    pub api: ListenConfig,
    pub health: ListenConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            source: SourceConfig::default(),
            sync: SyncConfig::default(),
            cache: CacheConfig::default(),
            extractor: ExtractorConfig::default(),
            api: ListenConfig::new("127.0.0.1:8080"),
            health: ListenConfig::new("127.0.0.1:8090"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://charts.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Filesystem path of the database file, if the URL points at one.
    pub fn file_path(&self) -> Option<&str> {
        let path = self
            .url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))?;
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path.starts_with(":memory:") {
            None
        } else {
            Some(path)
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    pub interval_seconds: u64,
    pub manifest_refresh_minutes: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            manifest_refresh_minutes: 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    pub quota_bytes: Option<u64>,
    pub max_concurrent_downloads: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            quota_bytes: None,
            max_concurrent_downloads: 4,
        }
    }
}

/// Locale rules applied by the text extractor. Phone rewriting is disabled
/// unless a national rule is configured.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ExtractorConfig {
    pub phone: Option<PhoneRule>,
}

/// Rewrites a national number starting with `trunk_prefix` into
/// `international_prefix` followed by the remaining digits, e.g. `0` → `+33`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PhoneRule {
    pub trunk_prefix: String,
    pub international_prefix: String,
    /// Total digit count of a national number, trunk prefix included.
    pub national_length: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ListenConfig {
    pub listen_addr: String,
}

impl ListenConfig {
    fn new(listen_addr: &str) -> Self {
        Self {
            listen_addr: listen_addr.to_string(),
        }
    }
}

pub fn load_config() -> Result<Config, ConfigError> {
    Ok(Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(SETTINGS_FILE))
        .merge(Env::prefixed(ENV_VAR_PREFIX).split("__"))
        .extract::<Config>()?)
}

pub mod error {
    use thiserror::Error;
    use tracing::dispatcher::SetGlobalDefaultError;

    #[derive(Debug, Error)]
    pub enum ConfigError {
        #[error("failed to load configuration: {0}")]
        Figment(#[from] figment::Error),
    }

    #[derive(Debug, Error)]
    pub enum InitializationError {
        #[error(transparent)]
        Tracing(#[from] SetGlobalDefaultError),
        #[error(transparent)]
        Config(#[from] ConfigError),
        #[error(transparent)]
        Migration(#[from] sqlx::migrate::MigrateError),
        #[error(transparent)]
        Db(#[from] sqlx::Error),
    }
}

pub fn init_tracing() -> Result<(), InitializationError> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[instrument(skip(db_config), fields(url = %db_config.url))]
pub async fn initialize_db(
    db_config: &DatabaseConfig,
    migrate: bool,
) -> Result<Pool<Sqlite>, InitializationError> {
    let options = SqliteConnectOptions::from_str(&db_config.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect_with(options)
        .await?;

    info!(name: "db.connected", "db pool created and connected");

    // Run any new migrations
    if migrate {
        MIGRATOR.run(&pool).await?;
    }

    Ok(pool)
}

pub async fn shutdown_listener(token: Option<CancellationToken>) {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = ?e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(name: "signal.ctrlc.received", "received Ctrl+C signal, shutting down"),
        _ = terminate => info!(name: "signal.sigterm.received", "received SIGTERM signal, shutting down"),
    }

    if let Some(token) = token {
        token.cancel();
    }
}
