//! `SQLite` plumbing for the ACS store.
//!
//! [`connect`] builds a WAL-mode pool for a [`StoreLocation`];
//! [`define_database!`](crate::define_database) wraps that pool in a typed
//! handle that runs the caller's embedded migrations on open.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

/// How long a writer waits on a locked database before giving up.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool size for file-backed stores.
const FILE_POOL_SIZE: u32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound("row".to_string()),
            other => Self::Query(other.to_string()),
        }
    }
}

/// Where a store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A database file; missing parent directories are created.
    File(PathBuf),
    /// A private in-memory database, gone when the pool closes.
    Memory,
}

impl StoreLocation {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    fn url(&self) -> String {
        match self {
            Self::File(path) => format!("sqlite:{}?mode=rwc", path.display()),
            Self::Memory => "sqlite::memory:".to_string(),
        }
    }

    /// Every connection to `:memory:` opens its own database, so the
    /// in-memory pool is pinned to one.
    const fn pool_size(&self) -> u32 {
        match self {
            Self::File(_) => FILE_POOL_SIZE,
            Self::Memory => 1,
        }
    }
}

/// Open a pool with WAL journaling, foreign keys and [`BUSY_TIMEOUT`].
pub async fn connect(location: &StoreLocation) -> Result<Pool<Sqlite>, DatabaseError> {
    if let StoreLocation::File(path) = location {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io(e.to_string()))?;
        }
    }

    let options = SqliteConnectOptions::from_str(&location.url())
        .map_err(|e| DatabaseError::Connection(e.to_string()))?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(location.pool_size())
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;

    match location {
        StoreLocation::File(path) => info!(path = %path.display(), "Database opened"),
        StoreLocation::Memory => debug!("In-memory database opened"),
    }
    Ok(pool)
}

/// Seconds since the Unix epoch.
#[allow(clippy::cast_possible_wrap)]
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Declares a cloneable store handle over a `SQLite` pool.
///
/// ```ignore
/// cwmp_core::define_database!(AcsDatabase, "ACS database migrations complete");
/// ```
///
/// The handle gets `open(path)`, `open_in_memory()`, `ping()` and `pool()`.
/// Both constructors apply the migrations embedded from the calling crate's
/// `./migrations` directory before returning.
#[macro_export]
macro_rules! define_database {
    ($name:ident, $migration_msg:expr) => {
        #[derive(Clone)]
        pub struct $name {
            pool: ::sqlx::Pool<::sqlx::Sqlite>,
        }

        impl $name {
            pub async fn open(
                path: &::std::path::Path,
            ) -> ::std::result::Result<Self, $crate::db::DatabaseError> {
                Self::at(&$crate::db::StoreLocation::file(path)).await
            }

            /// Throwaway database for tests.
            pub async fn open_in_memory() -> ::std::result::Result<Self, $crate::db::DatabaseError>
            {
                Self::at(&$crate::db::StoreLocation::Memory).await
            }

            async fn at(
                location: &$crate::db::StoreLocation,
            ) -> ::std::result::Result<Self, $crate::db::DatabaseError> {
                let pool = $crate::db::connect(location).await?;
                ::sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .map_err(|e| $crate::db::DatabaseError::Migration(e.to_string()))?;
                ::tracing::info!($migration_msg);
                Ok(Self { pool })
            }

            /// Round-trips a trivial query; used by the health endpoint.
            pub async fn ping(&self) -> ::std::result::Result<(), $crate::db::DatabaseError> {
                ::sqlx::query("SELECT 1").execute(&self.pool).await?;
                Ok(())
            }

            pub const fn pool(&self) -> &::sqlx::Pool<::sqlx::Sqlite> {
                &self.pool
            }
        }
    };
}
