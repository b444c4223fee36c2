#![cfg_attr(
    not(any(feature = "pg", feature = "mysql", feature = "sqlite")),
    allow(unused_imports, unused_variables, dead_code, unreachable_code)
)]

//! Persistence context for `repokit`.
//!
//! Connects a sqlx pool for the engine named by the DSN, wraps it in a
//! SeaORM connection and hands out repositories, either autocommitting over
//! the pool ([`DbHandle::repository`]) or scoped to a transaction
//! ([`UnitOfWork::repository`]).
//!
//! # Features
//! - `pg`, `mysql`, `sqlite`: enable the matching sqlx/SeaORM backends
//!   (`sqlite` is on by default)
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use repokit_db::{persistence, register_persistence, ClientHub, ConnectOpts, DbHandle};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let hub = ClientHub::new();
//! let db = DbHandle::connect("sqlite://./data/app.db", ConnectOpts::default()).await?;
//! register_persistence(&hub, Arc::new(db));
//!
//! // later, per request:
//! let uow = persistence(&hub)?.begin().await?;
//! // ... uow.repository::<my::Entity>() ...
//! uow.commit().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod pool_opts;
pub mod registry;
pub mod uow;

pub use config::{redact_credentials_in_dsn, DbConnConfig, PoolCfg};
pub use registry::{
    persistence, register_persistence, register_repository, ClientHub, ClientHubError,
    GLOBAL_SCOPE,
};
pub use uow::{UnitOfWork, UnitOfWorkFactory};

use std::sync::Arc;
use std::time::Duration;

use repokit::{RepoEntity, SeaOrmRepository};
use sea_orm::DatabaseConnection;
use thiserror::Error;
use tracing::{debug, info};

#[cfg(any(feature = "pg", feature = "mysql", feature = "sqlite"))]
use pool_opts::ApplyPoolOpts;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Unknown DSN: {0}")]
    UnknownDsn(String),

    #[error("Feature not enabled: {0}")]
    FeatureDisabled(&'static str),

    #[error("Invalid database config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Sea(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hub(#[from] ClientHubError),
}

/// Supported engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbEngine {
    Postgres,
    MySql,
    Sqlite,
}

/// Pool options; each driver applies the subset it supports.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectOpts {
    pub max_conns: Option<u32>,
    pub min_conns: Option<u32>,
    /// Timeout to acquire a connection from the pool.
    pub acquire_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
    /// Ping connections before handing them out.
    pub test_before_acquire: bool,
    /// For SQLite file DSNs, create parent directories if missing.
    pub create_sqlite_dirs: bool,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            max_conns: Some(10),
            min_conns: None,
            acquire_timeout: Some(Duration::from_secs(30)),
            idle_timeout: None,
            max_lifetime: None,
            test_before_acquire: false,
            create_sqlite_dirs: true,
        }
    }
}

#[cfg(feature = "sqlite")]
const DEFAULT_SQLITE_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Connected persistence context.
///
/// Clones share one pool through an `Arc`: `DatabaseConnection` is not
/// `Clone` when SeaORM's `mock` feature is on.
#[derive(Debug, Clone)]
pub struct DbHandle {
    engine: DbEngine,
    dsn: String,
    sea: Arc<DatabaseConnection>,
}

impl DbHandle {
    /// Detect engine by DSN scheme. The tail (credentials etc.) is not touched.
    pub fn detect(dsn: &str) -> Result<DbEngine> {
        let s = dsn.trim_start();
        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            Ok(DbEngine::Postgres)
        } else if s.starts_with("mysql://") {
            Ok(DbEngine::MySql)
        } else if s.starts_with("sqlite:") {
            Ok(DbEngine::Sqlite)
        } else {
            Err(DbError::UnknownDsn(redact_credentials_in_dsn(Some(dsn))))
        }
    }

    /// Connect a pool for `dsn` and wrap it for SeaORM.
    pub async fn connect(dsn: &str, opts: ConnectOpts) -> Result<Self> {
        let engine = Self::detect(dsn)?;
        let sea = match engine {
            #[cfg(feature = "pg")]
            DbEngine::Postgres => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .apply(&opts)
                    .connect(dsn)
                    .await?;
                sea_orm::SqlxPostgresConnector::from_sqlx_postgres_pool(pool)
            }
            #[cfg(feature = "mysql")]
            DbEngine::MySql => {
                let pool = sqlx::mysql::MySqlPoolOptions::new()
                    .apply(&opts)
                    .connect(dsn)
                    .await?;
                sea_orm::SqlxMySqlConnector::from_sqlx_mysql_pool(pool)
            }
            #[cfg(feature = "sqlite")]
            DbEngine::Sqlite => connect_sqlite(dsn, &opts).await?,
            #[cfg(not(feature = "pg"))]
            DbEngine::Postgres => {
                return Err(DbError::FeatureDisabled("PostgreSQL feature not enabled"))
            }
            #[cfg(not(feature = "mysql"))]
            DbEngine::MySql => {
                return Err(DbError::FeatureDisabled("MySQL feature not enabled"))
            }
            #[cfg(not(feature = "sqlite"))]
            DbEngine::Sqlite => {
                return Err(DbError::FeatureDisabled("SQLite feature not enabled"))
            }
        };

        info!(
            engine = ?engine,
            dsn = %redact_credentials_in_dsn(Some(dsn)),
            "database connected"
        );
        Ok(Self {
            engine,
            dsn: dsn.to_string(),
            sea: Arc::new(sea),
        })
    }

    /// Connect from typed config: builds the DSN and pool options first.
    pub async fn from_config(cfg: &DbConnConfig) -> Result<Self> {
        let dsn = cfg.to_dsn()?;
        Self::connect(&dsn, cfg.connect_opts()).await
    }

    pub fn engine(&self) -> DbEngine {
        self.engine
    }

    /// The DSN this handle was connected with.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn sea(&self) -> &DatabaseConnection {
        &self.sea
    }

    /// Autocommitting repository over the pool.
    pub fn repository<E: RepoEntity>(&self) -> SeaOrmRepository<E, Arc<DatabaseConnection>> {
        SeaOrmRepository::new(Arc::clone(&self.sea))
    }

    /// Close the pool if this is the last handle to it. While other clones
    /// or repositories still share the pool it closes when the last one is
    /// dropped.
    pub async fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.sea) {
            Ok(sea) => sea.close().await?,
            Err(shared) => {
                debug!(
                    holders = Arc::strong_count(&shared),
                    "pool still shared; it closes with the last holder"
                );
            }
        }
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
fn is_sqlite_memory(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

#[cfg(feature = "sqlite")]
async fn connect_sqlite(dsn: &str, opts: &ConnectOpts) -> Result<DatabaseConnection> {
    use std::str::FromStr;

    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    let mut conn_opts = SqliteConnectOptions::from_str(dsn)?.create_if_missing(true);
    let mut pool_opts = SqlitePoolOptions::new().apply(opts);

    if is_sqlite_memory(dsn) {
        // Every in-memory connection is a separate database: keep exactly one
        // alive for the life of the pool.
        pool_opts = pool_opts
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>);
    } else {
        if opts.create_sqlite_dirs {
            create_sqlite_parent_dir(dsn)?;
        }
        conn_opts = conn_opts.busy_timeout(DEFAULT_SQLITE_BUSY_TIMEOUT);
    }

    let pool = pool_opts.connect_with(conn_opts).await?;
    Ok(sea_orm::SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

#[cfg(feature = "sqlite")]
fn sqlite_path(dsn: &str) -> Option<std::path::PathBuf> {
    let rest = dsn.trim_start().strip_prefix("sqlite:")?;
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let path = rest.split('?').next().unwrap_or(rest);
    (!path.is_empty()).then(|| std::path::PathBuf::from(path))
}

#[cfg(feature = "sqlite")]
fn create_sqlite_parent_dir(dsn: &str) -> Result<()> {
    if let Some(parent) = sqlite_path(dsn).as_deref().and_then(|p| p.parent()) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
