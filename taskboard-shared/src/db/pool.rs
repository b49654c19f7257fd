/// SQLite connection pool backing the task store
///
/// Every connection runs with `PRAGMA foreign_keys = ON`; the cascade and
/// set-null rules between identities, profiles, tasks and the activity log
/// live in the schema and depend on it.
///
/// File databases run in WAL mode so readers never wait on the writer, and
/// a connection that meets a lock waits up to `busy_timeout_seconds` before
/// failing. Writers are serialized by the store itself.
///
/// An in-memory database exists only inside the connection that opened it,
/// so in-memory pools are pinned to a single connection that is never
/// recycled.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::from_url("sqlite://taskboard.db")).await?;
///
///     let (tasks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
///         .fetch_one(&pool)
///         .await?;
///
///     Ok(())
/// }
/// ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// URL of a private in-memory database
pub const IN_MEMORY_URL: &str = "sqlite::memory:";

/// Pool options
///
/// Durations are whole seconds so they map directly onto environment
/// variables.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `sqlite://path/to/file.db` or `sqlite::memory:`
    pub url: String,

    /// Upper bound on open connections (default 10, forced to 1 in memory)
    pub max_connections: u32,

    /// Connections kept open while idle (default 1)
    pub min_connections: u32,

    /// How long `acquire` waits before giving up (default 30)
    pub connect_timeout_seconds: u64,

    /// Idle connections older than this are closed (default 600, None = never)
    pub idle_timeout_seconds: Option<u64>,

    /// Connections are recycled after this long (default 1800, None = never)
    pub max_lifetime_seconds: Option<u64>,

    /// How long a statement waits on a locked database (default 5)
    pub busy_timeout_seconds: u64,

    /// Create the file on first connect (default true)
    pub create_if_missing: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
            busy_timeout_seconds: 5,
            create_if_missing: true,
        }
    }
}

impl DatabaseConfig {
    /// Default options for `url`
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Options for a private in-memory database, used by tests
    pub fn in_memory() -> Self {
        Self {
            url: IN_MEMORY_URL.to_string(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout_seconds: None,
            max_lifetime_seconds: None,
            ..Default::default()
        }
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Opens the pool and checks that the database answers
///
/// # Errors
///
/// - The URL cannot be parsed
/// - The database file cannot be opened or created
/// - The first query fails
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let mut connect_options = SqliteConnectOptions::from_str(&config.url)?
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(config.busy_timeout_seconds))
        .create_if_missing(config.create_if_missing);

    if !config.is_in_memory() {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    let max_connections = if config.is_in_memory() && config.max_connections > 1 {
        warn!(
            requested = config.max_connections,
            "In-memory database needs a single connection, clamping to 1"
        );
        1
    } else {
        config.max_connections
    };

    let (idle_timeout, max_lifetime) = if config.is_in_memory() {
        (None, None)
    } else {
        (
            config.idle_timeout_seconds.map(Duration::from_secs),
            config.max_lifetime_seconds.map(Duration::from_secs),
        )
    };

    debug!(
        max_connections,
        min_connections = config.min_connections,
        ?idle_timeout,
        ?max_lifetime,
        "Opening SQLite pool"
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(config.min_connections.min(max_connections))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(idle_timeout)
        .max_lifetime(max_lifetime)
        .connect_with(connect_options)
        .await?;

    health_check(&pool).await?;

    info!(max_connections, "SQLite pool ready");
    Ok(pool)
}

/// Runs a trivial query to confirm the database is reachable
///
/// # Errors
///
/// Returns the database error if the query fails
pub async fn health_check(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;

    if one != 1 {
        warn!(value = one, "Health check returned an unexpected value");
        return Err(sqlx::Error::Protocol(format!(
            "health check returned {}",
            one
        )));
    }

    debug!("Database health check passed");
    Ok(())
}

/// Snapshot of pool usage
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub active_connections: usize,
    pub idle_connections: usize,
    pub total_connections: usize,
    pub max_connections: u32,
}

pub fn get_pool_stats(pool: &SqlitePool) -> PoolStats {
    let total = pool.size() as usize;
    let idle = pool.num_idle();

    PoolStats {
        active_connections: total.saturating_sub(idle),
        idle_connections: idle,
        total_connections: total,
        max_connections: pool.options().get_max_connections(),
    }
}

/// Closes every connection, waiting for checked-out ones to come back
pub async fn close_pool(pool: SqlitePool) {
    pool.close().await;
    info!("SQLite pool closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::from_url("sqlite://board.db");
        assert_eq!(config.url, "sqlite://board.db");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.idle_timeout_seconds, Some(600));
        assert_eq!(config.busy_timeout_seconds, 5);
        assert!(config.create_if_missing);
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_in_memory_config_pins_single_connection() {
        let config = DatabaseConfig::in_memory();
        assert!(config.is_in_memory());
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.idle_timeout_seconds, None);
        assert_eq!(config.max_lifetime_seconds, None);
    }

    #[tokio::test]
    async fn test_in_memory_pool_enforces_foreign_keys() {
        let pool = create_pool(DatabaseConfig::in_memory()).await.unwrap();

        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
        assert_eq!(get_pool_stats(&pool).total_connections, 1);

        close_pool(pool).await;
    }
}
