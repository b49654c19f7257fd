/// Schema migrations
///
/// The SQL files in `taskboard-shared/migrations/` are embedded at compile
/// time and applied in version order by sqlx's migrator, which records them
/// in `_sqlx_migrations`.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::db::migrations::{ensure_database_exists, run_migrations};
/// use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let url = "sqlite://taskboard.db";
///     ensure_database_exists(url).await?;
///
///     let pool = create_pool(DatabaseConfig::from_url(url)).await?;
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

use sqlx::migrate::{MigrateDatabase, MigrateError, Migrator};
use sqlx::sqlite::SqlitePool;
use sqlx::Sqlite;
use tracing::{debug, error, info};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Where the schema stands
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Successfully applied migrations
    pub applied_migrations: usize,

    /// Highest applied version
    pub latest_version: Option<i64>,

    /// Every embedded migration has been applied
    pub is_up_to_date: bool,
}

/// Applies pending migrations
///
/// Already-applied migrations are skipped, so this is safe to run on every
/// start.
///
/// # Errors
///
/// Fails if a migration errors (it is rolled back) or an applied migration
/// no longer matches its checksum.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await.map_err(|e| {
        error!(error = %e, "Migration failed");
        e
    })?;

    info!(embedded = MIGRATOR.iter().count(), "Schema is up to date");
    Ok(())
}

/// Reads the migration bookkeeping table
///
/// A database that was never migrated reports zero applied migrations.
pub async fn get_migration_status(pool: &SqlitePool) -> Result<MigrationStatus, sqlx::Error> {
    let embedded = MIGRATOR.iter().count();

    let has_table: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    let (applied, latest_version) = if has_table {
        let (count, latest): (i64, Option<i64>) =
            sqlx::query_as("SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(pool)
                .await?;
        (usize::try_from(count).unwrap_or_default(), latest)
    } else {
        (0, None)
    };

    debug!(applied, embedded, ?latest_version, "Migration status");

    Ok(MigrationStatus {
        applied_migrations: applied,
        latest_version,
        is_up_to_date: applied >= embedded,
    })
}

/// Creates the database file behind `database_url` if it is missing
///
/// In-memory URLs need nothing.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if database_url.contains(":memory:") {
        return Ok(());
    }

    if Sqlite::database_exists(database_url).await? {
        debug!("Database file present");
    } else {
        info!(url = database_url, "Creating database file");
        Sqlite::create_database(database_url).await?;
    }

    Ok(())
}
