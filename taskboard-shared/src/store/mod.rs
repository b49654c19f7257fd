/// Policy-enforced entity store
///
/// [`Store`] is the only way callers touch the database. Every operation
/// takes the acting identity first, and runs in one scoped transaction that
/// follows the same steps:
///
/// 1. resolve the actor's role
/// 2. load the target row; a row the actor cannot read is `NotFound`
/// 3. authorize the operation with the policy engine (`Unauthorized`)
/// 4. validate columns and references (`ConstraintViolation`)
/// 5. write, plus the audit entry for task writes
/// 6. commit, then publish to the change notifier
///
/// A transaction that is dropped before commit rolls back, so any early
/// return through `?` leaves nothing behind.
///
/// Write transactions take the store's write lock before they begin and
/// hold it until they commit or roll back. SQLite allows one writer at a
/// time, and a deferred transaction that reads before it writes cannot wait
/// for another writer's lock, so concurrent writers queue on the lock
/// instead. The last one to commit wins. Reads don't take the lock.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskboard_shared::db::migrations::run_migrations;
/// use taskboard_shared::models::task::CreateTask;
/// use taskboard_shared::store::Store;
/// use uuid::Uuid;
///
/// # async fn example(manager: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::in_memory()).await?;
/// run_migrations(&pool).await?;
/// let store = Store::new(pool);
///
/// let task = store
///     .create_task(manager, CreateTask {
///         title: "Draft roadmap".to_string(),
///         created_by: manager,
///         ..CreateTask::default()
///     })
///     .await?;
/// println!("Created {}", task.id);
/// # Ok(())
/// # }
/// ```

mod activity;
mod identities;
mod profiles;
mod roles;
mod tasks;

pub use activity::DEFAULT_ACTIVITY_LIMIT;
pub use identities::{NewIdentity, Registration};

use sqlx::{Sqlite, SqlitePool, Transaction};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreResult;
use crate::events::notifier::{ChangeEvent, ChangeKind, ChangeNotifier};
use crate::models::EntityKind;

/// Handle to the task store
///
/// Cheap to clone; clones share the pool and the notifier.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    notifier: Arc<ChangeNotifier>,
    write_lock: Arc<Mutex<()>>,
}

impl Store {
    /// Creates a store with its own change notifier
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_notifier(pool, Arc::new(ChangeNotifier::new()))
    }

    /// Creates a store publishing to an existing notifier
    pub fn with_notifier(pool: SqlitePool, notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            pool,
            notifier,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The change notifier mutations are published to
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Waits for the write lock, then opens a transaction
    async fn begin(&self) -> StoreResult<WriteTx> {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(WriteTx { tx, _guard: guard })
    }

    fn publish<T: serde::Serialize>(&self, entity: EntityKind, change: ChangeKind, row: &T) {
        match serde_json::to_value(row) {
            Ok(record) => {
                self.notifier.publish(ChangeEvent::new(entity, change, record));
            }
            Err(e) => {
                tracing::error!(entity = %entity, error = %e, "Failed to encode change event");
            }
        }
    }
}

/// A transaction holding the store's write lock
///
/// Derefs to the underlying connection. Dropping it without [`commit`]
/// rolls back before the lock is released.
///
/// [`commit`]: WriteTx::commit
struct WriteTx {
    // dropped first: the rollback is queued before the lock is released
    tx: Transaction<'static, Sqlite>,
    _guard: OwnedMutexGuard<()>,
}

impl WriteTx {
    async fn commit(self) -> Result<(), sqlx::Error> {
        let WriteTx { tx, _guard } = self;
        tx.commit().await
    }
}

impl Deref for WriteTx {
    type Target = Transaction<'static, Sqlite>;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for WriteTx {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}
