/// Audit recorder
///
/// Writes one activity entry for every accepted task insert or update. It is
/// called from the task write path with the same connection the mutation
/// runs on, so the entry commits or rolls back together with the change.
/// A failed audit write is returned to the caller and aborts the transaction.

use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::models::activity_log::{ActivityLog, CreateActivityLog, ACTION_CREATED, ACTION_UPDATED};
use crate::models::task::Task;

/// Records a task mutation
///
/// # Arguments
///
/// * `conn` - The transaction the mutation ran on
/// * `actor` - Identity that made the change
/// * `before` - Row before the change, `None` for an insert
/// * `after` - Row after the change
///
/// # Errors
///
/// Returns the database error unchanged; the caller must not commit
pub async fn record_task_change(
    conn: &mut SqliteConnection,
    actor: Uuid,
    before: Option<&Task>,
    after: &Task,
) -> Result<ActivityLog, sqlx::Error> {
    let action = if before.is_some() {
        ACTION_UPDATED
    } else {
        ACTION_CREATED
    };

    let entry = ActivityLog::append(
        conn,
        CreateActivityLog {
            task_id: after.id,
            user_id: Some(actor),
            action: action.to_string(),
            old_value: before.map(Task::snapshot),
            new_value: Some(after.snapshot()),
        },
    )
    .await?;

    tracing::debug!(task_id = %after.id, actor = %actor, action, "Recorded task activity");

    Ok(entry)
}
