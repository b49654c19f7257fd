/// Activity log model and database operations
///
/// The activity log is an append-only history of task mutations. Rows are
/// written by the audit recorder in the same transaction as the change they
/// describe, or directly by a caller through the store's `log_activity`.
/// Nothing updates or deletes them; they disappear only when their task is
/// deleted.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE activity_log (
///     id         BLOB PRIMARY KEY NOT NULL,
///     task_id    BLOB NOT NULL REFERENCES tasks (id) ON DELETE CASCADE,
///     user_id    BLOB REFERENCES profiles (id) ON DELETE SET NULL,
///     action     TEXT NOT NULL,
///     old_value  TEXT,
///     new_value  TEXT,
///     created_at TEXT NOT NULL
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::SqliteConnection;
use uuid::Uuid;
use validator::Validate;

/// Label written for task inserts
pub const ACTION_CREATED: &str = "created";

/// Label written for task updates
pub const ACTION_UPDATED: &str = "updated";

/// One entry in a task's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityLog {
    /// Entry ID
    pub id: Uuid,

    /// Task the entry belongs to
    pub task_id: Uuid,

    /// Identity that acted (None once that identity is deleted)
    pub user_id: Option<Uuid>,

    /// What happened, e.g. "created" or "updated"
    pub action: String,

    /// Row before the change (None on create)
    pub old_value: Option<JsonValue>,

    /// Row after the change
    pub new_value: Option<JsonValue>,

    /// When the entry was written
    pub created_at: DateTime<Utc>,
}

/// Input for appending an entry
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateActivityLog {
    /// Task the entry belongs to
    pub task_id: Uuid,

    /// Acting identity
    pub user_id: Option<Uuid>,

    /// Free-form action label
    #[validate(length(min = 1, max = 100, message = "Action must be between 1 and 100 characters"))]
    pub action: String,

    /// Snapshot before the change
    #[serde(default)]
    pub old_value: Option<JsonValue>,

    /// Snapshot after the change
    #[serde(default)]
    pub new_value: Option<JsonValue>,
}

impl ActivityLog {
    /// Appends an entry
    ///
    /// # Errors
    ///
    /// Returns an error if the task or author doesn't exist, or the database fails
    pub async fn append(
        conn: &mut SqliteConnection,
        data: CreateActivityLog,
    ) -> Result<Self, sqlx::Error> {
        let entry = sqlx::query_as::<_, ActivityLog>(
            r#"
            INSERT INTO activity_log (id, task_id, user_id, action, old_value, new_value, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, task_id, user_id, action, old_value, new_value, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.task_id)
        .bind(data.user_id)
        .bind(data.action)
        .bind(data.old_value)
        .bind(data.new_value)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(entry)
    }

    /// Lists a task's entries, oldest first
    pub async fn list_by_task(
        conn: &mut SqliteConnection,
        task_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let entries = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, task_id, user_id, action, old_value, new_value, created_at
            FROM activity_log
            WHERE task_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(conn)
        .await?;

        Ok(entries)
    }

    /// Lists the newest entries on tasks `identity_id` created or is
    /// assigned to, at most `limit` of them
    pub async fn list_recent_for_participant(
        conn: &mut SqliteConnection,
        identity_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let entries = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT a.id, a.task_id, a.user_id, a.action, a.old_value, a.new_value, a.created_at
            FROM activity_log a
            JOIN tasks t ON t.id = a.task_id
            WHERE t.created_by = ?1 OR t.assigned_to = ?1
            ORDER BY a.created_at DESC, a.rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(identity_id)
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(entries)
    }

    /// Counts a task's entries
    pub async fn count_by_task(
        conn: &mut SqliteConnection,
        task_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM activity_log WHERE task_id = ?")
            .bind(task_id)
            .fetch_one(conn)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_label_validation() {
        let mut entry = CreateActivityLog {
            task_id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            action: "commented".to_string(),
            old_value: None,
            new_value: None,
        };
        assert!(entry.validate().is_ok());

        entry.action = String::new();
        assert!(entry.validate().is_err());
    }
}
