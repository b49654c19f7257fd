/// Task model and database operations
///
/// Tasks are the aggregate root of the store. A manager creates a task,
/// optionally assigns it to someone, and the assignee moves its status along.
///
/// # Status
///
/// ```text
/// todo ⇄ in_progress ⇄ completed
/// ```
///
/// There is no state machine: any status is reachable from any other. Who may
/// change it is decided by the policy engine, not by the model.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id          BLOB PRIMARY KEY NOT NULL,
///     title       TEXT NOT NULL CHECK (length(title) BETWEEN 1 AND 200),
///     description TEXT CHECK (description IS NULL OR length(description) <= 2000),
///     status      TEXT NOT NULL DEFAULT 'todo'
///                 CHECK (status IN ('todo', 'in_progress', 'completed')),
///     priority    INTEGER NOT NULL DEFAULT 3 CHECK (priority BETWEEN 1 AND 5),
///     created_by  BLOB NOT NULL REFERENCES profiles (id) ON DELETE CASCADE,
///     assigned_to BLOB REFERENCES profiles (id) ON DELETE SET NULL,
///     due_date    TEXT,
///     created_at  TEXT NOT NULL,
///     updated_at  TEXT NOT NULL
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::models::task::{Task, CreateTask};
/// use sqlx::SqlitePool;
/// use uuid::Uuid;
///
/// # async fn example(pool: SqlitePool, manager: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let task = Task::from_create(CreateTask {
///     title: "Write release notes".to_string(),
///     created_by: manager,
///     ..CreateTask::default()
/// });
///
/// let mut conn = pool.acquire().await?;
/// let stored = Task::insert(&mut conn, &task).await?;
/// assert_eq!(stored.priority, 3);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::double_option;

/// Default priority for new tasks
pub const DEFAULT_PRIORITY: i32 = 3;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started
    Todo,

    /// Somebody is working on it
    InProgress,

    /// Done
    Completed,
}

impl TaskStatus {
    /// All statuses, in board order
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Completed];

    /// Converts status to its stored string
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!(
                "Unknown status '{}', expected one of todo, in_progress, completed",
                other
            )),
        }
    }
}

/// Task model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, Validate)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Short title, 1 to 200 characters
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    /// Longer description, at most 2000 characters
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    /// Current status
    pub status: TaskStatus,

    /// Priority from 1 (lowest) to 5 (highest)
    #[validate(range(min = 1, max = 5, message = "Priority must be between 1 and 5"))]
    pub priority: i32,

    /// Identity that created the task, never changes
    pub created_by: Uuid,

    /// Identity working on the task
    pub assigned_to: Option<Uuid>,

    /// When the task is due
    pub due_date: Option<DateTime<Utc>>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    /// Task title
    pub title: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Initial status (default todo)
    #[serde(default)]
    pub status: TaskStatus,

    /// Priority (default 3)
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Creating identity, must be the caller
    pub created_by: Uuid,

    /// Assignee
    #[serde(default)]
    pub assigned_to: Option<Uuid>,

    /// Due date
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl Default for CreateTask {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: None,
            status: TaskStatus::default(),
            priority: DEFAULT_PRIORITY,
            created_by: Uuid::nil(),
            assigned_to: None,
            due_date: None,
        }
    }
}

/// Partial update of a task
///
/// Absent fields are left alone. For nullable columns `null` clears the value.
/// `created_by` is deliberately absent: it never changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    /// New title
    #[serde(default)]
    pub title: Option<String>,

    /// New description (use Some(None) to clear)
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    /// New status
    #[serde(default)]
    pub status: Option<TaskStatus>,

    /// New priority
    #[serde(default)]
    pub priority: Option<i32>,

    /// New assignee (use Some(None) to unassign)
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,

    /// New due date (use Some(None) to clear)
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateTask {
    /// Patch that only changes the status
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Whether the patch changes the assignee
    pub fn reassigns(&self) -> bool {
        self.assigned_to.is_some()
    }

    /// Applies the patch to a copy of `current`
    pub fn apply(&self, current: &Task) -> Task {
        let mut next = current.clone();

        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(assigned_to) = self.assigned_to {
            next.assigned_to = assigned_to;
        }
        if let Some(due_date) = self.due_date {
            next.due_date = due_date;
        }

        next.updated_at = Utc::now();
        next
    }
}

/// Optional filters for listing tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Only tasks in this status
    pub status: Option<TaskStatus>,

    /// Only tasks assigned to this identity
    pub assigned_to: Option<Uuid>,

    /// Only tasks created by this identity
    pub created_by: Option<Uuid>,
}

impl TaskFilter {
    /// Checks a task against the filter
    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.assigned_to.map_or(true, |a| task.assigned_to == Some(a))
            && self.created_by.map_or(true, |c| task.created_by == c)
    }
}

/// Dashboard counters over a set of tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    /// Number of tasks
    pub total: usize,

    /// Tasks in `todo`
    pub todo: usize,

    /// Tasks in `in_progress`
    pub in_progress: usize,

    /// Tasks in `completed`
    pub completed: usize,

    /// Unfinished tasks whose due date has passed
    pub overdue: usize,
}

impl TaskStats {
    /// Counts tasks by status, and overdue ones as of `now`
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>, now: DateTime<Utc>) -> Self {
        let mut stats = TaskStats::default();

        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::Todo => stats.todo += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            if task.is_overdue(now) {
                stats.overdue += 1;
            }
        }

        stats
    }
}

impl Task {
    /// Builds the row that `CreateTask` would insert
    pub fn from_create(data: CreateTask) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: data.title,
            description: data.description,
            status: data.status,
            priority: data.priority,
            created_by: data.created_by,
            assigned_to: data.assigned_to,
            due_date: data.due_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Unfinished and past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Completed && self.due_date.is_some_and(|due| due < now)
    }

    /// Full snapshot of the row, as stored in the activity log
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Inserts a task row
    ///
    /// # Errors
    ///
    /// Returns an error if a column check or foreign key fails, or the
    /// database fails
    pub async fn insert(conn: &mut SqliteConnection, task: &Task) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (id, title, description, status, priority, created_by,
                               assigned_to, due_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, title, description, status, priority, created_by,
                      assigned_to, due_date, created_at, updated_at
            "#,
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.created_by)
        .bind(task.assigned_to)
        .bind(task.due_date)
        .bind(task.created_at)
        .bind(task.updated_at)
        .fetch_one(conn)
        .await?;

        Ok(task)
    }

    /// Finds a task by ID
    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, title, description, status, priority, created_by,
                   assigned_to, due_date, created_at, updated_at
            FROM tasks
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(task)
    }

    /// Lists tasks created by or assigned to `identity_id`, newest first
    ///
    /// The participant predicate and the filter run in SQL, so the cost
    /// follows the caller's own tasks rather than the table size.
    pub async fn list_for_participant(
        conn: &mut SqliteConnection,
        identity_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, title, description, status, priority, created_by,
                   assigned_to, due_date, created_at, updated_at
            FROM tasks
            WHERE (created_by = ?1 OR assigned_to = ?1)
              AND (?2 IS NULL OR status = ?2)
              AND (?3 IS NULL OR assigned_to = ?3)
              AND (?4 IS NULL OR created_by = ?4)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(identity_id)
        .bind(filter.status)
        .bind(filter.assigned_to)
        .bind(filter.created_by)
        .fetch_all(conn)
        .await?;

        Ok(tasks)
    }

    /// Writes every mutable column of `task` back to its row
    ///
    /// `created_by` and `created_at` are never written.
    pub async fn save(conn: &mut SqliteConnection, task: &Task) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET title = ?, description = ?, status = ?, priority = ?,
                assigned_to = ?, due_date = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, title, description, status, priority, created_by,
                      assigned_to, due_date, created_at, updated_at
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.assigned_to)
        .bind(task.due_date)
        .bind(task.updated_at)
        .bind(task.id)
        .fetch_one(conn)
        .await?;

        Ok(task)
    }

    /// Deletes a task
    ///
    /// ⚠️  This also deletes its activity log rows due to CASCADE.
    pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
