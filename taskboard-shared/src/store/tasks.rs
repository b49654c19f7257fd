use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;
use validator::Validate;

use super::Store;
use crate::audit;
use crate::auth::authorization::{authorize, authorize_task_update, is_allowed, Actor, Operation, Target};
use crate::error::{StoreError, StoreResult};
use crate::events::notifier::ChangeKind;
use crate::models::profile::Profile;
use crate::models::task::{CreateTask, Task, TaskFilter, TaskStats, TaskStatus, UpdateTask};
use crate::models::EntityKind;

/// Loads a task the actor can read
///
/// Missing and invisible tasks look the same to the caller.
pub(super) async fn visible_task(
    conn: &mut SqliteConnection,
    actor: &Actor,
    id: Uuid,
) -> StoreResult<Task> {
    match Task::find_by_id(conn, id).await? {
        Some(task) if is_allowed(actor, Operation::Read, &Target::Task(&task)) => Ok(task),
        _ => Err(StoreError::NotFound("Task")),
    }
}

async fn check_references(conn: &mut SqliteConnection, task: &Task) -> StoreResult<()> {
    if !Profile::exists(&mut *conn, task.created_by).await? {
        return Err(StoreError::constraint("created_by", "Creator has no profile"));
    }
    if let Some(assignee) = task.assigned_to {
        if !Profile::exists(&mut *conn, assignee).await? {
            return Err(StoreError::constraint("assigned_to", "Assignee does not exist"));
        }
    }
    Ok(())
}

impl Store {
    /// Creates a task and its `created` activity entry
    ///
    /// # Errors
    ///
    /// - `Unauthorized` unless the actor is a manager creating on their own behalf
    /// - `ConstraintViolation` for invalid columns or an unknown assignee
    /// - `TransactionFailure` if the task or its audit entry cannot be written
    pub async fn create_task(&self, actor_id: Uuid, data: CreateTask) -> StoreResult<Task> {
        let mut tx = self.begin().await?;
        let actor = Actor::resolve(&mut tx, actor_id).await?;

        let task = Task::from_create(data);
        authorize(&actor, Operation::Insert, &Target::Task(&task))?;
        task.validate()?;
        check_references(&mut tx, &task).await?;

        let task = Task::insert(&mut tx, &task).await?;
        let entry = audit::record_task_change(&mut tx, actor.id, None, &task).await?;

        tx.commit().await?;

        tracing::info!(actor = %actor.id, task_id = %task.id, "Task created");
        self.publish(EntityKind::Task, ChangeKind::Insert, &task);
        self.publish(EntityKind::ActivityLog, ChangeKind::Insert, &entry);

        Ok(task)
    }

    /// Reads one task
    ///
    /// # Errors
    ///
    /// `NotFound` if the task doesn't exist or the actor is neither its
    /// creator nor its assignee
    pub async fn get_task(&self, actor_id: Uuid, id: Uuid) -> StoreResult<Task> {
        let mut conn = self.pool.acquire().await?;
        let actor = Actor::resolve(&mut conn, actor_id).await?;

        let task = visible_task(&mut conn, &actor, id).await?;
        tracing::debug!(actor = %actor.id, task_id = %id, "Task read");

        Ok(task)
    }

    /// Lists the tasks the actor can see, newest first
    ///
    /// Only the actor's own tasks are read; the read predicate still has the
    /// final say on each row.
    pub async fn list_tasks(&self, actor_id: Uuid, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let mut conn = self.pool.acquire().await?;
        let actor = Actor::resolve(&mut conn, actor_id).await?;

        let tasks: Vec<Task> = Task::list_for_participant(&mut conn, actor.id, filter)
            .await?
            .into_iter()
            .filter(|t| is_allowed(&actor, Operation::Read, &Target::Task(t)))
            .filter(|t| filter.matches(t))
            .collect();

        tracing::debug!(actor = %actor.id, count = tasks.len(), "Tasks listed");
        Ok(tasks)
    }

    /// Applies a partial update and records an `updated` activity entry
    ///
    /// The update predicate is checked against both the stored row and the
    /// patched row.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the task is missing or invisible to the actor
    /// - `Unauthorized` if the actor may see but not change the task
    /// - `ConstraintViolation` for invalid columns or an unknown assignee
    /// - `TransactionFailure` if the update or its audit entry cannot be written
    pub async fn update_task(&self, actor_id: Uuid, id: Uuid, patch: UpdateTask) -> StoreResult<Task> {
        let mut tx = self.begin().await?;
        let actor = Actor::resolve(&mut tx, actor_id).await?;

        let current = visible_task(&mut tx, &actor, id).await?;
        let next = patch.apply(&current);
        authorize_task_update(&actor, &current, &next)?;
        next.validate()?;
        if patch.reassigns() {
            check_references(&mut tx, &next).await?;
        }

        let task = Task::save(&mut tx, &next).await?;
        let entry = audit::record_task_change(&mut tx, actor.id, Some(&current), &task).await?;

        tx.commit().await?;

        tracing::info!(
            actor = %actor.id,
            task_id = %task.id,
            status = %task.status,
            "Task updated"
        );
        self.publish(EntityKind::Task, ChangeKind::Update, &task);
        self.publish(EntityKind::ActivityLog, ChangeKind::Insert, &entry);

        Ok(task)
    }

    /// Moves a task to another status
    pub async fn update_task_status(
        &self,
        actor_id: Uuid,
        id: Uuid,
        status: TaskStatus,
    ) -> StoreResult<Task> {
        self.update_task(actor_id, id, UpdateTask::status(status)).await
    }

    /// Deletes a task together with its activity entries
    ///
    /// # Errors
    ///
    /// - `NotFound` if the task is missing or invisible to the actor
    /// - `Unauthorized` unless the actor is the managing creator
    pub async fn delete_task(&self, actor_id: Uuid, id: Uuid) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        let actor = Actor::resolve(&mut tx, actor_id).await?;

        let task = visible_task(&mut tx, &actor, id).await?;
        authorize(&actor, Operation::Delete, &Target::Task(&task))?;

        if !Task::delete(&mut tx, id).await? {
            return Err(StoreError::NotFound("Task"));
        }

        tx.commit().await?;

        tracing::info!(actor = %actor.id, task_id = %id, "Task deleted");
        self.publish(EntityKind::Task, ChangeKind::Delete, &task);

        Ok(())
    }

    /// Dashboard counters over the tasks the actor can see
    pub async fn task_stats(&self, actor_id: Uuid) -> StoreResult<TaskStats> {
        let tasks = self.list_tasks(actor_id, &TaskFilter::default()).await?;
        Ok(TaskStats::from_tasks(&tasks, Utc::now()))
    }
}
