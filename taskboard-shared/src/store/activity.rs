use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use super::tasks::visible_task;
use super::Store;
use crate::auth::authorization::{authorize, is_allowed, Actor, Operation, Target};
use crate::error::StoreResult;
use crate::events::notifier::ChangeKind;
use crate::models::activity_log::{ActivityLog, CreateActivityLog};
use crate::models::task::{Task, TaskFilter};
use crate::models::EntityKind;

/// Default page size for the recent-activity feed
pub const DEFAULT_ACTIVITY_LIMIT: usize = 50;

impl Store {
    /// Lists a task's history, oldest first
    ///
    /// Visibility follows the task as it is now, not as it was when each
    /// entry was written.
    ///
    /// # Errors
    ///
    /// `NotFound` if the task is missing or invisible to the actor
    pub async fn list_task_activity(&self, actor_id: Uuid, task_id: Uuid) -> StoreResult<Vec<ActivityLog>> {
        let mut conn = self.pool.acquire().await?;
        let actor = Actor::resolve(&mut conn, actor_id).await?;

        let task = visible_task(&mut conn, &actor, task_id).await?;
        let entries = ActivityLog::list_by_task(&mut conn, task_id)
            .await?
            .into_iter()
            .filter(|e| {
                is_allowed(
                    &actor,
                    Operation::Read,
                    &Target::ActivityLog { user_id: e.user_id, task: &task },
                )
            })
            .collect();

        Ok(entries)
    }

    /// Lists the most recent entries the actor can see, newest first
    ///
    /// The participant join and `limit` run in SQL; the read predicate then
    /// checks each entry against its task.
    pub async fn list_recent_activity(&self, actor_id: Uuid, limit: usize) -> StoreResult<Vec<ActivityLog>> {
        let mut conn = self.pool.acquire().await?;
        let actor = Actor::resolve(&mut conn, actor_id).await?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let recent = ActivityLog::list_recent_for_participant(&mut conn, actor.id, limit).await?;
        if recent.is_empty() {
            return Ok(recent);
        }

        let tasks: HashMap<Uuid, Task> =
            Task::list_for_participant(&mut conn, actor.id, &TaskFilter::default())
                .await?
                .into_iter()
                .map(|t| (t.id, t))
                .collect();

        let entries = recent
            .into_iter()
            .filter(|e| {
                tasks.get(&e.task_id).is_some_and(|task| {
                    is_allowed(
                        &actor,
                        Operation::Read,
                        &Target::ActivityLog { user_id: e.user_id, task },
                    )
                })
            })
            .collect();

        Ok(entries)
    }

    /// Appends a free-form entry to a task's history
    ///
    /// # Errors
    ///
    /// - `NotFound` if the task is missing or invisible to the actor
    /// - `Unauthorized` unless the entry is authored by the actor
    /// - `ConstraintViolation` for an invalid action label
    pub async fn log_activity(&self, actor_id: Uuid, data: CreateActivityLog) -> StoreResult<ActivityLog> {
        let mut tx = self.begin().await?;
        let actor = Actor::resolve(&mut tx, actor_id).await?;

        let task = visible_task(&mut tx, &actor, data.task_id).await?;
        authorize(
            &actor,
            Operation::Insert,
            &Target::ActivityLog { user_id: data.user_id, task: &task },
        )?;
        data.validate()?;

        let entry = ActivityLog::append(&mut tx, data).await?;
        tx.commit().await?;

        tracing::info!(actor = %actor.id, task_id = %entry.task_id, action = %entry.action, "Activity logged");
        self.publish(EntityKind::ActivityLog, ChangeKind::Insert, &entry);

        Ok(entry)
    }
}
