/// Task endpoints
///
/// Managers create, assign and delete their own tasks. A task is visible to
/// its creator and its assignee only; assignees may edit their tasks but
/// cannot hand them to someone else.
///
/// # Endpoints
///
/// - `GET /v1/tasks` - List visible tasks, newest first
/// - `POST /v1/tasks` - Create a task
/// - `GET /v1/tasks/stats` - Counters over visible tasks
/// - `GET /v1/tasks/:id` - Get a task
/// - `PATCH /v1/tasks/:id` - Update a task
/// - `PATCH /v1/tasks/:id/status` - Move a task to another column
/// - `DELETE /v1/tasks/:id` - Delete a task

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::middleware::AuthContext,
    models::task::{CreateTask, Task, TaskFilter, TaskStats, TaskStatus, UpdateTask, DEFAULT_PRIORITY},
};
use uuid::Uuid;

/// Create task request
///
/// `created_by` defaults to the caller.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: Option<i32>,

    #[serde(default)]
    pub created_by: Option<Uuid>,

    #[serde(default)]
    pub assigned_to: Option<Uuid>,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl CreateTaskRequest {
    fn into_create(self, caller: Uuid) -> CreateTask {
        CreateTask {
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority.unwrap_or(DEFAULT_PRIORITY),
            created_by: self.created_by.unwrap_or(caller),
            assigned_to: self.assigned_to,
            due_date: self.due_date,
        }
    }
}

/// Status change request
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusRequest {
    pub status: TaskStatus,
}

/// Lists visible tasks
///
/// ```text
/// GET /v1/tasks?status=in_progress&assigned_to=uuid&created_by=uuid
/// ```
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.store.list_tasks(auth.identity_id, &filter).await?))
}

/// Creates a task
///
/// ```text
/// POST /v1/tasks
///
/// {
///   "title": "Prepare quarterly review",
///   "priority": 2,
///   "assigned_to": "uuid",
///   "due_date": "2025-07-01T00:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: caller is not a manager, or `created_by` is someone else
/// - `422 Unprocessable Entity`: a column rule failed, or a referenced
///   profile does not exist
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state
        .store
        .create_task(auth.identity_id, req.into_create(auth.identity_id))
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// Counters over the caller's visible tasks
pub async fn task_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<TaskStats>> {
    Ok(Json(state.store.task_stats(auth.identity_id).await?))
}

/// Gets one task
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.store.get_task(auth.identity_id, id).await?))
}

/// Updates a task
///
/// Absent fields are left alone; `null` clears `description`,
/// `assigned_to` or `due_date`.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateTask>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.store.update_task(auth.identity_id, id, patch).await?))
}

/// Changes only the status of a task
pub async fn update_task_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<Task>> {
    Ok(Json(
        state
            .store
            .update_task_status(auth.identity_id, id, req.status)
            .await?,
    ))
}

/// Deletes a task and its activity history
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete_task(auth.identity_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
