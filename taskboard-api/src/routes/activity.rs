/// Activity history endpoints
///
/// - `GET /v1/tasks/:id/activity` - one task's history, oldest first
/// - `POST /v1/tasks/:id/activity` - append a note authored by the caller
/// - `GET /v1/activity?limit=50` - recent entries across visible tasks

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use taskboard_shared::{
    auth::middleware::AuthContext,
    models::activity_log::{ActivityLog, CreateActivityLog},
    store::DEFAULT_ACTIVITY_LIMIT,
};
use uuid::Uuid;

/// Largest page the recent feed will return
const MAX_ACTIVITY_LIMIT: usize = 500;

/// Recent activity query
#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

/// Manual activity entry
#[derive(Debug, Deserialize)]
pub struct LogActivityRequest {
    pub action: String,

    #[serde(default)]
    pub old_value: Option<JsonValue>,

    #[serde(default)]
    pub new_value: Option<JsonValue>,
}

/// Lists a task's history
pub async fn task_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ActivityLog>>> {
    Ok(Json(
        state
            .store
            .list_task_activity(auth.identity_id, task_id)
            .await?,
    ))
}

/// Appends an entry to a task's history
pub async fn log_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<LogActivityRequest>,
) -> ApiResult<(StatusCode, Json<ActivityLog>)> {
    let entry = state
        .store
        .log_activity(
            auth.identity_id,
            CreateActivityLog {
                task_id,
                user_id: Some(auth.identity_id),
                action: req.action,
                old_value: req.old_value,
                new_value: req.new_value,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Lists recent activity, newest first
pub async fn recent_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<Vec<ActivityLog>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .min(MAX_ACTIVITY_LIMIT);

    Ok(Json(
        state
            .store
            .list_recent_activity(auth.identity_id, limit)
            .await?,
    ))
}
