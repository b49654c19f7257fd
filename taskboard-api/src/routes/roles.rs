/// Role endpoints
///
/// Role rows are private to their owner.
///
/// - `GET /v1/roles/me` - the caller's effective role row
/// - `POST /v1/roles` - assign a role to the caller

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Extension, Json};
use taskboard_shared::{
    auth::middleware::AuthContext,
    models::role::{CreateRoleAssignment, RoleAssignment},
};

/// Returns the caller's role assignment
///
/// If the caller holds several roles the manager row is returned.
pub async fn my_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<RoleAssignment>> {
    Ok(Json(
        state
            .store
            .get_role_assignment(auth.identity_id, auth.identity_id)
            .await?,
    ))
}

/// Assigns a role
///
/// ```text
/// POST /v1/roles
///
/// { "identity_id": "uuid", "role": "manager" }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: `identity_id` is not the caller
/// - `422 Unprocessable Entity`: the caller already holds that role
pub async fn assign_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateRoleAssignment>,
) -> ApiResult<(StatusCode, Json<RoleAssignment>)> {
    let assignment = state.store.assign_role(auth.identity_id, req).await?;

    Ok((StatusCode::CREATED, Json(assignment)))
}
