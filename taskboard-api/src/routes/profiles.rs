/// Profile endpoints
///
/// Any signed-in identity can read every profile; only the owner may
/// change one.
///
/// - `GET /v1/profiles`
/// - `GET /v1/profiles/:id`
/// - `PATCH /v1/profiles/:id`

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use taskboard_shared::{
    auth::middleware::AuthContext,
    models::profile::{Profile, UpdateProfile},
};
use uuid::Uuid;

/// Lists all profiles
pub async fn list_profiles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Profile>>> {
    Ok(Json(state.store.list_profiles(auth.identity_id).await?))
}

/// Gets one profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(state.store.get_profile(auth.identity_id, id).await?))
}

/// Updates the caller's own profile
///
/// ```text
/// PATCH /v1/profiles/:id
///
/// { "full_name": "Ada King", "avatar_url": null }
/// ```
///
/// `null` clears a field, an absent field is left alone.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateProfile>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(state.store.update_profile(auth.identity_id, id, patch).await?))
}
