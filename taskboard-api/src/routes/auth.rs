/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/signup` - Register an identity and get tokens
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Refresh access token
/// - `DELETE /v1/auth/account` - Delete the caller's identity (authenticated)
///
/// Sign-up provisions the profile and role in the same transaction as the
/// identity; see `Store::register_identity`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::{jwt, middleware::AuthContext, password},
    models::{profile::Profile, role::Role},
    provisioning::SignupMetadata,
    store::NewIdentity,
};
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Sign-up request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (will be validated for strength)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Display name and requested role
    #[serde(default)]
    pub metadata: SignupMetadata,
}

/// Sign-up response
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    /// New identity ID
    pub identity_id: Uuid,

    /// Provisioned profile
    pub profile: Profile,

    /// Provisioned role
    pub role: Role,

    /// Access and refresh tokens
    #[serde(flatten)]
    pub tokens: jwt::TokenPair,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Identity ID
    pub identity_id: Uuid,

    /// Access and refresh tokens
    #[serde(flatten)]
    pub tokens: jwt::TokenPair,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
}

/// Register a new identity
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/signup
/// Content-Type: application/json
///
/// {
///   "email": "ada@example.com",
///   "password": "analytical1",
///   "metadata": { "full_name": "Ada Lovelace", "role": "manager" }
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Invalid email, weak password, email taken
///   or invalid metadata
/// - `500 Internal Server Error`: Server error
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password)?;

    let password_hash = password::hash_password_blocking(req.password).await?;

    let registration = state
        .store
        .register_identity(NewIdentity {
            email: req.email,
            password_hash,
            metadata: req.metadata,
        })
        .await?;

    let tokens = jwt::issue_token_pair(registration.identity.id, state.jwt_secret())?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            identity_id: registration.identity.id,
            profile: registration.profile,
            role: registration.role.role,
            tokens,
        }),
    ))
}

/// Login endpoint
///
/// Unknown email and wrong password give the same 401.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "ada@example.com",
///   "password": "analytical1"
/// }
/// ```
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let identity = state
        .store
        .sign_in(&req.email, &req.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let tokens = jwt::issue_token_pair(identity.id, state.jwt_secret())?;

    Ok(Json(LoginResponse {
        identity_id: identity.id,
        tokens,
    }))
}

/// Token refresh endpoint
///
/// Exchanges a refresh token for a new access token.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}

/// Deletes the caller's identity
///
/// Cascades to the profile, role rows and created tasks. Tasks assigned to
/// the caller become unassigned.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    state.store.delete_identity(auth.identity_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
