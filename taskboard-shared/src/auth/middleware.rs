/// Request authentication
///
/// Turns an `Authorization` header into an [`AuthContext`]. The HTTP layer
/// runs this for every protected route and stores the context in the
/// request extensions; handlers then pass `identity_id` to the store as the
/// acting identity.
///
/// # Example
///
/// ```
/// use taskboard_shared::auth::jwt::issue_token_pair;
/// use taskboard_shared::auth::middleware::authenticate_bearer;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-signing-secret-of-at-least-32-bytes";
/// let identity = Uuid::new_v4();
/// let pair = issue_token_pair(identity, secret)?;
///
/// let header = format!("Bearer {}", pair.access_token);
/// let ctx = authenticate_bearer(Some(&header), secret)?;
/// assert_eq!(ctx.identity_id, identity);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};

/// Authenticated caller, injected into request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Acting identity
    pub identity_id: Uuid,
}

/// Why a request could not be authenticated
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Expected a Bearer token")]
    InvalidFormat,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Validates a `Bearer` access token from an `Authorization` header value
pub fn authenticate_bearer(header: Option<&str>, secret: &str) -> Result<AuthContext, AuthError> {
    let header = header.ok_or(AuthError::MissingCredentials)?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidFormat)?;

    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::Expired,
        other => AuthError::InvalidToken(other.to_string()),
    })?;

    Ok(AuthContext {
        identity_id: claims.sub,
    })
}
