/// Provisioning of newly registered identities
///
/// Registration creates exactly one profile and one role row for the new
/// identity. [`provision`] runs on the registration transaction, right after
/// the identity insert, so either all three rows commit or none do.
///
/// Provisioning acts on behalf of the system, not the new identity, and is
/// not subject to the policy engine.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use validator::Validate;

use crate::error::StoreResult;
use crate::models::identity::Identity;
use crate::models::profile::{CreateProfile, Profile};
use crate::models::role::{CreateRoleAssignment, Role, RoleAssignment};

/// Free-form metadata supplied at sign-up
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignupMetadata {
    /// Display name for the profile
    #[serde(default)]
    pub full_name: Option<String>,

    /// Requested role; anything but "manager" or "user" becomes "user"
    #[serde(default)]
    pub role: Option<String>,
}

/// Rows created for a new identity
#[derive(Debug, Clone, Serialize)]
pub struct Provisioned {
    pub profile: Profile,
    pub role: RoleAssignment,
}

/// Creates the profile and role rows for `identity`
///
/// # Errors
///
/// - `ConstraintViolation` if the metadata produces an invalid profile
/// - `TransactionFailure` if the database fails; the caller must roll back
pub async fn provision(
    conn: &mut SqliteConnection,
    identity: &Identity,
    metadata: &SignupMetadata,
) -> StoreResult<Provisioned> {
    let profile = Profile::from_create(CreateProfile {
        id: identity.id,
        email: identity.email.clone(),
        full_name: Some(metadata.full_name.clone().unwrap_or_default()),
        avatar_url: None,
    });
    profile.validate()?;

    let profile = Profile::insert(&mut *conn, &profile).await?;

    let role = RoleAssignment::create(
        &mut *conn,
        CreateRoleAssignment {
            identity_id: identity.id,
            role: Role::from_metadata(metadata.role.as_deref()),
        },
    )
    .await?;

    tracing::info!(
        identity = %identity.id,
        role = %role.role,
        "Provisioned profile and role"
    );

    Ok(Provisioned { profile, role })
}
