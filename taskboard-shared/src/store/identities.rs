use serde::Serialize;
use uuid::Uuid;
use validator::ValidateEmail;

use super::Store;
use crate::auth::password::{verify_against_dummy, verify_password_blocking};
use crate::error::{StoreError, StoreResult};
use crate::events::notifier::ChangeKind;
use crate::models::identity::{CreateIdentity, Identity};
use crate::models::profile::Profile;
use crate::models::role::RoleAssignment;
use crate::models::task::{Task, TaskFilter};
use crate::models::EntityKind;
use crate::provisioning::{self, SignupMetadata};

/// Registration input; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: String,
    pub metadata: SignupMetadata,
}

/// Everything registration created
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub identity: Identity,
    pub profile: Profile,
    pub role: RoleAssignment,
}

impl Store {
    /// Registers an identity and provisions its profile and role
    ///
    /// The three inserts share one transaction.
    ///
    /// # Errors
    ///
    /// - `ConstraintViolation` on `email` for a malformed or taken address
    /// - `TransactionFailure` if the database fails; nothing is created
    pub async fn register_identity(&self, data: NewIdentity) -> StoreResult<Registration> {
        let email = data.email.trim().to_string();
        if !email.validate_email() {
            return Err(StoreError::constraint("email", "Invalid email format"));
        }

        let mut tx = self.begin().await?;

        if Identity::find_by_email(&mut tx, &email).await?.is_some() {
            return Err(StoreError::constraint("email", "Email already registered"));
        }

        let identity = Identity::create(
            &mut tx,
            CreateIdentity {
                email,
                password_hash: data.password_hash,
            },
        )
        .await?;
        let provisioned = provisioning::provision(&mut tx, &identity, &data.metadata).await?;

        tx.commit().await?;

        tracing::info!(identity = %identity.id, "Identity registered");
        self.publish(EntityKind::Profile, ChangeKind::Insert, &provisioned.profile);
        self.publish(EntityKind::RoleAssignment, ChangeKind::Insert, &provisioned.role);

        Ok(Registration {
            identity,
            profile: provisioned.profile,
            role: provisioned.role,
        })
    }

    /// Looks up an identity for sign-in
    pub async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Identity::find_by_email(&mut conn, email.trim()).await?)
    }

    /// Looks up an identity by ID
    pub async fn find_identity(&self, id: Uuid) -> StoreResult<Option<Identity>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Identity::find_by_id(&mut conn, id).await?)
    }

    /// Checks credentials and stamps the sign-in
    ///
    /// An unknown email and a wrong password both give `None`, after the
    /// same Argon2 work. A stored hash that cannot be parsed counts as a
    /// wrong password.
    pub async fn sign_in(&self, email: &str, password: &str) -> StoreResult<Option<Identity>> {
        let Some(identity) = self.find_identity_by_email(email).await? else {
            if let Err(e) = verify_against_dummy(password.to_string()).await {
                tracing::error!(error = %e, "Dummy password check failed");
            }
            tracing::debug!("Sign-in for unknown email");
            return Ok(None);
        };

        let verified =
            verify_password_blocking(password.to_string(), identity.password_hash.clone()).await;
        match verified {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(identity = %identity.id, "Sign-in with wrong password");
                return Ok(None);
            }
            Err(e) => {
                tracing::error!(identity = %identity.id, error = %e, "Stored password hash is unusable");
                return Ok(None);
            }
        }

        self.record_sign_in(identity.id).await?;
        tracing::info!(identity = %identity.id, "Signed in");

        self.find_identity(identity.id).await
    }

    /// Stamps a successful sign-in
    pub async fn record_sign_in(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        Identity::touch_last_sign_in(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes the actor's own identity and everything that hangs off it
    ///
    /// Tasks it created go with it; tasks assigned to it are unassigned and
    /// published as updates.
    ///
    /// # Errors
    ///
    /// `NotFound` if the identity doesn't exist
    pub async fn delete_identity(&self, actor_id: Uuid) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        let (created, assigned): (Vec<Task>, Vec<Task>) =
            Task::list_for_participant(&mut tx, actor_id, &TaskFilter::default())
                .await?
                .into_iter()
                .partition(|t| t.created_by == actor_id);

        if !Identity::delete(&mut tx, actor_id).await? {
            return Err(StoreError::NotFound("Identity"));
        }

        let mut unassigned = Vec::with_capacity(assigned.len());
        for task in &assigned {
            if let Some(task) = Task::find_by_id(&mut tx, task.id).await? {
                unassigned.push(task);
            }
        }

        tx.commit().await?;

        tracing::info!(
            identity = %actor_id,
            deleted_tasks = created.len(),
            unassigned_tasks = unassigned.len(),
            "Identity deleted"
        );
        for task in &created {
            self.publish(EntityKind::Task, ChangeKind::Delete, task);
        }
        for task in &unassigned {
            self.publish(EntityKind::Task, ChangeKind::Update, task);
        }

        Ok(())
    }
}
