use uuid::Uuid;

use super::Store;
use crate::auth::authorization::{self, authorize, is_allowed, Actor, Operation, Target};
use crate::error::{StoreError, StoreResult};
use crate::events::notifier::ChangeKind;
use crate::models::role::{CreateRoleAssignment, Role, RoleAssignment};
use crate::models::EntityKind;

impl Store {
    /// Role resolver
    ///
    /// Looks up the role an identity holds. Always reads the store, never a
    /// token claim.
    pub async fn role_of(&self, identity_id: Uuid) -> StoreResult<Option<Role>> {
        let mut conn = self.pool.acquire().await?;
        authorization::role_of(&mut conn, identity_id).await
    }

    /// Reads the effective role row of an identity
    ///
    /// Only the identity itself can see its role rows. If both roles are
    /// held the manager row is returned.
    ///
    /// # Errors
    ///
    /// `NotFound` if the identity has no role or belongs to someone else
    pub async fn get_role_assignment(&self, actor_id: Uuid, identity_id: Uuid) -> StoreResult<RoleAssignment> {
        let mut conn = self.pool.acquire().await?;
        let actor = Actor::resolve(&mut conn, actor_id).await?;

        let mut visible: Vec<RoleAssignment> = RoleAssignment::list_for_identity(&mut conn, identity_id)
            .await?
            .into_iter()
            .filter(|r| {
                is_allowed(
                    &actor,
                    Operation::Read,
                    &Target::RoleAssignment { identity_id: r.identity_id },
                )
            })
            .collect();

        match visible.iter().position(|r| r.role == Role::Manager) {
            Some(i) => Ok(visible.swap_remove(i)),
            None if !visible.is_empty() => Ok(visible.swap_remove(0)),
            None => Err(StoreError::NotFound("Role assignment")),
        }
    }

    /// Inserts a role row for the actor
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if `data.identity_id` is not the actor
    /// - `ConstraintViolation` on `role` if the actor already holds it
    pub async fn assign_role(&self, actor_id: Uuid, data: CreateRoleAssignment) -> StoreResult<RoleAssignment> {
        let mut tx = self.begin().await?;
        let actor = Actor::resolve(&mut tx, actor_id).await?;

        authorize(
            &actor,
            Operation::Insert,
            &Target::RoleAssignment { identity_id: data.identity_id },
        )?;

        let assignment = RoleAssignment::create(&mut tx, data).await?;
        tx.commit().await?;

        tracing::info!(actor = %actor.id, role = %assignment.role, "Role assigned");
        self.publish(EntityKind::RoleAssignment, ChangeKind::Insert, &assignment);

        Ok(assignment)
    }
}
