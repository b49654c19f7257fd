use uuid::Uuid;
use validator::Validate;

use super::Store;
use crate::auth::authorization::{authorize, is_allowed, Actor, Operation, Target};
use crate::error::{StoreError, StoreResult};
use crate::events::notifier::ChangeKind;
use crate::models::identity::Identity;
use crate::models::profile::{CreateProfile, Profile, UpdateProfile};
use crate::models::EntityKind;

impl Store {
    /// Reads one profile
    pub async fn get_profile(&self, actor_id: Uuid, id: Uuid) -> StoreResult<Profile> {
        let mut conn = self.pool.acquire().await?;
        let actor = Actor::resolve(&mut conn, actor_id).await?;

        match Profile::find_by_id(&mut conn, id).await? {
            Some(profile) if is_allowed(&actor, Operation::Read, &Target::Profile { id }) => Ok(profile),
            _ => Err(StoreError::NotFound("Profile")),
        }
    }

    /// Lists profiles ordered by email
    pub async fn list_profiles(&self, actor_id: Uuid) -> StoreResult<Vec<Profile>> {
        let mut conn = self.pool.acquire().await?;
        let actor = Actor::resolve(&mut conn, actor_id).await?;

        let profiles = Profile::list_all(&mut conn)
            .await?
            .into_iter()
            .filter(|p| is_allowed(&actor, Operation::Read, &Target::Profile { id: p.id }))
            .collect();

        Ok(profiles)
    }

    /// Creates the actor's own profile when provisioning didn't
    ///
    /// The email is always taken from the identity; the one in `data` is
    /// ignored.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if `data.id` is not the actor
    /// - `NotFound` if the identity no longer exists
    /// - `ConstraintViolation` if the profile exists or a field is invalid
    pub async fn create_profile(&self, actor_id: Uuid, data: CreateProfile) -> StoreResult<Profile> {
        let mut tx = self.begin().await?;
        let actor = Actor::resolve(&mut tx, actor_id).await?;

        authorize(&actor, Operation::Insert, &Target::Profile { id: data.id })?;

        let identity = Identity::find_by_id(&mut tx, data.id)
            .await?
            .ok_or(StoreError::NotFound("Identity"))?;

        let profile = Profile::from_create(CreateProfile {
            email: identity.email,
            ..data
        });
        profile.validate()?;

        let profile = Profile::insert(&mut tx, &profile).await?;
        tx.commit().await?;

        tracing::info!(actor = %actor.id, "Profile created");
        self.publish(EntityKind::Profile, ChangeKind::Insert, &profile);

        Ok(profile)
    }

    /// Updates the actor's own display name or avatar
    ///
    /// # Errors
    ///
    /// - `NotFound` if the profile doesn't exist
    /// - `Unauthorized` if it belongs to someone else
    /// - `ConstraintViolation` for a name over 100 characters or a bad URL
    pub async fn update_profile(
        &self,
        actor_id: Uuid,
        id: Uuid,
        patch: UpdateProfile,
    ) -> StoreResult<Profile> {
        let mut tx = self.begin().await?;
        let actor = Actor::resolve(&mut tx, actor_id).await?;

        let current = Profile::find_by_id(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound("Profile"))?;
        authorize(&actor, Operation::Update, &Target::Profile { id })?;

        let next = patch.apply(&current);
        next.validate()?;

        let profile = Profile::save(&mut tx, &next).await?;
        tx.commit().await?;

        tracing::info!(actor = %actor.id, "Profile updated");
        self.publish(EntityKind::Profile, ChangeKind::Update, &profile);

        Ok(profile)
    }
}
