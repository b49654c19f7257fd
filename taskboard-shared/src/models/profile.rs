/// Profile model and database operations
///
/// One profile per identity, keyed by the identity's ID. Profiles are created
/// by provisioning at sign-up, edited only by their owner and removed only
/// through the identity cascade.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE profiles (
///     id         BLOB PRIMARY KEY NOT NULL REFERENCES identities (id) ON DELETE CASCADE,
///     email      TEXT NOT NULL,
///     full_name  TEXT,
///     avatar_url TEXT,
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use uuid::Uuid;
use validator::Validate;

use super::double_option;

/// Public profile of an identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, Validate)]
pub struct Profile {
    /// Identity this profile belongs to
    pub id: Uuid,

    /// Email, copied from the identity
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Display name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub full_name: Option<String>,

    /// Avatar image URL
    #[validate(url(message = "Avatar must be a valid URL"))]
    pub avatar_url: Option<String>,

    /// When the profile was created
    pub created_at: DateTime<Utc>,

    /// When the profile was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfile {
    /// Identity ID (must equal the acting identity)
    pub id: Uuid,

    /// Email address
    pub email: String,

    /// Display name
    pub full_name: Option<String>,

    /// Avatar image URL
    pub avatar_url: Option<String>,
}

/// Input for updating a profile
///
/// Absent fields are left alone, `null` clears the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    /// New display name (use Some(None) to clear)
    #[serde(default, deserialize_with = "double_option")]
    pub full_name: Option<Option<String>>,

    /// New avatar URL (use Some(None) to clear)
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,
}

impl UpdateProfile {
    /// Applies the patch to a copy of `current`
    pub fn apply(&self, current: &Profile) -> Profile {
        let mut next = current.clone();
        if let Some(full_name) = &self.full_name {
            next.full_name = full_name.clone();
        }
        if let Some(avatar_url) = &self.avatar_url {
            next.avatar_url = avatar_url.clone();
        }
        next.updated_at = Utc::now();
        next
    }
}

impl Profile {
    /// Builds the row that `CreateProfile` would insert
    pub fn from_create(data: CreateProfile) -> Self {
        let now = Utc::now();
        Self {
            id: data.id,
            email: data.email,
            full_name: data.full_name,
            avatar_url: data.avatar_url,
            created_at: now,
            updated_at: now,
        }
    }

    /// Inserts a profile row
    ///
    /// # Errors
    ///
    /// Returns an error if a profile already exists for the identity, the
    /// identity doesn't exist, or the database fails
    pub async fn insert(conn: &mut SqliteConnection, profile: &Profile) -> Result<Self, sqlx::Error> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, email, full_name, avatar_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, email, full_name, avatar_url, created_at, updated_at
            "#,
        )
        .bind(profile.id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .fetch_one(conn)
        .await?;

        Ok(profile)
    }

    /// Finds a profile by identity ID
    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, email, full_name, avatar_url, created_at, updated_at
            FROM profiles
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(profile)
    }

    /// Checks whether a profile exists
    pub async fn exists(conn: &mut SqliteConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_one(conn)
            .await?;

        Ok(count > 0)
    }

    /// Lists all profiles ordered by email
    pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<Self>, sqlx::Error> {
        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, email, full_name, avatar_url, created_at, updated_at
            FROM profiles
            ORDER BY email ASC
            "#,
        )
        .fetch_all(conn)
        .await?;

        Ok(profiles)
    }

    /// Writes the editable columns of `profile` back to its row
    pub async fn save(conn: &mut SqliteConnection, profile: &Profile) -> Result<Self, sqlx::Error> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET full_name = ?, avatar_url = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, email, full_name, avatar_url, created_at, updated_at
            "#,
        )
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(profile.updated_at)
        .bind(profile.id)
        .fetch_one(conn)
        .await?;

        Ok(profile)
    }
}
