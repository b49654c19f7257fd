/// Identity model and database operations
///
/// An identity is a sign-in account: an email and an Argon2id password hash.
/// It is the anchor every other row hangs off. The task store never mutates
/// identities itself; they are created by sign-up and removed by account
/// deletion, and the schema cascades the rest.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE identities (
///     id              BLOB PRIMARY KEY NOT NULL,
///     email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
///     password_hash   TEXT NOT NULL,
///     created_at      TEXT NOT NULL,
///     last_sign_in_at TEXT
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::models::identity::{Identity, CreateIdentity};
/// use sqlx::SqlitePool;
///
/// # async fn example(pool: SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
/// let mut conn = pool.acquire().await?;
///
/// let identity = Identity::create(&mut conn, CreateIdentity {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
///
/// let found = Identity::find_by_email(&mut conn, "USER@example.com").await?;
/// assert_eq!(found.map(|i| i.id), Some(identity.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Identity model representing a sign-in account
///
/// Passwords are stored as Argon2id hashes, never in plaintext. The hash is
/// never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    /// Unique identity ID (UUID v4)
    pub id: Uuid,

    /// Email address, unique case-insensitively
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// When the identity was registered
    pub created_at: DateTime<Utc>,

    /// When the identity last signed in (None if never)
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

/// Input for creating a new identity
#[derive(Debug, Clone)]
pub struct CreateIdentity {
    /// Email address
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,
}

impl Identity {
    /// Creates a new identity
    ///
    /// # Errors
    ///
    /// Returns an error if the email already exists (unique constraint
    /// violation) or the database fails
    pub async fn create(
        conn: &mut SqliteConnection,
        data: CreateIdentity,
    ) -> Result<Self, sqlx::Error> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO identities (id, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, email, password_hash, created_at, last_sign_in_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.email)
        .bind(data.password_hash)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(identity)
    }

    /// Finds an identity by ID
    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, email, password_hash, created_at, last_sign_in_at
            FROM identities
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(identity)
    }

    /// Finds an identity by email address
    ///
    /// Lookup is case-insensitive (the column collates NOCASE).
    pub async fn find_by_email(
        conn: &mut SqliteConnection,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, email, password_hash, created_at, last_sign_in_at
            FROM identities
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(conn)
        .await?;

        Ok(identity)
    }

    /// Stamps the last sign-in time
    pub async fn touch_last_sign_in(
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE identities SET last_sign_in_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Deletes an identity
    ///
    /// ⚠️  Cascades through the schema: the profile and role rows go, tasks
    /// created by this identity go (with their activity), tasks assigned to it
    /// are unassigned and its activity rows lose their author.
    ///
    /// # Returns
    ///
    /// True if the identity was deleted, false if it didn't exist
    pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM identities WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
