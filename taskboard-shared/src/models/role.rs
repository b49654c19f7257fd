/// Role assignment model and database operations
///
/// Each identity holds a static role, `manager` or `user`, assigned at sign-up.
/// There is no update path for role rows; the table only grows through
/// provisioning and explicit self-inserts, and shrinks through the identity
/// cascade.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE role_assignments (
///     id          BLOB PRIMARY KEY NOT NULL,
///     identity_id BLOB NOT NULL REFERENCES identities (id) ON DELETE CASCADE,
///     role        TEXT NOT NULL CHECK (role IN ('manager', 'user')),
///     created_at  TEXT NOT NULL,
///     UNIQUE (identity_id, role)
/// );
/// ```
///
/// # Roles
///
/// - **manager**: creates tasks, edits and deletes the tasks they created
/// - **user**: works on tasks assigned to them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Capability tag of an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Creates, assigns and deletes tasks
    Manager,

    /// Regular team member
    User,
}

impl Role {
    /// Converts role to its stored string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::User => "user",
        }
    }

    /// Parses sign-up metadata, falling back to `User`
    ///
    /// Anything other than an exact known role name, including a missing value,
    /// yields the default role.
    pub fn from_metadata(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manager" => Ok(Role::Manager),
            "user" => Ok(Role::User),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// A role held by an identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoleAssignment {
    /// Row ID
    pub id: Uuid,

    /// Identity holding the role
    pub identity_id: Uuid,

    /// The role
    pub role: Role,

    /// When the role was assigned
    pub created_at: DateTime<Utc>,
}

/// Input for assigning a role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoleAssignment {
    /// Identity receiving the role
    pub identity_id: Uuid,

    /// Role to assign (defaults to user)
    #[serde(default)]
    pub role: Role,
}

impl RoleAssignment {
    /// Inserts a role row
    ///
    /// # Errors
    ///
    /// Returns an error if the identity already holds this role (unique
    /// constraint violation), the identity doesn't exist, or the database fails
    pub async fn create(
        conn: &mut SqliteConnection,
        data: CreateRoleAssignment,
    ) -> Result<Self, sqlx::Error> {
        let assignment = sqlx::query_as::<_, RoleAssignment>(
            r#"
            INSERT INTO role_assignments (id, identity_id, role, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, identity_id, role, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.identity_id)
        .bind(data.role)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(assignment)
    }

    /// Lists the role rows of an identity, oldest first
    pub async fn list_for_identity(
        conn: &mut SqliteConnection,
        identity_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, RoleAssignment>(
            r#"
            SELECT id, identity_id, role, created_at
            FROM role_assignments
            WHERE identity_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(identity_id)
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }
}
