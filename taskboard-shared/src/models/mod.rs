/// Database models for TaskBoard
///
/// This module contains the row types of the task store and their raw SQL
/// operations. Models do no authorization: every call that reaches them from
/// outside the crate goes through [`crate::store::Store`], which runs the
/// policy engine first.
///
/// # Models
///
/// - `identity`: Sign-in accounts (email + password hash)
/// - `profile`: Public profile, one per identity
/// - `role`: Role assignments (`manager` | `user`)
/// - `task`: Tasks, the aggregate root
/// - `activity_log`: Append-only task history
///
/// All operations take a `&mut SqliteConnection` so they can run either on a
/// pooled connection or inside a transaction.

pub mod activity_log;
pub mod identity;
pub mod profile;
pub mod role;
pub mod task;

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Entity types the store exposes to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Profile,
    RoleAssignment,
    Task,
    ActivityLog,
}

impl EntityKind {
    /// Table name backing the entity
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Profile => "profiles",
            EntityKind::RoleAssignment => "role_assignments",
            EntityKind::Task => "tasks",
            EntityKind::ActivityLog => "activity_log",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Deserializes a present field into `Some`, so `Option<Option<T>>` can tell
/// an absent field (`None`) from an explicit `null` (`Some(None)`)
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
