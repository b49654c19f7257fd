/// Row-level authorization: the policy engine and role resolver
///
/// Every read and write the store performs is first put to [`authorize`] with
/// the acting identity, the operation and the target row. The decision comes
/// from a single table mapping (entity, operation) to a predicate. Pairs that
/// are not in the table are denied.
///
/// # Policy Table
///
/// | Entity         | Operation     | Allowed when                                            |
/// |----------------|---------------|---------------------------------------------------------|
/// | Profile        | read          | always                                                  |
/// | Profile        | insert/update | actor owns the profile                                  |
/// | RoleAssignment | read/insert   | actor owns the row                                      |
/// | Task           | read          | actor created it or is assigned to it                   |
/// | Task           | insert/delete | actor is a manager and created it                       |
/// | Task           | update        | actor is a manager and created it, or is assigned to it |
/// | ActivityLog    | read          | actor may read the referenced task                      |
/// | ActivityLog    | insert        | actor is the entry's author                             |
///
/// Roles come from the store through [`role_of`], never from a token or a
/// request payload.
///
/// # Example
///
/// ```
/// use taskboard_shared::auth::authorization::{authorize, Actor, Operation, Target};
/// use taskboard_shared::models::role::Role;
/// use taskboard_shared::models::task::{CreateTask, Task};
/// use uuid::Uuid;
///
/// let manager = Actor::new(Uuid::new_v4(), Some(Role::Manager));
/// let task = Task::from_create(CreateTask {
///     title: "Plan sprint".to_string(),
///     created_by: manager.id,
///     ..CreateTask::default()
/// });
///
/// assert!(authorize(&manager, Operation::Insert, &Target::Task(&task)).is_ok());
///
/// let stranger = Actor::new(Uuid::new_v4(), Some(Role::User));
/// assert!(authorize(&stranger, Operation::Read, &Target::Task(&task)).is_err());
/// ```

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::fmt;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::role::{Role, RoleAssignment};
use crate::models::task::Task;
use crate::models::EntityKind;

/// Kind of access being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Read => "read",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// The identity performing an operation, with its resolved role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Acting identity
    pub id: Uuid,

    /// Role from the role resolver (None if unassigned)
    pub role: Option<Role>,
}

impl Actor {
    /// Creates an actor with an already resolved role
    pub fn new(id: Uuid, role: Option<Role>) -> Self {
        Self { id, role }
    }

    /// Resolves the actor's role from the store
    pub async fn resolve(conn: &mut SqliteConnection, id: Uuid) -> StoreResult<Self> {
        let role = role_of(conn, id).await?;
        Ok(Self { id, role })
    }

    /// Whether the resolved role is manager
    pub fn is_manager(&self) -> bool {
        self.role == Some(Role::Manager)
    }
}

/// The row an operation is aimed at
///
/// Only the columns the predicates look at are carried.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// A profile, by identity ID
    Profile { id: Uuid },

    /// A role row, by owning identity
    RoleAssignment { identity_id: Uuid },

    /// A task row
    Task(&'a Task),

    /// An activity entry with the current state of the task it references
    ActivityLog { user_id: Option<Uuid>, task: &'a Task },
}

impl Target<'_> {
    /// Entity type of the target
    pub fn entity(&self) -> EntityKind {
        match self {
            Target::Profile { .. } => EntityKind::Profile,
            Target::RoleAssignment { .. } => EntityKind::RoleAssignment,
            Target::Task(_) => EntityKind::Task,
            Target::ActivityLog { .. } => EntityKind::ActivityLog,
        }
    }
}

type Predicate = fn(&Actor, &Target<'_>) -> bool;

struct Policy {
    entity: EntityKind,
    operation: Operation,
    predicate: Predicate,
}

static POLICIES: &[Policy] = &[
    Policy { entity: EntityKind::Profile, operation: Operation::Read, predicate: always },
    Policy { entity: EntityKind::Profile, operation: Operation::Insert, predicate: owns_profile },
    Policy { entity: EntityKind::Profile, operation: Operation::Update, predicate: owns_profile },
    Policy { entity: EntityKind::RoleAssignment, operation: Operation::Read, predicate: owns_role },
    Policy { entity: EntityKind::RoleAssignment, operation: Operation::Insert, predicate: owns_role },
    Policy { entity: EntityKind::Task, operation: Operation::Read, predicate: participates_in_task },
    Policy { entity: EntityKind::Task, operation: Operation::Insert, predicate: manages_task },
    Policy { entity: EntityKind::Task, operation: Operation::Update, predicate: may_edit_task },
    Policy { entity: EntityKind::Task, operation: Operation::Delete, predicate: manages_task },
    Policy { entity: EntityKind::ActivityLog, operation: Operation::Read, predicate: sees_logged_task },
    Policy { entity: EntityKind::ActivityLog, operation: Operation::Insert, predicate: authored_entry },
];

fn always(_: &Actor, _: &Target<'_>) -> bool {
    true
}

fn owns_profile(actor: &Actor, target: &Target<'_>) -> bool {
    matches!(target, Target::Profile { id } if *id == actor.id)
}

fn owns_role(actor: &Actor, target: &Target<'_>) -> bool {
    matches!(target, Target::RoleAssignment { identity_id } if *identity_id == actor.id)
}

fn is_participant(actor: &Actor, task: &Task) -> bool {
    task.assigned_to == Some(actor.id) || task.created_by == actor.id
}

fn is_managing_creator(actor: &Actor, task: &Task) -> bool {
    actor.is_manager() && task.created_by == actor.id
}

fn participates_in_task(actor: &Actor, target: &Target<'_>) -> bool {
    matches!(target, Target::Task(task) if is_participant(actor, task))
}

fn manages_task(actor: &Actor, target: &Target<'_>) -> bool {
    matches!(target, Target::Task(task) if is_managing_creator(actor, task))
}

// No column restriction for assignees: they may change any field.
fn may_edit_task(actor: &Actor, target: &Target<'_>) -> bool {
    matches!(target, Target::Task(task)
        if is_managing_creator(actor, task) || task.assigned_to == Some(actor.id))
}

fn sees_logged_task(actor: &Actor, target: &Target<'_>) -> bool {
    matches!(target, Target::ActivityLog { task, .. } if is_participant(actor, task))
}

fn authored_entry(actor: &Actor, target: &Target<'_>) -> bool {
    matches!(target, Target::ActivityLog { user_id, .. } if *user_id == Some(actor.id))
}

/// Evaluates the policy for an operation without logging
pub fn is_allowed(actor: &Actor, operation: Operation, target: &Target<'_>) -> bool {
    let entity = target.entity();
    POLICIES
        .iter()
        .filter(|p| p.entity == entity && p.operation == operation)
        .any(|p| (p.predicate)(actor, target))
}

/// Checks that `actor` may perform `operation` on `target`
///
/// # Errors
///
/// Returns [`StoreError::Unauthorized`] if no policy allows it
pub fn authorize(actor: &Actor, operation: Operation, target: &Target<'_>) -> StoreResult<()> {
    if is_allowed(actor, operation, target) {
        return Ok(());
    }

    tracing::warn!(
        actor = %actor.id,
        role = ?actor.role,
        entity = %target.entity(),
        operation = %operation,
        "Policy denied operation"
    );
    Err(StoreError::Unauthorized)
}

/// Checks a task update against the row before and after the change
///
/// The update predicate has to hold for both, so an assignee cannot pass the
/// task to someone else and keep the write.
pub fn authorize_task_update(actor: &Actor, current: &Task, next: &Task) -> StoreResult<()> {
    authorize(actor, Operation::Update, &Target::Task(current))?;
    authorize(actor, Operation::Update, &Target::Task(next))
}

/// Role resolver: the role held by an identity, if any
///
/// Should an identity ever hold both roles, manager wins, matching a
/// "has the manager role" check.
pub async fn role_of(conn: &mut SqliteConnection, identity_id: Uuid) -> StoreResult<Option<Role>> {
    let rows = RoleAssignment::list_for_identity(conn, identity_id).await?;

    if rows.iter().any(|r| r.role == Role::Manager) {
        return Ok(Some(Role::Manager));
    }

    Ok(rows.first().map(|r| r.role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::CreateTask;

    fn task_by(creator: Uuid, assignee: Option<Uuid>) -> Task {
        Task::from_create(CreateTask {
            title: "Draft roadmap".to_string(),
            created_by: creator,
            assigned_to: assignee,
            ..Default::default()
        })
    }

    fn manager() -> Actor {
        Actor::new(Uuid::new_v4(), Some(Role::Manager))
    }

    fn user() -> Actor {
        Actor::new(Uuid::new_v4(), Some(Role::User))
    }

    #[test]
    fn test_profile_rules() {
        let me = user();
        let other = Uuid::new_v4();

        assert!(is_allowed(&me, Operation::Read, &Target::Profile { id: other }));
        assert!(is_allowed(&me, Operation::Update, &Target::Profile { id: me.id }));
        assert!(is_allowed(&me, Operation::Insert, &Target::Profile { id: me.id }));
        assert!(!is_allowed(&me, Operation::Update, &Target::Profile { id: other }));
        assert!(!is_allowed(&me, Operation::Insert, &Target::Profile { id: other }));
        assert!(!is_allowed(&me, Operation::Delete, &Target::Profile { id: me.id }));
    }

    #[test]
    fn test_role_rows_are_private_and_immutable() {
        let me = user();
        let mine = Target::RoleAssignment { identity_id: me.id };
        let theirs = Target::RoleAssignment { identity_id: Uuid::new_v4() };

        assert!(is_allowed(&me, Operation::Read, &mine));
        assert!(is_allowed(&me, Operation::Insert, &mine));
        assert!(!is_allowed(&me, Operation::Read, &theirs));
        assert!(!is_allowed(&me, Operation::Insert, &theirs));
        assert!(!is_allowed(&me, Operation::Update, &mine));
        assert!(!is_allowed(&me, Operation::Delete, &mine));
    }

    #[test]
    fn test_task_read_requires_participation() {
        let creator = manager();
        let assignee = user();
        let outsider = manager();
        let task = task_by(creator.id, Some(assignee.id));

        assert!(is_allowed(&creator, Operation::Read, &Target::Task(&task)));
        assert!(is_allowed(&assignee, Operation::Read, &Target::Task(&task)));
        assert!(!is_allowed(&outsider, Operation::Read, &Target::Task(&task)));
    }

    #[test]
    fn test_task_insert_requires_manager_creator() {
        let m = manager();
        let u = user();

        assert!(is_allowed(&m, Operation::Insert, &Target::Task(&task_by(m.id, None))));
        assert!(!is_allowed(&u, Operation::Insert, &Target::Task(&task_by(u.id, None))));
        // creating on someone else's behalf
        assert!(!is_allowed(&m, Operation::Insert, &Target::Task(&task_by(Uuid::new_v4(), None))));
        // no role at all
        let nobody = Actor::new(Uuid::new_v4(), None);
        assert!(!is_allowed(&nobody, Operation::Insert, &Target::Task(&task_by(nobody.id, None))));
    }

    #[test]
    fn test_task_update_and_delete() {
        let creator = manager();
        let assignee = user();
        let other_manager = manager();
        let task = task_by(creator.id, Some(assignee.id));

        assert!(is_allowed(&creator, Operation::Update, &Target::Task(&task)));
        assert!(is_allowed(&assignee, Operation::Update, &Target::Task(&task)));
        assert!(!is_allowed(&other_manager, Operation::Update, &Target::Task(&task)));

        assert!(is_allowed(&creator, Operation::Delete, &Target::Task(&task)));
        assert!(!is_allowed(&assignee, Operation::Delete, &Target::Task(&task)));
        assert!(!is_allowed(&other_manager, Operation::Delete, &Target::Task(&task)));
    }

    #[test]
    fn test_demoted_creator_loses_write_access() {
        let creator_id = Uuid::new_v4();
        let task = task_by(creator_id, None);
        let as_user = Actor::new(creator_id, Some(Role::User));

        assert!(is_allowed(&as_user, Operation::Read, &Target::Task(&task)));
        assert!(!is_allowed(&as_user, Operation::Update, &Target::Task(&task)));
        assert!(!is_allowed(&as_user, Operation::Delete, &Target::Task(&task)));
    }

    #[test]
    fn test_assignee_cannot_hand_task_away() {
        let creator = manager();
        let assignee = user();
        let current = task_by(creator.id, Some(assignee.id));

        let mut finished = current.clone();
        finished.status = crate::models::task::TaskStatus::Completed;
        assert!(authorize_task_update(&assignee, &current, &finished).is_ok());

        let mut handed_off = current.clone();
        handed_off.assigned_to = Some(Uuid::new_v4());
        assert!(matches!(
            authorize_task_update(&assignee, &current, &handed_off),
            Err(StoreError::Unauthorized)
        ));

        // the managing creator can reassign freely
        assert!(authorize_task_update(&creator, &current, &handed_off).is_ok());
    }

    #[test]
    fn test_activity_rules_follow_task() {
        let creator = manager();
        let assignee = user();
        let outsider = user();
        let task = task_by(creator.id, Some(assignee.id));

        let entry = Target::ActivityLog { user_id: Some(assignee.id), task: &task };
        assert!(is_allowed(&creator, Operation::Read, &entry));
        assert!(is_allowed(&assignee, Operation::Read, &entry));
        assert!(!is_allowed(&outsider, Operation::Read, &entry));

        assert!(is_allowed(&assignee, Operation::Insert, &entry));
        assert!(!is_allowed(&creator, Operation::Insert, &entry));
        assert!(!is_allowed(&creator, Operation::Update, &entry));
        assert!(!is_allowed(&creator, Operation::Delete, &entry));

        let anonymous = Target::ActivityLog { user_id: None, task: &task };
        assert!(!is_allowed(&assignee, Operation::Insert, &anonymous));
    }

    #[test]
    fn test_authorize_returns_unauthorized() {
        let u = user();
        let err = authorize(&u, Operation::Delete, &Target::Profile { id: u.id }).unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));
    }
}
