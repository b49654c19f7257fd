/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Sign-up, login, token refresh and account removal
/// - `profiles`: Profile reads and owner updates
/// - `roles`: The caller's role and role assignment
/// - `tasks`: Task CRUD, status changes and stats
/// - `activity`: Task activity history
/// - `events`: Server-Sent Events feed of task changes
///
/// Every authenticated handler passes the caller's identity to the store,
/// which enforces the access policy.

pub mod activity;
pub mod auth;
pub mod events;
pub mod health;
pub mod profiles;
pub mod roles;
pub mod tasks;
