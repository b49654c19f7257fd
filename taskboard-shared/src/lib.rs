//! # TaskBoard Shared Library
//!
//! The policy-enforced task store behind the TaskBoard API.
//!
//! ## Module Organization
//!
//! - `store`: Entry point; every read and write goes through [`store::Store`]
//! - `auth`: Passwords, session tokens, and the row-level policy engine
//! - `audit`: Activity entries written alongside task mutations
//! - `provisioning`: Profile and role creation for new identities
//! - `events`: In-process change notifier
//! - `models`: Row types and raw SQL
//! - `db`: Pool and migrations
//! - `error`: The store's error taxonomy

pub mod audit;
pub mod auth;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod provisioning;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::Store;

/// Current version of the TaskBoard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
