// Shared helpers for store integration tests.
// Every test gets its own in-memory database with migrations applied.

#![allow(dead_code)]

use taskboard_shared::db::migrations::run_migrations;
use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
use taskboard_shared::models::task::{CreateTask, Task};
use taskboard_shared::provisioning::SignupMetadata;
use taskboard_shared::store::{NewIdentity, Registration};
use taskboard_shared::Store;
use uuid::Uuid;

/// Creates a store over a fresh, migrated in-memory database
pub async fn test_store() -> Store {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create in-memory pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Store::new(pool)
}

/// Registers an identity with the given role metadata
pub async fn register(store: &Store, email: &str, role: Option<&str>) -> Registration {
    store
        .register_identity(NewIdentity {
            email: email.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$test$test".to_string(),
            metadata: SignupMetadata {
                full_name: Some(email.split('@').next().unwrap_or_default().to_string()),
                role: role.map(str::to_string),
            },
        })
        .await
        .expect("Registration failed")
}

/// Registers a manager and returns its identity ID
pub async fn manager(store: &Store, email: &str) -> Uuid {
    register(store, email, Some("manager")).await.identity.id
}

/// Registers a regular user and returns its identity ID
pub async fn user(store: &Store, email: &str) -> Uuid {
    register(store, email, None).await.identity.id
}

/// Creates a task as `creator`, assigned to `assignee`
pub async fn create_task(store: &Store, creator: Uuid, assignee: Option<Uuid>, title: &str) -> Task {
    store
        .create_task(
            creator,
            CreateTask {
                title: title.to_string(),
                created_by: creator,
                assigned_to: assignee,
                ..CreateTask::default()
            },
        )
        .await
        .expect("Task creation failed")
}

/// Counts rows in a table
pub async fn count(store: &Store, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(store.pool())
        .await
        .expect("Count query failed")
}
