// Shared infrastructure for API integration tests.
// Each context owns a private in-memory database, no external services.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use taskboard_api::app::{build_router, AppState};
use taskboard_api::config::Config;
use taskboard_shared::auth::jwt::issue_token_pair;
use taskboard_shared::db::migrations::run_migrations;
use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
use taskboard_shared::provisioning::SignupMetadata;
use taskboard_shared::store::NewIdentity;
use taskboard_shared::Store;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// A signed-in test identity
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub token: String,
}

/// Test context containing the router and the store behind it
pub struct TestContext {
    pub store: Store,
    pub app: Router,
    pub config: Config,
}

impl TestContext {
    /// Creates a context over a fresh, migrated in-memory database
    pub async fn new() -> Self {
        let vars: HashMap<String, String> =
            [("JWT_SECRET".to_string(), JWT_SECRET.to_string())].into_iter().collect();
        let config = Config::from_vars(&vars).expect("Invalid test config");

        let pool = create_pool(DatabaseConfig::in_memory())
            .await
            .expect("Failed to create in-memory pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let store = Store::new(pool);
        let app = build_router(AppState::new(store.clone(), config.clone()));

        Self { store, app, config }
    }

    /// Registers an identity directly through the store and issues a token
    ///
    /// Skips password hashing, use the signup endpoint to test that path.
    pub async fn user_with_role(&self, email: &str, role: Option<&str>) -> TestUser {
        let registration = self
            .store
            .register_identity(NewIdentity {
                email: email.to_string(),
                password_hash: "not-a-real-hash".to_string(),
                metadata: SignupMetadata {
                    full_name: Some("Test User".to_string()),
                    role: role.map(str::to_string),
                },
            })
            .await
            .expect("Registration failed");

        let tokens = issue_token_pair(registration.identity.id, JWT_SECRET).expect("Token creation failed");

        TestUser {
            id: registration.identity.id,
            token: tokens.access_token,
        }
    }

    pub async fn manager(&self, email: &str) -> TestUser {
        self.user_with_role(email, Some("manager")).await
    }

    pub async fn user(&self, email: &str) -> TestUser {
        self.user_with_role(email, None).await
    }

    /// Sends a request and returns the status and JSON body (`Null` if empty)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("Non-JSON body ({}): {}", status, String::from_utf8_lossy(&bytes))
            })
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(&user.token), None).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(&user.token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(&user.token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(&user.token), None).await
    }
}
