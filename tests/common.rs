// tests/common.rs
//! Shared setup for integration tests. Everything runs against the in-memory
//! store and a fixed identity provider, so tests are hermetic and parallel.

use std::sync::Arc;

use uuid::Uuid;

use marketplace_core::auth::{FixedIdentityProvider, SessionToken};
use marketplace_core::config::Config;
use marketplace_core::handlers::AppState;
use marketplace_core::models::{NewPost, NewProfile, NewRequest, Profile, Role};
use marketplace_core::store::{EntityStore, MemoryStore};

pub struct TestSetup {
    pub store: Arc<MemoryStore>,
    pub identity: Arc<FixedIdentityProvider>,
    pub state: AppState,
}

impl TestSetup {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(FixedIdentityProvider::new());
        let config = Arc::new(Config {
            database_url: "postgresql://localhost/marketplace_test".to_string(),
            db_max_connections: 5,
            db_acquire_timeout_seconds: 5,
            fanout_concurrency: 4,
            log_level: "debug".to_string(),
        });
        let state = AppState::new(store.clone(), identity.clone(), config);
        Self {
            store,
            identity,
            state,
        }
    }

    /// Creates a profile and a live session for it.
    pub async fn create_user(&self, name: &str) -> (Profile, SessionToken) {
        self.create_profile_with_role(name, Role::User).await
    }

    pub async fn create_admin(&self, name: &str) -> (Profile, SessionToken) {
        self.create_profile_with_role(name, Role::Admin).await
    }

    async fn create_profile_with_role(&self, name: &str, role: Role) -> (Profile, SessionToken) {
        let profile = self
            .store
            .create_profile(NewProfile {
                id: Uuid::new_v4(),
                full_name: name.to_string(),
                avatar_url: None,
                role,
            })
            .await
            .expect("Failed to create test profile");
        let token = self.identity.issue(profile.id);
        (profile, token)
    }

    /// A token no session was ever issued for.
    pub fn bad_token(&self) -> SessionToken {
        SessionToken("not-a-session".to_string())
    }
}

pub fn sample_post(title: &str) -> NewPost {
    NewPost {
        title: title.to_string(),
        price: 25.0,
        images: vec!["https://images.example/one.jpg".to_string()],
        category: Some("bikes".to_string()),
    }
}

pub fn sample_request(title: &str) -> NewRequest {
    NewRequest {
        title: title.to_string(),
        description: "Looking for one in good condition".to_string(),
        category: Some("bikes".to_string()),
    }
}
