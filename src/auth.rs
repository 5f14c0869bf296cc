use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ActionError;
use crate::models::{Chat, Role};
use crate::store::EntityStore;

/// Opaque session handle minted by the external identity context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

/// Who a session belongs to. Carries no role: permissions always come from
/// the caller's profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
}

/// Resolves session tokens to identities. The production implementation
/// lives with the embedding server; tests and demos use
/// [`FixedIdentityProvider`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `NotAuthenticated` for unknown or expired tokens.
    async fn resolve(&self, token: &SessionToken) -> Result<Identity, ActionError>;
}

/// In-process token map.
#[derive(Debug, Default)]
pub struct FixedIdentityProvider {
    sessions: DashMap<String, Uuid>,
}

impl FixedIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh token for the user.
    pub fn issue(&self, user_id: Uuid) -> SessionToken {
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), user_id);
        SessionToken(token)
    }

    pub fn revoke(&self, token: &SessionToken) {
        self.sessions.remove(&token.0);
    }
}

#[async_trait]
impl IdentityProvider for FixedIdentityProvider {
    async fn resolve(&self, token: &SessionToken) -> Result<Identity, ActionError> {
        match self.sessions.get(&token.0) {
            Some(entry) => Ok(Identity { user_id: *entry }),
            None => Err(ActionError::NotAuthenticated),
        }
    }
}

// --- Consolidated authorization policy ---
//
// Every gated handler goes through exactly one of these helpers. Admin
// status is read from the profile row each time, so demoting an account
// takes effect on its next call.

pub async fn require_admin(
    store: &dyn EntityStore,
    identity: &Identity,
) -> Result<(), ActionError> {
    let profile = store.profile(identity.user_id).await?;
    match profile {
        Some(profile) if profile.role == Role::Admin => Ok(()),
        _ => Err(ActionError::Unauthorized),
    }
}

pub async fn require_owner_or_admin(
    store: &dyn EntityStore,
    identity: &Identity,
    owner_id: Uuid,
) -> Result<(), ActionError> {
    if identity.user_id == owner_id {
        return Ok(());
    }
    require_admin(store, identity).await
}

pub fn require_participant(chat: &Chat, identity: &Identity) -> Result<(), ActionError> {
    if chat.involves(identity.user_id) {
        Ok(())
    } else {
        Err(ActionError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewProfile;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn resolve_round_trip_and_revocation() {
        let provider = FixedIdentityProvider::new();
        let user_id = Uuid::new_v4();

        let token = provider.issue(user_id);
        let identity = provider.resolve(&token).await.unwrap();
        assert_eq!(identity.user_id, user_id);

        provider.revoke(&token);
        let denied = provider.resolve(&token).await;
        assert_eq!(denied, Err(ActionError::NotAuthenticated));
    }

    #[tokio::test]
    async fn unknown_token_is_not_authenticated() {
        let provider = FixedIdentityProvider::new();
        let result = provider
            .resolve(&SessionToken("no-such-token".to_string()))
            .await;
        assert_eq!(result, Err(ActionError::NotAuthenticated));
    }

    #[tokio::test]
    async fn admin_gate_reads_the_profile_role() {
        let store = MemoryStore::new();
        let admin = store
            .create_profile(NewProfile {
                id: Uuid::new_v4(),
                full_name: "Admin".to_string(),
                avatar_url: None,
                role: Role::Admin,
            })
            .await
            .unwrap();
        let user = store
            .create_profile(NewProfile {
                id: Uuid::new_v4(),
                full_name: "User".to_string(),
                avatar_url: None,
                role: Role::User,
            })
            .await
            .unwrap();

        assert!(require_admin(&store, &Identity { user_id: admin.id })
            .await
            .is_ok());
        assert_eq!(
            require_admin(&store, &Identity { user_id: user.id }).await,
            Err(ActionError::Unauthorized)
        );
        // No profile row at all behaves like a missing role.
        assert_eq!(
            require_admin(
                &store,
                &Identity {
                    user_id: Uuid::new_v4()
                }
            )
            .await,
            Err(ActionError::Unauthorized)
        );
    }
}
