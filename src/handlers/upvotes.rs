use tracing::info;
use uuid::Uuid;

use crate::auth::SessionToken;
use crate::error::ActionError;
use crate::handlers::AppState;
use crate::models::UpvoteToggle;

/// Adds the caller's vote if absent, removes it if present. The store does
/// the flip and the counter move in one atomic step, so hammering this
/// endpoint can never drift the count away from the vote rows.
pub async fn toggle_upvote(
    state: &AppState,
    session: &SessionToken,
    request_id: Uuid,
) -> Result<UpvoteToggle, ActionError> {
    let identity = state.authenticate(session).await?;

    match state
        .store
        .toggle_upvote(request_id, identity.user_id)
        .await?
    {
        Some(toggle) => {
            info!(
                request_id = %request_id,
                user_id = %identity.user_id,
                state = ?toggle.state,
                upvotes = toggle.upvotes,
                "toggled upvote"
            );
            Ok(toggle)
        }
        None => Err(ActionError::NotFound),
    }
}
