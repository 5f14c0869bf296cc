use uuid::Uuid;

use crate::auth::SessionToken;
use crate::error::ActionError;
use crate::handlers::AppState;
use crate::models::Notification;

/// The caller's inbox, newest first.
pub async fn list_notifications(
    state: &AppState,
    session: &SessionToken,
) -> Result<Vec<Notification>, ActionError> {
    let identity = state.authenticate(session).await?;
    Ok(state.store.notifications_for(identity.user_id).await?)
}

/// Marks one of the caller's notifications read. Idempotent; a read
/// notification never becomes unread again.
pub async fn mark_as_read(
    state: &AppState,
    session: &SessionToken,
    notification_id: Uuid,
) -> Result<Notification, ActionError> {
    let identity = state.authenticate(session).await?;

    let notification = match state.store.notification(notification_id).await? {
        Some(notification) => notification,
        None => return Err(ActionError::NotFound),
    };
    if notification.target_id != identity.user_id {
        return Err(ActionError::Unauthorized);
    }

    match state.store.mark_notification_read(notification_id).await? {
        Some(notification) => Ok(notification),
        None => Err(ActionError::NotFound),
    }
}
