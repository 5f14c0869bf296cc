use tracing::info;
use uuid::Uuid;

use crate::auth::{self, SessionToken};
use crate::error::ActionError;
use crate::handlers::{validate_message_text, AppState};
use crate::models::{Chat, ChatOverview, ChatThread, Message};
use crate::notify;

/// Returns the chat between the caller and `other_user_id`, creating it on
/// first contact. Calling again, from either side, returns the same chat.
pub async fn start_chat(
    state: &AppState,
    session: &SessionToken,
    other_user_id: Uuid,
) -> Result<Chat, ActionError> {
    let identity = state.authenticate(session).await?;

    if other_user_id == identity.user_id {
        return Err(ActionError::ValidationFailed(
            "Cannot start a chat with yourself".to_string(),
        ));
    }
    if state.store.profile(other_user_id).await?.is_none() {
        return Err(ActionError::NotFound);
    }

    let (chat, created) = state
        .store
        .open_chat(identity.user_id, other_user_id)
        .await?;
    if created {
        info!(chat_id = %chat.id, user_id = %identity.user_id, other_user_id = %other_user_id, "opened chat");
    }
    Ok(chat)
}

/// Participant-only. Appends the message, bumps the chat's activity
/// timestamp and notifies the other side.
pub async fn send_message(
    state: &AppState,
    session: &SessionToken,
    chat_id: Uuid,
    text: String,
) -> Result<Message, ActionError> {
    let identity = state.authenticate(session).await?;

    let chat = match state.store.chat(chat_id).await? {
        Some(chat) => chat,
        None => return Err(ActionError::NotFound),
    };
    auth::require_participant(&chat, &identity)?;

    let text = validate_message_text(&text)?;
    let message = match state
        .store
        .append_message(chat_id, identity.user_id, text)
        .await?
    {
        Some(message) => message,
        None => return Err(ActionError::NotFound),
    };

    notify::notify_new_message(state.store.as_ref(), &chat, &message).await;

    Ok(message)
}

/// Sender-only hard delete. The chat's activity timestamp falls back to the
/// remaining messages.
pub async fn delete_message(
    state: &AppState,
    session: &SessionToken,
    chat_id: Uuid,
    message_id: Uuid,
) -> Result<(), ActionError> {
    let identity = state.authenticate(session).await?;

    let message = match state.store.message(message_id).await? {
        Some(message) => message,
        None => return Err(ActionError::NotFound),
    };
    if message.chat_id != chat_id {
        return Err(ActionError::NotFound);
    }
    if message.sender_id != identity.user_id {
        return Err(ActionError::Unauthorized);
    }

    if state.store.delete_message(message_id).await? {
        info!(message_id = %message_id, chat_id = %chat_id, "deleted message");
        Ok(())
    } else {
        Err(ActionError::NotFound)
    }
}

/// Participant-only: the chat plus its full ordered history.
pub async fn get_chat(
    state: &AppState,
    session: &SessionToken,
    chat_id: Uuid,
) -> Result<ChatThread, ActionError> {
    let identity = state.authenticate(session).await?;

    let chat = match state.store.chat(chat_id).await? {
        Some(chat) => chat,
        None => return Err(ActionError::NotFound),
    };
    auth::require_participant(&chat, &identity)?;

    let messages = state.store.messages(chat_id).await?;
    Ok(ChatThread { chat, messages })
}

/// The caller's conversations, most recently active first.
pub async fn get_all_chats(
    state: &AppState,
    session: &SessionToken,
) -> Result<Vec<ChatOverview>, ActionError> {
    let identity = state.authenticate(session).await?;
    Ok(state.store.chats_for_user(identity.user_id).await?)
}
