//! Notification fanout.
//!
//! Every function here is a side effect of an action that already succeeded.
//! A failed insert is logged and swallowed: a lost notification is
//! recoverable, failing the triggering action over it is not.

use futures::stream::{self, StreamExt};
use tracing::error;
use uuid::Uuid;

use crate::models::{
    Chat, Message, ModerationDecision, NewNotification, NotificationKind,
};
use crate::store::EntityStore;

/// Tells an entity's owner what an admin decided. The rejection reason, when
/// present, rides in the message text.
pub async fn notify_moderation_decision(
    store: &dyn EntityStore,
    actor_id: Uuid,
    owner_id: Uuid,
    noun: &str,
    title: &str,
    decision: ModerationDecision,
    reason: Option<&str>,
) {
    let (kind, message) = match decision {
        ModerationDecision::Approve => (
            NotificationKind::AdminApprove,
            format!("Your {} \"{}\" was approved", noun, title),
        ),
        ModerationDecision::Reject => {
            let message = match reason {
                Some(reason) => {
                    format!("Your {} \"{}\" was rejected: {}", noun, title, reason)
                }
                None => format!("Your {} \"{}\" was rejected", noun, title),
            };
            (NotificationKind::AdminReject, message)
        }
    };

    let note = NewNotification {
        target_id: owner_id,
        actor_id,
        kind,
        message,
    };
    if let Err(e) = store.insert_notification(note).await {
        error!(error = %e, target_id = %owner_id, "failed to write moderation notification");
    }
}

/// Tells the other participant about a new chat message.
pub async fn notify_new_message(store: &dyn EntityStore, chat: &Chat, message: &Message) {
    let recipient = match chat.other_participant(message.sender_id) {
        Some(recipient) => recipient,
        None => return,
    };

    let sender_name = match store.profile(message.sender_id).await {
        Ok(Some(profile)) => profile.full_name,
        Ok(None) => "Someone".to_string(),
        Err(e) => {
            error!(error = %e, sender_id = %message.sender_id, "failed to load sender profile for notification");
            "Someone".to_string()
        }
    };

    let note = NewNotification {
        target_id: recipient,
        actor_id: message.sender_id,
        kind: NotificationKind::NewMessage,
        message: format!("{} sent you a message", sender_name),
    };
    if let Err(e) = store.insert_notification(note).await {
        error!(error = %e, target_id = %recipient, "failed to write message notification");
    }
}

/// Tells every admin that a new listing is waiting for review. Inserts run
/// with bounded concurrency; one failed admin does not stop the rest.
pub async fn notify_new_submission(
    store: &dyn EntityStore,
    actor_id: Uuid,
    title: &str,
    concurrency: usize,
) {
    let admins = match store.admin_profiles().await {
        Ok(admins) => admins,
        Err(e) => {
            error!(error = %e, "failed to list admins for submission fanout");
            return;
        }
    };

    let message = format!("New listing \"{}\" is waiting for review", title);

    stream::iter(admins.into_iter())
        .map(|admin| {
            let message = message.clone();
            async move {
                let note = NewNotification {
                    target_id: admin.id,
                    actor_id,
                    kind: NotificationKind::NewSubmission,
                    message,
                };
                if let Err(e) = store.insert_notification(note).await {
                    error!(error = %e, target_id = %admin.id, "failed to write submission notification");
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;
}
