use tracing::info;
use uuid::Uuid;

use crate::auth::{self, SessionToken};
use crate::constants::MAX_REJECT_REASON_LENGTH;
use crate::error::ActionError;
use crate::handlers::AppState;
use crate::models::{
    ModerationDecision, ModerationOutcome, ModerationStatus, Post, Request,
};
use crate::notify;

fn status_label(status: ModerationStatus) -> &'static str {
    match status {
        ModerationStatus::Pending => "pending",
        ModerationStatus::Approved => "approved",
        ModerationStatus::Rejected => "rejected",
    }
}

fn validate_reason(reason: Option<String>) -> Result<Option<String>, ActionError> {
    match reason {
        None => Ok(None),
        Some(reason) => {
            let reason = reason.trim().to_string();
            if reason.is_empty() {
                return Ok(None);
            }
            if reason.chars().count() > MAX_REJECT_REASON_LENGTH {
                return Err(ActionError::ValidationFailed(format!(
                    "Reason exceeds maximum length of {} characters",
                    MAX_REJECT_REASON_LENGTH
                )));
            }
            Ok(Some(reason))
        }
    }
}

/// Approves a pending listing: it becomes approved and available, and the
/// seller is notified. Re-approving is a no-op; approving a rejected
/// listing is a conflict.
pub async fn approve_post(
    state: &AppState,
    session: &SessionToken,
    post_id: Uuid,
) -> Result<Post, ActionError> {
    decide_post(state, session, post_id, ModerationDecision::Approve, None).await
}

/// Rejects a pending listing: it stays stored but leaves circulation. The
/// reason, when given, reaches the seller in the notification text.
pub async fn reject_post(
    state: &AppState,
    session: &SessionToken,
    post_id: Uuid,
    reason: Option<String>,
) -> Result<Post, ActionError> {
    decide_post(state, session, post_id, ModerationDecision::Reject, reason).await
}

async fn decide_post(
    state: &AppState,
    session: &SessionToken,
    post_id: Uuid,
    decision: ModerationDecision,
    reason: Option<String>,
) -> Result<Post, ActionError> {
    let identity = state.authenticate(session).await?;
    auth::require_admin(state.store.as_ref(), &identity).await?;
    let reason = validate_reason(reason)?;

    let outcome = match state.store.moderate_post(post_id, decision).await? {
        Some(outcome) => outcome,
        None => return Err(ActionError::NotFound),
    };

    match outcome {
        ModerationOutcome::Applied(post) => {
            info!(
                post_id = %post.id,
                admin_id = %identity.user_id,
                decision = ?decision,
                "moderated post"
            );
            notify::notify_moderation_decision(
                state.store.as_ref(),
                identity.user_id,
                post.seller_id,
                "listing",
                &post.title,
                decision,
                reason.as_deref(),
            )
            .await;
            Ok(post)
        }
        ModerationOutcome::Unchanged(post) => Ok(post),
        ModerationOutcome::Denied(current) => Err(ActionError::Conflict(format!(
            "Already {}",
            status_label(current)
        ))),
    }
}

pub async fn approve_request(
    state: &AppState,
    session: &SessionToken,
    request_id: Uuid,
) -> Result<Request, ActionError> {
    decide_request(state, session, request_id, ModerationDecision::Approve, None).await
}

pub async fn reject_request(
    state: &AppState,
    session: &SessionToken,
    request_id: Uuid,
    reason: Option<String>,
) -> Result<Request, ActionError> {
    decide_request(state, session, request_id, ModerationDecision::Reject, reason).await
}

async fn decide_request(
    state: &AppState,
    session: &SessionToken,
    request_id: Uuid,
    decision: ModerationDecision,
    reason: Option<String>,
) -> Result<Request, ActionError> {
    let identity = state.authenticate(session).await?;
    auth::require_admin(state.store.as_ref(), &identity).await?;
    let reason = validate_reason(reason)?;

    let outcome = match state.store.moderate_request(request_id, decision).await? {
        Some(outcome) => outcome,
        None => return Err(ActionError::NotFound),
    };

    match outcome {
        ModerationOutcome::Applied(request) => {
            info!(
                request_id = %request.id,
                admin_id = %identity.user_id,
                decision = ?decision,
                "moderated request"
            );
            notify::notify_moderation_decision(
                state.store.as_ref(),
                identity.user_id,
                request.user_id,
                "request",
                &request.title,
                decision,
                reason.as_deref(),
            )
            .await;
            Ok(request)
        }
        ModerationOutcome::Unchanged(request) => Ok(request),
        ModerationOutcome::Denied(current) => Err(ActionError::Conflict(format!(
            "Already {}",
            status_label(current)
        ))),
    }
}

/// Admin queue: pending listings, oldest first.
pub async fn pending_posts(
    state: &AppState,
    session: &SessionToken,
) -> Result<Vec<Post>, ActionError> {
    let identity = state.authenticate(session).await?;
    auth::require_admin(state.store.as_ref(), &identity).await?;
    Ok(state.store.pending_posts().await?)
}

/// Admin queue: pending requests, oldest first.
pub async fn pending_requests(
    state: &AppState,
    session: &SessionToken,
) -> Result<Vec<Request>, ActionError> {
    let identity = state.authenticate(session).await?;
    auth::require_admin(state.store.as_ref(), &identity).await?;
    Ok(state.store.pending_requests().await?)
}
