use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::info;
use uuid::Uuid;

use crate::auth::{self, SessionToken};
use crate::error::ActionError;
use crate::handlers::{validate_category, validate_description, validate_title, AppState};
use crate::models::{ListedRequest, NewRequest, Request, RequestPatch};
use crate::utils::{BrowseFilter, PaginationParams};

/// Creates a "wanted" request. Requests are browsable immediately; the
/// moderation queue sees them as pending until an admin decides.
pub async fn create_request(
    state: &AppState,
    session: &SessionToken,
    data: NewRequest,
) -> Result<Request, ActionError> {
    let identity = state.authenticate(session).await?;

    let data = NewRequest {
        title: validate_title(&data.title)?,
        description: validate_description(&data.description)?,
        category: validate_category(data.category)?,
    };

    let request = state.store.insert_request(identity.user_id, data).await?;
    info!(request_id = %request.id, user_id = %request.user_id, "created request");
    Ok(request)
}

pub async fn get_request(
    state: &AppState,
    session: &SessionToken,
    request_id: Uuid,
) -> Result<ListedRequest, ActionError> {
    let identity = state.authenticate(session).await?;
    let request = match state.store.request(request_id).await? {
        Some(request) => request,
        None => return Err(ActionError::NotFound),
    };
    let upvoted = state
        .store
        .has_upvoted(request.id, identity.user_id)
        .await?;
    Ok(ListedRequest { request, upvoted })
}

/// Browse view with the caller's own vote state resolved per row. The vote
/// lookups run concurrently; `buffered` keeps the listing order.
pub async fn list_requests(
    state: &AppState,
    session: &SessionToken,
    filter: BrowseFilter,
    page: PaginationParams,
) -> Result<Vec<ListedRequest>, ActionError> {
    let identity = state.authenticate(session).await?;
    let requests = state.store.list_requests(&filter, &page).await?;

    let max_concurrency = 10;
    let listed = stream::iter(requests.into_iter())
        .map(|request| async move {
            let upvoted = state
                .store
                .has_upvoted(request.id, identity.user_id)
                .await?;
            Ok::<_, ActionError>(ListedRequest { request, upvoted })
        })
        .buffered(max_concurrency)
        .try_collect()
        .await?;
    Ok(listed)
}

pub async fn my_requests(
    state: &AppState,
    session: &SessionToken,
) -> Result<Vec<Request>, ActionError> {
    let identity = state.authenticate(session).await?;
    Ok(state.store.requests_by_owner(identity.user_id).await?)
}

pub async fn update_request(
    state: &AppState,
    session: &SessionToken,
    request_id: Uuid,
    patch: RequestPatch,
) -> Result<Request, ActionError> {
    let identity = state.authenticate(session).await?;

    let existing = match state.store.request(request_id).await? {
        Some(request) => request,
        None => return Err(ActionError::NotFound),
    };
    auth::require_owner_or_admin(state.store.as_ref(), &identity, existing.user_id).await?;

    let patch = RequestPatch {
        title: match patch.title {
            Some(title) => Some(validate_title(&title)?),
            None => None,
        },
        description: match patch.description {
            Some(description) => Some(validate_description(&description)?),
            None => None,
        },
        category: validate_category(patch.category)?,
    };

    match state.store.update_request(request_id, patch).await? {
        Some(request) => {
            info!(request_id = %request.id, user_id = %identity.user_id, "updated request");
            Ok(request)
        }
        None => Err(ActionError::NotFound),
    }
}

pub async fn delete_request(
    state: &AppState,
    session: &SessionToken,
    request_id: Uuid,
) -> Result<(), ActionError> {
    let identity = state.authenticate(session).await?;

    let existing = match state.store.request(request_id).await? {
        Some(request) => request,
        None => return Err(ActionError::NotFound),
    };
    auth::require_owner_or_admin(state.store.as_ref(), &identity, existing.user_id).await?;

    if state.store.delete_request(request_id).await? {
        info!(request_id = %request_id, user_id = %identity.user_id, "deleted request");
        Ok(())
    } else {
        Err(ActionError::NotFound)
    }
}
