use tracing::info;
use uuid::Uuid;

use crate::auth::{self, SessionToken};
use crate::error::ActionError;
use crate::handlers::{
    validate_category, validate_images, validate_price, validate_title, AppState,
};
use crate::models::{NewPost, Post, PostPatch};
use crate::notify;
use crate::utils::{BrowseFilter, PaginationParams};

/// Creates a listing. It enters the moderation queue pending and stays out
/// of public browse until an admin approves it.
pub async fn create_post(
    state: &AppState,
    session: &SessionToken,
    data: NewPost,
) -> Result<Post, ActionError> {
    let identity = state.authenticate(session).await?;

    let data = NewPost {
        title: validate_title(&data.title)?,
        price: validate_price(data.price)?,
        images: validate_images(&data.images)?,
        category: validate_category(data.category)?,
    };

    let post = state.store.insert_post(identity.user_id, data).await?;
    info!(post_id = %post.id, seller_id = %post.seller_id, "created post");

    notify::notify_new_submission(
        state.store.as_ref(),
        identity.user_id,
        &post.title,
        state.config.fanout_concurrency,
    )
    .await;

    Ok(post)
}

pub async fn get_post(
    state: &AppState,
    session: &SessionToken,
    post_id: Uuid,
) -> Result<Post, ActionError> {
    state.authenticate(session).await?;
    match state.store.post(post_id).await? {
        Some(post) => Ok(post),
        None => Err(ActionError::NotFound),
    }
}

/// Public browse: approved and available listings only.
pub async fn list_posts(
    state: &AppState,
    session: &SessionToken,
    filter: BrowseFilter,
    page: PaginationParams,
) -> Result<Vec<Post>, ActionError> {
    state.authenticate(session).await?;
    Ok(state.store.list_posts(&filter, &page).await?)
}

/// The caller's own listings, regardless of moderation state.
pub async fn my_posts(state: &AppState, session: &SessionToken) -> Result<Vec<Post>, ActionError> {
    let identity = state.authenticate(session).await?;
    Ok(state.store.posts_by_seller(identity.user_id).await?)
}

/// Owner-or-admin. The patch cannot carry approval fields, so moderation
/// outcomes survive any edit.
pub async fn update_post(
    state: &AppState,
    session: &SessionToken,
    post_id: Uuid,
    patch: PostPatch,
) -> Result<Post, ActionError> {
    let identity = state.authenticate(session).await?;

    let existing = match state.store.post(post_id).await? {
        Some(post) => post,
        None => return Err(ActionError::NotFound),
    };
    auth::require_owner_or_admin(state.store.as_ref(), &identity, existing.seller_id).await?;

    let patch = PostPatch {
        title: match patch.title {
            Some(title) => Some(validate_title(&title)?),
            None => None,
        },
        price: match patch.price {
            Some(price) => Some(validate_price(price)?),
            None => None,
        },
        images: match patch.images {
            Some(images) => Some(validate_images(&images)?),
            None => None,
        },
        category: validate_category(patch.category)?,
        is_available: patch.is_available,
    };

    match state.store.update_post(post_id, patch).await? {
        Some(post) => {
            info!(post_id = %post.id, user_id = %identity.user_id, "updated post");
            Ok(post)
        }
        None => Err(ActionError::NotFound),
    }
}

pub async fn delete_post(
    state: &AppState,
    session: &SessionToken,
    post_id: Uuid,
) -> Result<(), ActionError> {
    let identity = state.authenticate(session).await?;

    let existing = match state.store.post(post_id).await? {
        Some(post) => post,
        None => return Err(ActionError::NotFound),
    };
    auth::require_owner_or_admin(state.store.as_ref(), &identity, existing.seller_id).await?;

    if state.store.delete_post(post_id).await? {
        info!(post_id = %post_id, user_id = %identity.user_id, "deleted post");
        Ok(())
    } else {
        Err(ActionError::NotFound)
    }
}
