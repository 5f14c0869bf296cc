pub mod chats;
pub mod moderation;
pub mod notifications;
pub mod posts;
pub mod requests;
pub mod upvotes;

use std::sync::Arc;

use crate::auth::{Identity, IdentityProvider, SessionToken};
use crate::config::Config;
use crate::constants::*;
use crate::error::ActionError;
use crate::store::EntityStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntityStore>,
        identity: Arc<dyn IdentityProvider>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            identity,
            config,
        }
    }

    pub async fn authenticate(&self, session: &SessionToken) -> Result<Identity, ActionError> {
        self.identity.resolve(session).await
    }
}

// --- Shared input validation ---

pub(crate) fn validate_title(title: &str) -> Result<String, ActionError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ActionError::ValidationFailed(
            "Title must not be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ActionError::ValidationFailed(format!(
            "Title exceeds maximum length of {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

pub(crate) fn validate_description(description: &str) -> Result<String, ActionError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(ActionError::ValidationFailed(
            "Description must not be empty".to_string(),
        ));
    }
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ActionError::ValidationFailed(format!(
            "Description exceeds maximum length of {} characters",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(description.to_string())
}

pub(crate) fn validate_price(price: f64) -> Result<f64, ActionError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ActionError::ValidationFailed(
            "Price must be a non-negative number".to_string(),
        ));
    }
    Ok(price)
}

pub(crate) fn validate_images(images: &[String]) -> Result<Vec<String>, ActionError> {
    if images.len() > MAX_IMAGES_PER_POST {
        return Err(ActionError::ValidationFailed(format!(
            "Exceeded maximum number of images ({})",
            MAX_IMAGES_PER_POST
        )));
    }
    for url in images {
        if url.is_empty() || url.chars().count() > MAX_IMAGE_URL_LENGTH {
            return Err(ActionError::ValidationFailed(
                "Image URLs must be non-empty and of reasonable length".to_string(),
            ));
        }
    }
    Ok(images.to_vec())
}

pub(crate) fn validate_category(
    category: Option<String>,
) -> Result<Option<String>, ActionError> {
    match category {
        None => Ok(None),
        Some(category) => {
            let category = category.trim().to_string();
            if category.is_empty() {
                return Err(ActionError::ValidationFailed(
                    "Category must not be empty".to_string(),
                ));
            }
            if category.chars().count() > MAX_CATEGORY_LENGTH {
                return Err(ActionError::ValidationFailed(format!(
                    "Category exceeds maximum length of {} characters",
                    MAX_CATEGORY_LENGTH
                )));
            }
            Ok(Some(category))
        }
    }
}

pub(crate) fn validate_message_text(text: &str) -> Result<String, ActionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ActionError::ValidationFailed(
            "Message must not be empty".to_string(),
        ));
    }
    if text.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ActionError::ValidationFailed(format!(
            "Message exceeds maximum length of {} characters",
            MAX_MESSAGE_LENGTH
        )));
    }
    Ok(text.to_string())
}
