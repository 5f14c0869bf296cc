use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::*;
use crate::store::EntityStore;
use crate::utils::{BrowseFilter, PaginationParams};

#[derive(Default)]
struct State {
    profiles: HashMap<Uuid, Profile>,
    posts: HashMap<Uuid, Post>,
    requests: HashMap<Uuid, Request>,
    upvotes: HashMap<(Uuid, Uuid), Upvote>,
    chats: HashMap<Uuid, Chat>,
    chat_pairs: HashMap<(Uuid, Uuid), Uuid>,
    messages: HashMap<Uuid, Message>,
    notifications: HashMap<Uuid, Notification>,
}

/// In-memory entity store.
///
/// All collections live behind one lock and every mutating method holds the
/// write guard across its whole check-then-act sequence, so writers are
/// fully serialized. Used by the test suite and by embedders that want the
/// subsystem without Postgres.
#[derive(Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    fail_notifications: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent notification insert fail, for exercising
    /// fanout error paths.
    pub fn set_fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }
}

fn title_matches(title: &str, query: &Option<String>) -> bool {
    match query {
        Some(q) => title.to_lowercase().contains(&q.to_lowercase()),
        None => true,
    }
}

fn category_matches(category: &Option<String>, wanted: &Option<String>) -> bool {
    match wanted {
        Some(w) => category.as_deref() == Some(w.as_str()),
        None => true,
    }
}

fn paginate<T>(mut items: Vec<T>, page: &PaginationParams) -> Vec<T> {
    let offset = page.offset() as usize;
    let limit = page.limit() as usize;
    if offset >= items.len() {
        return Vec::new();
    }
    items.drain(..offset);
    items.truncate(limit);
    items
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        let mut state = self.state.write().await;
        if state.profiles.contains_key(&profile.id) {
            return Err(StoreError::Conflict("profiles.id"));
        }
        let created = Profile {
            id: profile.id,
            role: profile.role,
            full_name: profile.full_name,
            avatar_url: profile.avatar_url,
            created_at: Utc::now(),
        };
        state.profiles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        let state = self.state.read().await;
        Ok(state.profiles.get(&id).cloned())
    }

    async fn admin_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let state = self.state.read().await;
        let mut admins: Vec<Profile> = state
            .profiles
            .values()
            .filter(|profile| profile.role == Role::Admin)
            .cloned()
            .collect();
        admins.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(admins)
    }

    async fn insert_post(&self, seller_id: Uuid, data: NewPost) -> Result<Post, StoreError> {
        let mut state = self.state.write().await;
        let post = Post {
            id: Uuid::new_v4(),
            seller_id,
            title: data.title,
            price: data.price,
            images: data.images,
            category: data.category,
            is_available: true,
            is_approved: false,
            status: ModerationStatus::Pending,
            created_at: Utc::now(),
        };
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        let state = self.state.read().await;
        Ok(state.posts.get(&id).cloned())
    }

    async fn list_posts(
        &self,
        filter: &BrowseFilter,
        page: &PaginationParams,
    ) -> Result<Vec<Post>, StoreError> {
        let state = self.state.read().await;
        let mut posts: Vec<Post> = state
            .posts
            .values()
            .filter(|post| post.is_approved && post.is_available)
            .filter(|post| category_matches(&post.category, &filter.category))
            .filter(|post| title_matches(&post.title, &filter.query))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(posts, page))
    }

    async fn posts_by_seller(&self, seller_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let state = self.state.read().await;
        let mut posts: Vec<Post> = state
            .posts
            .values()
            .filter(|post| post.seller_id == seller_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn pending_posts(&self) -> Result<Vec<Post>, StoreError> {
        let state = self.state.read().await;
        let mut posts: Vec<Post> = state
            .posts
            .values()
            .filter(|post| post.status == ModerationStatus::Pending)
            .cloned()
            .collect();
        posts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(posts)
    }

    async fn update_post(&self, id: Uuid, data: PostPatch) -> Result<Option<Post>, StoreError> {
        let mut state = self.state.write().await;
        let post = match state.posts.get_mut(&id) {
            Some(post) => post,
            None => return Ok(None),
        };
        if let Some(title) = data.title {
            post.title = title;
        }
        if let Some(price) = data.price {
            post.price = price;
        }
        if let Some(images) = data.images {
            post.images = images;
        }
        if let Some(category) = data.category {
            post.category = Some(category);
        }
        if let Some(is_available) = data.is_available {
            post.is_available = is_available;
        }
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.posts.remove(&id).is_some())
    }

    async fn moderate_post(
        &self,
        id: Uuid,
        decision: ModerationDecision,
    ) -> Result<Option<ModerationOutcome<Post>>, StoreError> {
        let mut state = self.state.write().await;
        let post = match state.posts.get_mut(&id) {
            Some(post) => post,
            None => return Ok(None),
        };
        let target = decision.target_status();
        let outcome = if post.status == ModerationStatus::Pending {
            post.status = target;
            match decision {
                ModerationDecision::Approve => {
                    post.is_approved = true;
                    post.is_available = true;
                }
                ModerationDecision::Reject => {
                    post.is_approved = false;
                    post.is_available = false;
                }
            }
            ModerationOutcome::Applied(post.clone())
        } else if post.status == target {
            ModerationOutcome::Unchanged(post.clone())
        } else {
            ModerationOutcome::Denied(post.status)
        };
        Ok(Some(outcome))
    }

    async fn insert_request(
        &self,
        user_id: Uuid,
        data: NewRequest,
    ) -> Result<Request, StoreError> {
        let mut state = self.state.write().await;
        let request = Request {
            id: Uuid::new_v4(),
            user_id,
            title: data.title,
            description: data.description,
            category: data.category,
            upvotes: 0,
            status: ModerationStatus::Pending,
            created_at: Utc::now(),
        };
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn request(&self, id: Uuid) -> Result<Option<Request>, StoreError> {
        let state = self.state.read().await;
        Ok(state.requests.get(&id).cloned())
    }

    async fn list_requests(
        &self,
        filter: &BrowseFilter,
        page: &PaginationParams,
    ) -> Result<Vec<Request>, StoreError> {
        let state = self.state.read().await;
        let mut requests: Vec<Request> = state
            .requests
            .values()
            .filter(|request| category_matches(&request.category, &filter.category))
            .filter(|request| title_matches(&request.title, &filter.query))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(requests, page))
    }

    async fn requests_by_owner(&self, user_id: Uuid) -> Result<Vec<Request>, StoreError> {
        let state = self.state.read().await;
        let mut requests: Vec<Request> = state
            .requests
            .values()
            .filter(|request| request.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn pending_requests(&self) -> Result<Vec<Request>, StoreError> {
        let state = self.state.read().await;
        let mut requests: Vec<Request> = state
            .requests
            .values()
            .filter(|request| request.status == ModerationStatus::Pending)
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(requests)
    }

    async fn update_request(
        &self,
        id: Uuid,
        data: RequestPatch,
    ) -> Result<Option<Request>, StoreError> {
        let mut state = self.state.write().await;
        let request = match state.requests.get_mut(&id) {
            Some(request) => request,
            None => return Ok(None),
        };
        if let Some(title) = data.title {
            request.title = title;
        }
        if let Some(description) = data.description {
            request.description = description;
        }
        if let Some(category) = data.category {
            request.category = Some(category);
        }
        Ok(Some(request.clone()))
    }

    async fn delete_request(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let removed = state.requests.remove(&id).is_some();
        if removed {
            state.upvotes.retain(|(request_id, _), _| *request_id != id);
        }
        Ok(removed)
    }

    async fn moderate_request(
        &self,
        id: Uuid,
        decision: ModerationDecision,
    ) -> Result<Option<ModerationOutcome<Request>>, StoreError> {
        let mut state = self.state.write().await;
        let request = match state.requests.get_mut(&id) {
            Some(request) => request,
            None => return Ok(None),
        };
        let target = decision.target_status();
        let outcome = if request.status == ModerationStatus::Pending {
            request.status = target;
            ModerationOutcome::Applied(request.clone())
        } else if request.status == target {
            ModerationOutcome::Unchanged(request.clone())
        } else {
            ModerationOutcome::Denied(request.status)
        };
        Ok(Some(outcome))
    }

    async fn toggle_upvote(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<UpvoteToggle>, StoreError> {
        let mut state = self.state.write().await;
        if !state.requests.contains_key(&request_id) {
            return Ok(None);
        }

        let key = (request_id, user_id);
        let vote_state = if state.upvotes.remove(&key).is_some() {
            UpvoteState::Removed
        } else {
            state.upvotes.insert(
                key,
                Upvote {
                    request_id,
                    user_id,
                    created_at: Utc::now(),
                },
            );
            UpvoteState::Added
        };

        let request = match state.requests.get_mut(&request_id) {
            Some(request) => request,
            None => {
                return Err(StoreError::Corrupted(
                    "request vanished while holding the write lock".to_string(),
                ))
            }
        };
        match vote_state {
            UpvoteState::Added => request.upvotes += 1,
            UpvoteState::Removed => request.upvotes -= 1,
        }

        Ok(Some(UpvoteToggle {
            state: vote_state,
            upvotes: request.upvotes,
        }))
    }

    async fn has_upvoted(&self, request_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state.upvotes.contains_key(&(request_id, user_id)))
    }

    async fn upvote_count(&self, request_id: Uuid) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .upvotes
            .keys()
            .filter(|(id, _)| *id == request_id)
            .count() as i64)
    }

    async fn open_chat(&self, a: Uuid, b: Uuid) -> Result<(Chat, bool), StoreError> {
        let (low, high) = canonical_pair(a, b);
        let mut state = self.state.write().await;

        if let Some(chat_id) = state.chat_pairs.get(&(low, high)).copied() {
            let chat = match state.chats.get(&chat_id) {
                Some(chat) => chat.clone(),
                None => {
                    return Err(StoreError::Corrupted(
                        "chat pair index points at a missing chat".to_string(),
                    ))
                }
            };
            return Ok((chat, false));
        }

        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4(),
            user_low: low,
            user_high: high,
            created_at: now,
            updated_at: now,
        };
        state.chat_pairs.insert((low, high), chat.id);
        state.chats.insert(chat.id, chat.clone());
        Ok((chat, true))
    }

    async fn chat(&self, id: Uuid) -> Result<Option<Chat>, StoreError> {
        let state = self.state.read().await;
        Ok(state.chats.get(&id).cloned())
    }

    async fn chats_for_user(&self, user_id: Uuid) -> Result<Vec<ChatOverview>, StoreError> {
        let state = self.state.read().await;
        let mut chats: Vec<Chat> = state
            .chats
            .values()
            .filter(|chat| chat.involves(user_id))
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));

        Ok(chats
            .into_iter()
            .map(|chat| {
                let last_message = state
                    .messages
                    .values()
                    .filter(|message| message.chat_id == chat.id)
                    .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
                    .cloned();
                ChatOverview { chat, last_message }
            })
            .collect())
    }

    async fn append_message(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        text: String,
    ) -> Result<Option<Message>, StoreError> {
        let mut state = self.state.write().await;
        if !state.chats.contains_key(&chat_id) {
            return Ok(None);
        }

        let message = Message {
            id: Uuid::new_v4(),
            chat_id,
            sender_id,
            text,
            created_at: Utc::now(),
        };
        state.messages.insert(message.id, message.clone());

        if let Some(chat) = state.chats.get_mut(&chat_id) {
            chat.updated_at = message.created_at;
        }

        Ok(Some(message))
    }

    async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state
            .messages
            .values()
            .filter(|message| message.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        let state = self.state.read().await;
        Ok(state.messages.get(&id).cloned())
    }

    async fn delete_message(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let message = match state.messages.remove(&id) {
            Some(message) => message,
            None => return Ok(false),
        };

        let latest = state
            .messages
            .values()
            .filter(|m| m.chat_id == message.chat_id)
            .map(|m| m.created_at)
            .max();
        if let Some(chat) = state.chats.get_mut(&message.chat_id) {
            chat.updated_at = latest.unwrap_or(chat.created_at);
        }

        Ok(true)
    }

    async fn insert_notification(
        &self,
        data: NewNotification,
    ) -> Result<Notification, StoreError> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout);
        }

        let mut state = self.state.write().await;
        let notification = Notification {
            id: Uuid::new_v4(),
            target_id: data.target_id,
            actor_id: data.actor_id,
            kind: data.kind,
            message: data.message,
            is_read: false,
            created_at: Utc::now(),
        };
        state
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn notifications_for(&self, target_id: Uuid) -> Result<Vec<Notification>, StoreError> {
        let state = self.state.read().await;
        let mut notifications: Vec<Notification> = state
            .notifications
            .values()
            .filter(|notification| notification.target_id == target_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    async fn notification(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        let state = self.state.read().await;
        Ok(state.notifications.get(&id).cloned())
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
    ) -> Result<Option<Notification>, StoreError> {
        let mut state = self.state.write().await;
        let notification = match state.notifications.get_mut(&id) {
            Some(notification) => notification,
            None => return Ok(None),
        };
        notification.is_read = true;
        Ok(Some(notification.clone()))
    }
}
