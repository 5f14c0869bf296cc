pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::*;
use crate::utils::{BrowseFilter, PaginationParams};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Data-access interface injected into every handler.
///
/// Compound check-then-act sequences (toggling an upvote, opening a chat,
/// appending or deleting a message, applying a moderation decision) are
/// single methods so each backend can make them atomic: one transaction in
/// Postgres, one write-lock section in memory. Callers never read, decide,
/// and write back counters or pair keys themselves.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // --- Profiles ---

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError>;
    async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;
    async fn admin_profiles(&self) -> Result<Vec<Profile>, StoreError>;

    // --- Posts ---

    async fn insert_post(&self, seller_id: Uuid, data: NewPost) -> Result<Post, StoreError>;
    async fn post(&self, id: Uuid) -> Result<Option<Post>, StoreError>;
    /// Public browse view: approved and available posts only, newest first.
    async fn list_posts(
        &self,
        filter: &BrowseFilter,
        page: &PaginationParams,
    ) -> Result<Vec<Post>, StoreError>;
    async fn posts_by_seller(&self, seller_id: Uuid) -> Result<Vec<Post>, StoreError>;
    /// Moderation queue view: pending posts, oldest first.
    async fn pending_posts(&self) -> Result<Vec<Post>, StoreError>;
    /// Applies a patch. Approval state is not part of `PostPatch` and cannot
    /// change here. Returns `None` when the post does not exist.
    async fn update_post(&self, id: Uuid, data: PostPatch) -> Result<Option<Post>, StoreError>;
    /// Returns whether a row was deleted.
    async fn delete_post(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn moderate_post(
        &self,
        id: Uuid,
        decision: ModerationDecision,
    ) -> Result<Option<ModerationOutcome<Post>>, StoreError>;

    // --- Requests ---

    async fn insert_request(&self, user_id: Uuid, data: NewRequest)
        -> Result<Request, StoreError>;
    async fn request(&self, id: Uuid) -> Result<Option<Request>, StoreError>;
    /// Browse view for requests. Not gated by moderation status.
    async fn list_requests(
        &self,
        filter: &BrowseFilter,
        page: &PaginationParams,
    ) -> Result<Vec<Request>, StoreError>;
    async fn requests_by_owner(&self, user_id: Uuid) -> Result<Vec<Request>, StoreError>;
    async fn pending_requests(&self) -> Result<Vec<Request>, StoreError>;
    async fn update_request(
        &self,
        id: Uuid,
        data: RequestPatch,
    ) -> Result<Option<Request>, StoreError>;
    async fn delete_request(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn moderate_request(
        &self,
        id: Uuid,
        decision: ModerationDecision,
    ) -> Result<Option<ModerationOutcome<Request>>, StoreError>;

    // --- Upvotes ---

    /// Adds the (request, user) vote if absent, removes it if present, and
    /// adjusts the denormalized counter in the same atomic step. Returns
    /// `None` when the request does not exist.
    async fn toggle_upvote(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<UpvoteToggle>, StoreError>;
    async fn has_upvoted(&self, request_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;
    /// True row count, independent of the denormalized counter.
    async fn upvote_count(&self, request_id: Uuid) -> Result<i64, StoreError>;

    // --- Chats ---

    /// Returns the chat for the unordered pair, creating it when absent.
    /// The flag reports whether this call created it. Concurrent calls for
    /// the same pair converge on one chat.
    async fn open_chat(&self, a: Uuid, b: Uuid) -> Result<(Chat, bool), StoreError>;
    async fn chat(&self, id: Uuid) -> Result<Option<Chat>, StoreError>;
    /// All chats involving the user, most recently active first, each with
    /// its latest message.
    async fn chats_for_user(&self, user_id: Uuid) -> Result<Vec<ChatOverview>, StoreError>;
    /// Appends a message and bumps the chat's `updated_at` to the message
    /// timestamp in the same atomic step. `None` when the chat is absent.
    async fn append_message(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        text: String,
    ) -> Result<Option<Message>, StoreError>;
    /// Messages of a chat ordered by (created_at, id) ascending.
    async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>, StoreError>;
    async fn message(&self, id: Uuid) -> Result<Option<Message>, StoreError>;
    /// Deletes a message and recomputes the chat's `updated_at` from the
    /// remaining messages (falling back to the chat's `created_at`).
    async fn delete_message(&self, id: Uuid) -> Result<bool, StoreError>;

    // --- Notifications ---

    async fn insert_notification(
        &self,
        data: NewNotification,
    ) -> Result<Notification, StoreError>;
    /// One user's inbox, newest first.
    async fn notifications_for(&self, target_id: Uuid) -> Result<Vec<Notification>, StoreError>;
    async fn notification(&self, id: Uuid) -> Result<Option<Notification>, StoreError>;
    /// Marks read. Idempotent; `is_read` never goes back to false.
    async fn mark_notification_read(
        &self,
        id: Uuid,
    ) -> Result<Option<Notification>, StoreError>;
}
