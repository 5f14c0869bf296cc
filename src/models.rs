use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role carried on a profile. Authorization always reads this from the
/// profile row, never from a session token.
#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// Moderation state machine for gated entities. `Pending` is the only state
/// that transitions; the other two are terminal.
#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "moderation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
}

/// Represents a marketplace user.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Represents an item listed for sale.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub images: Vec<String>,
    pub category: Option<String>,
    pub is_available: bool,
    pub is_approved: bool,
    pub status: ModerationStatus,
    pub created_at: DateTime<Utc>,
}

/// Represents a "wanted" request posted by a buyer.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct Request {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub upvotes: i64,
    pub status: ModerationStatus,
    pub created_at: DateTime<Utc>,
}

/// One user's upvote on one request. Existence is the vote.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct Upvote {
    pub request_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A two-party conversation. The pair is stored in canonical order
/// (`user_low < user_high`) so the unordered pair has exactly one encoding.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct Chat {
    pub id: Uuid,
    pub user_low: Uuid,
    pub user_high: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn participant_ids(&self) -> [Uuid; 2] {
        [self.user_low, self.user_high]
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.user_low == user_id || self.user_high == user_id
    }

    /// The participant that is not `user_id`, if `user_id` is in the chat.
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if self.user_low == user_id {
            Some(self.user_high)
        } else if self.user_high == user_id {
            Some(self.user_low)
        } else {
            None
        }
    }
}

/// Canonical encoding of an unordered user pair.
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Represents a message inside a chat.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "notification_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    AdminApprove,
    AdminReject,
    NewMessage,
    NewSubmission,
}

/// Represents a notification delivered to one user's inbox.
#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub target_id: Uuid,
    pub actor_id: Uuid,
    #[sqlx(rename = "target_type")]
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// --- Input payloads ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub full_name: String,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: Role,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub images: Vec<String>,
    pub category: Option<String>,
}

/// Partial update for a post. Approval state is deliberately absent; only
/// the moderation workflow can change it.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub price: Option<f64>,
    pub images: Option<Vec<String>>,
    pub category: Option<String>,
    pub is_available: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewRequest {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RequestPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewNotification {
    pub target_id: Uuid,
    pub actor_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
}

// --- Operation results and views ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpvoteState {
    Added,
    Removed,
}

/// Result of an upvote toggle: what happened plus the count after it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpvoteToggle {
    pub state: UpvoteState,
    pub upvotes: i64,
}

/// A chat plus its most recent message, for conversation lists.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatOverview {
    pub chat: Chat,
    pub last_message: Option<Message>,
}

/// A chat plus its full ordered history.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatThread {
    pub chat: Chat,
    pub messages: Vec<Message>,
}

/// A request as seen by one caller, with their own vote state resolved.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ListedRequest {
    pub request: Request,
    pub upvoted: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModerationDecision {
    Approve,
    Reject,
}

impl ModerationDecision {
    /// Terminal status this decision drives the entity to.
    pub fn target_status(&self) -> ModerationStatus {
        match self {
            ModerationDecision::Approve => ModerationStatus::Approved,
            ModerationDecision::Reject => ModerationStatus::Rejected,
        }
    }
}

/// What a moderation decision did to the entity.
#[derive(Debug, Clone)]
pub enum ModerationOutcome<T> {
    /// Pending entity moved to the decided terminal state.
    Applied(T),
    /// Entity was already in the decided state; nothing changed.
    Unchanged(T),
    /// Entity sits in the opposite terminal state; decision refused.
    Denied(ModerationStatus),
}
