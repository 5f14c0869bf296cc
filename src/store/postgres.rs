use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::*;
use crate::store::EntityStore;
use crate::utils::{BrowseFilter, PaginationParams};

/// Postgres-backed entity store.
///
/// Uniqueness and counter invariants live in the schema; compound operations
/// lock the parent row (`FOR UPDATE`) inside one transaction so concurrent
/// callers serialize instead of racing.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_seconds))
            .connect(&config.database_url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Create enum types, tables and indexes if they do not exist yet.
    /// Safe to run on every startup.
    pub async fn prepare_database(&self) -> Result<(), StoreError> {
        let mut transaction = self.pool.begin().await?;

        sqlx::query(
            "
            DO $$ BEGIN
                CREATE TYPE user_role AS ENUM ('USER', 'ADMIN');
            EXCEPTION
                WHEN duplicate_object THEN null;
            END $$;
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            DO $$ BEGIN
                CREATE TYPE moderation_status AS ENUM ('pending', 'approved', 'rejected');
            EXCEPTION
                WHEN duplicate_object THEN null;
            END $$;
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            DO $$ BEGIN
                CREATE TYPE notification_kind AS ENUM (
                    'ADMIN_APPROVE',
                    'ADMIN_REJECT',
                    'NEW_MESSAGE',
                    'NEW_SUBMISSION'
                );
            EXCEPTION
                WHEN duplicate_object THEN null;
            END $$;
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE TABLE IF NOT EXISTS profiles (
                id         UUID        PRIMARY KEY,
                role       user_role   NOT NULL DEFAULT 'USER',
                full_name  TEXT        NOT NULL,
                avatar_url TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE TABLE IF NOT EXISTS posts (
                id           UUID              PRIMARY KEY,
                seller_id    UUID              NOT NULL,
                title        TEXT              NOT NULL,
                price        DOUBLE PRECISION  NOT NULL,
                images       TEXT[]            NOT NULL DEFAULT '{}',
                category     TEXT,
                is_available BOOLEAN           NOT NULL DEFAULT TRUE,
                is_approved  BOOLEAN           NOT NULL DEFAULT FALSE,
                status       moderation_status NOT NULL DEFAULT 'pending',
                created_at   TIMESTAMPTZ       NOT NULL DEFAULT NOW()
            );
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE INDEX IF NOT EXISTS posts_browse_index
            ON posts (is_approved, is_available, created_at);
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE INDEX IF NOT EXISTS posts_seller_index
            ON posts (seller_id);
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE TABLE IF NOT EXISTS requests (
                id          UUID              PRIMARY KEY,
                user_id     UUID              NOT NULL,
                title       TEXT              NOT NULL,
                description TEXT              NOT NULL,
                category    TEXT,
                upvotes     INT8              NOT NULL DEFAULT 0 CHECK (upvotes >= 0),
                status      moderation_status NOT NULL DEFAULT 'pending',
                created_at  TIMESTAMPTZ       NOT NULL DEFAULT NOW()
            );
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE INDEX IF NOT EXISTS requests_owner_index
            ON requests (user_id);
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE TABLE IF NOT EXISTS upvotes (
                request_id UUID        NOT NULL REFERENCES requests (id) ON DELETE CASCADE,
                user_id    UUID        NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (request_id, user_id)
            );
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE TABLE IF NOT EXISTS chats (
                id         UUID        PRIMARY KEY,
                user_low   UUID        NOT NULL,
                user_high  UUID        NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CHECK (user_low < user_high)
            );
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE UNIQUE INDEX IF NOT EXISTS chats_pair_index
            ON chats (user_low, user_high);
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE TABLE IF NOT EXISTS messages (
                id         UUID        PRIMARY KEY,
                chat_id    UUID        NOT NULL REFERENCES chats (id) ON DELETE CASCADE,
                sender_id  UUID        NOT NULL,
                text       TEXT        NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE INDEX IF NOT EXISTS messages_chat_index
            ON messages (chat_id, created_at, id);
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE TABLE IF NOT EXISTS notifications (
                id          UUID              PRIMARY KEY,
                target_id   UUID              NOT NULL,
                actor_id    UUID              NOT NULL,
                target_type notification_kind NOT NULL,
                message     TEXT              NOT NULL,
                is_read     BOOLEAN           NOT NULL DEFAULT FALSE,
                created_at  TIMESTAMPTZ       NOT NULL DEFAULT NOW()
            );
        ",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "
            CREATE INDEX IF NOT EXISTS notifications_target_index
            ON notifications (target_id, created_at);
        ",
        )
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for PostgresStore {
    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        let created = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, role, full_name, avatar_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, role, full_name, avatar_url, created_at
            "#,
        )
        .bind(profile.id)
        .bind(profile.role)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, role, full_name, avatar_url, created_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn admin_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let admins = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, role, full_name, avatar_url, created_at
            FROM profiles
            WHERE role = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(Role::Admin)
        .fetch_all(&self.pool)
        .await?;

        Ok(admins)
    }

    /// New posts start pending, unapproved and available.
    async fn insert_post(&self, seller_id: Uuid, data: NewPost) -> Result<Post, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, seller_id, title, price, images, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, seller_id, title, price, images, category,
                      is_available, is_approved, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(&data.title)
        .bind(data.price)
        .bind(&data.images)
        .bind(&data.category)
        .fetch_one(&self.pool)
        .await?;

        Ok(post)
    }

    async fn post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, seller_id, title, price, images, category,
                   is_available, is_approved, status, created_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn list_posts(
        &self,
        filter: &BrowseFilter,
        page: &PaginationParams,
    ) -> Result<Vec<Post>, StoreError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, seller_id, title, price, images, category,
                   is_available, is_approved, status, created_at
            FROM posts
            WHERE is_approved = TRUE AND is_available = TRUE
            AND ($1::text IS NULL OR category = $1)
            AND ($2::text IS NULL OR strpos(lower(title), lower($2)) > 0)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filter.category)
        .bind(&filter.query)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    async fn posts_by_seller(&self, seller_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, seller_id, title, price, images, category,
                   is_available, is_approved, status, created_at
            FROM posts
            WHERE seller_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    async fn pending_posts(&self) -> Result<Vec<Post>, StoreError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, seller_id, title, price, images, category,
                   is_available, is_approved, status, created_at
            FROM posts
            WHERE status = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(ModerationStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    async fn update_post(&self, id: Uuid, data: PostPatch) -> Result<Option<Post>, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title        = COALESCE($2::text, title),
                price        = COALESCE($3::float8, price),
                images       = COALESCE($4::text[], images),
                category     = COALESCE($5::text, category),
                is_available = COALESCE($6::boolean, is_available)
            WHERE id = $1
            RETURNING id, seller_id, title, price, images, category,
                      is_available, is_approved, status, created_at
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(data.price)
        .bind(&data.images)
        .bind(&data.category)
        .bind(data.is_available)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn moderate_post(
        &self,
        id: Uuid,
        decision: ModerationDecision,
    ) -> Result<Option<ModerationOutcome<Post>>, StoreError> {
        let mut transaction = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, seller_id, title, price, images, category,
                   is_available, is_approved, status, created_at
            FROM posts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *transaction)
        .await?;

        let current = match current {
            Some(post) => post,
            None => return Ok(None),
        };

        let target = decision.target_status();
        let outcome = if current.status == ModerationStatus::Pending {
            let (approved, available) = match decision {
                ModerationDecision::Approve => (true, true),
                ModerationDecision::Reject => (false, false),
            };
            let updated = sqlx::query_as::<_, Post>(
                r#"
                UPDATE posts
                SET status = $2, is_approved = $3, is_available = $4
                WHERE id = $1
                RETURNING id, seller_id, title, price, images, category,
                          is_available, is_approved, status, created_at
                "#,
            )
            .bind(id)
            .bind(target)
            .bind(approved)
            .bind(available)
            .fetch_one(&mut *transaction)
            .await?;
            ModerationOutcome::Applied(updated)
        } else if current.status == target {
            ModerationOutcome::Unchanged(current)
        } else {
            ModerationOutcome::Denied(current.status)
        };

        transaction.commit().await?;
        Ok(Some(outcome))
    }

    async fn insert_request(
        &self,
        user_id: Uuid,
        data: NewRequest,
    ) -> Result<Request, StoreError> {
        let request = sqlx::query_as::<_, Request>(
            r#"
            INSERT INTO requests (id, user_id, title, description, category)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, title, description, category, upvotes, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.category)
        .fetch_one(&self.pool)
        .await?;

        Ok(request)
    }

    async fn request(&self, id: Uuid) -> Result<Option<Request>, StoreError> {
        let request = sqlx::query_as::<_, Request>(
            r#"
            SELECT id, user_id, title, description, category, upvotes, status, created_at
            FROM requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn list_requests(
        &self,
        filter: &BrowseFilter,
        page: &PaginationParams,
    ) -> Result<Vec<Request>, StoreError> {
        let requests = sqlx::query_as::<_, Request>(
            r#"
            SELECT id, user_id, title, description, category, upvotes, status, created_at
            FROM requests
            WHERE ($1::text IS NULL OR category = $1)
            AND ($2::text IS NULL OR strpos(lower(title), lower($2)) > 0)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filter.category)
        .bind(&filter.query)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn requests_by_owner(&self, user_id: Uuid) -> Result<Vec<Request>, StoreError> {
        let requests = sqlx::query_as::<_, Request>(
            r#"
            SELECT id, user_id, title, description, category, upvotes, status, created_at
            FROM requests
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn pending_requests(&self) -> Result<Vec<Request>, StoreError> {
        let requests = sqlx::query_as::<_, Request>(
            r#"
            SELECT id, user_id, title, description, category, upvotes, status, created_at
            FROM requests
            WHERE status = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(ModerationStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn update_request(
        &self,
        id: Uuid,
        data: RequestPatch,
    ) -> Result<Option<Request>, StoreError> {
        let request = sqlx::query_as::<_, Request>(
            r#"
            UPDATE requests
            SET title       = COALESCE($2::text, title),
                description = COALESCE($3::text, description),
                category    = COALESCE($4::text, category)
            WHERE id = $1
            RETURNING id, user_id, title, description, category, upvotes, status, created_at
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.category)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn delete_request(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn moderate_request(
        &self,
        id: Uuid,
        decision: ModerationDecision,
    ) -> Result<Option<ModerationOutcome<Request>>, StoreError> {
        let mut transaction = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Request>(
            r#"
            SELECT id, user_id, title, description, category, upvotes, status, created_at
            FROM requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *transaction)
        .await?;

        let current = match current {
            Some(request) => request,
            None => return Ok(None),
        };

        let target = decision.target_status();
        let outcome = if current.status == ModerationStatus::Pending {
            let updated = sqlx::query_as::<_, Request>(
                r#"
                UPDATE requests
                SET status = $2
                WHERE id = $1
                RETURNING id, user_id, title, description, category, upvotes, status, created_at
                "#,
            )
            .bind(id)
            .bind(target)
            .fetch_one(&mut *transaction)
            .await?;
            ModerationOutcome::Applied(updated)
        } else if current.status == target {
            ModerationOutcome::Unchanged(current)
        } else {
            ModerationOutcome::Denied(current.status)
        };

        transaction.commit().await?;
        Ok(Some(outcome))
    }

    /// Locks the request row first, which serializes every toggle touching
    /// the same request and keeps the counter equal to the row count.
    async fn toggle_upvote(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<UpvoteToggle>, StoreError> {
        let mut transaction = self.pool.begin().await?;

        let request = sqlx::query(
            r#"
            SELECT id
            FROM requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(request_id)
        .fetch_optional(&mut *transaction)
        .await?;

        if request.is_none() {
            return Ok(None);
        }

        let removed = sqlx::query(
            r#"
            DELETE FROM upvotes
            WHERE request_id = $1 AND user_id = $2
            "#,
        )
        .bind(request_id)
        .bind(user_id)
        .execute(&mut *transaction)
        .await?
        .rows_affected();

        let (state, upvotes) = if removed > 0 {
            let row = sqlx::query(
                r#"
                UPDATE requests
                SET upvotes = upvotes - 1
                WHERE id = $1
                RETURNING upvotes
                "#,
            )
            .bind(request_id)
            .fetch_one(&mut *transaction)
            .await?;
            (UpvoteState::Removed, row.get("upvotes"))
        } else {
            sqlx::query(
                r#"
                INSERT INTO upvotes (request_id, user_id)
                VALUES ($1, $2)
                "#,
            )
            .bind(request_id)
            .bind(user_id)
            .execute(&mut *transaction)
            .await?;
            let row = sqlx::query(
                r#"
                UPDATE requests
                SET upvotes = upvotes + 1
                WHERE id = $1
                RETURNING upvotes
                "#,
            )
            .bind(request_id)
            .fetch_one(&mut *transaction)
            .await?;
            (UpvoteState::Added, row.get("upvotes"))
        };

        transaction.commit().await?;
        Ok(Some(UpvoteToggle { state, upvotes }))
    }

    async fn has_upvoted(&self, request_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM upvotes WHERE request_id = $1 AND user_id = $2
            ) as exists
            "#,
        )
        .bind(request_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let exists: bool = row.get("exists");
        Ok(exists)
    }

    async fn upvote_count(&self, request_id: Uuid) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM upvotes
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.get("count");
        Ok(count)
    }

    /// Insert wins or loses against the pair index; the loser reads the
    /// winner's row back. Either way exactly one chat exists afterwards.
    async fn open_chat(&self, a: Uuid, b: Uuid) -> Result<(Chat, bool), StoreError> {
        let (low, high) = canonical_pair(a, b);

        let inserted = sqlx::query_as::<_, Chat>(
            r#"
            INSERT INTO chats (id, user_low, user_high)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_low, user_high) DO NOTHING
            RETURNING id, user_low, user_high, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(low)
        .bind(high)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(chat) = inserted {
            return Ok((chat, true));
        }

        let existing = sqlx::query_as::<_, Chat>(
            r#"
            SELECT id, user_low, user_high, created_at, updated_at
            FROM chats
            WHERE user_low = $1 AND user_high = $2
            "#,
        )
        .bind(low)
        .bind(high)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(chat) => Ok((chat, false)),
            None => Err(StoreError::Corrupted(
                "chat missing after conflicting insert".to_string(),
            )),
        }
    }

    async fn chat(&self, id: Uuid) -> Result<Option<Chat>, StoreError> {
        let chat = sqlx::query_as::<_, Chat>(
            r#"
            SELECT id, user_low, user_high, created_at, updated_at
            FROM chats
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(chat)
    }

    async fn chats_for_user(&self, user_id: Uuid) -> Result<Vec<ChatOverview>, StoreError> {
        let chats = sqlx::query_as::<_, Chat>(
            r#"
            SELECT id, user_low, user_high, created_at, updated_at
            FROM chats
            WHERE user_low = $1 OR user_high = $1
            ORDER BY updated_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if chats.is_empty() {
            return Ok(Vec::new());
        }

        let chat_ids: Vec<Uuid> = chats.iter().map(|chat| chat.id).collect();
        let latest = sqlx::query_as::<_, Message>(
            r#"
            SELECT DISTINCT ON (chat_id) id, chat_id, sender_id, text, created_at
            FROM messages
            WHERE chat_id = ANY($1)
            ORDER BY chat_id, created_at DESC, id DESC
            "#,
        )
        .bind(&chat_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_chat: HashMap<Uuid, Message> =
            latest.into_iter().map(|m| (m.chat_id, m)).collect();

        Ok(chats
            .into_iter()
            .map(|chat| {
                let last_message = by_chat.remove(&chat.id);
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
        let mut transaction = self.pool.begin().await?;

        let chat = sqlx::query(
            r#"
            SELECT id
            FROM chats
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(chat_id)
        .fetch_optional(&mut *transaction)
        .await?;

        if chat.is_none() {
            return Ok(None);
        }

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, chat_id, sender_id, text)
            VALUES ($1, $2, $3, $4)
            RETURNING id, chat_id, sender_id, text, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(chat_id)
        .bind(sender_id)
        .bind(&text)
        .fetch_one(&mut *transaction)
        .await?;

        sqlx::query(
            r#"
            UPDATE chats
            SET updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(chat_id)
        .bind(message.created_at)
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;
        Ok(Some(message))
    }

    async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, chat_id, sender_id, text, created_at
            FROM messages
            WHERE chat_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, chat_id, sender_id, text, created_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn delete_message(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut transaction = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT chat_id
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *transaction)
        .await?;

        let chat_id: Uuid = match row {
            Some(row) => row.get("chat_id"),
            None => return Ok(false),
        };

        // Same lock order as append_message: chat row first.
        sqlx::query(
            r#"
            SELECT id
            FROM chats
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(chat_id)
        .execute(&mut *transaction)
        .await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *transaction)
        .await?
        .rows_affected();

        sqlx::query(
            r#"
            UPDATE chats
            SET updated_at = COALESCE(
                (SELECT MAX(created_at) FROM messages WHERE chat_id = chats.id),
                chats.created_at
            )
            WHERE id = $1
            "#,
        )
        .bind(chat_id)
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;
        Ok(deleted > 0)
    }

    async fn insert_notification(
        &self,
        data: NewNotification,
    ) -> Result<Notification, StoreError> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, target_id, actor_id, target_type, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, target_id, actor_id, target_type, message, is_read, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.target_id)
        .bind(data.actor_id)
        .bind(data.kind)
        .bind(&data.message)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn notifications_for(&self, target_id: Uuid) -> Result<Vec<Notification>, StoreError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, target_id, actor_id, target_type, message, is_read, created_at
            FROM notifications
            WHERE target_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(target_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn notification(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, target_id, actor_id, target_type, message, is_read, created_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
    ) -> Result<Option<Notification>, StoreError> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE id = $1
            RETURNING id, target_id, actor_id, target_type, message, is_read, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }
}
