use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::domain::models::{Account, FollowDelta, Post, ToggleDelta, ToggleKind};
use crate::repository::RelationStore;

const ACCOUNT_COLUMNS: &str = "id, username, display_name, follower_count, following_count, \
     liked_count, saved_count, post_count, created_at";

const POST_COLUMNS: &str = "id, author_id, caption, location, like_count, save_count, created_at";

/// PostgreSQL relation store (source of truth).
///
/// Graph mutations commit the relation-row write and both counter updates in
/// one transaction, with the relation-row write guarded so a concurrent
/// duplicate request leaves counters untouched.
#[derive(Clone)]
pub struct PostgresRelationStore {
    pool: PgPool,
}

impl PostgresRelationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a connection pool and verify it with a probe query.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .test_before_acquire(true)
            .connect(&config.url)
            .await
            .context("failed to connect to PostgreSQL")?;

        tokio::time::timeout(
            Duration::from_secs(config.connect_timeout_secs),
            sqlx::query("SELECT 1").execute(&pool),
        )
        .await
        .context("database verification timed out")?
        .context("database verification query failed")?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "database pool created and verified"
        );

        Ok(Self { pool })
    }

    /// Run the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run database migrations")?;
        info!("database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RelationStore for PostgresRelationStore {
    async fn account(&self, id: Uuid) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load account")?;

        Ok(account)
    }

    async fn account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE LOWER(username) = LOWER($1)"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load account by username")?;

        Ok(account)
    }

    async fn post(&self, id: Uuid) -> Result<Option<Post>> {
        let post =
            sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("failed to load post")?;

        Ok(post)
    }

    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(&self.pool)
        .await
        .context("failed to check follow edge")?;

        Ok(exists)
    }

    async fn is_toggled(&self, kind: ToggleKind, account_id: Uuid, post_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM post_toggles
                WHERE kind = $1 AND account_id = $2 AND post_id = $3
            )
            "#,
        )
        .bind(kind)
        .bind(account_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await
        .context("failed to check toggle relation")?;

        Ok(exists)
    }

    async fn insert_account(&self, username: &str, display_name: &str) -> Result<Account> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (id, username, display_name, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert account")?;

        debug!(account_id = %account.id, username, "inserted account");
        Ok(account)
    }

    async fn insert_post(
        &self,
        author_id: Uuid,
        caption: &str,
        location: Option<&str>,
    ) -> Result<Post> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin insert-post transaction")?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (id, author_id, caption, location, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(author_id)
        .bind(caption)
        .bind(location)
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert post")?;

        sqlx::query("UPDATE accounts SET post_count = post_count + 1 WHERE id = $1")
            .bind(author_id)
            .execute(&mut *tx)
            .await
            .context("failed to bump author post count")?;

        tx.commit()
            .await
            .context("failed to commit insert-post transaction")?;

        debug!(post_id = %post.id, author_id = %author_id, "inserted post");
        Ok(post)
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin delete-post transaction")?;

        // Toggle rows referencing the post stay behind; every liked/saved
        // listing joins through to live posts and never sees them.
        let author: Option<(Uuid,)> =
            sqlx::query_as("DELETE FROM posts WHERE id = $1 RETURNING author_id")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await
                .context("failed to delete post")?;

        let Some((author_id,)) = author else {
            tx.rollback()
                .await
                .context("failed to roll back delete-post transaction")?;
            return Ok(false);
        };

        sqlx::query("UPDATE accounts SET post_count = GREATEST(post_count - 1, 0) WHERE id = $1")
            .bind(author_id)
            .execute(&mut *tx)
            .await
            .context("failed to decrement author post count")?;

        tx.commit()
            .await
            .context("failed to commit delete-post transaction")?;

        debug!(post_id = %post_id, author_id = %author_id, "deleted post");
        Ok(true)
    }

    async fn apply_follow(&self, delta: &FollowDelta) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin follow transaction")?;

        let changed = if delta.step > 0 {
            sqlx::query(
                r#"
                INSERT INTO follows (id, follower_id, followee_id, created_at)
                VALUES ($1, $2, $3, NOW())
                ON CONFLICT (follower_id, followee_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(delta.follower_id)
            .bind(delta.followee_id)
            .execute(&mut *tx)
            .await
            .context("failed to insert follow edge")?
            .rows_affected()
                > 0
        } else {
            sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
                .bind(delta.follower_id)
                .bind(delta.followee_id)
                .execute(&mut *tx)
                .await
                .context("failed to delete follow edge")?
                .rows_affected()
                > 0
        };

        if !changed {
            tx.rollback()
                .await
                .context("failed to roll back follow transaction")?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE accounts SET follower_count = GREATEST(follower_count + $2, 0) WHERE id = $1",
        )
        .bind(delta.followee_id)
        .bind(delta.step)
        .execute(&mut *tx)
        .await
        .context("failed to update follower count")?;

        sqlx::query(
            "UPDATE accounts SET following_count = GREATEST(following_count + $2, 0) WHERE id = $1",
        )
        .bind(delta.follower_id)
        .bind(delta.step)
        .execute(&mut *tx)
        .await
        .context("failed to update following count")?;

        tx.commit()
            .await
            .context("failed to commit follow transaction")?;

        debug!(
            follower_id = %delta.follower_id,
            followee_id = %delta.followee_id,
            step = delta.step,
            "applied follow delta"
        );
        Ok(true)
    }

    async fn apply_toggle(&self, delta: &ToggleDelta) -> Result<bool> {
        let (post_column, account_column) = match delta.kind {
            ToggleKind::Like => ("like_count", "liked_count"),
            ToggleKind::Save => ("save_count", "saved_count"),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin toggle transaction")?;

        let changed = if delta.turned_on {
            sqlx::query(
                r#"
                INSERT INTO post_toggles (id, kind, account_id, post_id, created_at)
                VALUES ($1, $2, $3, $4, NOW())
                ON CONFLICT (kind, account_id, post_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(delta.kind)
            .bind(delta.account_id)
            .bind(delta.post_id)
            .execute(&mut *tx)
            .await
            .context("failed to insert toggle relation")?
            .rows_affected()
                > 0
        } else {
            sqlx::query(
                "DELETE FROM post_toggles WHERE kind = $1 AND account_id = $2 AND post_id = $3",
            )
            .bind(delta.kind)
            .bind(delta.account_id)
            .bind(delta.post_id)
            .execute(&mut *tx)
            .await
            .context("failed to delete toggle relation")?
            .rows_affected()
                > 0
        };

        if !changed {
            tx.rollback()
                .await
                .context("failed to roll back toggle transaction")?;
            return Ok(false);
        }

        let step = delta.step();

        sqlx::query(&format!(
            "UPDATE posts SET {post_column} = GREATEST({post_column} + $2, 0) WHERE id = $1"
        ))
        .bind(delta.post_id)
        .bind(step)
        .execute(&mut *tx)
        .await
        .context("failed to update post toggle count")?;

        sqlx::query(&format!(
            "UPDATE accounts SET {account_column} = GREATEST({account_column} + $2, 0) WHERE id = $1"
        ))
        .bind(delta.account_id)
        .bind(step)
        .execute(&mut *tx)
        .await
        .context("failed to update account toggle count")?;

        tx.commit()
            .await
            .context("failed to commit toggle transaction")?;

        debug!(
            kind = delta.kind.as_str(),
            account_id = %delta.account_id,
            post_id = %delta.post_id,
            turned_on = delta.turned_on,
            "applied toggle delta"
        );
        Ok(true)
    }

    async fn followers_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64)> {
        let effective_limit = limit.min(10_000);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE followee_id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await
            .context("failed to count followers")?;

        let items = sqlx::query_as::<_, Account>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS_QUALIFIED}
            FROM follows f
            JOIN accounts a ON a.id = f.follower_id
            WHERE f.followee_id = $1
            ORDER BY f.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            ACCOUNT_COLUMNS_QUALIFIED = qualified_account_columns()
        ))
        .bind(account_id)
        .bind(effective_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch followers page")?;

        Ok((items, total))
    }

    async fn following_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64)> {
        let effective_limit = limit.min(10_000);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await
            .context("failed to count following")?;

        let items = sqlx::query_as::<_, Account>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS_QUALIFIED}
            FROM follows f
            JOIN accounts a ON a.id = f.followee_id
            WHERE f.follower_id = $1
            ORDER BY f.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            ACCOUNT_COLUMNS_QUALIFIED = qualified_account_columns()
        ))
        .bind(account_id)
        .bind(effective_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch following page")?;

        Ok((items, total))
    }

    async fn posts_by_author_page(
        &self,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Post>, i64)> {
        let effective_limit = limit.min(10_000);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await
            .context("failed to count author posts")?;

        let items = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE author_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(author_id)
        .bind(effective_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch author posts page")?;

        Ok((items, total))
    }

    async fn recent_posts_page(&self, limit: i64, offset: i64) -> Result<(Vec<Post>, i64)> {
        let effective_limit = limit.min(10_000);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .context("failed to count posts")?;

        let items = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(effective_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch recent posts page")?;

        Ok((items, total))
    }

    async fn feed_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Post>, i64)> {
        let effective_limit = limit.min(10_000);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM posts p
            JOIN follows f ON f.followee_id = p.author_id
            WHERE f.follower_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .context("failed to count feed posts")?;

        let items = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS_QUALIFIED}
            FROM posts p
            JOIN follows f ON f.followee_id = p.author_id
            WHERE f.follower_id = $1
            ORDER BY p.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            POST_COLUMNS_QUALIFIED = qualified_post_columns()
        ))
        .bind(account_id)
        .bind(effective_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch feed page")?;

        Ok((items, total))
    }

    async fn toggled_posts_page(
        &self,
        kind: ToggleKind,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Post>, i64)> {
        let effective_limit = limit.min(10_000);

        // Both queries join through to live posts, so orphaned join rows
        // (post deleted after the toggle) affect neither the count nor the window.
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM post_toggles t
            JOIN posts p ON p.id = t.post_id
            WHERE t.kind = $1 AND t.account_id = $2
            "#,
        )
        .bind(kind)
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .context("failed to count toggled posts")?;

        let items = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS_QUALIFIED}
            FROM post_toggles t
            JOIN posts p ON p.id = t.post_id
            WHERE t.kind = $1 AND t.account_id = $2
            ORDER BY t.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            POST_COLUMNS_QUALIFIED = qualified_post_columns()
        ))
        .bind(kind)
        .bind(account_id)
        .bind(effective_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch toggled posts page")?;

        Ok((items, total))
    }

    async fn search_accounts_page(
        &self,
        term: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64)> {
        let effective_limit = limit.min(10_000);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM accounts
            WHERE username ILIKE '%' || $1 || '%' OR display_name ILIKE '%' || $1 || '%'
            "#,
        )
        .bind(term)
        .fetch_one(&self.pool)
        .await
        .context("failed to count matching accounts")?;

        let items = sqlx::query_as::<_, Account>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}
            FROM accounts
            WHERE username ILIKE '%' || $1 || '%' OR display_name ILIKE '%' || $1 || '%'
            ORDER BY username ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(term)
        .bind(effective_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch matching accounts page")?;

        Ok((items, total))
    }
}

fn qualified_account_columns() -> String {
    ACCOUNT_COLUMNS
        .split(", ")
        .map(|c| format!("a.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn qualified_post_columns() -> String {
    POST_COLUMNS
        .split(", ")
        .map(|c| format!("p.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
