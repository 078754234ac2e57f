pub mod memory;
pub mod postgres;

pub use memory::InMemoryRelationStore;
pub use postgres::PostgresRelationStore;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::{Account, FollowDelta, Post, ToggleDelta, ToggleKind};

/// Interface to the relation store.
///
/// The PostgreSQL implementation is the production store; the in-memory
/// implementation backs the test suite. Windowed read methods return the
/// window plus the total count of the unwindowed query; the two are computed
/// independently and may race concurrent writers.
#[async_trait]
pub trait RelationStore: Send + Sync {
    // Point lookups
    async fn account(&self, id: Uuid) -> Result<Option<Account>>;
    async fn account_by_username(&self, username: &str) -> Result<Option<Account>>;
    async fn post(&self, id: Uuid) -> Result<Option<Post>>;

    // Membership probes
    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool>;
    async fn is_toggled(&self, kind: ToggleKind, account_id: Uuid, post_id: Uuid) -> Result<bool>;

    // Entity lifecycle
    async fn insert_account(&self, username: &str, display_name: &str) -> Result<Account>;

    /// Inserts the post and bumps the author's post count in one store operation.
    async fn insert_post(
        &self,
        author_id: Uuid,
        caption: &str,
        location: Option<&str>,
    ) -> Result<Post>;

    /// Deletes the post row and decrements the author's post count. Toggle
    /// rows referencing the post are left behind as orphans; the read model
    /// skips them. Returns false when the post was already gone.
    async fn delete_post(&self, post_id: Uuid) -> Result<bool>;

    // Graph mutations
    /// Applies a follow delta: the edge write plus both counter updates.
    /// The edge write is conditional; returns false when the edge was already
    /// in the requested state and nothing was written.
    async fn apply_follow(&self, delta: &FollowDelta) -> Result<bool>;

    /// Applies a toggle delta: the join-row write plus both counter updates.
    /// Returns false when the join row was already in the requested state.
    async fn apply_toggle(&self, delta: &ToggleDelta) -> Result<bool>;

    // Windowed read model: (window, total count)
    async fn followers_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64)>;

    async fn following_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64)>;

    async fn posts_by_author_page(
        &self,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Post>, i64)>;

    async fn recent_posts_page(&self, limit: i64, offset: i64) -> Result<(Vec<Post>, i64)>;

    /// Posts authored by accounts the given account follows, newest first.
    async fn feed_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Post>, i64)>;

    /// Posts the account has toggled with `kind`, newest toggle first.
    /// Joins through to live posts only, so orphaned join rows are skipped.
    async fn toggled_posts_page(
        &self,
        kind: ToggleKind,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Post>, i64)>;

    /// Case-insensitive substring search over username and display name.
    async fn search_accounts_page(
        &self,
        term: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64)>;
}
