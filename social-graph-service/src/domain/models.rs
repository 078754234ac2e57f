use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account entity with denormalized relationship counters.
///
/// Each counter mirrors the cardinality of its backing relation set
/// (follows or post_toggles rows) between operations.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub follower_count: i64,
    pub following_count: i64,
    pub liked_count: i64,
    pub saved_count: i64,
    pub post_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Post entity - the target of like/save toggles.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub caption: String,
    pub location: Option<String>,
    pub like_count: i64,
    pub save_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Join row representing "this account currently likes/saves this post".
/// Created on toggle-on, deleted on toggle-off; it has no update path.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ToggleRelation {
    pub id: Uuid,
    pub kind: ToggleKind,
    pub account_id: Uuid,
    pub post_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// The two toggle relations an account can hold against a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "toggle_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ToggleKind {
    Like,
    Save,
}

impl ToggleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleKind::Like => "like",
            ToggleKind::Save => "save",
        }
    }
}

/// Direction of a follow mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowAction {
    Follow,
    Unfollow,
}

/// Signed follow mutation: +1 adds the edge and bumps both counters,
/// -1 removes it and decrements them.
#[derive(Debug, Clone, Copy)]
pub struct FollowDelta {
    pub follower_id: Uuid,
    pub followee_id: Uuid,
    pub step: i64,
}

/// Toggle mutation with the membership branch already decided.
#[derive(Debug, Clone, Copy)]
pub struct ToggleDelta {
    pub kind: ToggleKind,
    pub account_id: Uuid,
    pub post_id: Uuid,
    pub turned_on: bool,
}

impl ToggleDelta {
    pub fn step(&self) -> i64 {
        if self.turned_on {
            1
        } else {
            -1
        }
    }
}
