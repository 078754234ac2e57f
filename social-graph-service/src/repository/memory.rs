use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::models::{Account, FollowDelta, Post, ToggleDelta, ToggleKind, ToggleRelation};
use crate::repository::RelationStore;

#[derive(Debug, Clone)]
struct FollowEdge {
    follower_id: Uuid,
    followee_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    // Posts keep insertion order so newest-first windows are deterministic
    // even when wall-clock timestamps collide.
    posts: Vec<Post>,
    follows: Vec<FollowEdge>,
    toggles: Vec<ToggleRelation>,
}

/// In-memory relation store backing the test suite.
///
/// Mutations run as two independently applied writes without a surrounding
/// transaction: the relation row is written before the entity counters on
/// turn-on and after them on turn-off, so an interrupted sequence leaves an
/// orphaned row rather than a counter with no backing record.
#[derive(Default)]
pub struct InMemoryRelationStore {
    inner: Mutex<State>,
}

impl InMemoryRelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of toggle rows currently held, orphans included.
    pub fn toggle_row_count(&self) -> usize {
        self.lock().toggles.len()
    }
}

fn window<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl RelationStore for InMemoryRelationStore {
    async fn account(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.lock().accounts.get(&id).cloned())
    }

    async fn account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let state = self.lock();
        Ok(state
            .accounts
            .values()
            .find(|a| a.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn post(&self, id: Uuid) -> Result<Option<Post>> {
        let state = self.lock();
        Ok(state.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let state = self.lock();
        Ok(state
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.followee_id == followee_id))
    }

    async fn is_toggled(&self, kind: ToggleKind, account_id: Uuid, post_id: Uuid) -> Result<bool> {
        let state = self.lock();
        Ok(state
            .toggles
            .iter()
            .any(|t| t.kind == kind && t.account_id == account_id && t.post_id == post_id))
    }

    async fn insert_account(&self, username: &str, display_name: &str) -> Result<Account> {
        let account = Account {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            follower_count: 0,
            following_count: 0,
            liked_count: 0,
            saved_count: 0,
            post_count: 0,
            created_at: Utc::now(),
        };
        self.lock().accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn insert_post(
        &self,
        author_id: Uuid,
        caption: &str,
        location: Option<&str>,
    ) -> Result<Post> {
        let post = Post {
            id: Uuid::new_v4(),
            author_id,
            caption: caption.to_string(),
            location: location.map(str::to_string),
            like_count: 0,
            save_count: 0,
            created_at: Utc::now(),
        };

        let mut state = self.lock();
        state.posts.push(post.clone());
        if let Some(author) = state.accounts.get_mut(&author_id) {
            author.post_count += 1;
        }
        Ok(post)
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        let mut state = self.lock();
        let Some(index) = state.posts.iter().position(|p| p.id == post_id) else {
            return Ok(false);
        };
        let post = state.posts.remove(index);
        if let Some(author) = state.accounts.get_mut(&post.author_id) {
            author.post_count = (author.post_count - 1).max(0);
        }
        // Toggle rows for the post stay behind as orphans.
        Ok(true)
    }

    async fn apply_follow(&self, delta: &FollowDelta) -> Result<bool> {
        let mut state = self.lock();

        if delta.step > 0 {
            let exists = state
                .follows
                .iter()
                .any(|f| f.follower_id == delta.follower_id && f.followee_id == delta.followee_id);
            if exists {
                return Ok(false);
            }
            state.follows.push(FollowEdge {
                follower_id: delta.follower_id,
                followee_id: delta.followee_id,
                created_at: Utc::now(),
            });
        } else {
            let before = state.follows.len();
            state
                .follows
                .retain(|f| !(f.follower_id == delta.follower_id && f.followee_id == delta.followee_id));
            if state.follows.len() == before {
                return Ok(false);
            }
        }

        if let Some(target) = state.accounts.get_mut(&delta.followee_id) {
            target.follower_count = (target.follower_count + delta.step).max(0);
        }
        if let Some(actor) = state.accounts.get_mut(&delta.follower_id) {
            actor.following_count = (actor.following_count + delta.step).max(0);
        }
        Ok(true)
    }

    async fn apply_toggle(&self, delta: &ToggleDelta) -> Result<bool> {
        let mut state = self.lock();

        let present = state
            .toggles
            .iter()
            .any(|t| {
                t.kind == delta.kind
                    && t.account_id == delta.account_id
                    && t.post_id == delta.post_id
            });

        if delta.turned_on {
            if present {
                return Ok(false);
            }
            // Join row first: a crash here leaves an orphan, not a dangling counter.
            state.toggles.push(ToggleRelation {
                id: Uuid::new_v4(),
                kind: delta.kind,
                account_id: delta.account_id,
                post_id: delta.post_id,
                created_at: Utc::now(),
            });
            bump_toggle_counters(&mut state, delta);
        } else {
            if !present {
                return Ok(false);
            }
            // Counters first, join row last, for the same crash ordering.
            bump_toggle_counters(&mut state, delta);
            state.toggles.retain(|t| {
                !(t.kind == delta.kind
                    && t.account_id == delta.account_id
                    && t.post_id == delta.post_id)
            });
        }
        Ok(true)
    }

    async fn followers_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64)> {
        let state = self.lock();
        let ids: Vec<Uuid> = state
            .follows
            .iter()
            .rev()
            .filter(|f| f.followee_id == account_id)
            .map(|f| f.follower_id)
            .collect();
        let total = ids.len() as i64;
        let items = window(ids, limit, offset)
            .into_iter()
            .filter_map(|id| state.accounts.get(&id).cloned())
            .collect();
        Ok((items, total))
    }

    async fn following_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64)> {
        let state = self.lock();
        let ids: Vec<Uuid> = state
            .follows
            .iter()
            .rev()
            .filter(|f| f.follower_id == account_id)
            .map(|f| f.followee_id)
            .collect();
        let total = ids.len() as i64;
        let items = window(ids, limit, offset)
            .into_iter()
            .filter_map(|id| state.accounts.get(&id).cloned())
            .collect();
        Ok((items, total))
    }

    async fn posts_by_author_page(
        &self,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Post>, i64)> {
        let state = self.lock();
        let posts: Vec<Post> = state
            .posts
            .iter()
            .rev()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .collect();
        let total = posts.len() as i64;
        Ok((window(posts, limit, offset), total))
    }

    async fn recent_posts_page(&self, limit: i64, offset: i64) -> Result<(Vec<Post>, i64)> {
        let state = self.lock();
        let posts: Vec<Post> = state.posts.iter().rev().cloned().collect();
        let total = posts.len() as i64;
        Ok((window(posts, limit, offset), total))
    }

    async fn feed_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Post>, i64)> {
        let state = self.lock();
        let followees: Vec<Uuid> = state
            .follows
            .iter()
            .filter(|f| f.follower_id == account_id)
            .map(|f| f.followee_id)
            .collect();
        let posts: Vec<Post> = state
            .posts
            .iter()
            .rev()
            .filter(|p| followees.contains(&p.author_id))
            .cloned()
            .collect();
        let total = posts.len() as i64;
        Ok((window(posts, limit, offset), total))
    }

    async fn toggled_posts_page(
        &self,
        kind: ToggleKind,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Post>, i64)> {
        let state = self.lock();
        // Orphaned rows (post gone) are dropped before counting or windowing.
        let posts: Vec<Post> = state
            .toggles
            .iter()
            .rev()
            .filter(|t| t.kind == kind && t.account_id == account_id)
            .filter_map(|t| state.posts.iter().find(|p| p.id == t.post_id).cloned())
            .collect();
        let total = posts.len() as i64;
        Ok((window(posts, limit, offset), total))
    }

    async fn search_accounts_page(
        &self,
        term: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64)> {
        let state = self.lock();
        let needle = term.to_lowercase();
        let mut matches: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| {
                a.username.to_lowercase().contains(&needle)
                    || a.display_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.username.cmp(&b.username));
        let total = matches.len() as i64;
        Ok((window(matches, limit, offset), total))
    }
}

fn bump_toggle_counters(state: &mut State, delta: &ToggleDelta) {
    let step = delta.step();
    if let Some(post) = state.posts.iter_mut().find(|p| p.id == delta.post_id) {
        match delta.kind {
            ToggleKind::Like => post.like_count = (post.like_count + step).max(0),
            ToggleKind::Save => post.save_count = (post.save_count + step).max(0),
        }
    }
    if let Some(account) = state.accounts.get_mut(&delta.account_id) {
        match delta.kind {
            ToggleKind::Like => account.liked_count = (account.liked_count + step).max(0),
            ToggleKind::Save => account.saved_count = (account.saved_count + step).max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_follow_edge_is_not_written_twice() {
        let store = InMemoryRelationStore::new();
        let a = store.insert_account("ada", "Ada").await.unwrap();
        let b = store.insert_account("ben", "Ben").await.unwrap();

        let delta = FollowDelta {
            follower_id: a.id,
            followee_id: b.id,
            step: 1,
        };
        assert!(store.apply_follow(&delta).await.unwrap());
        assert!(!store.apply_follow(&delta).await.unwrap());

        let b = store.account(b.id).await.unwrap().unwrap();
        assert_eq!(b.follower_count, 1);
    }

    #[tokio::test]
    async fn toggle_off_without_a_row_changes_nothing() {
        let store = InMemoryRelationStore::new();
        let a = store.insert_account("ada", "Ada").await.unwrap();
        let post = store.insert_post(a.id, "first", None).await.unwrap();

        let delta = ToggleDelta {
            kind: ToggleKind::Like,
            account_id: a.id,
            post_id: post.id,
            turned_on: false,
        };
        assert!(!store.apply_toggle(&delta).await.unwrap());

        let post = store.post(post.id).await.unwrap().unwrap();
        let a = store.account(a.id).await.unwrap().unwrap();
        assert_eq!(post.like_count, 0);
        assert_eq!(a.liked_count, 0);
    }
}
