use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::{Account, FollowAction, Post, ToggleKind};
use crate::error::{GraphError, GraphResult};
use crate::repository::RelationStore;
use crate::services::deltas;

/// Outcome of a follow or unfollow mutation: both updated entities.
#[derive(Debug, Clone, Serialize)]
pub struct FollowOutcome {
    pub actor: Account,
    pub target: Account,
}

/// Outcome of a toggle mutation.
#[derive(Debug, Clone, Serialize)]
pub struct ToggleOutcome {
    pub account: Account,
    pub post: Post,
    pub turned_on: bool,
}

/// Mutates the social graph one relation at a time.
///
/// Each operation is a load / compute / persist sequence over the relation
/// store: both affected entities are loaded, the delta is computed from that
/// snapshot, and the store applies the relation write together with both
/// counter updates. The store-side write is conditional, so a request that
/// lost a race against an identical one observes "nothing changed" instead of
/// double-counting.
#[derive(Clone)]
pub struct GraphService<S> {
    store: Arc<S>,
}

impl<S: RelationStore> GraphService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn follow(&self, actor_id: Uuid, target_id: Uuid) -> GraphResult<FollowOutcome> {
        self.apply_follow_action(actor_id, target_id, FollowAction::Follow)
            .await
    }

    pub async fn unfollow(&self, actor_id: Uuid, target_id: Uuid) -> GraphResult<FollowOutcome> {
        self.apply_follow_action(actor_id, target_id, FollowAction::Unfollow)
            .await
    }

    async fn apply_follow_action(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
        action: FollowAction,
    ) -> GraphResult<FollowOutcome> {
        let mut actor = self.load_account(actor_id).await?;
        let mut target = self.load_account(target_id).await?;
        let related = self.store.is_following(actor_id, target_id).await?;

        let delta = deltas::follow_delta(&actor, &target, related, action)?;

        if !self.store.apply_follow(&delta).await? {
            // An identical request won the race between the probe and the write.
            return Err(match action {
                FollowAction::Follow => GraphError::AlreadyFollowing,
                FollowAction::Unfollow => GraphError::NotFollowing,
            });
        }

        deltas::apply_follow_counters(&mut actor, &mut target, &delta);
        Ok(FollowOutcome { actor, target })
    }

    /// Flip the given relation between the account and the post. Membership
    /// alone decides the direction; calling twice restores the initial state.
    pub async fn toggle(
        &self,
        kind: ToggleKind,
        actor_id: Uuid,
        post_id: Uuid,
    ) -> GraphResult<ToggleOutcome> {
        let mut account = self.load_account(actor_id).await?;
        let mut post = self.load_post(post_id).await?;
        let currently_on = self.store.is_toggled(kind, actor_id, post_id).await?;

        let delta = deltas::toggle_delta(kind, actor_id, post_id, currently_on);

        if self.store.apply_toggle(&delta).await? {
            deltas::apply_toggle_counters(&mut account, &mut post, &delta);
        } else {
            // A concurrent identical toggle already moved the relation to the
            // requested state; re-read so the outcome carries real counters.
            account = self.load_account(actor_id).await?;
            post = self.load_post(post_id).await?;
        }

        Ok(ToggleOutcome {
            account,
            post,
            turned_on: delta.turned_on,
        })
    }

    async fn load_account(&self, id: Uuid) -> GraphResult<Account> {
        self.store
            .account(id)
            .await?
            .ok_or_else(|| GraphError::NotFound("account".to_string()))
    }

    async fn load_post(&self, id: Uuid) -> GraphResult<Post> {
        self.store
            .post(id)
            .await?
            .ok_or_else(|| GraphError::NotFound("post".to_string()))
    }
}
