//! Pure delta computation for graph mutations.
//!
//! No I/O here: callers load the snapshot, ask for a delta, and persist it.
//! Counter arithmetic lives in this module so the mutator and the stores
//! agree on what a delta means.

use uuid::Uuid;

use crate::domain::models::{Account, FollowAction, FollowDelta, Post, ToggleDelta, ToggleKind};
use crate::error::GraphError;

/// Compute the signed follow delta for an actor/target pair.
///
/// `actor_follows_target` is the membership probe taken with the snapshot:
/// following an already-followed account and unfollowing a stranger are both
/// state errors, and self-relations are rejected before anything else.
pub fn follow_delta(
    actor: &Account,
    target: &Account,
    actor_follows_target: bool,
    action: FollowAction,
) -> Result<FollowDelta, GraphError> {
    if actor.id == target.id {
        return Err(GraphError::SelfRelation);
    }

    let step = match action {
        FollowAction::Follow if actor_follows_target => return Err(GraphError::AlreadyFollowing),
        FollowAction::Follow => 1,
        FollowAction::Unfollow if !actor_follows_target => return Err(GraphError::NotFollowing),
        FollowAction::Unfollow => -1,
    };

    Ok(FollowDelta {
        follower_id: actor.id,
        followee_id: target.id,
        step,
    })
}

/// Membership alone decides the toggle branch; a second toggle reverses the
/// first, so there is no error case.
pub fn toggle_delta(
    kind: ToggleKind,
    account_id: Uuid,
    post_id: Uuid,
    currently_on: bool,
) -> ToggleDelta {
    ToggleDelta {
        kind,
        account_id,
        post_id,
        turned_on: !currently_on,
    }
}

/// Apply a follow delta to in-memory entity copies, clamped at zero.
pub fn apply_follow_counters(actor: &mut Account, target: &mut Account, delta: &FollowDelta) {
    target.follower_count = (target.follower_count + delta.step).max(0);
    actor.following_count = (actor.following_count + delta.step).max(0);
}

/// Apply a toggle delta to in-memory entity copies, clamped at zero.
pub fn apply_toggle_counters(account: &mut Account, post: &mut Post, delta: &ToggleDelta) {
    let step = delta.step();
    match delta.kind {
        ToggleKind::Like => {
            post.like_count = (post.like_count + step).max(0);
            account.liked_count = (account.liked_count + step).max(0);
        }
        ToggleKind::Save => {
            post.save_count = (post.save_count + step).max(0);
            account.saved_count = (account.saved_count + step).max(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(username: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: username.to_string(),
            follower_count: 0,
            following_count: 0,
            liked_count: 0,
            saved_count: 0,
            post_count: 0,
            created_at: Utc::now(),
        }
    }

    fn post(author_id: Uuid) -> Post {
        Post {
            id: Uuid::new_v4(),
            author_id,
            caption: "caption".to_string(),
            location: None,
            like_count: 0,
            save_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn follow_produces_positive_step() {
        let a = account("ada");
        let b = account("ben");
        let delta = follow_delta(&a, &b, false, FollowAction::Follow).unwrap();
        assert_eq!(delta.follower_id, a.id);
        assert_eq!(delta.followee_id, b.id);
        assert_eq!(delta.step, 1);
    }

    #[test]
    fn unfollow_produces_negative_step() {
        let a = account("ada");
        let b = account("ben");
        let delta = follow_delta(&a, &b, true, FollowAction::Unfollow).unwrap();
        assert_eq!(delta.step, -1);
    }

    #[test]
    fn self_relation_is_rejected_for_both_actions() {
        let a = account("ada");
        for action in [FollowAction::Follow, FollowAction::Unfollow] {
            let err = follow_delta(&a, &a, false, action).unwrap_err();
            assert!(matches!(err, GraphError::SelfRelation));
        }
    }

    #[test]
    fn follow_when_already_following_is_rejected() {
        let a = account("ada");
        let b = account("ben");
        let err = follow_delta(&a, &b, true, FollowAction::Follow).unwrap_err();
        assert!(matches!(err, GraphError::AlreadyFollowing));
    }

    #[test]
    fn unfollow_when_not_following_is_rejected() {
        let a = account("ada");
        let b = account("ben");
        let err = follow_delta(&a, &b, false, FollowAction::Unfollow).unwrap_err();
        assert!(matches!(err, GraphError::NotFollowing));
    }

    #[test]
    fn toggle_branch_follows_membership() {
        let id = Uuid::new_v4();
        let post_id = Uuid::new_v4();

        let on = toggle_delta(ToggleKind::Like, id, post_id, false);
        assert!(on.turned_on);
        assert_eq!(on.step(), 1);

        let off = toggle_delta(ToggleKind::Like, id, post_id, true);
        assert!(!off.turned_on);
        assert_eq!(off.step(), -1);
    }

    #[test]
    fn counter_application_clamps_at_zero() {
        let mut a = account("ada");
        let mut b = account("ben");
        let delta = FollowDelta {
            follower_id: a.id,
            followee_id: b.id,
            step: -1,
        };
        apply_follow_counters(&mut a, &mut b, &delta);
        assert_eq!(a.following_count, 0);
        assert_eq!(b.follower_count, 0);
    }

    #[test]
    fn toggle_counters_touch_only_their_kind() {
        let mut a = account("ada");
        let mut p = post(a.id);
        let delta = toggle_delta(ToggleKind::Save, a.id, p.id, false);
        apply_toggle_counters(&mut a, &mut p, &delta);
        assert_eq!(p.save_count, 1);
        assert_eq!(a.saved_count, 1);
        assert_eq!(p.like_count, 0);
        assert_eq!(a.liked_count, 0);
    }
}
