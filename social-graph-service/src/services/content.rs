use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::{Account, Post};
use crate::error::{GraphError, GraphResult};
use crate::repository::RelationStore;

/// Thin account/post lifecycle around the relation store.
///
/// Creation and deletion live outside the graph mutations but maintain the
/// author's post counter the same way: the counter write commits with the
/// entity write.
#[derive(Clone)]
pub struct ContentService<S> {
    store: Arc<S>,
}

impl<S: RelationStore> ContentService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn register_account(
        &self,
        username: &str,
        display_name: &str,
    ) -> GraphResult<Account> {
        let username = username.trim();
        if username.is_empty() {
            return Err(GraphError::InvalidInput("username is required".into()));
        }
        if self.store.account_by_username(username).await?.is_some() {
            return Err(GraphError::InvalidInput("username is already taken".into()));
        }
        Ok(self.store.insert_account(username, display_name).await?)
    }

    pub async fn account_by_username(&self, username: &str) -> GraphResult<Account> {
        self.store
            .account_by_username(username)
            .await?
            .ok_or_else(|| GraphError::NotFound("account".to_string()))
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        caption: &str,
        location: Option<&str>,
    ) -> GraphResult<Post> {
        self.store
            .account(author_id)
            .await?
            .ok_or_else(|| GraphError::NotFound("account".to_string()))?;
        Ok(self.store.insert_post(author_id, caption, location).await?)
    }

    /// Delete a post the actor authored. Toggle rows referencing the post are
    /// left behind; the read model skips them.
    pub async fn delete_post(&self, actor_id: Uuid, post_id: Uuid) -> GraphResult<Uuid> {
        let post = self
            .store
            .post(post_id)
            .await?
            .ok_or_else(|| GraphError::NotFound("post".to_string()))?;
        let actor = self
            .store
            .account(actor_id)
            .await?
            .ok_or_else(|| GraphError::NotFound("account".to_string()))?;

        if post.author_id != actor.id {
            return Err(GraphError::NotAuthor);
        }

        self.store.delete_post(post_id).await?;
        Ok(post_id)
    }
}
