use pagination::{Page, PageRequest};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::{Account, Post, ToggleKind};
use crate::error::{GraphError, GraphResult};
use crate::repository::RelationStore;

/// Paginated read model over the relation store.
///
/// Every listing fetches one window plus an independent total count; the pair
/// carries no shared-snapshot guarantee under concurrent writes.
#[derive(Clone)]
pub struct BrowseService<S> {
    store: Arc<S>,
}

impl<S: RelationStore> BrowseService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn followers(
        &self,
        account_id: Uuid,
        page: &PageRequest,
    ) -> GraphResult<Page<Account>> {
        self.ensure_account(account_id).await?;
        let (items, total) = self
            .store
            .followers_page(account_id, page.limit() as i64, page.offset() as i64)
            .await?;
        Ok(Page::assemble(items, total.max(0) as u64, page))
    }

    pub async fn following(
        &self,
        account_id: Uuid,
        page: &PageRequest,
    ) -> GraphResult<Page<Account>> {
        self.ensure_account(account_id).await?;
        let (items, total) = self
            .store
            .following_page(account_id, page.limit() as i64, page.offset() as i64)
            .await?;
        Ok(Page::assemble(items, total.max(0) as u64, page))
    }

    pub async fn account_posts(
        &self,
        author_id: Uuid,
        page: &PageRequest,
    ) -> GraphResult<Page<Post>> {
        self.ensure_account(author_id).await?;
        let (items, total) = self
            .store
            .posts_by_author_page(author_id, page.limit() as i64, page.offset() as i64)
            .await?;
        Ok(Page::assemble(items, total.max(0) as u64, page))
    }

    pub async fn recent_posts(&self, page: &PageRequest) -> GraphResult<Page<Post>> {
        let (items, total) = self
            .store
            .recent_posts_page(page.limit() as i64, page.offset() as i64)
            .await?;
        Ok(Page::assemble(items, total.max(0) as u64, page))
    }

    /// Posts authored by accounts the caller follows, newest first.
    pub async fn feed(&self, account_id: Uuid, page: &PageRequest) -> GraphResult<Page<Post>> {
        self.ensure_account(account_id).await?;
        let (items, total) = self
            .store
            .feed_page(account_id, page.limit() as i64, page.offset() as i64)
            .await?;
        Ok(Page::assemble(items, total.max(0) as u64, page))
    }

    pub async fn liked_posts(
        &self,
        account_id: Uuid,
        page: &PageRequest,
    ) -> GraphResult<Page<Post>> {
        self.toggled_posts(ToggleKind::Like, account_id, page).await
    }

    pub async fn saved_posts(
        &self,
        account_id: Uuid,
        page: &PageRequest,
    ) -> GraphResult<Page<Post>> {
        self.toggled_posts(ToggleKind::Save, account_id, page).await
    }

    /// Posts the account has liked or saved, newest toggle first. Join rows
    /// whose post has since been deleted are skipped, never an error.
    pub async fn toggled_posts(
        &self,
        kind: ToggleKind,
        account_id: Uuid,
        page: &PageRequest,
    ) -> GraphResult<Page<Post>> {
        self.ensure_account(account_id).await?;
        let (items, total) = self
            .store
            .toggled_posts_page(kind, account_id, page.limit() as i64, page.offset() as i64)
            .await?;
        Ok(Page::assemble(items, total.max(0) as u64, page))
    }

    /// Case-insensitive substring search over username and display name.
    pub async fn search_accounts(
        &self,
        term: &str,
        page: &PageRequest,
    ) -> GraphResult<Page<Account>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(GraphError::InvalidInput("search term is required".into()));
        }
        let (items, total) = self
            .store
            .search_accounts_page(term, page.limit() as i64, page.offset() as i64)
            .await?;
        Ok(Page::assemble(items, total.max(0) as u64, page))
    }

    async fn ensure_account(&self, id: Uuid) -> GraphResult<()> {
        self.store
            .account(id)
            .await?
            .map(|_| ())
            .ok_or_else(|| GraphError::NotFound("account".to_string()))
    }
}
