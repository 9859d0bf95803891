//! Page view-models.
//!
//! Each page reads through a `PortalClient` and runs the pure transforms over whatever
//! came back. A failed read is reported through `ViewStatus::Unavailable` and renders as an
//! empty listing; it never escalates into an error response.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::cache::QueryState;
use crate::client::PortalClient;
use crate::editor::PostDraft;
use crate::models::{PostId, PostInput, RecruitmentPost, RecruitmentPostType};
use crate::query_state::ListingParams;
use crate::transforms::{self, HOME_FEED_SIZE};

/// ViewStatus
///
/// Where a page's underlying read stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ViewStatus {
    Loading,
    Ready,
    Unavailable,
}

impl ViewStatus {
    pub fn of<T>(state: &QueryState<T>) -> Self {
        match state {
            QueryState::Idle | QueryState::Loading => ViewStatus::Loading,
            QueryState::Ready(_) => ViewStatus::Ready,
            QueryState::Failed(_) => ViewStatus::Unavailable,
        }
    }
}

/// The fetched collection, or nothing when the read has not produced one.
fn posts_or_empty(state: &QueryState<Arc<Vec<RecruitmentPost>>>) -> &[RecruitmentPost] {
    state.data().map(|posts| posts.as_slice()).unwrap_or(&[])
}

/// Facets
///
/// Filter choices offered next to a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Facets {
    pub years: Vec<String>,
    pub tags: Vec<String>,
}

impl Facets {
    pub fn of(posts: &[RecruitmentPost]) -> Self {
        Self {
            years: transforms::available_years(posts),
            tags: transforms::available_tags(posts),
        }
    }
}

// --- Public Pages ---

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HomeView {
    pub status: ViewStatus,
    pub posts: Vec<RecruitmentPost>,
}

impl HomeView {
    /// The newest published posts.
    pub fn build(published: &QueryState<Arc<Vec<RecruitmentPost>>>) -> Self {
        Self {
            status: ViewStatus::of(published),
            posts: transforms::latest(posts_or_empty(published), HOME_FEED_SIZE),
        }
    }

    pub async fn load(client: &PortalClient) -> Self {
        Self::build(&client.published_posts().await)
    }
}

/// CategoryView
///
/// One category listing. `category_empty` tells an empty category apart from a listing
/// that the current filters emptied.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    pub status: ViewStatus,
    pub post_type: RecruitmentPostType,
    pub params: ListingParams,
    pub facets: Facets,
    pub posts: Vec<RecruitmentPost>,
    pub category_empty: bool,
}

impl CategoryView {
    /// Built from the published collection: the category set is narrowed locally so that
    /// facets reflect every post of the category, not only the filtered ones.
    pub fn build(
        published: &QueryState<Arc<Vec<RecruitmentPost>>>,
        post_type: RecruitmentPostType,
        params: ListingParams,
    ) -> Self {
        let category = transforms::posts_of_type(posts_or_empty(published), post_type);
        Self {
            status: ViewStatus::of(published),
            post_type,
            facets: Facets::of(&category),
            posts: transforms::apply_listing(&category, &params),
            category_empty: category.is_empty(),
            params,
        }
    }

    pub async fn load(
        client: &PortalClient,
        post_type: RecruitmentPostType,
        params: ListingParams,
    ) -> Self {
        Self::build(&client.published_posts().await, post_type, params)
    }
}

/// SearchView
///
/// Free-text search over published posts. With an empty query there is no result list
/// at all, which is different from a query that matched nothing.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SearchView {
    pub status: ViewStatus,
    pub query: String,
    pub params: ListingParams,
    pub facets: Facets,
    pub posts: Option<Vec<RecruitmentPost>>,
}

impl SearchView {
    pub fn build(
        published: &QueryState<Arc<Vec<RecruitmentPost>>>,
        query: &str,
        params: ListingParams,
    ) -> Self {
        let query = query.trim();
        if query.is_empty() {
            return Self {
                status: ViewStatus::of(published),
                query: String::new(),
                params,
                facets: Facets::default(),
                posts: None,
            };
        }

        let results = transforms::search_posts(posts_or_empty(published), query);
        Self {
            status: ViewStatus::of(published),
            query: query.to_string(),
            facets: Facets::of(&results),
            posts: Some(transforms::apply_listing(&results, &params)),
            params,
        }
    }

    pub async fn load(client: &PortalClient, query: &str, params: ListingParams) -> Self {
        Self::build(&client.published_posts().await, query, params)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PostDetailView {
    pub status: ViewStatus,
    pub post: Option<RecruitmentPost>,
}

impl PostDetailView {
    pub fn build(state: &QueryState<Option<Arc<RecruitmentPost>>>) -> Self {
        Self {
            status: ViewStatus::of(state),
            post: state.data().and_then(|post| post.as_deref().cloned()),
        }
    }

    pub async fn load(client: &PortalClient, id: PostId) -> Self {
        Self::build(&client.post(Some(id)).await)
    }

    /// The read succeeded and the service had no such post (or will not show it to us).
    pub fn is_not_found(&self) -> bool {
        self.status == ViewStatus::Ready && self.post.is_none()
    }
}

// --- Admin Pages ---

/// AdminDashboardView
///
/// Every post regardless of status, newest first, with per-status counts.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboardView {
    pub status: ViewStatus,
    pub posts: Vec<RecruitmentPost>,
    pub published_count: usize,
    pub draft_count: usize,
}

impl AdminDashboardView {
    pub fn build(all: &QueryState<Arc<Vec<RecruitmentPost>>>) -> Self {
        let posts = transforms::latest(posts_or_empty(all), usize::MAX);
        let published_count = posts.iter().filter(|post| post.is_published()).count();
        Self {
            status: ViewStatus::of(all),
            draft_count: posts.len() - published_count,
            published_count,
            posts,
        }
    }

    pub async fn load(client: &PortalClient) -> Self {
        Self::build(&client.all_posts().await)
    }
}

/// AdminEditView
///
/// The editor's starting point for an existing post, looked up in the full listing.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminEditView {
    pub status: ViewStatus,
    pub post_id: PostId,
    pub draft: Option<PostInput>,
}

impl AdminEditView {
    pub fn build(all: &QueryState<Arc<Vec<RecruitmentPost>>>, id: PostId) -> Self {
        let draft = posts_or_empty(all)
            .iter()
            .find(|post| post.id == id)
            .map(|post| PostDraft::from_post(post).input().clone());
        Self {
            status: ViewStatus::of(all),
            post_id: id,
            draft,
        }
    }

    pub async fn load(client: &PortalClient, id: PostId) -> Self {
        Self::build(&client.all_posts().await, id)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == ViewStatus::Ready && self.draft.is_none()
    }
}
