use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::error::PortalError;
use crate::models::{
    PostId, PostInput, PostStatus, Principal, RecruitmentPost, RecruitmentPostType, UserProfile, UserRole,
};
use crate::service::{RemoteService, ServiceConnector, ServiceState};

/// Store
///
/// Everything the in-memory service holds. Posts are keyed by id so listings come out in
/// creation order, the way the remote service returns them.
#[derive(Default)]
struct Store {
    posts: BTreeMap<PostId, RecruitmentPost>,
    next_id: PostId,
    profiles: HashMap<Principal, UserProfile>,
    roles: HashMap<Principal, UserRole>,
    last_tick: Option<DateTime<Utc>>,
    failing: bool,
    calls: HashMap<&'static str, usize>,
}

impl Store {
    /// Wall-clock time, clamped so that timestamps never move backwards.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = match self.last_tick {
            Some(last) if last > Utc::now() => last,
            _ => Utc::now(),
        };
        self.last_tick = Some(now);
        now
    }

    fn record(&mut self, operation: &'static str) -> Result<(), PortalError> {
        *self.calls.entry(operation).or_default() += 1;
        if self.failing {
            return Err(PortalError::RequestFailed(format!(
                "{}: simulated failure",
                operation
            )));
        }
        Ok(())
    }

    fn role_of(&self, caller: Option<&Principal>) -> UserRole {
        match caller {
            None => UserRole::Guest,
            Some(principal) => self.roles.get(principal).copied().unwrap_or(UserRole::User),
        }
    }

    fn require_admin(&self, caller: Option<&Principal>) -> Result<(), PortalError> {
        if self.role_of(caller) == UserRole::Admin {
            Ok(())
        } else {
            Err(PortalError::RequestFailed(
                "Unauthorized: only admins can perform this action".to_string(),
            ))
        }
    }

    fn published(&self) -> impl Iterator<Item = &RecruitmentPost> {
        self.posts.values().filter(|post| post.is_published())
    }

    fn post_mut(&mut self, id: PostId) -> Result<&mut RecruitmentPost, PortalError> {
        self.posts
            .get_mut(&id)
            .ok_or_else(|| PortalError::RequestFailed(format!("Post {} not found", id)))
    }
}

// 3. The In-Memory Implementation (Local runs and tests)
/// InMemoryBackend
///
/// A process-local stand-in for the remote data service. It enforces the same rules the
/// real service does (admin-only mutations, published-only public reads, monotonic
/// timestamps) so the cache layer can be exercised without a network. `set_failing`
/// simulates a service that rejects every call.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<RwLock<Store>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// An actor bound to `caller`, sharing this backend's state.
    pub fn actor(&self, caller: Option<Principal>) -> InMemoryActor {
        InMemoryActor {
            store: self.store.clone(),
            caller,
        }
    }

    pub async fn grant_role(&self, principal: Principal, role: UserRole) {
        self.store.write().await.roles.insert(principal, role);
    }

    /// Inserts a post verbatim (id and timestamps included). Later creates get ids above it.
    pub async fn seed_post(&self, post: RecruitmentPost) {
        let mut store = self.store.write().await;
        store.next_id = store.next_id.max(post.id + 1);
        store.posts.insert(post.id, post);
    }

    /// Holds every service call until the returned guard is dropped.
    pub async fn pause(&self) -> PausedBackend {
        PausedBackend {
            _store: self.store.clone().write_owned().await,
        }
    }

    pub async fn set_failing(&self, failing: bool) {
        self.store.write().await.failing = failing;
    }

    /// How many times `operation` (camelCase service name) has been called.
    pub async fn call_count(&self, operation: &str) -> usize {
        self.store.read().await.calls.get(operation).copied().unwrap_or(0)
    }

    pub async fn post(&self, id: PostId) -> Option<RecruitmentPost> {
        self.store.read().await.posts.get(&id).cloned()
    }
}

/// PausedBackend
///
/// Returned by `InMemoryBackend::pause`; calls resume once it is dropped.
pub struct PausedBackend {
    _store: OwnedRwLockWriteGuard<Store>,
}

#[async_trait]
impl ServiceConnector for InMemoryBackend {
    async fn connect(&self, identity: Option<&Principal>) -> Result<ServiceState, PortalError> {
        Ok(Arc::new(self.actor(identity.cloned())))
    }
}

/// InMemoryActor
///
/// One caller's view of an `InMemoryBackend`.
#[derive(Clone)]
pub struct InMemoryActor {
    store: Arc<RwLock<Store>>,
    caller: Option<Principal>,
}

#[async_trait]
impl RemoteService for InMemoryActor {
    async fn get_published_posts(&self) -> Result<Vec<RecruitmentPost>, PortalError> {
        let mut store = self.store.write().await;
        store.record("getPublishedPosts")?;
        Ok(store.published().cloned().collect())
    }

    async fn get_all_posts(&self) -> Result<Vec<RecruitmentPost>, PortalError> {
        let mut store = self.store.write().await;
        store.record("getAllPosts")?;
        store.require_admin(self.caller.as_ref())?;
        Ok(store.posts.values().cloned().collect())
    }

    async fn get_post_by_id(&self, id: PostId) -> Result<Option<RecruitmentPost>, PortalError> {
        let mut store = self.store.write().await;
        store.record("getPostById")?;
        let is_admin = store.role_of(self.caller.as_ref()) == UserRole::Admin;
        Ok(store
            .posts
            .get(&id)
            .filter(|post| is_admin || post.is_published())
            .cloned())
    }

    async fn get_posts_by_type(
        &self,
        post_type: RecruitmentPostType,
    ) -> Result<Vec<RecruitmentPost>, PortalError> {
        let mut store = self.store.write().await;
        store.record("getPostsByType")?;
        Ok(store
            .published()
            .filter(|post| post.post_type == post_type)
            .cloned()
            .collect())
    }

    async fn search_posts_by_tag(&self, tag: &str) -> Result<Vec<RecruitmentPost>, PortalError> {
        let mut store = self.store.write().await;
        store.record("searchPostsByTag")?;
        Ok(store
            .published()
            .filter(|post| post.tags.iter().any(|t| t == tag))
            .cloned()
            .collect())
    }

    async fn create_post(&self, input: PostInput) -> Result<PostId, PortalError> {
        let mut store = self.store.write().await;
        store.record("createPost")?;
        store.require_admin(self.caller.as_ref())?;
        let id = store.next_id;
        store.next_id += 1;
        let now = store.tick();
        store.posts.insert(id, RecruitmentPost::from_input(id, input, now));
        Ok(id)
    }

    async fn update_post(&self, id: PostId, input: PostInput) -> Result<(), PortalError> {
        let mut store = self.store.write().await;
        store.record("updatePost")?;
        store.require_admin(self.caller.as_ref())?;
        let now = store.tick();
        let post = store.post_mut(id)?;
        // Last write wins: no version check against concurrent edits.
        *post = RecruitmentPost {
            status: post.status,
            created_at: post.created_at,
            updated_at: now.max(post.updated_at),
            ..RecruitmentPost::from_input(id, input, now)
        };
        Ok(())
    }

    async fn publish_post(&self, id: PostId) -> Result<(), PortalError> {
        set_status(self, "publishPost", id, PostStatus::Published).await
    }

    async fn unpublish_post(&self, id: PostId) -> Result<(), PortalError> {
        set_status(self, "unpublishPost", id, PostStatus::Draft).await
    }

    async fn delete_post(&self, id: PostId) -> Result<(), PortalError> {
        let mut store = self.store.write().await;
        store.record("deletePost")?;
        store.require_admin(self.caller.as_ref())?;
        store
            .posts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PortalError::RequestFailed(format!("Post {} not found", id)))
    }

    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, PortalError> {
        let mut store = self.store.write().await;
        store.record("getCallerUserProfile")?;
        Ok(self
            .caller
            .as_ref()
            .and_then(|caller| store.profiles.get(caller).cloned()))
    }

    async fn save_caller_user_profile(&self, profile: UserProfile) -> Result<(), PortalError> {
        let mut store = self.store.write().await;
        store.record("saveCallerUserProfile")?;
        let caller = self.caller.clone().ok_or_else(|| {
            PortalError::RequestFailed("Unauthorized: anonymous callers have no profile".to_string())
        })?;
        store.profiles.insert(caller, profile);
        Ok(())
    }

    async fn get_user_profile(&self, user: &Principal) -> Result<Option<UserProfile>, PortalError> {
        let mut store = self.store.write().await;
        store.record("getUserProfile")?;
        Ok(store.profiles.get(user).cloned())
    }

    async fn is_caller_admin(&self) -> Result<bool, PortalError> {
        let mut store = self.store.write().await;
        store.record("isCallerAdmin")?;
        Ok(store.role_of(self.caller.as_ref()) == UserRole::Admin)
    }

    async fn get_caller_user_role(&self) -> Result<UserRole, PortalError> {
        let mut store = self.store.write().await;
        store.record("getCallerUserRole")?;
        Ok(store.role_of(self.caller.as_ref()))
    }

    async fn assign_caller_user_role(&self, user: &Principal, role: UserRole) -> Result<(), PortalError> {
        let mut store = self.store.write().await;
        store.record("assignCallerUserRole")?;
        store.require_admin(self.caller.as_ref())?;
        store.roles.insert(user.clone(), role);
        Ok(())
    }
}

async fn set_status(
    actor: &InMemoryActor,
    operation: &'static str,
    id: PostId,
    status: PostStatus,
) -> Result<(), PortalError> {
    let mut store = actor.store.write().await;
    store.record(operation)?;
    store.require_admin(actor.caller.as_ref())?;
    let now = store.tick();
    let post = store.post_mut(id)?;
    post.status = status;
    post.updated_at = now.max(post.updated_at);
    Ok(())
}
