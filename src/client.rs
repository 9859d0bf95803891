//! The remote cache layer's entry point.
//!
//! `PortalClient` owns one caller's actor connection and query cache. Reads go through
//! the cache and only reach the service when no fresh value exists; mutations always go
//! to the service and, on success only, invalidate the keys listed in the invalidation
//! table.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;

use crate::auth::{Identity, Session};
use crate::cache::{CacheGroup, CachedValue, EntryStatus, Mutation, QueryCache, QueryKey, QueryState};
use crate::error::PortalError;
use crate::models::{PostId, PostInput, Principal, RecruitmentPost, RecruitmentPostType, UserProfile, UserRole};
use crate::service::{ConnectorState, ServiceState};

/// Transport
///
/// Connection state of the caller's actor. Queries only run while `Connected`.
#[derive(Clone)]
pub enum Transport {
    Connecting,
    Connected(ServiceState),
    Unavailable(PortalError),
}

/// PortalClient
///
/// One caller session against the remote service: identity, actor connection and cache.
/// Nothing here is a global; the BFF keeps one client per identity. A client that belongs
/// to a `CacheGroup` spreads the invalidations of its successful mutations to the rest of
/// the group.
pub struct PortalClient {
    identity: Identity,
    connector: ConnectorState,
    transport: RwLock<Transport>,
    cache: Arc<QueryCache>,
    group: Option<Arc<CacheGroup>>,
}

impl PortalClient {
    pub fn new(identity: Identity, connector: ConnectorState) -> Self {
        Self {
            identity,
            connector,
            transport: RwLock::new(Transport::Connecting),
            cache: Arc::new(QueryCache::new()),
            group: None,
        }
    }

    /// A client whose cache is a member of `group`.
    pub fn in_group(identity: Identity, connector: ConnectorState, group: Arc<CacheGroup>) -> Self {
        Self {
            identity,
            connector,
            transport: RwLock::new(Transport::Connecting),
            cache: group.join(),
            group: Some(group),
        }
    }

    /// connect
    ///
    /// Resolves the actor for this client's identity. While the identity is still
    /// initializing there is nobody to connect as, so the client stays `Connecting`.
    pub async fn connect(&self) -> Result<(), PortalError> {
        if !self.identity.is_resolved() {
            return Ok(());
        }

        let outcome = self.connector.connect(self.identity.principal()).await;
        let mut transport = self.transport.write().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(service) => {
                *transport = Transport::Connected(service);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not connect to remote service");
                *transport = Transport::Unavailable(err.clone());
                Err(err)
            }
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn is_connected(&self) -> bool {
        self.service().is_some()
    }

    fn service(&self) -> Option<ServiceState> {
        match &*self.transport.read().unwrap_or_else(PoisonError::into_inner) {
            Transport::Connected(service) => Some(service.clone()),
            _ => None,
        }
    }

    /// session
    ///
    /// The caller context as the admin gate consumes it, read from the cache without
    /// triggering a fetch.
    pub fn session(&self) -> Session {
        let is_admin = if self.is_connected() {
            self.cache
                .status(&QueryKey::IsAdmin)
                .as_query_state()
                .typed(CachedValue::into_flag)
        } else {
            QueryState::Idle
        };
        Session::new(self.identity.clone(), is_admin)
    }

    /// Polls one entry without fetching.
    pub fn peek(&self, key: &QueryKey) -> EntryStatus {
        self.cache.status(key)
    }

    // --- Query Execution ---

    /// query
    ///
    /// Fetch-on-read for one key. Serves a fresh cached value when there is one; otherwise
    /// runs `fetch` against the connected actor and stores the outcome. A lost connection
    /// leaves the key absent and reports `Idle` rather than a failure.
    async fn query<F, Fut>(&self, key: QueryKey, fetch: F) -> QueryState<CachedValue>
    where
        F: FnOnce(ServiceState) -> Fut,
        Fut: Future<Output = Result<CachedValue, PortalError>>,
    {
        let Some(service) = self.service() else {
            return QueryState::Idle;
        };

        if let Some(value) = self.cache.fresh(&key) {
            tracing::debug!(key = %key, "cache hit");
            return QueryState::Ready(value);
        }

        tracing::debug!(key = %key, "cache miss, fetching");
        let ticket = self.cache.begin(&key);
        match fetch(service).await {
            Ok(value) => {
                self.cache.complete(&ticket, Ok(value.clone()));
                QueryState::Ready(value)
            }
            Err(PortalError::TransportUnavailable) => {
                tracing::warn!(key = %key, "transport unavailable, query not run");
                self.cache.abandon(&ticket);
                QueryState::Idle
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "query failed");
                self.cache.complete(&ticket, Err(err.clone()));
                QueryState::Failed(err)
            }
        }
    }

    pub async fn published_posts(&self) -> QueryState<Arc<Vec<RecruitmentPost>>> {
        self.query(QueryKey::PublishedPosts, |service| async move {
            let posts = service.get_published_posts().await?;
            Ok(CachedValue::Posts(Arc::new(posts)))
        })
        .await
        .typed(CachedValue::into_posts)
    }

    /// Privileged listing of every post regardless of status.
    pub async fn all_posts(&self) -> QueryState<Arc<Vec<RecruitmentPost>>> {
        self.query(QueryKey::AllPosts, |service| async move {
            let posts = service.get_all_posts().await?;
            Ok(CachedValue::Posts(Arc::new(posts)))
        })
        .await
        .typed(CachedValue::into_posts)
    }

    /// Runnable only with an id; `None` (a missing route parameter) stays `Idle`.
    pub async fn post(&self, id: Option<PostId>) -> QueryState<Option<Arc<RecruitmentPost>>> {
        let Some(id) = id else {
            return QueryState::Idle;
        };
        self.query(QueryKey::Post(id), move |service| async move {
            let post = service.get_post_by_id(id).await?;
            Ok(CachedValue::Post(post.map(Arc::new)))
        })
        .await
        .typed(CachedValue::into_post)
    }

    pub async fn posts_by_type(
        &self,
        post_type: RecruitmentPostType,
    ) -> QueryState<Arc<Vec<RecruitmentPost>>> {
        self.query(QueryKey::PostsByType(post_type), move |service| async move {
            let posts = service.get_posts_by_type(post_type).await?;
            Ok(CachedValue::Posts(Arc::new(posts)))
        })
        .await
        .typed(CachedValue::into_posts)
    }

    /// Runnable only with a non-empty tag.
    pub async fn posts_by_tag(&self, tag: &str) -> QueryState<Arc<Vec<RecruitmentPost>>> {
        if tag.is_empty() {
            return QueryState::Idle;
        }
        let tag = tag.to_string();
        self.query(QueryKey::PostsByTag(tag.clone()), move |service| async move {
            let posts = service.search_posts_by_tag(&tag).await?;
            Ok(CachedValue::Posts(Arc::new(posts)))
        })
        .await
        .typed(CachedValue::into_posts)
    }

    pub async fn is_admin(&self) -> QueryState<bool> {
        self.query(QueryKey::IsAdmin, |service| async move {
            Ok(CachedValue::Flag(service.is_caller_admin().await?))
        })
        .await
        .typed(CachedValue::into_flag)
    }

    pub async fn caller_role(&self) -> QueryState<UserRole> {
        self.query(QueryKey::CallerRole, |service| async move {
            Ok(CachedValue::Role(service.get_caller_user_role().await?))
        })
        .await
        .typed(CachedValue::into_role)
    }

    pub async fn caller_profile(&self) -> QueryState<Option<UserProfile>> {
        self.query(QueryKey::CurrentUserProfile, |service| async move {
            Ok(CachedValue::Profile(service.get_caller_user_profile().await?))
        })
        .await
        .typed(CachedValue::into_profile)
    }

    pub async fn user_profile(&self, user: &Principal) -> QueryState<Option<UserProfile>> {
        let user = user.clone();
        self.query(QueryKey::UserProfile(user.clone()), move |service| async move {
            Ok(CachedValue::Profile(service.get_user_profile(&user).await?))
        })
        .await
        .typed(CachedValue::into_profile)
    }

    // --- Mutations ---

    /// mutate
    ///
    /// Runs one write against the actor. Only a successful write touches the cache; a
    /// failed one returns its error with every entry exactly as it was.
    async fn mutate<T, F, Fut>(&self, mutation: Mutation, run: F) -> Result<T, PortalError>
    where
        F: FnOnce(ServiceState) -> Fut,
        Fut: Future<Output = Result<T, PortalError>>,
    {
        let service = self.service().ok_or(PortalError::TransportUnavailable)?;
        match run(service).await {
            Ok(value) => {
                match &self.group {
                    Some(group) if !mutation.is_caller_scoped() => group.apply(&mutation),
                    _ => self.cache.apply(&mutation),
                }
                tracing::info!(mutation = mutation.name(), "mutation applied");
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(mutation = mutation.name(), error = %err, "mutation failed");
                Err(err)
            }
        }
    }

    pub async fn create_post(&self, input: PostInput) -> Result<PostId, PortalError> {
        input.validate()?;
        self.mutate(Mutation::CreatePost, |service| async move {
            service.create_post(input).await
        })
        .await
    }

    pub async fn update_post(&self, id: PostId, input: PostInput) -> Result<(), PortalError> {
        input.validate()?;
        self.mutate(Mutation::UpdatePost(id), move |service| async move {
            service.update_post(id, input).await
        })
        .await
    }

    pub async fn publish_post(&self, id: PostId) -> Result<(), PortalError> {
        self.mutate(Mutation::PublishPost(id), move |service| async move {
            service.publish_post(id).await
        })
        .await
    }

    pub async fn unpublish_post(&self, id: PostId) -> Result<(), PortalError> {
        self.mutate(Mutation::UnpublishPost(id), move |service| async move {
            service.unpublish_post(id).await
        })
        .await
    }

    pub async fn delete_post(&self, id: PostId) -> Result<(), PortalError> {
        self.mutate(Mutation::DeletePost(id), move |service| async move {
            service.delete_post(id).await
        })
        .await
    }

    pub async fn save_caller_profile(&self, profile: UserProfile) -> Result<(), PortalError> {
        if profile.name.trim().is_empty() {
            return Err(PortalError::ValidationViolation { field: "name" });
        }
        self.mutate(Mutation::SaveCallerProfile, |service| async move {
            service.save_caller_user_profile(profile).await
        })
        .await
    }

    pub async fn assign_user_role(&self, user: Principal, role: UserRole) -> Result<(), PortalError> {
        self.mutate(Mutation::AssignUserRole, move |service| async move {
            service.assign_caller_user_role(&user, role).await
        })
        .await
    }
}

/// ViewScope
///
/// The lifetime of one consumer of query results. Once unmounted, results that resolve
/// later are not delivered to it; the cache still keeps them for other readers.
#[derive(Debug, Clone, Default)]
pub struct ViewScope {
    token: CancellationToken,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unmount(&self) {
        self.token.cancel();
    }

    pub fn is_mounted(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Awaits `pending` to completion and hands the result over only if the scope is still
    /// mounted at that point.
    pub async fn deliver<T>(&self, pending: impl Future<Output = T>) -> Option<T> {
        let value = pending.await;
        if self.token.is_cancelled() {
            tracing::debug!("view unmounted before its query resolved, result not delivered");
            return None;
        }
        Some(value)
    }
}

/// Upper bound on cached clients when none is configured.
pub const DEFAULT_MAX_CLIENTS: usize = 1024;

struct RegistryEntry {
    client: Arc<PortalClient>,
    // Registry clock reading at the last hand-out.
    last_used: AtomicU64,
}

/// ClientRegistry
///
/// One `PortalClient` per caller identity, so caller-scoped entries such as `isAdmin` or
/// `currentUserProfile` never leak between identities. All clients share one
/// `CacheGroup`, so a post mutation by one caller is seen by every other caller's next
/// read. At most `capacity` clients are kept; the least recently used one is evicted to
/// make room.
pub struct ClientRegistry {
    connector: ConnectorState,
    group: Arc<CacheGroup>,
    capacity: usize,
    clients: RwLock<HashMap<Identity, RegistryEntry>>,
    clock: AtomicU64,
}

impl ClientRegistry {
    pub fn new(connector: ConnectorState) -> Self {
        Self::with_capacity(connector, DEFAULT_MAX_CLIENTS)
    }

    pub fn with_capacity(connector: ConnectorState, capacity: usize) -> Self {
        Self {
            connector,
            group: Arc::new(CacheGroup::new()),
            capacity: capacity.max(1),
            clients: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// client_for
    ///
    /// Returns the client for `identity`, creating and connecting it on first use. A client
    /// whose connection attempt failed is not kept, so the next request retries.
    pub async fn client_for(&self, identity: &Identity) -> Arc<PortalClient> {
        let existing = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .map(|entry| {
                entry.last_used.store(self.tick(), Ordering::Relaxed);
                entry.client.clone()
            });
        if let Some(client) = existing {
            return client;
        }

        let client = Arc::new(PortalClient::in_group(
            identity.clone(),
            self.connector.clone(),
            self.group.clone(),
        ));
        if client.connect().await.is_err() || !identity.is_resolved() {
            return client;
        }

        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = clients.get(identity) {
            // Another request connected the same identity first.
            entry.last_used.store(self.tick(), Ordering::Relaxed);
            return entry.client.clone();
        }
        if clients.len() >= self.capacity {
            let idle = clients
                .iter()
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(identity, _)| identity.clone());
            if let Some(idle) = idle {
                clients.remove(&idle);
                tracing::debug!(identity = ?idle, "evicted least recently used client");
            }
        }
        clients.insert(
            identity.clone(),
            RegistryEntry {
                client: client.clone(),
                last_used: AtomicU64::new(self.tick()),
            },
        );
        client
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
