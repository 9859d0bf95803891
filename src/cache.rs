//! Keyed cache of remote query results.
//!
//! One entry per logical query, addressed by a typed `QueryKey`. An entry is absent,
//! loading, resolved or failed, and a resolved entry may be marked stale by an
//! invalidation. Stale values are never handed out as fresh: the next read re-runs the
//! query. Writes are atomic per key; a resolving query only ever touches its own key.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::error::PortalError;
use crate::models::{PostId, Principal, RecruitmentPost, RecruitmentPostType, UserProfile, UserRole};

// --- Keys ---

/// QueryKey
///
/// Query name plus its canonical parameters. `Display` renders the familiar string form
/// (`post:7`, `postsByType:admitCard`) for logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKey {
    PublishedPosts,
    AllPosts,
    Post(PostId),
    PostsByType(RecruitmentPostType),
    PostsByTag(String),
    IsAdmin,
    CallerRole,
    CurrentUserProfile,
    UserProfile(Principal),
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::PublishedPosts => f.write_str("publishedPosts"),
            QueryKey::AllPosts => f.write_str("allPosts"),
            QueryKey::Post(id) => write!(f, "post:{}", id),
            QueryKey::PostsByType(post_type) => write!(f, "postsByType:{}", post_type),
            QueryKey::PostsByTag(tag) => write!(f, "postsByTag:{}", tag),
            QueryKey::IsAdmin => f.write_str("isAdmin"),
            QueryKey::CallerRole => f.write_str("callerRole"),
            QueryKey::CurrentUserProfile => f.write_str("currentUserProfile"),
            QueryKey::UserProfile(user) => write!(f, "userProfile:{}", user),
        }
    }
}

// --- Mutations ---

/// Mutation
///
/// Every write the client can perform, paired with the cache keys it invalidates on
/// success. A failed mutation invalidates nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreatePost,
    UpdatePost(PostId),
    PublishPost(PostId),
    UnpublishPost(PostId),
    DeletePost(PostId),
    SaveCallerProfile,
    AssignUserRole,
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::CreatePost => "createPost",
            Mutation::UpdatePost(_) => "updatePost",
            Mutation::PublishPost(_) => "publishPost",
            Mutation::UnpublishPost(_) => "unpublishPost",
            Mutation::DeletePost(_) => "deletePost",
            Mutation::SaveCallerProfile => "saveCallerUserProfile",
            Mutation::AssignUserRole => "assignCallerUserRole",
        }
    }

    /// The invalidation table.
    pub fn invalidates(&self) -> Vec<QueryKey> {
        match self {
            Mutation::CreatePost
            | Mutation::PublishPost(_)
            | Mutation::UnpublishPost(_)
            | Mutation::DeletePost(_) => vec![QueryKey::AllPosts, QueryKey::PublishedPosts],
            Mutation::UpdatePost(id) => vec![
                QueryKey::AllPosts,
                QueryKey::PublishedPosts,
                QueryKey::Post(*id),
            ],
            Mutation::SaveCallerProfile => vec![QueryKey::CurrentUserProfile],
            Mutation::AssignUserRole => vec![],
        }
    }

    /// Whether the invalidated keys describe the calling identity alone.
    pub fn is_caller_scoped(&self) -> bool {
        matches!(self, Mutation::SaveCallerProfile)
    }
}

// --- Values & States ---

/// CachedValue
///
/// What a resolved entry holds. Collections and posts sit behind `Arc` so readers share
/// one immutable snapshot; a refetch replaces the `Arc`, never its contents.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Posts(Arc<Vec<RecruitmentPost>>),
    Post(Option<Arc<RecruitmentPost>>),
    Flag(bool),
    Role(UserRole),
    Profile(Option<UserProfile>),
}

impl CachedValue {
    pub fn into_posts(self) -> Option<Arc<Vec<RecruitmentPost>>> {
        match self {
            CachedValue::Posts(posts) => Some(posts),
            _ => None,
        }
    }

    pub fn into_post(self) -> Option<Option<Arc<RecruitmentPost>>> {
        match self {
            CachedValue::Post(post) => Some(post),
            _ => None,
        }
    }

    pub fn into_flag(self) -> Option<bool> {
        match self {
            CachedValue::Flag(flag) => Some(flag),
            _ => None,
        }
    }

    pub fn into_role(self) -> Option<UserRole> {
        match self {
            CachedValue::Role(role) => Some(role),
            _ => None,
        }
    }

    pub fn into_profile(self) -> Option<Option<UserProfile>> {
        match self {
            CachedValue::Profile(profile) => Some(profile),
            _ => None,
        }
    }
}

/// QueryState
///
/// The result of a read as a consumer sees it.
/// - `Idle`: the query is not runnable yet (no connection, or a missing parameter).
/// - `Loading`: a fetch is in flight.
/// - `Ready`: resolved value; an empty collection is still `Ready`.
/// - `Failed`: the remote call errored.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    Idle,
    Loading,
    Ready(T),
    Failed(PortalError),
}

impl<T> QueryState<T> {
    /// Idle or loading: no answer yet.
    pub fn is_pending(&self) -> bool {
        matches!(self, QueryState::Idle | QueryState::Loading)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, QueryState::Failed(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            QueryState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            QueryState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        match self {
            QueryState::Idle => QueryState::Idle,
            QueryState::Loading => QueryState::Loading,
            QueryState::Ready(value) => QueryState::Ready(f(value)),
            QueryState::Failed(err) => QueryState::Failed(err),
        }
    }
}

impl QueryState<CachedValue> {
    /// Narrows an untyped state to the variant a typed query expects.
    pub fn typed<T>(self, extract: fn(CachedValue) -> Option<T>) -> QueryState<T> {
        match self {
            QueryState::Idle => QueryState::Idle,
            QueryState::Loading => QueryState::Loading,
            QueryState::Ready(value) => match extract(value) {
                Some(typed) => QueryState::Ready(typed),
                None => QueryState::Failed(PortalError::RequestFailed(
                    "cached value has an unexpected shape".to_string(),
                )),
            },
            QueryState::Failed(err) => QueryState::Failed(err),
        }
    }
}

/// EntryStatus
///
/// A point-in-time view of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryStatus {
    Absent,
    Loading,
    Resolved { value: CachedValue, stale: bool },
    Failed(PortalError),
}

impl EntryStatus {
    /// The state a poller should act on: stale values are reported as loading, since the
    /// next read will refetch them.
    pub fn as_query_state(&self) -> QueryState<CachedValue> {
        match self {
            EntryStatus::Absent => QueryState::Idle,
            EntryStatus::Loading | EntryStatus::Resolved { stale: true, .. } => QueryState::Loading,
            EntryStatus::Resolved { value, stale: false } => QueryState::Ready(value.clone()),
            EntryStatus::Failed(err) => QueryState::Failed(err.clone()),
        }
    }
}

// --- Entries ---

#[derive(Debug, Clone)]
enum Slot {
    Loading,
    Resolved(CachedValue),
    Failed(PortalError),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    slot: Slot,
    stale: bool,
    // Bumped by every invalidation of this key.
    epoch: u64,
    // Sequence number of the most recently started fetch.
    latest_fetch: u64,
}

/// FetchTicket
///
/// Handed out when a fetch starts; completing with it writes the result back only if no
/// newer fetch has started for the same key since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    epoch: u64,
    seq: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

/// QueryCache
///
/// The entries themselves. Callers never receive a mutable handle to a stored value; every
/// write replaces the entry's slot wholesale under the lock.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
    fetch_seq: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, key: &QueryKey) -> EntryStatus {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            None => EntryStatus::Absent,
            Some(entry) => match &entry.slot {
                Slot::Loading => EntryStatus::Loading,
                Slot::Resolved(value) => EntryStatus::Resolved {
                    value: value.clone(),
                    stale: entry.stale,
                },
                Slot::Failed(err) => EntryStatus::Failed(err.clone()),
            },
        }
    }

    /// The resolved, non-stale value under `key`, if any.
    pub fn fresh(&self, key: &QueryKey) -> Option<CachedValue> {
        match self.status(key) {
            EntryStatus::Resolved { value, stale: false } => Some(value),
            _ => None,
        }
    }

    /// begin
    ///
    /// Marks `key` as loading and returns the ticket the fetch must complete with. Any
    /// previous value is dropped from the entry: it is either stale or absent, so nobody
    /// may read it as fresh anyway.
    pub fn begin(&self, key: &QueryKey) -> FetchTicket {
        let seq = self.fetch_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(key.clone()).or_insert(CacheEntry {
            slot: Slot::Loading,
            stale: false,
            epoch: 0,
            latest_fetch: 0,
        });
        entry.slot = Slot::Loading;
        entry.stale = false;
        entry.latest_fetch = seq;
        FetchTicket {
            key: key.clone(),
            epoch: entry.epoch,
            seq,
        }
    }

    /// complete
    ///
    /// Writes a fetch result back. Returns `false` when the result was dropped because a
    /// newer fetch owns the key or the entry was cleared. A result whose key was
    /// invalidated while it was in flight is stored but marked stale.
    pub fn complete(&self, ticket: &FetchTicket, result: Result<CachedValue, PortalError>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get_mut(&ticket.key) else {
            return false;
        };
        if entry.latest_fetch != ticket.seq {
            tracing::debug!(key = %ticket.key, "dropping superseded fetch result");
            return false;
        }
        entry.stale = entry.epoch != ticket.epoch;
        entry.slot = match result {
            Ok(value) => Slot::Resolved(value),
            Err(err) => Slot::Failed(err),
        };
        true
    }

    /// Forgets a fetch that never reached the service, returning the key to absent.
    pub fn abandon(&self, ticket: &FetchTicket) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let owned = entries
            .get(&ticket.key)
            .is_some_and(|entry| entry.latest_fetch == ticket.seq);
        if owned {
            entries.remove(&ticket.key);
        }
    }

    /// invalidate
    ///
    /// Marks `key` stale so the next read refetches it. An in-flight fetch for the key will
    /// land stale as well. Absent keys are left alone.
    pub fn invalidate(&self, key: &QueryKey) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(key) {
            entry.epoch += 1;
            entry.stale = true;
            tracing::debug!(key = %key, "cache entry invalidated");
        }
    }

    /// Applies the invalidation table for a mutation that succeeded.
    pub fn apply(&self, mutation: &Mutation) {
        for key in mutation.invalidates() {
            self.invalidate(&key);
        }
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// --- Shared Invalidation ---

/// CacheGroup
///
/// The caches of every client in one registry. The remote data is the same for every
/// caller, so a mutation that succeeds through one client invalidates the affected keys
/// in all of them. Members are held weakly; a cache whose client is gone drops out.
#[derive(Debug, Default)]
pub struct CacheGroup {
    members: RwLock<Vec<Weak<QueryCache>>>,
}

impl CacheGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new cache that receives every invalidation applied to the group.
    pub fn join(&self) -> Arc<QueryCache> {
        let cache = Arc::new(QueryCache::new());
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        members.retain(|member| member.strong_count() > 0);
        members.push(Arc::downgrade(&cache));
        cache
    }

    /// Applies the invalidation table for `mutation` to every live member.
    pub fn apply(&self, mutation: &Mutation) {
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        members.retain(|member| match member.upgrade() {
            Some(cache) => {
                cache.apply(mutation);
                true
            }
            None => false,
        });
    }

    /// Number of member caches still in use.
    pub fn len(&self) -> usize {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|member| member.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
