use async_trait::async_trait;
use reqwest::header::HeaderValue;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::PortalError;
use crate::models::{PostId, PostInput, Principal, RecruitmentPost, RecruitmentPostType, UserProfile, UserRole};

/// Header carrying the caller principal to the remote service.
pub const PRINCIPAL_HEADER: &str = "x-principal";

// 1. RemoteService Contract
/// RemoteService
///
/// The remote data service as seen by one caller identity (an "actor"). Every call is a
/// single request/response; nothing streams. The cache layer only ever talks to this
/// trait, so the HTTP actor and the in-memory backend are interchangeable.
///
/// **Send + Sync + async_trait** make `Arc<dyn RemoteService>` usable across tasks.
#[async_trait]
pub trait RemoteService: Send + Sync {
    // --- Post Retrieval ---
    async fn get_published_posts(&self) -> Result<Vec<RecruitmentPost>, PortalError>;
    // Privileged: every post regardless of status.
    async fn get_all_posts(&self) -> Result<Vec<RecruitmentPost>, PortalError>;
    async fn get_post_by_id(&self, id: PostId) -> Result<Option<RecruitmentPost>, PortalError>;
    async fn get_posts_by_type(
        &self,
        post_type: RecruitmentPostType,
    ) -> Result<Vec<RecruitmentPost>, PortalError>;
    async fn search_posts_by_tag(&self, tag: &str) -> Result<Vec<RecruitmentPost>, PortalError>;

    // --- Post Mutations (admin) ---
    async fn create_post(&self, input: PostInput) -> Result<PostId, PortalError>;
    async fn update_post(&self, id: PostId, input: PostInput) -> Result<(), PortalError>;
    async fn publish_post(&self, id: PostId) -> Result<(), PortalError>;
    async fn unpublish_post(&self, id: PostId) -> Result<(), PortalError>;
    async fn delete_post(&self, id: PostId) -> Result<(), PortalError>;

    // --- Profile & Role ---
    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, PortalError>;
    async fn save_caller_user_profile(&self, profile: UserProfile) -> Result<(), PortalError>;
    async fn get_user_profile(&self, user: &Principal) -> Result<Option<UserProfile>, PortalError>;
    async fn is_caller_admin(&self) -> Result<bool, PortalError>;
    async fn get_caller_user_role(&self) -> Result<UserRole, PortalError>;
    /// Authorization of this call is the service's business, not the client's.
    async fn assign_caller_user_role(&self, user: &Principal, role: UserRole) -> Result<(), PortalError>;
}

/// ServiceState
///
/// The shared handle to a connected actor.
pub type ServiceState = Arc<dyn RemoteService>;

/// ServiceConnector
///
/// Produces an actor bound to a caller identity (`None` for anonymous callers).
#[async_trait]
pub trait ServiceConnector: Send + Sync {
    async fn connect(&self, identity: Option<&Principal>) -> Result<ServiceState, PortalError>;
}

pub type ConnectorState = Arc<dyn ServiceConnector>;

// 2. The HTTP Implementation
/// HttpRemoteService
///
/// Talks to the remote service over HTTP, one `POST {base}/rpc/{operation}` per call
/// with a camelCase JSON argument object. A 2xx answer carries the JSON result; any other
/// status becomes `RequestFailed` with the response body; a refused connection becomes
/// `TransportUnavailable`. No timeout beyond the reqwest default is applied.
#[derive(Clone)]
pub struct HttpRemoteService {
    client: reqwest::Client,
    base_url: String,
    principal: Option<Principal>,
}

impl HttpRemoteService {
    pub fn new(client: reqwest::Client, base_url: &str, principal: Option<Principal>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            principal,
        }
    }

    async fn send(&self, operation: &str, args: Value) -> Result<reqwest::Response, PortalError> {
        let url = format!("{}/rpc/{}", self.base_url, operation);
        let mut request = self.client.post(&url).json(&args);
        if let Some(principal) = &self.principal {
            let value = HeaderValue::from_str(principal.as_str())
                .map_err(|e| PortalError::RequestFailed(e.to_string()))?;
            request = request.header(PRINCIPAL_HEADER, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(operation, %status, "remote call rejected");
        Err(PortalError::RequestFailed(format!("{}: {}", status, body)))
    }

    async fn call<T: DeserializeOwned>(&self, operation: &str, args: Value) -> Result<T, PortalError> {
        let response = self.send(operation, args).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PortalError::RequestFailed(format!("{} returned malformed body: {}", operation, e)))
    }

    /// For void operations the body is ignored.
    async fn call_unit(&self, operation: &str, args: Value) -> Result<(), PortalError> {
        self.send(operation, args).await.map(|_| ())
    }
}

fn post_args(id: Option<PostId>, input: &PostInput) -> Result<Value, PortalError> {
    let mut args = serde_json::to_value(input).map_err(|e| PortalError::RequestFailed(e.to_string()))?;
    if let (Some(id), Value::Object(map)) = (id, &mut args) {
        map.insert("id".to_string(), json!(id));
    }
    Ok(args)
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn get_published_posts(&self) -> Result<Vec<RecruitmentPost>, PortalError> {
        self.call("getPublishedPosts", json!({})).await
    }

    async fn get_all_posts(&self) -> Result<Vec<RecruitmentPost>, PortalError> {
        self.call("getAllPosts", json!({})).await
    }

    async fn get_post_by_id(&self, id: PostId) -> Result<Option<RecruitmentPost>, PortalError> {
        self.call("getPostById", json!({ "id": id })).await
    }

    async fn get_posts_by_type(
        &self,
        post_type: RecruitmentPostType,
    ) -> Result<Vec<RecruitmentPost>, PortalError> {
        self.call("getPostsByType", json!({ "postType": post_type })).await
    }

    async fn search_posts_by_tag(&self, tag: &str) -> Result<Vec<RecruitmentPost>, PortalError> {
        self.call("searchPostsByTag", json!({ "tag": tag })).await
    }

    async fn create_post(&self, input: PostInput) -> Result<PostId, PortalError> {
        self.call("createPost", post_args(None, &input)?).await
    }

    async fn update_post(&self, id: PostId, input: PostInput) -> Result<(), PortalError> {
        self.call_unit("updatePost", post_args(Some(id), &input)?).await
    }

    async fn publish_post(&self, id: PostId) -> Result<(), PortalError> {
        self.call_unit("publishPost", json!({ "id": id })).await
    }

    async fn unpublish_post(&self, id: PostId) -> Result<(), PortalError> {
        self.call_unit("unpublishPost", json!({ "id": id })).await
    }

    async fn delete_post(&self, id: PostId) -> Result<(), PortalError> {
        self.call_unit("deletePost", json!({ "id": id })).await
    }

    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, PortalError> {
        self.call("getCallerUserProfile", json!({})).await
    }

    async fn save_caller_user_profile(&self, profile: UserProfile) -> Result<(), PortalError> {
        self.call_unit("saveCallerUserProfile", json!({ "profile": profile })).await
    }

    async fn get_user_profile(&self, user: &Principal) -> Result<Option<UserProfile>, PortalError> {
        self.call("getUserProfile", json!({ "user": user })).await
    }

    async fn is_caller_admin(&self) -> Result<bool, PortalError> {
        self.call("isCallerAdmin", json!({})).await
    }

    async fn get_caller_user_role(&self) -> Result<UserRole, PortalError> {
        self.call("getCallerUserRole", json!({})).await
    }

    async fn assign_caller_user_role(&self, user: &Principal, role: UserRole) -> Result<(), PortalError> {
        self.call_unit("assignCallerUserRole", json!({ "user": user, "role": role }))
            .await
    }
}

/// HttpConnector
///
/// Hands out `HttpRemoteService` actors that share one reqwest connection pool.
#[derive(Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConnector {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait]
impl ServiceConnector for HttpConnector {
    async fn connect(&self, identity: Option<&Principal>) -> Result<ServiceState, PortalError> {
        Ok(Arc::new(HttpRemoteService::new(
            self.client.clone(),
            &self.base_url,
            identity.cloned(),
        )))
    }
}
