use axum::{
    Json,
    extract::{OriginalUri, Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    RegistryState,
    auth::{AdminSession, SessionUser},
    cache::{QueryKey, QueryState},
    editor::PostDraft,
    error::PortalError,
    models::{AssignRoleRequest, CreatedPost, PostId, PostInput, RecruitmentPostType, UserProfile, UserRole},
    pages::{AdminDashboardView, AdminEditView, CategoryView, HomeView, PostDetailView, SearchView},
    query_state::{ListingLocation, ListingUpdate},
};

// --- Request/Response Payloads ---

/// NavigateRequest
///
/// A listing page's current location plus the change the user made to its filters.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NavigateRequest {
    pub path: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub update: ListingUpdate,
}

/// NavigateResponse
///
/// Where the navigation lands: the canonical href and its decoded state.
#[derive(Debug, Serialize, ToSchema)]
pub struct NavigateResponse {
    pub href: String,
    pub location: ListingLocation,
}

/// Turns a caller-facing read into a response body. Reads that never ran (no connection)
/// are reported the same way a refused connection would be.
fn ready<T>(state: QueryState<T>) -> Result<T, PortalError> {
    match state {
        QueryState::Ready(value) => Ok(value),
        QueryState::Failed(err) => Err(err),
        QueryState::Idle | QueryState::Loading => Err(PortalError::TransportUnavailable),
    }
}

/// Redirects a listing request to its canonical URL when the query string is not already
/// in canonical form; otherwise yields the decoded location. Keys other than the listing
/// params are not part of the canonical form, so a query carrying them is redirected
/// without them.
fn canonical_location(uri: &OriginalUri, raw_query: Option<String>) -> Result<ListingLocation, Response> {
    let raw = raw_query.unwrap_or_default();
    let location = ListingLocation::parse(uri.0.path(), &raw);
    if location.is_canonical_query(&raw) {
        Ok(location)
    } else {
        Err(Redirect::temporary(&location.href()).into_response())
    }
}

// --- Public Handlers ---

/// get_home
///
/// [Public Route] The newest published notices.
#[utoipa::path(
    get,
    path = "/api/home",
    responses((status = 200, description = "Home feed", body = HomeView))
)]
pub async fn get_home(SessionUser(identity): SessionUser, State(registry): State<RegistryState>) -> Json<HomeView> {
    let client = registry.client_for(&identity).await;
    Json(HomeView::load(&client).await)
}

/// get_category
///
/// [Public Route] Published notices of one category, filtered and sorted by the URL's
/// listing params. A non-canonical query string (empty values, default sort) is
/// redirected to its canonical form first.
#[utoipa::path(
    get,
    path = "/api/category/{type}",
    params(
        ("type" = String, Path, description = "recruitmentForm | admitCard | result | answerKey"),
        ("sort" = Option<String>, Query, description = "newest | updated"),
        ("organization" = Option<String>, Query, description = "Organization substring"),
        ("tag" = Option<String>, Query, description = "Exact tag"),
        ("year" = Option<String>, Query, description = "Creation year"),
    ),
    responses(
        (status = 200, description = "Category listing", body = CategoryView),
        (status = 307, description = "Redirect to the canonical query: empty values and the default sort are dropped, as are query keys that are not listing params"),
        (status = 404, description = "Unknown category")
    )
)]
pub async fn get_category(
    SessionUser(identity): SessionUser,
    State(registry): State<RegistryState>,
    Path(segment): Path<String>,
    uri: OriginalUri,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, PortalError> {
    let post_type: RecruitmentPostType = segment.parse()?;
    let location = match canonical_location(&uri, raw_query) {
        Ok(location) => location,
        Err(redirect) => return Ok(redirect),
    };

    let client = registry.client_for(&identity).await;
    let view = CategoryView::load(&client, post_type, location.params).await;
    Ok(Json(view).into_response())
}

/// search
///
/// [Public Route] Free-text search over published notices (`q`), refined by the same
/// listing params as the category pages.
#[utoipa::path(
    get,
    path = "/api/search",
    params(
        ("q" = Option<String>, Query, description = "Search text"),
        ("sort" = Option<String>, Query, description = "newest | updated"),
        ("organization" = Option<String>, Query, description = "Organization substring"),
        ("tag" = Option<String>, Query, description = "Exact tag"),
        ("year" = Option<String>, Query, description = "Creation year"),
    ),
    responses(
        (status = 200, description = "Search results", body = SearchView),
        (status = 307, description = "Redirect to the canonical query: empty values and the default sort are dropped, as are query keys that are not listing params")
    )
)]
pub async fn search(
    SessionUser(identity): SessionUser,
    State(registry): State<RegistryState>,
    uri: OriginalUri,
    RawQuery(raw_query): RawQuery,
) -> Response {
    let location = match canonical_location(&uri, raw_query) {
        Ok(location) => location,
        Err(redirect) => return redirect,
    };

    let client = registry.client_for(&identity).await;
    Json(SearchView::load(&client, &location.search, location.params).await).into_response()
}

/// get_post
///
/// [Public Route] One notice by id. Drafts are only visible to administrators, which the
/// remote service decides.
#[utoipa::path(
    get,
    path = "/api/posts/{id}",
    params(("id" = u64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post detail", body = PostDetailView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post(
    SessionUser(identity): SessionUser,
    State(registry): State<RegistryState>,
    Path(id): Path<PostId>,
) -> Result<Json<PostDetailView>, PortalError> {
    let client = registry.client_for(&identity).await;
    let view = PostDetailView::load(&client, id).await;
    if view.is_not_found() {
        return Err(PortalError::NotFound);
    }
    Ok(Json(view))
}

/// navigate
///
/// [Public Route] Applies a filter change to a listing location and returns the
/// canonical target. `q` survives the change.
#[utoipa::path(
    post,
    path = "/api/listing/navigate",
    request_body = NavigateRequest,
    responses((status = 200, description = "Canonical target", body = NavigateResponse))
)]
pub async fn navigate(Json(request): Json<NavigateRequest>) -> Json<NavigateResponse> {
    let location = ListingLocation::parse(&request.path, &request.query).update_params(&request.update);
    Json(NavigateResponse {
        href: location.href(),
        location,
    })
}

// --- Caller Handlers ---

/// get_my_profile
///
/// [Caller Route] The caller's saved profile, `null` until one has been saved.
#[utoipa::path(
    get,
    path = "/api/me/profile",
    responses((status = 200, description = "Caller profile, null until saved", body = UserProfile))
)]
pub async fn get_my_profile(
    SessionUser(identity): SessionUser,
    State(registry): State<RegistryState>,
) -> Result<Json<Option<UserProfile>>, PortalError> {
    let client = registry.client_for(&identity).await;
    Ok(Json(ready(client.caller_profile().await)?))
}

/// save_my_profile
///
/// [Caller Route] Creates or replaces the caller's profile.
#[utoipa::path(
    put,
    path = "/api/me/profile",
    request_body = UserProfile,
    responses(
        (status = 204, description = "Saved"),
        (status = 422, description = "Blank name"),
        (status = 502, description = "Rejected by the remote service")
    )
)]
pub async fn save_my_profile(
    SessionUser(identity): SessionUser,
    State(registry): State<RegistryState>,
    Json(profile): Json<UserProfile>,
) -> Result<StatusCode, PortalError> {
    let client = registry.client_for(&identity).await;
    client.save_caller_profile(profile).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// get_my_role
///
/// [Caller Route] The caller's role as the remote service reports it. Re-read on every
/// request, since an admin may have changed it since the last one.
#[utoipa::path(
    get,
    path = "/api/me/role",
    responses((status = 200, description = "Caller role", body = UserRole))
)]
pub async fn get_my_role(
    SessionUser(identity): SessionUser,
    State(registry): State<RegistryState>,
) -> Result<Json<UserRole>, PortalError> {
    let client = registry.client_for(&identity).await;
    client.cache().invalidate(&QueryKey::CallerRole);
    Ok(Json(ready(client.caller_role().await)?))
}

// --- Admin Handlers ---
// Every handler below takes `AdminSession`, so a request that the gate does not grant
// never reaches the remote service's mutation endpoints.

/// list_admin_posts
///
/// [Admin Route] Every notice regardless of status, with published/draft counts.
#[utoipa::path(
    get,
    path = "/api/admin/posts",
    responses(
        (status = 200, description = "Dashboard", body = AdminDashboardView),
        (status = 403, description = "Access denied")
    )
)]
pub async fn list_admin_posts(AdminSession(client): AdminSession) -> Json<AdminDashboardView> {
    Json(AdminDashboardView::load(&client).await)
}

/// create_post
///
/// [Admin Route] Submits a new notice. It starts as a draft.
#[utoipa::path(
    post,
    path = "/api/admin/posts",
    request_body = PostInput,
    responses(
        (status = 201, description = "Created", body = CreatedPost),
        (status = 403, description = "Access denied"),
        (status = 422, description = "Required field empty")
    )
)]
pub async fn create_post(
    AdminSession(client): AdminSession,
    Json(input): Json<PostInput>,
) -> Result<(StatusCode, Json<CreatedPost>), PortalError> {
    let input = PostDraft::from_input(input).submit()?;
    let id = client.create_post(input).await?;
    Ok((StatusCode::CREATED, Json(CreatedPost { id })))
}

/// get_admin_post
///
/// [Admin Route] The editor's starting state for an existing notice.
#[utoipa::path(
    get,
    path = "/api/admin/posts/{id}",
    params(("id" = u64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Edit view", body = AdminEditView),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_admin_post(
    AdminSession(client): AdminSession,
    Path(id): Path<PostId>,
) -> Result<Json<AdminEditView>, PortalError> {
    let view = AdminEditView::load(&client, id).await;
    if view.is_not_found() {
        return Err(PortalError::NotFound);
    }
    Ok(Json(view))
}

/// update_post
///
/// [Admin Route] Replaces the editable fields of a notice. Status and creation time are
/// kept. Concurrent edits are last-write-wins.
#[utoipa::path(
    put,
    path = "/api/admin/posts/{id}",
    params(("id" = u64, Path, description = "Post ID")),
    request_body = PostInput,
    responses(
        (status = 204, description = "Updated"),
        (status = 403, description = "Access denied"),
        (status = 422, description = "Required field empty")
    )
)]
pub async fn update_post(
    AdminSession(client): AdminSession,
    Path(id): Path<PostId>,
    Json(input): Json<PostInput>,
) -> Result<StatusCode, PortalError> {
    let input = PostDraft::from_input(input).submit()?;
    client.update_post(id, input).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// delete_post
///
/// [Admin Route] Removes a notice.
#[utoipa::path(
    delete,
    path = "/api/admin/posts/{id}",
    params(("id" = u64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn delete_post(
    AdminSession(client): AdminSession,
    Path(id): Path<PostId>,
) -> Result<StatusCode, PortalError> {
    client.delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// publish_post
///
/// [Admin Route] Moves a notice into the public view set.
#[utoipa::path(
    post,
    path = "/api/admin/posts/{id}/publish",
    params(("id" = u64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Published"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn publish_post(
    AdminSession(client): AdminSession,
    Path(id): Path<PostId>,
) -> Result<StatusCode, PortalError> {
    client.publish_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// unpublish_post
///
/// [Admin Route] Returns a notice to draft.
#[utoipa::path(
    post,
    path = "/api/admin/posts/{id}/unpublish",
    params(("id" = u64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Unpublished"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn unpublish_post(
    AdminSession(client): AdminSession,
    Path(id): Path<PostId>,
) -> Result<StatusCode, PortalError> {
    client.unpublish_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// assign_role
///
/// [Admin Route] Grants a role to another principal. The remote service re-checks the
/// caller's authority.
#[utoipa::path(
    post,
    path = "/api/admin/roles",
    request_body = AssignRoleRequest,
    responses(
        (status = 204, description = "Assigned"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn assign_role(
    AdminSession(client): AdminSession,
    Json(request): Json<AssignRoleRequest>,
) -> Result<StatusCode, PortalError> {
    client.assign_user_role(request.user, request.role).await?;
    Ok(StatusCode::NO_CONTENT)
}
