use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::RegistryState;
use crate::cache::{QueryKey, QueryState};
use crate::client::PortalClient;
use crate::models::Principal;
use crate::service::PRINCIPAL_HEADER;

/// Identity
///
/// What the identity provider has told us about the caller so far.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// The provider has not finished resolving the caller.
    Initializing,
    Anonymous,
    Principal(Principal),
}

impl Identity {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::Principal(principal) => Some(principal),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Identity::Initializing)
    }
}

/// Session
///
/// The ambient caller context, passed explicitly to whoever needs it: the resolved
/// identity plus the state of the `isAdmin` role query.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub identity: Identity,
    pub is_admin: QueryState<bool>,
}

impl Session {
    pub fn new(identity: Identity, is_admin: QueryState<bool>) -> Self {
        Self { identity, is_admin }
    }
}

/// GateDecision
///
/// The three states of the admin gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum GateDecision {
    /// Identity or role still pending: render nothing protected.
    Unresolved,
    /// No identity, or an identity without the admin role.
    Denied,
    Granted,
}

/// AdminGate
///
/// Guards mutation-capable views. Decisions come purely from the session; the gate caches
/// nothing and mutates nothing.
///
/// `Denied` is sticky for the current render cycle: further observations return it
/// unchanged until `navigate` is called or the identity changes.
#[derive(Debug, Clone)]
pub struct AdminGate {
    decision: GateDecision,
    identity: Option<Identity>,
}

impl Default for AdminGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminGate {
    pub fn new() -> Self {
        Self {
            decision: GateDecision::Unresolved,
            identity: None,
        }
    }

    /// decide
    ///
    /// The stateless decision for one session snapshot:
    /// - identity initializing → `Unresolved`
    /// - anonymous → `Denied`, whatever the role query says
    /// - principal with role query idle/loading → `Unresolved`
    /// - principal with role resolved `true` → `Granted`
    /// - principal with role resolved `false` or failed → `Denied`
    pub fn decide(session: &Session) -> GateDecision {
        match &session.identity {
            Identity::Initializing => GateDecision::Unresolved,
            Identity::Anonymous => GateDecision::Denied,
            Identity::Principal(_) => match &session.is_admin {
                QueryState::Idle | QueryState::Loading => GateDecision::Unresolved,
                QueryState::Ready(true) => GateDecision::Granted,
                QueryState::Ready(false) | QueryState::Failed(_) => GateDecision::Denied,
            },
        }
    }

    /// Feeds a new session snapshot through the state machine.
    pub fn observe(&mut self, session: &Session) -> GateDecision {
        let identity_changed = self
            .identity
            .as_ref()
            .is_some_and(|seen| *seen != session.identity);
        if identity_changed {
            self.decision = GateDecision::Unresolved;
        }
        self.identity = Some(session.identity.clone());

        if self.decision != GateDecision::Denied {
            self.decision = Self::decide(session);
        }
        self.decision
    }

    /// A fresh navigation re-enters `Unresolved`.
    pub fn navigate(&mut self) {
        self.decision = GateDecision::Unresolved;
    }

    pub fn decision(&self) -> GateDecision {
        self.decision
    }
}

/// SessionUser Extractor Result
///
/// The caller identity of a BFF request. Identity provisioning happens upstream; by the
/// time a request reaches us the principal, if any, is in the `x-principal` header.
/// A missing or blank header means an anonymous caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser(pub Identity);

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(PRINCIPAL_HEADER) else {
            return Ok(SessionUser(Identity::Anonymous));
        };

        // A header that is not valid text is a malformed request, not an anonymous one.
        let text = value.to_str().map_err(|_| StatusCode::BAD_REQUEST)?.trim();
        if text.is_empty() {
            return Ok(SessionUser(Identity::Anonymous));
        }
        Ok(SessionUser(Identity::Principal(Principal::new(text))))
    }
}

/// Fixed body of the access-denied view.
pub const ACCESS_DENIED: &str = "Access denied: administrator privileges are required";

/// GateRejection
///
/// Why an admin request was not let through.
/// - `Unresolved` → 503: the role could not be determined yet; the caller may retry.
/// - `Denied` → 403 with the fixed access-denied body.
/// - `Malformed` → 400: the principal header was not valid text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    Unresolved,
    Denied,
    Malformed,
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        match self {
            GateRejection::Unresolved => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "authorization is not resolved yet" })),
            )
                .into_response(),
            GateRejection::Denied => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": ACCESS_DENIED }))).into_response()
            }
            GateRejection::Malformed => StatusCode::BAD_REQUEST.into_response(),
        }
    }
}

/// AdminSession Extractor Result
///
/// The caller's `PortalClient`, handed out only once the admin gate has granted access.
/// Every request is a new navigation: the cached `isAdmin` answer is invalidated and
/// re-resolved, and the session goes through a fresh `AdminGate`. A role change made
/// through `POST /api/admin/roles` therefore applies from the caller's next request.
pub struct AdminSession(pub Arc<PortalClient>);

impl<S> FromRequestParts<S> for AdminSession
where
    RegistryState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let SessionUser(identity) = SessionUser::from_request_parts(parts, state)
            .await
            .map_err(|_| GateRejection::Malformed)?;

        let registry = RegistryState::from_ref(state);
        let client = registry.client_for(&identity).await;
        let session = if identity.principal().is_some() {
            client.cache().invalidate(&QueryKey::IsAdmin);
            Session::new(identity.clone(), client.is_admin().await)
        } else {
            client.session()
        };

        let mut gate = AdminGate::new();
        match gate.observe(&session) {
            GateDecision::Granted => Ok(AdminSession(client)),
            GateDecision::Denied => {
                tracing::warn!(identity = ?identity, "admin access denied");
                Err(GateRejection::Denied)
            }
            GateDecision::Unresolved => Err(GateRejection::Unresolved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortalError;

    fn principal() -> Identity {
        Identity::Principal(Principal::new("aaaaa-aa"))
    }

    #[test]
    fn test_failed_role_query_denies() {
        let session = Session::new(
            principal(),
            QueryState::Failed(PortalError::RequestFailed("down".into())),
        );
        assert_eq!(AdminGate::decide(&session), GateDecision::Denied);
    }

    #[test]
    fn test_denied_is_sticky_until_navigation() {
        let mut gate = AdminGate::new();
        let identity = principal();
        assert_eq!(
            gate.observe(&Session::new(identity.clone(), QueryState::Ready(false))),
            GateDecision::Denied
        );
        // A later admin answer within the same cycle does not flip the decision.
        assert_eq!(
            gate.observe(&Session::new(identity.clone(), QueryState::Ready(true))),
            GateDecision::Denied
        );

        gate.navigate();
        assert_eq!(
            gate.observe(&Session::new(identity, QueryState::Ready(true))),
            GateDecision::Granted
        );
    }

    #[test]
    fn test_initializing_identity_is_unresolved_even_with_admin_role() {
        let session = Session::new(Identity::Initializing, QueryState::Ready(true));
        assert_eq!(AdminGate::decide(&session), GateDecision::Unresolved);
    }
}
