use crate::{errors::ServiceError, AppState};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Acting identity, resolved once at the HTTP boundary.
///
/// Token issuance and verification live upstream; this service only needs to
/// know who owns a cart and whether the caller may reach the back office.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous { session: Option<String> },
    User(Uuid),
    Admin,
}

/// A cart owner: either an authenticated customer or an anonymous session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    Customer(Uuid),
    Session(String),
}

impl Identity {
    /// The cart this identity may act on. Admin tokens and sessionless
    /// anonymous callers have no cart of their own.
    pub fn cart_owner(&self) -> Result<CartOwner, ServiceError> {
        match self {
            Identity::User(id) => Ok(CartOwner::Customer(*id)),
            Identity::Anonymous {
                session: Some(session),
            } => Ok(CartOwner::Session(session.clone())),
            Identity::Anonymous { session: None } => Err(ServiceError::Unauthorized(
                "a session id or user identity is required for cart operations".to_string(),
            )),
            Identity::Admin => Err(ServiceError::Forbidden(
                "admin tokens do not own a cart".to_string(),
            )),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.iter().zip(b) {
        res |= x ^ y;
    }
    res == 0
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = header_str(parts, "authorization") {
            if let Some(token) = auth.strip_prefix("Bearer ") {
                if constant_time_eq(token.as_bytes(), state.config.admin_token.as_bytes()) {
                    return Ok(Identity::Admin);
                }
                return Err(ServiceError::Unauthorized("invalid token".to_string()));
            }
        }

        if let Some(raw) = header_str(parts, "x-user-id") {
            let id = raw
                .parse::<Uuid>()
                .map_err(|_| ServiceError::Unauthorized("malformed user id".to_string()))?;
            return Ok(Identity::User(id));
        }

        let session = header_str(parts, "x-session-id")
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(Identity::Anonymous { session })
    }
}

/// Extractor gating back-office endpoints on the admin identity.
#[derive(Debug, Clone, Copy)]
pub struct AdminOnly;

#[async_trait]
impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match Identity::from_request_parts(parts, state).await? {
            Identity::Admin => Ok(AdminOnly),
            Identity::Anonymous { .. } => Err(ServiceError::Unauthorized(
                "admin token required".to_string(),
            )),
            Identity::User(_) => Err(ServiceError::Forbidden(
                "admin token required".to_string(),
            )),
        }
    }
}
