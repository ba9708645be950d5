use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::users::{Model as User, Role};
use crate::services::auth_service::AuthService;
use crate::utils::cookies::ACCESS_COOKIE;

/// Identity of the caller, attached to requests that passed the
/// authentication guard. Only non-sensitive fields.
///
/// As an extractor this *is* the guard: a handler taking `AuthUser` rejects
/// unauthenticated callers with 401 before it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

impl AuthUser {
    /// Authorization guard for an already authenticated caller.
    pub fn require(&self, allowed: &[Role]) -> Result<(), AuthError> {
        authorize(Some(self), allowed)
    }
}

/// Optional variant of the guard: never rejects, carries `None` instead.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

/// Authorization guard. No identity means the authentication guard did not
/// run or failed.
pub fn authorize(user: Option<&AuthUser>, allowed: &[Role]) -> Result<(), AuthError> {
    let user = user.ok_or(AuthError::Unauthenticated)?;
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        tracing::info!(user_id = %user.id, role = user.role.as_str(), "Access denied: insufficient role");
        Err(AuthError::Forbidden)
    }
}

/// Session token carried by the request: the `token` cookie wins over an
/// `Authorization: Bearer` header.
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ACCESS_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    let header = req.headers().get("Authorization")?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn auth_service(req: &HttpRequest) -> Result<web::Data<AuthService>, AuthError> {
    req.app_data::<web::Data<AuthService>>().cloned().ok_or_else(|| {
        tracing::error!("AuthService is not registered as app data");
        AuthError::InternalError
    })
}

impl FromRequest for AuthUser {
    type Error = AuthError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // 1. Token from cookie or header, 2. service from app data
        let token = extract_token(req);
        let service = auth_service(req);

        // 3. Verify and reload the user
        Box::pin(async move { service?.authenticate(token.as_deref()).await })
    }
}

impl FromRequest for MaybeAuthUser {
    type Error = AuthError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = extract_token(req);
        let service = auth_service(req);

        Box::pin(async move {
            let user = service?.authenticate_optional(token.as_deref()).await;
            Ok(MaybeAuthUser(user))
        })
    }
}
