//! Authenticated request context and the role-gating middlewares.
//!
//! Flow Overview: the bearer token is validated once per request and turned into
//! an `AuthContext` (user id, email, role). Route groups attach one of the
//! middlewares below; handlers take `AuthContext` as an extractor and call
//! `authorize` when a single method needs a narrower allow-set than its group.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::policy::{AllowSet, Role, ADMIN_OR_ABOVE, EVALUATOR_OR_ABOVE, SUPER_ADMIN_ONLY};
use super::state::AuthState;
use super::token::bearer_token;
use crate::api::handlers::error::ApiError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthContext {
    /// Admit the caller only if its role is in `allowed`.
    ///
    /// # Errors
    /// Returns `403` when the role is not a member of the allow-set.
    pub fn authorize(&self, allowed: AllowSet) -> Result<(), ApiError> {
        if allowed.permits(self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Insufficient permissions"))
        }
    }
}

/// Validate the bearer token in `headers` and build the caller's context.
///
/// # Errors
/// `401` for a missing, malformed, invalid or expired token. A token that validates
/// but carries no usable role is an internal error, since issuance always sets one.
pub fn resolve(headers: &HeaderMap, state: &AuthState) -> Result<AuthContext, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(ApiError::Unauthorized("Authorization header required"))?;
    let value = header
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid authorization header format"))?;
    let token =
        bearer_token(value).ok_or(ApiError::Unauthorized("Invalid authorization header format"))?;

    let claims = state
        .tokens()
        .validate(token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token"))?;

    let role = claims.role.parse::<Role>().map_err(|err| {
        error!("Authenticated token without a valid role claim: {err}");
        ApiError::Internal("RoleFormatError")
    })?;

    Ok(AuthContext {
        user_id: claims.user_id,
        email: claims.email,
        role,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<Self>() {
            return Ok(context.clone());
        }

        let state = parts
            .extensions
            .get::<Arc<AuthState>>()
            .cloned()
            .ok_or(ApiError::Internal("Auth state is not configured"))?;

        resolve(&parts.headers, &state)
    }
}

async fn admit(
    context: AuthContext,
    allowed: Option<AllowSet>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(allowed) = allowed {
        if let Err(err) = context.authorize(allowed) {
            return err.into_response();
        }
    }
    request.extensions_mut().insert(context);
    next.run(request).await
}

/// Require any valid token.
pub async fn authenticate(context: AuthContext, request: Request, next: Next) -> Response {
    admit(context, None, request, next).await
}

pub async fn require_super_admin(context: AuthContext, request: Request, next: Next) -> Response {
    admit(context, Some(SUPER_ADMIN_ONLY), request, next).await
}

pub async fn require_admin_or_above(
    context: AuthContext,
    request: Request,
    next: Next,
) -> Response {
    admit(context, Some(ADMIN_OR_ABOVE), request, next).await
}

pub async fn require_evaluator_or_above(
    context: AuthContext,
    request: Request,
    next: Next,
) -> Response {
    admit(context, Some(EVALUATOR_OR_ABOVE), request, next).await
}
