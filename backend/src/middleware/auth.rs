//! Authentication middleware
//!
//! Resolves the session token (cookie first, then `Authorization: Bearer`)
//! to an [`AuthUser`]; handlers then guard each operation with
//! [`AuthUser::require`] against the fixed role permission table.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use shared::{Permission, Role};

use crate::error::{AppError, AppResult};
use crate::services::auth::{AuthService, TokenType};
use crate::AppState;

/// Authenticated user information extracted from the session token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    /// Permission guard for use in handlers
    pub fn require(&self, permission: Permission) -> AppResult<()> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = self.user_id,
                role = self.role.as_str(),
                permission = permission.as_str(),
                "Permission denied"
            );
            Err(AppError::PermissionDenied(format!(
                "requires '{}' permission",
                permission.as_str()
            )))
        }
    }
}

/// Authentication middleware that validates the session token.
///
/// The account is re-read on every request so a deactivation or role change
/// takes effect before the token expires.
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = jar
        .get(&state.config.auth.cookie_name)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| bearer.map(|TypedHeader(auth)| auth.token().to_string()))
        .ok_or_else(|| AppError::Unauthorized("Missing session token".to_string()))?;

    let auth = AuthService::new(state.db.clone(), &state.config);
    let claims = auth.verify_token(&token, TokenType::Access)?;
    let user = auth.active_user(claims.user_id()?).await?;

    request.extensions_mut().insert(AuthUser {
        user_id: user.id,
        username: user.username,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

impl std::ops::Deref for CurrentUser {
    type Target = AuthUser;

    fn deref(&self) -> &AuthUser {
        &self.0
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "someone".into(),
            role,
        }
    }

    #[test]
    fn test_user_cannot_delete() {
        let err = user(Role::User).require(Permission::Delete).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(user(Role::User).require(Permission::Edit).is_ok());
    }

    #[test]
    fn test_superuser_has_admin() {
        assert!(user(Role::Superuser).require(Permission::Admin).is_ok());
    }
}
