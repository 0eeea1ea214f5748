use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::api_docs::ErrorResponse;
use crate::auth::jwt::{self, Claims};
use crate::entities::user::UserRole;
use crate::error::AppError;

/// Identity of the caller, resolved from the bearer token and handed to
/// handlers as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Owners and admins may manage a resource.
    pub fn can_manage(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id || self.is_admin()
    }

    pub fn require_author(&self) -> Result<(), AppError> {
        if self.role.can_author() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Access denied. Only teachers can perform this action.".to_string(),
            ))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied".to_string()))
        }
    }
}

impl TryFrom<Claims> for CurrentUser {
    type Error = uuid::Error;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: Uuid::parse_str(&claims.sub)?,
            role: UserRole::from(claims.role),
            email: claims.email,
        })
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(message)),
    )
        .into_response()
}

/// Extracts the raw token from an `Authorization: Bearer {token}` header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let auth_header = headers
        .get("Authorization")
        .ok_or("Missing Authorization header")?;

    let auth_header_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header")?;

    auth_header_str
        .strip_prefix("Bearer ")
        .ok_or("Invalid token format")
}

/// Resolves the caller when a valid token is present. Public endpoints use
/// this to personalise responses without requiring a login.
pub fn optional_user(headers: &HeaderMap) -> Option<CurrentUser> {
    let token = bearer_token(headers).ok()?;
    let claims = jwt::validate_token(token).ok()?;
    CurrentUser::try_from(claims).ok()
}

pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let token = match bearer_token(request.headers()) {
        Ok(token) => token,
        Err(message) => return unauthorized(message),
    };

    // Validate token
    let claims = match jwt::validate_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("Rejected bearer token: {}", e);
            return unauthorized("Invalid or expired token");
        }
    };

    let current_user = match CurrentUser::try_from(claims) {
        Ok(user) => user,
        Err(_) => return unauthorized("Invalid user ID in token"),
    };

    request.extensions_mut().insert(current_user);
    next.run(request).await
}
