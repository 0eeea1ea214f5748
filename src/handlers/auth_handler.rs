use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use validator::Validate;

use crate::{
    api_docs::{ApiResponse, AuthResponse, ErrorResponse},
    auth::{jwt, CurrentUser},
    entities::user::{LoginRequest, RegisterRequest, UserDTO},
    error::AppError,
    services::user_service::{self, UserError},
};

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, returns a JWT token", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn register(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let user = user_service::register(db.as_ref(), payload).await?;
    let token = jwt::create_token(user.user_id, &user.email, &user.role())
        .map_err(UserError::from)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "User registered successfully",
            AuthResponse {
                token,
                user: UserDTO::from(user),
            },
        )),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, returns a JWT token", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account disabled", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let (user, token) = user_service::login(db.as_ref(), &payload.email, &payload.password).await?;
    tracing::info!("User {} logged in", user.user_id);

    Ok(Json(ApiResponse::with_message(
        "Login successful",
        AuthResponse {
            token,
            user: UserDTO::from(user),
        },
    ))
    .into_response())
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "authentication",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Current user information", body = UserDTO),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_current_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let user = user_service::find_by_id(db.as_ref(), current_user.user_id)
        .await?
        .ok_or(UserError::NotFound)?;

    Ok(Json(ApiResponse::data(UserDTO::from(user))).into_response())
}
