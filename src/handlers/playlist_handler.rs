use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api_docs::{ApiResponse, ErrorResponse},
    auth::CurrentUser,
    entities::playlist::{CreatePlaylistRequest, PlaylistDTO, UpdatePlaylistRequest},
    error::AppError,
    services::playlist_service,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PlaylistQuery {
    /// Only playlists of this course.
    pub course_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/playlists",
    tag = "media",
    params(PlaylistQuery),
    responses(
        (status = 200, description = "Playlists with their videos", body = [PlaylistDTO]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn list_playlists(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<PlaylistQuery>,
) -> Result<Response, AppError> {
    let playlists = playlist_service::list_playlists(db.as_ref(), query.course_id).await?;
    Ok(Json(ApiResponse::data(playlists)).into_response())
}

#[utoipa::path(
    get,
    path = "/playlists/{id}",
    tag = "media",
    params(("id" = Uuid, Path, description = "Playlist id")),
    responses(
        (status = 200, description = "Playlist with ordered videos", body = PlaylistDTO),
        (status = 404, description = "Playlist not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_playlist(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Path(playlist_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let playlist = playlist_service::get_playlist(db.as_ref(), playlist_id).await?;
    Ok(Json(ApiResponse::data(playlist)).into_response())
}

#[utoipa::path(
    post,
    path = "/playlists",
    tag = "media",
    request_body = CreatePlaylistRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Playlist created", body = PlaylistDTO),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Only the course's teacher can add playlists", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn create_playlist(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<CreatePlaylistRequest>,
) -> Result<Response, AppError> {
    current_user.require_author()?;
    payload.validate()?;

    let playlist = playlist_service::create_playlist(db.as_ref(), &current_user, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Playlist created successfully",
            playlist,
        )),
    )
        .into_response())
}

#[utoipa::path(
    put,
    path = "/playlists/{id}",
    tag = "media",
    params(("id" = Uuid, Path, description = "Playlist id")),
    request_body = UpdatePlaylistRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Playlist updated", body = PlaylistDTO),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Playlist not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn update_playlist(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(playlist_id): Path<Uuid>,
    Json(payload): Json<UpdatePlaylistRequest>,
) -> Result<Response, AppError> {
    current_user.require_author()?;
    payload.validate()?;

    let playlist =
        playlist_service::update_playlist(db.as_ref(), &current_user, playlist_id, payload)
            .await?;

    Ok(Json(ApiResponse::with_message(
        "Playlist updated successfully",
        playlist,
    ))
    .into_response())
}

#[utoipa::path(
    delete,
    path = "/playlists/{id}",
    tag = "media",
    params(("id" = Uuid, Path, description = "Playlist id")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Playlist deleted"),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Playlist not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn delete_playlist(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(playlist_id): Path<Uuid>,
) -> Result<Response, AppError> {
    current_user.require_author()?;
    playlist_service::delete_playlist(db.as_ref(), &current_user, playlist_id).await?;
    Ok(Json(ApiResponse::message("Playlist deleted successfully")).into_response())
}
