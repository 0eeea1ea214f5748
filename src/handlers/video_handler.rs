use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api_docs::{ApiResponse, ErrorResponse},
    auth::CurrentUser,
    entities::video::{
        AddVideosRequest, CreateVideoRequest, UpdateVideoRequest, VideoDTO, VideoQuery,
    },
    error::AppError,
    services::video_service,
};

#[utoipa::path(
    post,
    path = "/courses/{id}/videos",
    tag = "media",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = AddVideosRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Videos added", body = [VideoDTO]),
        (status = 400, description = "Each video needs a title, url and duration", body = ErrorResponse),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course or playlist not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn add_course_videos(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<AddVideosRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let videos =
        video_service::add_course_videos(db.as_ref(), &current_user, course_id, payload).await?;
    let videos: Vec<VideoDTO> = videos.into_iter().map(VideoDTO::from).collect();

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Videos added successfully", videos)),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/videos/{id}",
    tag = "media",
    params(("id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 200, description = "Video details", body = VideoDTO),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_video(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Path(video_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let video = video_service::find_video(db.as_ref(), video_id).await?;
    Ok(Json(ApiResponse::data(VideoDTO::from(video))).into_response())
}

#[utoipa::path(
    get,
    path = "/videos",
    tag = "media",
    params(VideoQuery),
    responses(
        (status = 200, description = "Videos in playback order", body = [VideoDTO]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn list_videos(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<VideoQuery>,
) -> Result<Response, AppError> {
    let videos = video_service::list_videos(db.as_ref(), query.course_id).await?;
    let videos: Vec<VideoDTO> = videos.into_iter().map(VideoDTO::from).collect();
    Ok(Json(ApiResponse::data(videos)).into_response())
}

#[utoipa::path(
    post,
    path = "/videos",
    tag = "media",
    request_body = CreateVideoRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Video created", body = VideoDTO),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course or playlist not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn create_video(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<CreateVideoRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let video = video_service::create_video(db.as_ref(), &current_user, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Video created successfully",
            VideoDTO::from(video),
        )),
    )
        .into_response())
}

#[utoipa::path(
    put,
    path = "/videos/{id}",
    tag = "media",
    params(("id" = Uuid, Path, description = "Video id")),
    request_body = UpdateVideoRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Video updated", body = VideoDTO),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Video or playlist not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn update_video(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(video_id): Path<Uuid>,
    Json(payload): Json<UpdateVideoRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let video = video_service::update_video(db.as_ref(), &current_user, video_id, payload).await?;

    Ok(Json(ApiResponse::with_message(
        "Video updated successfully",
        VideoDTO::from(video),
    ))
    .into_response())
}

#[utoipa::path(
    delete,
    path = "/videos/{id}",
    tag = "media",
    params(("id" = Uuid, Path, description = "Video id")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Video deleted"),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn delete_video(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(video_id): Path<Uuid>,
) -> Result<Response, AppError> {
    video_service::delete_video(db.as_ref(), &current_user, video_id).await?;
    Ok(Json(ApiResponse::message("Video deleted successfully")).into_response())
}
