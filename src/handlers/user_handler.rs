use axum::{
    extract::{Extension, Json, Path, Query},
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api_docs::{ApiResponse, ErrorResponse, Pagination},
    auth::CurrentUser,
    entities::course::CourseDTO,
    entities::enrollment::{CourseProgressRequest, EnrollmentListQuery},
    entities::user::{UpdatePasswordRequest, UpdateProfileRequest, UserDTO},
    error::AppError,
    services::course_service,
    services::enrollment_service::{
        self, Dashboard, EnrollmentPage, LearningStats, ProgressUpdate,
        DEFAULT_ENROLLMENT_PAGE_SIZE,
    },
    services::user_service,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedCourses {
    pub courses: Vec<CourseDTO>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeacherList {
    pub teachers: Vec<UserDTO>,
}

#[utoipa::path(
    get,
    path = "/users/dashboard",
    tag = "users",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Profile, enrollment totals and recent activity", body = Dashboard),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn dashboard(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let dashboard = enrollment_service::dashboard(db.as_ref(), current_user.user_id).await?;
    Ok(Json(ApiResponse::data(dashboard)).into_response())
}

#[utoipa::path(
    get,
    path = "/users/enrolled-courses",
    tag = "users",
    params(EnrollmentListQuery),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "The caller's enrollments, newest first", body = EnrollmentPage),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn enrolled_courses(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<EnrollmentListQuery>,
) -> Result<Response, AppError> {
    let page = enrollment_service::list_for_user(db.as_ref(), current_user.user_id, &query).await?;
    Ok(Json(ApiResponse::data(page)).into_response())
}

#[utoipa::path(
    get,
    path = "/users/created-courses",
    tag = "users",
    params(PageQuery),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Courses authored by the caller", body = CreatedCourses),
        (status = 403, description = "Teachers only", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn created_courses(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    current_user.require_author()?;

    let (page, limit) =
        course_service::page_params(query.page, query.limit, DEFAULT_ENROLLMENT_PAGE_SIZE);
    let (courses, total) =
        course_service::list_created_courses(db.as_ref(), current_user.user_id, page, limit)
            .await?;

    Ok(Json(ApiResponse::data(CreatedCourses {
        courses: courses.into_iter().map(CourseDTO::from).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
    .into_response())
}

#[utoipa::path(
    put,
    path = "/users/course-progress/{course_id}",
    tag = "users",
    params(("course_id" = Uuid, Path, description = "Course id")),
    request_body = CourseProgressRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Progress recorded", body = ProgressUpdate),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Enrollment or lesson not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn update_course_progress(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CourseProgressRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let update = enrollment_service::update_course_progress(
        db.as_ref(),
        current_user.user_id,
        course_id,
        payload,
    )
    .await?;

    Ok(Json(ApiResponse::with_message(
        "Progress updated successfully",
        update,
    ))
    .into_response())
}

#[utoipa::path(
    get,
    path = "/users/learning-stats",
    tag = "users",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Learning statistics of the caller", body = LearningStats),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn learning_stats(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let stats = enrollment_service::learning_stats(db.as_ref(), current_user.user_id).await?;
    Ok(Json(ApiResponse::data(stats)).into_response())
}

#[utoipa::path(
    get,
    path = "/users/teachers",
    tag = "users",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Active teachers", body = TeacherList),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn list_teachers(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, AppError> {
    let teachers = user_service::list_teachers(db.as_ref()).await?;
    Ok(Json(ApiResponse::data(TeacherList {
        teachers: teachers.into_iter().map(UserDTO::from).collect(),
    }))
    .into_response())
}

#[utoipa::path(
    get,
    path = "/users/teacher/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "Teacher's user id")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Teacher profile", body = UserDTO),
        (status = 404, description = "Teacher not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_teacher(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Path(teacher_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let teacher = user_service::find_teacher(db.as_ref(), teacher_id).await?;
    Ok(Json(ApiResponse::data(UserDTO::from(teacher))).into_response())
}

#[utoipa::path(
    put,
    path = "/users/profile",
    tag = "users",
    request_body = UpdateProfileRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Profile updated", body = UserDTO),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn update_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let user = user_service::update_profile(db.as_ref(), current_user.user_id, payload).await?;

    Ok(Json(ApiResponse::with_message(
        "Profile updated successfully",
        UserDTO::from(user),
    ))
    .into_response())
}

#[utoipa::path(
    put,
    path = "/users/password",
    tag = "users",
    request_body = UpdatePasswordRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Invalid input or wrong current password", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn update_password(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    user_service::update_password(db.as_ref(), current_user.user_id, payload).await?;
    Ok(Json(ApiResponse::message("Password updated successfully")).into_response())
}
