use axum::{
    extract::{Extension, Json, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api_docs::{ApiResponse, ErrorResponse},
    auth::{middleware::optional_user, CurrentUser},
    entities::course::{CourseDTO, CourseQuery, CreateCourseRequest, UpdateCourseRequest},
    entities::enrollment::EnrollmentDTO,
    entities::lesson::{CreateLessonRequest, LessonDTO},
    entities::review::{CreateReviewRequest, ReviewDTO},
    error::AppError,
    services::course_service::{self, CatalogError, CourseAnalytics, CourseDetail, CoursePage},
    services::enrollment_service,
};

#[utoipa::path(
    get,
    path = "/courses",
    tag = "courses",
    params(CourseQuery),
    responses(
        (status = 200, description = "One page of published courses", body = CoursePage),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn list_courses(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<CourseQuery>,
) -> Result<Response, AppError> {
    let page = course_service::list_courses(db.as_ref(), &query).await?;
    Ok(Json(ApiResponse::data(page)).into_response())
}

#[utoipa::path(
    get,
    path = "/courses/{id}",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course with lessons and reviews", body = CourseDetail),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_course(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Path(course_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    // Public route: a token only personalises the answer
    let viewer = optional_user(&headers);
    let detail = course_service::get_course_detail(db.as_ref(), course_id, viewer.as_ref()).await?;
    Ok(Json(ApiResponse::data(detail)).into_response())
}

#[utoipa::path(
    post,
    path = "/courses",
    tag = "courses",
    request_body = CreateCourseRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Course created", body = CourseDTO),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Only teachers can create courses", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn create_course(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<Response, AppError> {
    current_user.require_author()?;
    payload.validate()?;

    let course = course_service::create_course(db.as_ref(), current_user.user_id, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Course created successfully",
            CourseDTO::from(course),
        )),
    )
        .into_response())
}

#[utoipa::path(
    put,
    path = "/courses/{id}",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = UpdateCourseRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Course updated", body = CourseDTO),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn update_course(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let course =
        course_service::update_course(db.as_ref(), &current_user, course_id, payload).await?;

    Ok(Json(ApiResponse::with_message(
        "Course updated successfully",
        CourseDTO::from(course),
    ))
    .into_response())
}

#[utoipa::path(
    delete,
    path = "/courses/{id}",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course id")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Course deleted"),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn delete_course(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(course_id): Path<Uuid>,
) -> Result<Response, AppError> {
    course_service::delete_course(db.as_ref(), &current_user, course_id).await?;
    Ok(Json(ApiResponse::message("Course deleted successfully")).into_response())
}

#[utoipa::path(
    post,
    path = "/courses/{id}/enroll",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course id")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Enrolled", body = EnrollmentDTO),
        (status = 200, description = "Already enrolled, existing enrollment returned", body = EnrollmentDTO),
        (status = 400, description = "Course is unpublished or requires payment", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn enroll_course(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(course_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let course = course_service::find_course(db.as_ref(), course_id).await?;
    if !course.is_published {
        return Err(CatalogError::NotPublished.into());
    }
    // Paid courses go through /payments/create-payment-intent
    if course.effective_price() > 0.0 {
        return Err(AppError::Payment(
            "This course requires payment".to_string(),
        ));
    }

    let enrolled = enrollment_service::enroll(db.as_ref(), current_user.user_id, course_id).await?;
    let dto = EnrollmentDTO::from(enrolled.enrollment);

    if enrolled.created {
        Ok((
            StatusCode::CREATED,
            Json(ApiResponse::with_message("Enrolled successfully", dto)),
        )
            .into_response())
    } else {
        Ok(Json(ApiResponse::with_message("Already enrolled in this course", dto)).into_response())
    }
}

#[utoipa::path(
    post,
    path = "/courses/{id}/reviews",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = CreateReviewRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Review added", body = ReviewDTO),
        (status = 400, description = "Invalid rating or comment", body = ErrorResponse),
        (status = 403, description = "Not enrolled in the course", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Course already reviewed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn add_review(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let review =
        course_service::add_review(db.as_ref(), current_user.user_id, course_id, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Review added successfully",
            ReviewDTO::from(review),
        )),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/courses/{id}/analytics",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course id")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Enrollment analytics for the course", body = CourseAnalytics),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn course_analytics(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(course_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let analytics =
        course_service::course_analytics(db.as_ref(), &current_user, course_id).await?;
    Ok(Json(ApiResponse::data(analytics)).into_response())
}

#[utoipa::path(
    post,
    path = "/courses/{id}/lessons",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = CreateLessonRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Lesson added", body = LessonDTO),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Lesson order already used", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn add_lesson(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let lesson = course_service::add_lesson(db.as_ref(), &current_user, course_id, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Lesson added successfully",
            LessonDTO::from(lesson),
        )),
    )
        .into_response())
}
