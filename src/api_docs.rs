use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

/// Authentication response after successful login
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: crate::entities::user::UserDTO,
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Envelope for every successful JSON response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Pagination block returned next to every paged list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total_items: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total_items.div_ceil(limit)
        };
        Self {
            current_page: page,
            total_pages,
            total_items,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::auth_handler::register,
        crate::handlers::auth_handler::login,
        crate::handlers::auth_handler::get_current_user,
        crate::handlers::course_handler::list_courses,
        crate::handlers::course_handler::get_course,
        crate::handlers::course_handler::create_course,
        crate::handlers::course_handler::update_course,
        crate::handlers::course_handler::delete_course,
        crate::handlers::course_handler::enroll_course,
        crate::handlers::course_handler::add_review,
        crate::handlers::course_handler::course_analytics,
        crate::handlers::course_handler::add_lesson,
        crate::handlers::video_handler::add_course_videos,
        crate::handlers::video_handler::get_video,
        crate::handlers::video_handler::list_videos,
        crate::handlers::video_handler::create_video,
        crate::handlers::video_handler::update_video,
        crate::handlers::video_handler::delete_video,
        crate::handlers::playlist_handler::list_playlists,
        crate::handlers::playlist_handler::get_playlist,
        crate::handlers::playlist_handler::create_playlist,
        crate::handlers::playlist_handler::update_playlist,
        crate::handlers::playlist_handler::delete_playlist,
        crate::handlers::payment_handler::create_payment_intent,
        crate::handlers::payment_handler::confirm_payment,
        crate::handlers::payment_handler::payment_history,
        crate::handlers::payment_handler::refund,
        crate::handlers::payment_handler::webhook,
        crate::handlers::user_handler::dashboard,
        crate::handlers::user_handler::enrolled_courses,
        crate::handlers::user_handler::created_courses,
        crate::handlers::user_handler::update_course_progress,
        crate::handlers::user_handler::learning_stats,
        crate::handlers::user_handler::list_teachers,
        crate::handlers::user_handler::get_teacher,
        crate::handlers::user_handler::update_profile,
        crate::handlers::user_handler::update_password,
    ),
    components(
        schemas(
            AuthResponse,
            ErrorResponse,
            Pagination,
            crate::entities::user::RegisterRequest,
            crate::entities::user::LoginRequest,
            crate::entities::user::UserRole,
            crate::entities::user::UserDTO,
            crate::entities::course::CourseDTO,
            crate::entities::course::CreateCourseRequest,
            crate::entities::course::UpdateCourseRequest,
            crate::entities::lesson::CreateLessonRequest,
            crate::entities::lesson::LessonDTO,
            crate::entities::enrollment::EnrollmentDTO,
            crate::entities::review::CreateReviewRequest,
            crate::entities::video::AddVideosRequest,
            crate::entities::video::CreateVideoRequest,
            crate::entities::video::UpdateVideoRequest,
            crate::entities::playlist::PlaylistDTO,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "authentication", description = "Registration and login"),
        (name = "courses", description = "Course catalog"),
        (name = "media", description = "Videos and playlists"),
        (name = "payments", description = "Checkout, refunds and processor webhooks"),
        (name = "users", description = "Dashboards and learning progress")
    ),
    info(
        title = "Coursehub API",
        version = "0.1.0",
        description = "Course marketplace: catalog, enrollments and payments",
    )
)]
pub struct ApiDoc;
