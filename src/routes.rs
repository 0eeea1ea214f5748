use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::auth::middleware::auth_middleware;
use crate::handlers::{
    auth_handler, course_handler, payment_handler, playlist_handler, user_handler, video_handler,
};

/// Routes reachable without a token. Course and playlist reads still pick up
/// the caller when a valid bearer token is sent.
fn public_routes() -> Router {
    Router::new()
        .route("/auth/register", post(auth_handler::register))
        .route("/auth/login", post(auth_handler::login))
        .route("/courses", get(course_handler::list_courses))
        .route("/courses/{id}", get(course_handler::get_course))
        .route("/videos", get(video_handler::list_videos))
        .route("/videos/{id}", get(video_handler::get_video))
        .route("/playlists", get(playlist_handler::list_playlists))
        .route("/playlists/{id}", get(playlist_handler::get_playlist))
        // Authenticated by the processor signature, not a bearer token.
        .route("/payments/webhook", post(payment_handler::webhook))
}

fn protected_routes() -> Router {
    Router::new()
        .route("/auth/me", get(auth_handler::get_current_user))
        .route("/courses", post(course_handler::create_course))
        .route(
            "/courses/{id}",
            put(course_handler::update_course).delete(course_handler::delete_course),
        )
        .route("/courses/{id}/enroll", post(course_handler::enroll_course))
        .route("/courses/{id}/reviews", post(course_handler::add_review))
        .route(
            "/courses/{id}/analytics",
            get(course_handler::course_analytics),
        )
        .route("/courses/{id}/lessons", post(course_handler::add_lesson))
        .route(
            "/courses/{id}/videos",
            post(video_handler::add_course_videos),
        )
        .route("/videos", post(video_handler::create_video))
        .route(
            "/videos/{id}",
            put(video_handler::update_video).delete(video_handler::delete_video),
        )
        .route("/playlists", post(playlist_handler::create_playlist))
        .route(
            "/playlists/{id}",
            put(playlist_handler::update_playlist).delete(playlist_handler::delete_playlist),
        )
        .route(
            "/payments/create-payment-intent",
            post(payment_handler::create_payment_intent),
        )
        .route(
            "/payments/confirm-payment",
            post(payment_handler::confirm_payment),
        )
        .route("/payments/history", get(payment_handler::payment_history))
        .route("/payments/refund", post(payment_handler::refund))
        .route("/users/dashboard", get(user_handler::dashboard))
        .route(
            "/users/enrolled-courses",
            get(user_handler::enrolled_courses),
        )
        .route("/users/created-courses", get(user_handler::created_courses))
        .route(
            "/users/course-progress/{course_id}",
            put(user_handler::update_course_progress),
        )
        .route("/users/learning-stats", get(user_handler::learning_stats))
        .route("/users/teachers", get(user_handler::list_teachers))
        .route("/users/teacher/{id}", get(user_handler::get_teacher))
        .route("/users/profile", put(user_handler::update_profile))
        .route("/users/password", put(user_handler::update_password))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Every API route. Paths shared by both halves are merged per method, so
/// `GET /courses` stays public while `POST /courses` requires a token.
pub fn api_router() -> Router {
    public_routes().merge(protected_routes())
}
