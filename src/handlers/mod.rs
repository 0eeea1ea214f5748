pub mod auth_handler;
pub mod course_handler;
pub mod payment_handler;
pub mod playlist_handler;
pub mod user_handler;
pub mod video_handler;
