pub mod course_service;
pub mod enrollment_service;
pub mod payment_service;
pub mod playlist_service;
pub mod stripe_client;
pub mod user_service;
pub mod video_service;
