mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use coursehub_service::{
    api_docs::ApiResponse,
    entities::playlist::PlaylistDTO,
    entities::user::UserRole,
    entities::video::{derive_youtube_id, extract_youtube_id, VideoDTO, VideoType},
};

#[test]
fn test_extract_youtube_id() {
    assert_eq!(
        extract_youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
        Some("dQw4w9WgXcQ".to_string())
    );
    assert_eq!(
        extract_youtube_id("https://youtu.be/dQw4w9WgXcQ?t=42"),
        Some("dQw4w9WgXcQ".to_string())
    );
    assert_eq!(
        extract_youtube_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
        Some("dQw4w9WgXcQ".to_string())
    );
    assert_eq!(extract_youtube_id("https://vimeo.com/123456"), None);
    assert_eq!(
        derive_youtube_id(VideoType::Upload, "https://youtu.be/dQw4w9WgXcQ"),
        None
    );
}

#[tokio::test]
async fn test_add_videos_and_build_playlist() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let teacher = common::create_test_user(db.as_ref(), "t@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let course = common::create_test_course(db.as_ref(), teacher.user_id, 0.0, None)
        .await
        .unwrap();
    let app = common::create_test_app(db, Arc::new(common::MockProcessor::default()));
    let token = common::create_test_token(&teacher);

    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/courses/{}/videos", course.course_id),
            &token,
            json!({
                "videos": [
                    { "title": "Intro", "url": "https://youtu.be/dQw4w9WgXcQ", "duration": 120 },
                    { "title": "Setup", "url": "https://cdn.example.com/setup.mp4", "duration": 300, "video_type": "upload" }
                ]
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let videos: ApiResponse<Vec<VideoDTO>> = common::parse_json(response.into_body()).await;
    let videos = videos.data.unwrap();
    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0].youtube_id.as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(videos[0].order, 1);
    assert_eq!(videos[1].order, 2);
    assert_eq!(videos[1].youtube_id, None);

    let video = app
        .clone()
        .oneshot(common::create_request(
            Method::GET,
            &format!("/videos/{}", videos[0].video_id),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(video.status(), StatusCode::OK);

    // Playlist order follows the given ids
    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            "/playlists",
            &token,
            json!({
                "course_id": course.course_id,
                "title": "Getting started",
                "video_ids": [videos[1].video_id, videos[0].video_id]
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let playlist: ApiResponse<PlaylistDTO> = common::parse_json(response.into_body()).await;
    let playlist = playlist.data.unwrap();
    let ordered: Vec<_> = playlist.videos.iter().map(|v| v.video_id).collect();
    assert_eq!(ordered, vec![videos[1].video_id, videos[0].video_id]);

    let response = app
        .clone()
        .oneshot(common::create_request(
            Method::GET,
            &format!("/playlists?courseId={}", course.course_id),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed: ApiResponse<Vec<PlaylistDTO>> = common::parse_json(response.into_body()).await;
    assert_eq!(listed.data.unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::DELETE,
            &format!("/playlists/{}", playlist.playlist_id),
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Deleting the playlist keeps its videos
    let video = app
        .oneshot(common::create_request(
            Method::GET,
            &format!("/videos/{}", videos[1].video_id),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(video.status(), StatusCode::OK);
    let video: ApiResponse<VideoDTO> = common::parse_json(video.into_body()).await;
    assert_eq!(video.data.unwrap().playlist_id, None);
}

#[tokio::test]
async fn test_add_videos_rejects_incomplete_batch_and_strangers() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let teacher = common::create_test_user(db.as_ref(), "t@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let other = common::create_test_user(db.as_ref(), "o@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let course = common::create_test_course(db.as_ref(), teacher.user_id, 0.0, None)
        .await
        .unwrap();
    let app = common::create_test_app(db, Arc::new(common::MockProcessor::default()));
    let uri = format!("/courses/{}/videos", course.course_id);

    let incomplete = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            &uri,
            &common::create_test_token(&teacher),
            json!({ "videos": [{ "title": "No url", "url": "", "duration": 60 }] }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(incomplete.status(), StatusCode::BAD_REQUEST);

    let stranger = app
        .oneshot(common::create_authorized_request(
            Method::POST,
            &uri,
            &common::create_test_token(&other),
            json!({ "videos": [{ "title": "Intro", "url": "https://youtu.be/dQw4w9WgXcQ", "duration": 60 }] })
                .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(stranger.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_video_management_lifecycle() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let teacher = common::create_test_user(db.as_ref(), "t@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let course = common::create_test_course(db.as_ref(), teacher.user_id, 0.0, None)
        .await
        .unwrap();
    let app = common::create_test_app(db, Arc::new(common::MockProcessor::default()));
    let token = common::create_test_token(&teacher);

    // Inserted out of order, listed by position
    let mut created = Vec::new();
    for (title, order) in [("Second", 2), ("First", 1)] {
        let response = app
            .clone()
            .oneshot(common::create_authorized_request(
                Method::POST,
                "/videos",
                &token,
                json!({
                    "course_id": course.course_id,
                    "title": title,
                    "url": "https://cdn.example.com/clip.mp4",
                    "duration": 90,
                    "video_type": "upload",
                    "order": order
                })
                .to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let video: ApiResponse<VideoDTO> = common::parse_json(response.into_body()).await;
        created.push(video.data.unwrap());
    }

    let response = app
        .clone()
        .oneshot(common::create_request(
            Method::GET,
            &format!("/videos?courseId={}", course.course_id),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed: ApiResponse<Vec<VideoDTO>> = common::parse_json(response.into_body()).await;
    let titles: Vec<_> = listed.data.unwrap().into_iter().map(|v| v.title).collect();
    assert_eq!(titles, vec!["First".to_string(), "Second".to_string()]);

    // Switching to a YouTube URL derives the id again
    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::PUT,
            &format!("/videos/{}", created[0].video_id),
            &token,
            json!({
                "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                "video_type": "youtube",
                "title": "Second, now hosted"
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: ApiResponse<VideoDTO> = common::parse_json(response.into_body()).await;
    let updated = updated.data.unwrap();
    assert_eq!(updated.youtube_id.as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(updated.title, "Second, now hosted");
    assert_eq!(updated.duration, 90);
    assert_eq!(updated.order, 2);

    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::DELETE,
            &format!("/videos/{}", created[1].video_id),
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let gone = app
        .oneshot(common::create_request(
            Method::GET,
            &format!("/videos/{}", created[1].video_id),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_video_changes_need_course_owner() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let teacher = common::create_test_user(db.as_ref(), "t@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let other = common::create_test_user(db.as_ref(), "o@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let course = common::create_test_course(db.as_ref(), teacher.user_id, 0.0, None)
        .await
        .unwrap();
    let app = common::create_test_app(db, Arc::new(common::MockProcessor::default()));

    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            "/videos",
            &common::create_test_token(&teacher),
            json!({
                "course_id": course.course_id,
                "title": "Intro",
                "url": "https://youtu.be/dQw4w9WgXcQ",
                "duration": 60
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let video: ApiResponse<VideoDTO> = common::parse_json(response.into_body()).await;
    let video = video.data.unwrap();
    assert_eq!(video.youtube_id.as_deref(), Some("dQw4w9WgXcQ"));

    let stranger_token = common::create_test_token(&other);
    let uri = format!("/videos/{}", video.video_id);

    let update = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::PUT,
            &uri,
            &stranger_token,
            json!({ "title": "Taken over" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(update.status(), StatusCode::FORBIDDEN);

    let delete = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::DELETE,
            &uri,
            &stranger_token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::FORBIDDEN);

    let anonymous = app
        .oneshot(common::create_request(Method::DELETE, &uri, ""))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}
