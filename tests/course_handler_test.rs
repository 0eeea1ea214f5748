mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use coursehub_service::{
    api_docs::{ApiResponse, ErrorResponse},
    entities::course::CourseDTO,
    entities::enrollment::EnrollmentDTO,
    entities::user::UserRole,
    services::course_service::CoursePage,
};

fn course_body() -> String {
    json!({
        "title": "Async Rust",
        "description": "Futures, executors and tokio",
        "short_description": "Async in practice",
        "category": "Programming",
        "level": "Intermediate",
        "price": 49.0,
        "thumbnail": "https://img.example.com/async.png",
        "duration": "6h",
        "what_you_will_learn": ["Futures", "Pinning"],
        "tags": ["rust", "async"],
        "is_published": true
    })
    .to_string()
}

#[tokio::test]
async fn test_list_courses_is_public() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let teacher = common::create_test_user(db.as_ref(), "t@example.com", UserRole::Teacher)
        .await
        .unwrap();
    common::create_test_course(db.as_ref(), teacher.user_id, 0.0, None)
        .await
        .unwrap();
    let app = common::create_test_app(db, Arc::new(common::MockProcessor::default()));

    let response = app
        .oneshot(common::create_request(Method::GET, "/courses?search=rust", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<CoursePage> = common::parse_json(response.into_body()).await;
    let page = body.data.unwrap();
    assert_eq!(page.courses.len(), 1);
    assert_eq!(page.pagination.total_items, 1);
}

#[tokio::test]
async fn test_create_course_requires_teacher() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let student = common::create_test_user(db.as_ref(), "s@example.com", UserRole::Student)
        .await
        .unwrap();
    let teacher = common::create_test_user(db.as_ref(), "t@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let app = common::create_test_app(db, Arc::new(common::MockProcessor::default()));

    let anonymous = app
        .clone()
        .oneshot(common::create_request(Method::POST, "/courses", course_body()))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let forbidden = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            "/courses",
            &common::create_test_token(&student),
            course_body(),
        ))
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let created = app
        .oneshot(common::create_authorized_request(
            Method::POST,
            "/courses",
            &common::create_test_token(&teacher),
            course_body(),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let body: ApiResponse<CourseDTO> = common::parse_json(created.into_body()).await;
    let course = body.data.unwrap();
    assert_eq!(course.instructor_id, teacher.user_id);
    assert_eq!(course.effective_price, 49.0);
    assert!(course.published_at.is_some());
}

#[tokio::test]
async fn test_enroll_free_course_is_idempotent() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let teacher = common::create_test_user(db.as_ref(), "t@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let student = common::create_test_user(db.as_ref(), "s@example.com", UserRole::Student)
        .await
        .unwrap();
    let course = common::create_test_course(db.as_ref(), teacher.user_id, 0.0, None)
        .await
        .unwrap();
    let app = common::create_test_app(db, Arc::new(common::MockProcessor::default()));
    let token = common::create_test_token(&student);
    let uri = format!("/courses/{}/enroll", course.course_id);

    let first = app
        .clone()
        .oneshot(common::create_authorized_request(Method::POST, &uri, &token, ""))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first: ApiResponse<EnrollmentDTO> = common::parse_json(first.into_body()).await;
    let first = first.data.unwrap();
    assert_eq!(first.progress, 0);

    let second = app
        .clone()
        .oneshot(common::create_authorized_request(Method::POST, &uri, &token, ""))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second: ApiResponse<EnrollmentDTO> = common::parse_json(second.into_body()).await;
    assert_eq!(
        second.message.as_deref(),
        Some("Already enrolled in this course")
    );
    assert_eq!(second.data.unwrap().enrollment_id, first.enrollment_id);

    let detail = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            &format!("/courses/{}", course.course_id),
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(detail.status(), StatusCode::OK);
    let detail: ApiResponse<Value> = common::parse_json(detail.into_body()).await;
    let detail = detail.data.unwrap();
    assert_eq!(detail["is_enrolled"], json!(true));
    assert_eq!(detail["course"]["enrollment_count"], json!(1));
}

#[tokio::test]
async fn test_enroll_paid_course_requires_payment() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let teacher = common::create_test_user(db.as_ref(), "t@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let student = common::create_test_user(db.as_ref(), "s@example.com", UserRole::Student)
        .await
        .unwrap();
    let course = common::create_test_course(db.as_ref(), teacher.user_id, 100.0, Some(80.0))
        .await
        .unwrap();
    let app = common::create_test_app(db, Arc::new(common::MockProcessor::default()));

    let response = app
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/courses/{}/enroll", course.course_id),
            &common::create_test_token(&student),
            "",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = common::parse_json(response.into_body()).await;
    assert_eq!(error.message, "This course requires payment");
}

#[tokio::test]
async fn test_unknown_course_is_not_found() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db, Arc::new(common::MockProcessor::default()));

    let response = app
        .oneshot(common::create_request(
            Method::GET,
            &format!("/courses/{}", uuid::Uuid::new_v4()),
            "",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_after_enrollment() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let teacher = common::create_test_user(db.as_ref(), "t@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let student = common::create_test_user(db.as_ref(), "s@example.com", UserRole::Student)
        .await
        .unwrap();
    let course = common::create_test_course(db.as_ref(), teacher.user_id, 0.0, None)
        .await
        .unwrap();
    let app = common::create_test_app(db, Arc::new(common::MockProcessor::default()));
    let token = common::create_test_token(&student);
    let review_uri = format!("/courses/{}/reviews", course.course_id);
    let review = json!({ "rating": 5, "comment": "Clear and practical" }).to_string();

    let not_enrolled = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            &review_uri,
            &token,
            review.clone(),
        ))
        .await
        .unwrap();
    assert!(not_enrolled.status().is_client_error());

    app.clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/courses/{}/enroll", course.course_id),
            &token,
            "",
        ))
        .await
        .unwrap();

    let created = app
        .oneshot(common::create_authorized_request(
            Method::POST,
            &review_uri,
            &token,
            review,
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
}
