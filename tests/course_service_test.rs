mod common;

use chrono::{TimeZone, Utc};
use sea_orm::EntityTrait;
use uuid::Uuid;

use coursehub_service::{
    auth::CurrentUser,
    entities::{
        course::{
            CourseCategory, CourseLevel, CourseQuery, CourseSortField, CreateCourseRequest,
            SortOrder, UpdateCourseRequest,
        },
        lesson::{CreateLessonRequest, LessonContent, LessonType},
        prelude::{Course, Lesson},
        review::CreateReviewRequest,
        user::{Model as UserModel, UserRole},
    },
    services::{
        course_service::{
            self, page_params, publish_timestamp, rating_summary, validate_pricing, CatalogError,
        },
        enrollment_service,
    },
};

fn current(user: &UserModel) -> CurrentUser {
    CurrentUser {
        user_id: user.user_id,
        email: user.email.clone(),
        role: user.role(),
    }
}

fn course_request(title: &str, price: f64) -> CreateCourseRequest {
    CreateCourseRequest {
        title: title.to_string(),
        description: "A long description".to_string(),
        short_description: "Short".to_string(),
        category: CourseCategory::Design,
        level: CourseLevel::Intermediate,
        price,
        discount_price: None,
        thumbnail: "https://img.example.com/t.png".to_string(),
        preview_video: None,
        duration: "2h".to_string(),
        requirements: vec![" ".to_string(), "A laptop".to_string()],
        what_you_will_learn: vec!["Typography".to_string()],
        tags: vec!["Design".to_string()],
        language: None,
        is_published: true,
    }
}

fn review(rating: i32) -> CreateReviewRequest {
    CreateReviewRequest {
        rating,
        comment: Some("Great course".to_string()),
    }
}

#[test]
fn test_validate_pricing() {
    assert!(validate_pricing(100.0, None).is_ok());
    assert!(validate_pricing(100.0, Some(80.0)).is_ok());
    assert!(validate_pricing(0.0, None).is_ok());
    assert!(matches!(
        validate_pricing(-1.0, None),
        Err(CatalogError::Invalid(_))
    ));
    assert!(matches!(
        validate_pricing(100.0, Some(100.0)),
        Err(CatalogError::Invalid(_))
    ));
    assert!(matches!(
        validate_pricing(100.0, Some(120.0)),
        Err(CatalogError::Invalid(_))
    ));
}

#[test]
fn test_rating_summary() {
    assert_eq!(rating_summary(&[]), (0.0, 0));
    assert_eq!(rating_summary(&[5]), (5.0, 1));
    assert_eq!(rating_summary(&[4, 5]), (4.5, 2));
    assert_eq!(rating_summary(&[5, 4, 4]), (4.3, 3));
}

#[test]
fn test_publish_timestamp_is_set_once() {
    let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    assert_eq!(publish_timestamp(false, None, later), None);
    assert_eq!(publish_timestamp(true, None, later), Some(later));
    assert_eq!(publish_timestamp(true, Some(first), later), Some(first));
    assert_eq!(publish_timestamp(false, Some(first), later), Some(first));
}

#[test]
fn test_page_params() {
    assert_eq!(page_params(None, None, 12), (1, 12));
    assert_eq!(page_params(Some(0), Some(0), 12), (1, 12));
    assert_eq!(page_params(Some(3), Some(500), 12), (3, 100));
}

#[tokio::test]
async fn test_effective_price_uses_valid_discount() {
    let db = common::setup_test_db().await.unwrap();
    let teacher = common::create_test_user(&db, "teacher@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let discounted = common::create_test_course(&db, teacher.user_id, 100.0, Some(80.0))
        .await
        .unwrap();
    let full_price = common::create_test_course(&db, teacher.user_id, 50.0, None)
        .await
        .unwrap();

    assert_eq!(
        course_service::get_effective_price(&db, discounted.course_id)
            .await
            .unwrap(),
        80.0
    );
    assert_eq!(
        course_service::get_effective_price(&db, full_price.course_id)
            .await
            .unwrap(),
        50.0
    );
    assert!(matches!(
        course_service::get_effective_price(&db, Uuid::new_v4()).await,
        Err(CatalogError::CourseNotFound)
    ));
}

#[tokio::test]
async fn test_enrollment_eligibility() {
    let db = common::setup_test_db().await.unwrap();
    let teacher = common::create_test_user(&db, "teacher@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let student = common::create_test_user(&db, "student@example.com", UserRole::Student)
        .await
        .unwrap();
    let course = common::create_test_course(&db, teacher.user_id, 30.0, None)
        .await
        .unwrap();

    let eligible =
        course_service::is_eligible_for_enrollment(&db, student.user_id, course.course_id)
            .await
            .unwrap();
    assert_eq!(eligible.course_id, course.course_id);

    enrollment_service::enroll(&db, student.user_id, course.course_id)
        .await
        .unwrap();
    assert!(matches!(
        course_service::is_eligible_for_enrollment(&db, student.user_id, course.course_id).await,
        Err(CatalogError::AlreadyEnrolled)
    ));

    let draft = course_service::update_course(
        &db,
        &current(&teacher),
        course.course_id,
        UpdateCourseRequest {
            is_published: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(!draft.is_published);
    assert!(draft.published_at.is_some());

    let other = common::create_test_user(&db, "other@example.com", UserRole::Student)
        .await
        .unwrap();
    assert!(matches!(
        course_service::is_eligible_for_enrollment(&db, other.user_id, course.course_id).await,
        Err(CatalogError::NotPublished)
    ));
}

#[tokio::test]
async fn test_create_update_and_ownership() {
    let db = common::setup_test_db().await.unwrap();
    let teacher = common::create_test_user(&db, "teacher@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let intruder = common::create_test_user(&db, "intruder@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let admin = common::create_test_user(&db, "admin@example.com", UserRole::Admin)
        .await
        .unwrap();

    let created = course_service::create_course(&db, teacher.user_id, course_request(" Layouts ", 40.0))
        .await
        .unwrap();
    assert_eq!(created.title, "Layouts");
    assert_eq!(created.instructor_id, teacher.user_id);
    assert_eq!(created.requirements.0, vec!["A laptop".to_string()]);
    assert_eq!(created.tags.0, vec!["design".to_string()]);
    assert_eq!(created.enrollment_count, 0);
    assert!(created.published_at.is_some());

    let mut bad = course_request("Bad", 40.0);
    bad.discount_price = Some(45.0);
    assert!(matches!(
        course_service::create_course(&db, teacher.user_id, bad).await,
        Err(CatalogError::Invalid(_))
    ));

    let denied = course_service::update_course(
        &db,
        &current(&intruder),
        created.course_id,
        UpdateCourseRequest {
            title: Some("Hijacked".to_string()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(denied, Err(CatalogError::Forbidden(_))));

    let updated = course_service::update_course(
        &db,
        &current(&admin),
        created.course_id,
        UpdateCourseRequest {
            discount_price: Some(Some(30.0)),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.discount_price, Some(30.0));
    assert_eq!(updated.effective_price(), 30.0);
    assert_eq!(updated.instructor_id, teacher.user_id);

    let cleared = course_service::update_course(
        &db,
        &current(&teacher),
        created.course_id,
        UpdateCourseRequest {
            discount_price: Some(None),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(cleared.discount_price, None);
}

#[tokio::test]
async fn test_review_requires_enrollment_and_is_unique() {
    let db = common::setup_test_db().await.unwrap();
    let teacher = common::create_test_user(&db, "teacher@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let student = common::create_test_user(&db, "student@example.com", UserRole::Student)
        .await
        .unwrap();
    let classmate = common::create_test_user(&db, "classmate@example.com", UserRole::Student)
        .await
        .unwrap();
    let course = common::create_test_course(&db, teacher.user_id, 0.0, None)
        .await
        .unwrap();

    let not_enrolled = course_service::add_review(&db, student.user_id, course.course_id, review(5)).await;
    assert!(matches!(not_enrolled, Err(CatalogError::NotEnrolled)));

    enrollment_service::enroll(&db, student.user_id, course.course_id)
        .await
        .unwrap();
    enrollment_service::enroll(&db, classmate.user_id, course.course_id)
        .await
        .unwrap();

    course_service::add_review(&db, student.user_id, course.course_id, review(5))
        .await
        .unwrap();
    let duplicate = course_service::add_review(&db, student.user_id, course.course_id, review(1)).await;
    assert!(matches!(duplicate, Err(CatalogError::DuplicateReview)));

    course_service::add_review(&db, classmate.user_id, course.course_id, review(4))
        .await
        .unwrap();

    let out_of_range = course_service::add_review(&db, classmate.user_id, course.course_id, review(6)).await;
    assert!(matches!(out_of_range, Err(CatalogError::Invalid(_))));

    let course = Course::find_by_id(course.course_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(course.average_rating, 4.5);
    assert_eq!(course.total_ratings, 2);
}

#[tokio::test]
async fn test_course_listing_filters_and_sorting() {
    let db = common::setup_test_db().await.unwrap();
    let teacher = common::create_test_user(&db, "teacher@example.com", UserRole::Teacher)
        .await
        .unwrap();

    course_service::create_course(&db, teacher.user_id, course_request("Color Theory", 10.0))
        .await
        .unwrap();
    course_service::create_course(&db, teacher.user_id, course_request("Advanced Grids", 60.0))
        .await
        .unwrap();
    let mut draft = course_request("Unreleased", 20.0);
    draft.is_published = false;
    course_service::create_course(&db, teacher.user_id, draft)
        .await
        .unwrap();
    common::create_test_course(&db, teacher.user_id, 35.0, None)
        .await
        .unwrap();

    let all = course_service::list_courses(&db, &CourseQuery::default())
        .await
        .unwrap();
    assert_eq!(all.pagination.total_items, 3);
    assert!(all.courses.iter().all(|c| c.is_published));
    assert!(all.courses.iter().all(|c| c.instructor.is_some()));

    let design = course_service::list_courses(
        &db,
        &CourseQuery {
            category: Some(CourseCategory::Design),
            sort_by: Some(CourseSortField::Price),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let prices: Vec<f64> = design.courses.iter().map(|c| c.price).collect();
    assert_eq!(prices, vec![10.0, 60.0]);

    let searched = course_service::list_courses(
        &db,
        &CourseQuery {
            search: Some("GRID".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(searched.courses.len(), 1);
    assert_eq!(searched.courses[0].title, "Advanced Grids");

    let priced = course_service::list_courses(
        &db,
        &CourseQuery {
            min_price: Some(20.0),
            max_price: Some(50.0),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(priced.courses.len(), 1);
    assert_eq!(priced.courses[0].price, 35.0);

    let paged = course_service::list_courses(
        &db,
        &CourseQuery {
            page: Some(2),
            limit: Some(2),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(paged.courses.len(), 1);
    assert_eq!(paged.pagination.total_pages, 2);
    assert!(paged.pagination.has_prev_page);
    assert!(!paged.pagination.has_next_page);
}

#[tokio::test]
async fn test_course_detail_visibility() {
    let db = common::setup_test_db().await.unwrap();
    let teacher = common::create_test_user(&db, "teacher@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let student = common::create_test_user(&db, "student@example.com", UserRole::Student)
        .await
        .unwrap();
    let course = common::create_test_course(&db, teacher.user_id, 0.0, None)
        .await
        .unwrap();
    common::create_test_lessons(&db, course.course_id, 3)
        .await
        .unwrap();

    let anonymous = course_service::get_course_detail(&db, course.course_id, None)
        .await
        .unwrap();
    assert_eq!(anonymous.lessons.len(), 1);
    assert!(!anonymous.is_enrolled);
    assert!(anonymous.course.instructor.is_some());

    enrollment_service::enroll(&db, student.user_id, course.course_id)
        .await
        .unwrap();
    let enrolled = course_service::get_course_detail(&db, course.course_id, Some(&current(&student)))
        .await
        .unwrap();
    assert_eq!(enrolled.lessons.len(), 3);
    assert!(enrolled.is_enrolled);
    assert_eq!(enrolled.user_progress, 0);

    let draft = course_service::create_course(&db, teacher.user_id, {
        let mut request = course_request("Draft", 10.0);
        request.is_published = false;
        request
    })
    .await
    .unwrap();
    assert!(matches!(
        course_service::get_course_detail(&db, draft.course_id, Some(&current(&student))).await,
        Err(CatalogError::CourseNotFound)
    ));
    assert!(
        course_service::get_course_detail(&db, draft.course_id, Some(&current(&teacher)))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_lessons_and_cascade_delete() {
    let db = common::setup_test_db().await.unwrap();
    let teacher = common::create_test_user(&db, "teacher@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let student = common::create_test_user(&db, "student@example.com", UserRole::Student)
        .await
        .unwrap();
    let course = common::create_test_course(&db, teacher.user_id, 0.0, None)
        .await
        .unwrap();
    let owner = current(&teacher);

    let lesson_request = |order: i32| CreateLessonRequest {
        title: format!("Lesson {}", order),
        description: None,
        order,
        lesson_type: LessonType::Video,
        content: LessonContent {
            video_url: Some("https://videos.example.com/1.mp4".to_string()),
            ..Default::default()
        },
        duration: 65,
        is_preview: false,
        is_published: true,
    };

    let lesson = course_service::add_lesson(&db, &owner, course.course_id, lesson_request(1))
        .await
        .unwrap();
    assert_eq!(lesson.formatted_duration(), "1h 5m");
    assert!(matches!(
        course_service::add_lesson(&db, &owner, course.course_id, lesson_request(1)).await,
        Err(CatalogError::DuplicateLessonOrder(1))
    ));
    assert!(matches!(
        course_service::add_lesson(&db, &current(&student), course.course_id, lesson_request(2)).await,
        Err(CatalogError::Forbidden(_))
    ));

    let enrollment = enrollment_service::enroll(&db, student.user_id, course.course_id)
        .await
        .unwrap()
        .enrollment;
    enrollment_service::complete_lesson(&db, enrollment.enrollment_id, lesson.lesson_id, 5, None)
        .await
        .unwrap();
    course_service::add_review(&db, student.user_id, course.course_id, review(5))
        .await
        .unwrap();

    course_service::delete_course(&db, &owner, course.course_id)
        .await
        .unwrap();
    assert!(Course::find_by_id(course.course_id)
        .one(&db)
        .await
        .unwrap()
        .is_none());
    assert!(Lesson::find().all(&db).await.unwrap().is_empty());
    assert!(enrollment_service::find_by_id(&db, enrollment.enrollment_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_course_analytics() {
    let db = common::setup_test_db().await.unwrap();
    let teacher = common::create_test_user(&db, "teacher@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let student = common::create_test_user(&db, "student@example.com", UserRole::Student)
        .await
        .unwrap();
    let course = common::create_test_course(&db, teacher.user_id, 100.0, Some(80.0))
        .await
        .unwrap();

    enrollment_service::enroll_with_payment(
        &db,
        student.user_id,
        course.course_id,
        enrollment_service::EnrollmentPayment {
            transaction_id: "pi_analytics".to_string(),
            amount: 80.0,
            currency: "usd".to_string(),
            payment_method: "stripe".to_string(),
        },
    )
    .await
    .unwrap();

    let analytics = course_service::course_analytics(&db, &current(&teacher), course.course_id)
        .await
        .unwrap();
    assert_eq!(analytics.total_enrollments, 1);
    assert_eq!(analytics.completed_enrollments, 0);
    assert_eq!(analytics.total_revenue, 80.0);
    assert_eq!(analytics.enrollments_by_month.values().sum::<u64>(), 1);
    assert_eq!(analytics.student_progress.len(), 1);
    assert_eq!(
        analytics.student_progress[0].email.as_deref(),
        Some("student@example.com")
    );

    assert!(matches!(
        course_service::course_analytics(&db, &current(&student), course.course_id).await,
        Err(CatalogError::Forbidden(_))
    ));
}
