mod common;

use uuid::Uuid;

use coursehub_service::{
    entities::user::{
        RegisterRequest, RegistrationRole, UpdatePasswordRequest, UpdateProfileRequest, UserRole,
    },
    services::user_service::{self, UserError},
};

fn register_request(email: &str, role: RegistrationRole) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: common::TEST_PASSWORD.to_string(),
        first_name: " Jane ".to_string(),
        last_name: "Doe".to_string(),
        role,
    }
}

#[tokio::test]
async fn test_register_student_normalizes_email() {
    let db = common::setup_test_db().await.unwrap();

    let user = user_service::register(
        &db,
        register_request("  Jane.Doe@Example.COM ", RegistrationRole::Student),
    )
    .await
    .unwrap();

    assert_eq!(user.email, "jane.doe@example.com");
    assert_eq!(user.first_name, "Jane");
    assert_eq!(user.role(), UserRole::Student);
    assert_ne!(user.password_hash, common::TEST_PASSWORD);
    assert!(user.is_active);
    assert!(user.stripe_customer_id.is_none());
}

#[tokio::test]
async fn test_register_teacher() {
    let db = common::setup_test_db().await.unwrap();

    let user = user_service::register(
        &db,
        register_request("teacher@example.com", RegistrationRole::Teacher),
    )
    .await
    .unwrap();

    assert_eq!(user.role, "TEACHER");
}

#[tokio::test]
async fn test_register_duplicate_email_ignores_case() {
    let db = common::setup_test_db().await.unwrap();

    user_service::register(&db, register_request("dup@example.com", RegistrationRole::Student))
        .await
        .unwrap();
    let result = user_service::register(
        &db,
        register_request("DUP@example.com", RegistrationRole::Teacher),
    )
    .await;

    assert!(matches!(result, Err(UserError::EmailTaken)));
}

#[tokio::test]
async fn test_login_success_and_failures() {
    let db = common::setup_test_db().await.unwrap();
    let user = common::create_test_user(&db, "login@example.com", UserRole::Student)
        .await
        .unwrap();

    let (found, token) = user_service::login(&db, "LOGIN@example.com", common::TEST_PASSWORD)
        .await
        .unwrap();
    assert_eq!(found.user_id, user.user_id);
    assert!(!token.is_empty());

    let wrong_password = user_service::login(&db, "login@example.com", "wrong-password").await;
    assert!(matches!(wrong_password, Err(UserError::InvalidCredentials)));

    let unknown = user_service::login(&db, "nobody@example.com", common::TEST_PASSWORD).await;
    assert!(matches!(unknown, Err(UserError::InvalidCredentials)));
}

#[tokio::test]
async fn test_find_by_id_not_found() {
    let db = common::setup_test_db().await.unwrap();

    let result = user_service::find_by_id(&db, Uuid::new_v4()).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_update_profile_only_touches_given_fields() {
    let db = common::setup_test_db().await.unwrap();
    let user = common::create_test_user(&db, "profile@example.com", UserRole::Student)
        .await
        .unwrap();

    let updated = user_service::update_profile(
        &db,
        user.user_id,
        UpdateProfileRequest {
            bio: Some("Learning Rust".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.bio.as_deref(), Some("Learning Rust"));
    assert_eq!(updated.first_name, user.first_name);
    assert_eq!(updated.last_name, user.last_name);
}

#[tokio::test]
async fn test_update_password_requires_current_password() {
    let db = common::setup_test_db().await.unwrap();
    let user = common::create_test_user(&db, "pw@example.com", UserRole::Student)
        .await
        .unwrap();

    let rejected = user_service::update_password(
        &db,
        user.user_id,
        UpdatePasswordRequest {
            current_password: "not-my-password".to_string(),
            new_password: "new-password-123".to_string(),
        },
    )
    .await;
    assert!(matches!(rejected, Err(UserError::IncorrectPassword)));

    user_service::update_password(
        &db,
        user.user_id,
        UpdatePasswordRequest {
            current_password: common::TEST_PASSWORD.to_string(),
            new_password: "new-password-123".to_string(),
        },
    )
    .await
    .unwrap();

    assert!(user_service::login(&db, "pw@example.com", "new-password-123")
        .await
        .is_ok());
}

#[tokio::test]
async fn test_teachers_listing_excludes_students() {
    let db = common::setup_test_db().await.unwrap();
    let teacher = common::create_test_user(&db, "t@example.com", UserRole::Teacher)
        .await
        .unwrap();
    let student = common::create_test_user(&db, "s@example.com", UserRole::Student)
        .await
        .unwrap();

    let teachers = user_service::list_teachers(&db).await.unwrap();
    assert_eq!(teachers.len(), 1);
    assert_eq!(teachers[0].user_id, teacher.user_id);

    assert!(user_service::find_teacher(&db, teacher.user_id).await.is_ok());
    assert!(matches!(
        user_service::find_teacher(&db, student.user_id).await,
        Err(UserError::TeacherNotFound)
    ));
}
