#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{self, Request},
    Router,
};
use chrono::Utc;
use dotenvy::dotenv;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, DbErr, Set};
use std::{
    collections::HashMap,
    env,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

use coursehub_service::{
    auth::password,
    config::StripeConfig,
    entities::{
        course::{self, CourseCategory, CourseLevel},
        lesson::{self, LessonContent, LessonType},
        user::{self, Model as UserModel, UserRole},
        StringList,
    },
    services::payment_service::{
        Customer, Metadata, PaymentIntent, PaymentProcessor, PaymentService, ProcessorError,
        Refund,
    },
};

// Define a constant for the body size limit (16MB)
const BODY_SIZE_LIMIT: usize = 16 * 1024 * 1024;

pub const TEST_PASSWORD: &str = "password123";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Sets up the JWT_SECRET environment variable for tests
pub fn setup_jwt_secret() {
    env::set_var("JWT_SECRET", "test_secret_for_tests");
}

/// Creates an in-memory SQLite database for testing
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    dotenv().ok();
    setup_jwt_secret();
    let db = Database::connect("sqlite::memory:").await?;
    coursehub_service::db::ensure_schema_exists(&db).await?;
    Ok(db)
}

/// In-memory stand-in for the payment processor. Intents are kept in a map
/// so tests can flip their status the way a real checkout would.
#[derive(Default)]
pub struct MockProcessor {
    intents: Mutex<HashMap<String, PaymentIntent>>,
    pub created_amounts: Mutex<Vec<i64>>,
    pub refunds: Mutex<Vec<(String, Option<i64>, String)>>,
    pub customers: Mutex<Vec<String>>,
}

impl MockProcessor {
    pub fn set_status(&self, intent_id: &str, status: &str) {
        if let Some(intent) = self.intents.lock().unwrap().get_mut(intent_id) {
            intent.status = status.to_string();
        }
    }

    pub fn insert_intent(&self, intent: PaymentIntent) {
        self.intents
            .lock()
            .unwrap()
            .insert(intent.id.clone(), intent);
    }

    pub fn intent(&self, intent_id: &str) -> Option<PaymentIntent> {
        self.intents.lock().unwrap().get(intent_id).cloned()
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: &Metadata,
        customer: Option<&str>,
    ) -> Result<PaymentIntent, ProcessorError> {
        let id = format!("pi_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            id: id.clone(),
            client_secret: Some(format!("{}_secret", id)),
            amount,
            currency: currency.to_string(),
            status: "requires_payment_method".to_string(),
            metadata: metadata.clone(),
            customer: customer.map(str::to_string),
            created: Utc::now().timestamp(),
        };
        self.created_amounts.lock().unwrap().push(amount);
        self.insert_intent(intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProcessorError> {
        self.intent(intent_id).ok_or_else(|| ProcessorError::Api {
            status: 404,
            message: format!("No such payment_intent: '{}'", intent_id),
        })
    }

    async fn create_customer(
        &self,
        email: &str,
        _name: &str,
        _metadata: &Metadata,
    ) -> Result<Customer, ProcessorError> {
        self.customers.lock().unwrap().push(email.to_string());
        Ok(Customer {
            id: format!("cus_{}", Uuid::new_v4().simple()),
        })
    }

    async fn create_refund(
        &self,
        intent_id: &str,
        amount: Option<i64>,
        reason: &str,
    ) -> Result<Refund, ProcessorError> {
        let intent = self.retrieve_payment_intent(intent_id).await?;
        self.refunds
            .lock()
            .unwrap()
            .push((intent_id.to_string(), amount, reason.to_string()));
        Ok(Refund {
            id: format!("re_{}", Uuid::new_v4().simple()),
            amount: amount.unwrap_or(intent.amount),
            status: Some("succeeded".to_string()),
        })
    }

    async fn list_payment_intents(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<PaymentIntent>, ProcessorError> {
        Ok(self
            .intents
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.customer.as_deref() == Some(customer_id))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

pub fn test_stripe_config() -> StripeConfig {
    StripeConfig {
        secret_key: Some("sk_test".to_string()),
        webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        ..StripeConfig::default()
    }
}

pub fn payment_service(processor: Arc<MockProcessor>) -> PaymentService {
    PaymentService::new(Some(processor as Arc<dyn PaymentProcessor>), &test_stripe_config())
}

/// Creates the full API router backed by the given database and processor
pub fn create_test_app(db: Arc<DatabaseConnection>, processor: Arc<MockProcessor>) -> Router {
    coursehub_service::build_app(db, Arc::new(payment_service(processor)))
}

/// Creates a test user in the database
pub async fn create_test_user(
    db: &DatabaseConnection,
    email: &str,
    role: UserRole,
) -> Result<UserModel, DbErr> {
    let now = Utc::now();
    let password_hash = password::hash_password(TEST_PASSWORD)
        .map_err(|e| DbErr::Custom(e.to_string()))?;
    let user = user::ActiveModel {
        user_id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        first_name: Set("Test".to_string()),
        last_name: Set("User".to_string()),
        role: Set(role.to_string()),
        profile_picture: Set(None),
        bio: Set(None),
        stripe_customer_id: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };

    user.insert(db).await
}

/// Creates a published course owned by `instructor_id`
pub async fn create_test_course(
    db: &DatabaseConnection,
    instructor_id: Uuid,
    price: f64,
    discount_price: Option<f64>,
) -> Result<course::Model, DbErr> {
    let now = Utc::now();
    course::ActiveModel {
        course_id: Set(Uuid::new_v4()),
        title: Set("Rust for Services".to_string()),
        description: Set("Build web services in Rust".to_string()),
        short_description: Set("Rust services".to_string()),
        instructor_id: Set(instructor_id),
        category: Set(CourseCategory::Programming),
        level: Set(CourseLevel::Beginner),
        price: Set(price),
        discount_price: Set(discount_price),
        thumbnail: Set("https://img.example.com/rust.png".to_string()),
        preview_video: Set(None),
        duration: Set("4h".to_string()),
        requirements: Set(StringList::default()),
        what_you_will_learn: Set(StringList(vec!["Axum".to_string()])),
        tags: Set(StringList(vec!["rust".to_string()])),
        language: Set("English".to_string()),
        enrollment_count: Set(0),
        average_rating: Set(0.0),
        total_ratings: Set(0),
        is_published: Set(true),
        published_at: Set(Some(now)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
}

/// Adds `count` lessons with orders 1..=count
pub async fn create_test_lessons(
    db: &DatabaseConnection,
    course_id: Uuid,
    count: i32,
) -> Result<Vec<lesson::Model>, DbErr> {
    let now = Utc::now();
    let mut lessons = Vec::new();
    for order in 1..=count {
        let lesson = lesson::ActiveModel {
            lesson_id: Set(Uuid::new_v4()),
            course_id: Set(course_id),
            title: Set(format!("Lesson {}", order)),
            description: Set(None),
            order: Set(order),
            lesson_type: Set(LessonType::Text),
            content: Set(LessonContent::default()),
            duration: Set(10),
            is_preview: Set(order == 1),
            is_published: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
        lessons.push(lesson);
    }
    Ok(lessons)
}

/// Creates a JWT token for testing
pub fn create_test_token(user: &UserModel) -> String {
    setup_jwt_secret();
    coursehub_service::auth::jwt::create_token(user.user_id, &user.email, &user.role())
        .expect("Failed to create test token")
}

/// Creates a test request with authorization header
pub fn create_authorized_request<B>(
    method: http::Method,
    uri: &str,
    token: &str,
    body: B,
) -> Request<Body>
where
    B: Into<Body>,
{
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .header(http::header::AUTHORIZATION, format!("Bearer {}", token))
        .body(body.into())
        .unwrap()
}

/// Creates a test request without authorization
pub fn create_request<B>(method: http::Method, uri: &str, body: B) -> Request<Body>
where
    B: Into<Body>,
{
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(body.into())
        .unwrap()
}

/// Helper to parse response body as JSON
pub async fn parse_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = to_bytes(body, BODY_SIZE_LIMIT).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
