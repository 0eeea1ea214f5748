use axum::{
    body::Bytes,
    extract::{Extension, Json, Query},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api_docs::{ApiResponse, ErrorResponse},
    auth::CurrentUser,
    entities::user,
    error::AppError,
    services::course_service,
    services::enrollment_service::{self, EnrollmentPayment},
    services::payment_service::{
        enrollment_metadata, Metadata, PaymentRecord, PaymentService, RefundSummary,
        PAYMENT_METHOD, PROCESSOR_ID,
    },
    services::user_service::{self, UserError},
};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreatePaymentIntentRequest {
    pub course_id: Uuid,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct ConfirmPaymentRequest {
    #[validate(
        length(min = 1, message = "Payment intent ID is required"),
        regex(path = *PROCESSOR_ID, message = "Invalid payment intent ID")
    )]
    pub payment_intent_id: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RefundRequest {
    #[validate(
        length(min = 1, message = "Payment intent ID is required"),
        regex(path = *PROCESSOR_ID, message = "Invalid payment intent ID")
    )]
    pub payment_intent_id: String,
    /// Major units; a full refund when absent.
    #[validate(range(exclusive_min = 0.0, message = "Refund amount must be positive"))]
    pub amount: Option<f64>,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutSession {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub amount: f64,
    pub currency: String,
    pub course_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentConfirmation {
    pub enrollment_id: Uuid,
    pub transaction_id: String,
    /// False when the enrollment already existed, e.g. created by the webhook.
    pub created: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentHistory {
    pub payments: Vec<PaymentRecord>,
}

/// Returns the user's processor customer id, creating the customer on first
/// checkout. Checkout continues without one if creation fails.
async fn ensure_customer(
    db: &DatabaseConnection,
    payments: &PaymentService,
    user: user::Model,
) -> Result<Option<String>, AppError> {
    if let Some(customer_id) = user.stripe_customer_id.clone() {
        return Ok(Some(customer_id));
    }

    let mut metadata = Metadata::new();
    metadata.insert("userId".to_string(), user.user_id.to_string());

    let outcome = payments
        .create_customer(&user.email, &user.full_name(), &metadata)
        .await;
    match outcome.into_app_result() {
        Ok(customer_id) => {
            user_service::set_stripe_customer_id(db, user, customer_id.clone()).await?;
            Ok(Some(customer_id))
        }
        Err(e) => {
            tracing::warn!("Could not create processor customer for {}: {}", user.user_id, e);
            Ok(None)
        }
    }
}

#[utoipa::path(
    post,
    path = "/payments/create-payment-intent",
    tag = "payments",
    request_body = CreatePaymentIntentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Payment intent created", body = CheckoutSession),
        (status = 400, description = "Course unavailable, free, or processor error", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Already enrolled", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn create_payment_intent(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(payments): Extension<Arc<PaymentService>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<CreatePaymentIntentRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let course =
        course_service::is_eligible_for_enrollment(db.as_ref(), current_user.user_id, payload.course_id)
            .await?;
    let amount = course.effective_price();
    if amount <= 0.0 {
        return Err(AppError::Validation(
            "This course is free, enroll directly".to_string(),
        ));
    }

    let user = user_service::find_by_id(db.as_ref(), current_user.user_id)
        .await?
        .ok_or(UserError::NotFound)?;
    let customer_id = ensure_customer(db.as_ref(), payments.as_ref(), user).await?;

    let metadata = enrollment_metadata(current_user.user_id, course.course_id, &course.title);
    let intent = payments
        .create_payment_intent(amount, payments.currency(), &metadata, customer_id.as_deref())
        .await
        .into_app_result()?;

    tracing::info!(
        "Payment intent {} created for user {} course {}",
        intent.payment_intent_id,
        current_user.user_id,
        course.course_id
    );

    Ok(Json(ApiResponse::data(CheckoutSession {
        client_secret: intent.client_secret,
        payment_intent_id: intent.payment_intent_id,
        amount,
        currency: payments.currency().to_string(),
        course_name: course.title,
    }))
    .into_response())
}

#[utoipa::path(
    post,
    path = "/payments/confirm-payment",
    tag = "payments",
    request_body = ConfirmPaymentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Payment confirmed, enrollment created or already present", body = PaymentConfirmation),
        (status = 400, description = "Payment not completed or processor error", body = ErrorResponse),
        (status = 403, description = "Payment belongs to another user", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn confirm_payment(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(payments): Extension<Arc<PaymentService>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let confirmed = payments
        .confirm_payment(&payload.payment_intent_id)
        .await
        .into_app_result()?;

    if !confirmed.is_succeeded() {
        tracing::info!(
            "Intent {} not settled yet (status {})",
            confirmed.payment_intent_id,
            confirmed.status
        );
        return Err(AppError::Payment("Payment not completed".to_string()));
    }

    let course_id = confirmed
        .course_id()
        .ok_or_else(|| AppError::Payment("Payment is not linked to a course".to_string()))?;
    if confirmed.user_id() != Some(current_user.user_id) {
        return Err(AppError::Forbidden(
            "Payment belongs to another user".to_string(),
        ));
    }

    let payment = EnrollmentPayment {
        transaction_id: confirmed.payment_intent_id.clone(),
        amount: confirmed.amount,
        currency: confirmed.currency.clone(),
        payment_method: PAYMENT_METHOD.to_string(),
    };
    let enrolled =
        enrollment_service::enroll_with_payment(db.as_ref(), current_user.user_id, course_id, payment)
            .await?;

    Ok(Json(ApiResponse::with_message(
        "Payment confirmed and enrollment created",
        PaymentConfirmation {
            enrollment_id: enrolled.enrollment.enrollment_id,
            transaction_id: confirmed.payment_intent_id,
            created: enrolled.created,
        },
    ))
    .into_response())
}

#[utoipa::path(
    get,
    path = "/payments/history",
    tag = "payments",
    params(HistoryQuery),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Recent payments of the caller", body = PaymentHistory),
        (status = 400, description = "Processor error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn payment_history(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(payments): Extension<Arc<PaymentService>>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, AppError> {
    let user = user_service::find_by_id(db.as_ref(), current_user.user_id)
        .await?
        .ok_or(UserError::NotFound)?;

    let payments = match user.stripe_customer_id {
        Some(customer_id) => payments
            .payment_history(&customer_id, query.limit)
            .await
            .into_app_result()?,
        None => Vec::new(),
    };

    Ok(Json(ApiResponse::data(PaymentHistory { payments })).into_response())
}

#[utoipa::path(
    post,
    path = "/payments/refund",
    tag = "payments",
    request_body = RefundRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Refund processed", body = RefundSummary),
        (status = 400, description = "Invalid input or processor error", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn refund(
    Extension(payments): Extension<Arc<PaymentService>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<RefundRequest>,
) -> Result<Response, AppError> {
    current_user.require_admin()?;
    payload.validate()?;

    let refund = payments
        .process_refund(
            &payload.payment_intent_id,
            payload.amount,
            payload.reason.as_deref(),
        )
        .await
        .into_app_result()?;

    Ok(Json(ApiResponse::with_message(
        "Refund processed successfully",
        refund,
    ))
    .into_response())
}

#[utoipa::path(
    post,
    path = "/payments/webhook",
    tag = "payments",
    request_body(content = String, description = "Raw processor event", content_type = "application/json"),
    params(("stripe-signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")),
    responses(
        (status = 200, description = "Event received"),
        (status = 400, description = "Missing, invalid or stale signature", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn webhook(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(payments): Extension<Arc<PaymentService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok());

    match payments.handle_webhook(db.as_ref(), &body, signature).await {
        Ok(outcome) => {
            tracing::debug!("Webhook handled: {:?}", outcome);
            Ok(Json(serde_json::json!({ "received": true })).into_response())
        }
        Err(e) => {
            tracing::warn!("Webhook rejected: {}", e);
            Err(e.into())
        }
    }
}
