use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::StripeConfig;
use crate::error::AppError;
use crate::services::enrollment_service::{self, EnrollmentError, EnrollmentPayment};
use crate::services::stripe_client::StripeClient;

pub const DEFAULT_REFUND_REASON: &str = "requested_by_customer";
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;
pub const PAYMENT_METHOD: &str = "stripe";
pub const INTENT_SUCCEEDED: &str = "succeeded";

pub type Metadata = BTreeMap<String, String>;

type HmacSha256 = Hmac<Sha256>;

/// Shape of processor object ids such as `pi_3Nq...`. Ids are interpolated
/// into request paths, so nothing else is sent.
pub static PROCESSOR_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("processor id pattern is valid"));

/// Failure reported by the processor or by the transport to it.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Payment processor unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected response from payment processor: {0}")]
    InvalidResponse(String),
    #[error("Invalid payment intent ID: {0}")]
    InvalidId(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{0}")]
    NotConfigured(&'static str),
    #[error("Missing stripe-signature header")]
    MissingSignature,
    #[error("Malformed stripe-signature header")]
    MalformedSignature,
    #[error("Webhook timestamp outside the tolerance window")]
    StaleTimestamp,
    #[error("Webhook signature verification failed")]
    InvalidSignature,
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Db(e) => AppError::Database(e),
            other => AppError::Payment(other.to_string()),
        }
    }
}

/// Outcome of a call to the processor. Failures carry the processor's
/// message and are for the caller to report.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome<T> {
    Succeeded(T),
    Failed { error: String },
}

impl<T> PaymentOutcome<T> {
    pub fn failed(error: impl Into<String>) -> Self {
        PaymentOutcome::Failed {
            error: error.into(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, PaymentOutcome::Succeeded(_))
    }

    /// Turns a failure into a 400 carrying the processor's message.
    pub fn into_app_result(self) -> Result<T, AppError> {
        match self {
            PaymentOutcome::Succeeded(value) => Ok(value),
            PaymentOutcome::Failed { error } => Err(AppError::Payment(error)),
        }
    }
}

impl<T> From<Result<T, ProcessorError>> for PaymentOutcome<T> {
    fn from(result: Result<T, ProcessorError>) -> Self {
        match result {
            Ok(value) => PaymentOutcome::Succeeded(value),
            Err(e) => PaymentOutcome::failed(e.to_string()),
        }
    }
}

/// Processor-side payment intent. Amounts are in minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub status: Option<String>,
}

/// The only seam that talks to the payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: &Metadata,
        customer: Option<&str>,
    ) -> Result<PaymentIntent, ProcessorError>;

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProcessorError>;

    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        metadata: &Metadata,
    ) -> Result<Customer, ProcessorError>;

    async fn create_refund(
        &self,
        intent_id: &str,
        amount: Option<i64>,
        reason: &str,
    ) -> Result<Refund, ProcessorError>;

    async fn list_payment_intents(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<PaymentIntent>, ProcessorError>;
}

pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn to_major_units(amount: i64) -> f64 {
    amount as f64 / 100.0
}

/// Metadata attached to a course purchase intent; the webhook relies on
/// `courseId` and `userId` to enroll.
pub fn enrollment_metadata(user_id: Uuid, course_id: Uuid, course_name: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("courseId".to_string(), course_id.to_string());
    metadata.insert("userId".to_string(), user_id.to_string());
    metadata.insert("courseName".to_string(), course_name.to_string());
    metadata
}

fn metadata_uuid(metadata: &Metadata, key: &str) -> Option<Uuid> {
    metadata.get(key).and_then(|v| Uuid::parse_str(v).ok())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreatedIntent {
    pub client_secret: String,
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfirmedPayment {
    pub payment_intent_id: String,
    pub status: String,
    pub amount: f64,
    pub currency: String,
    pub metadata: Metadata,
}

impl ConfirmedPayment {
    pub fn is_succeeded(&self) -> bool {
        self.status == INTENT_SUCCEEDED
    }

    pub fn course_id(&self) -> Option<Uuid> {
        metadata_uuid(&self.metadata, "courseId")
    }

    pub fn user_id(&self) -> Option<Uuid> {
        metadata_uuid(&self.metadata, "userId")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RefundSummary {
    pub refund_id: String,
    pub amount: f64,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentRecord {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub created: DateTime<Utc>,
    pub metadata: Metadata,
}

impl From<PaymentIntent> for PaymentRecord {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            id: intent.id,
            amount: to_major_units(intent.amount),
            currency: intent.currency,
            status: intent.status,
            created: DateTime::from_timestamp(intent.created, 0).unwrap_or_default(),
            metadata: intent.metadata,
        }
    }
}

/// HMAC-SHA256 over `"{timestamp}.{payload}"`, hex encoded.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, PaymentError> {
    let mac = signing_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn signing_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::NotConfigured("Invalid webhook secret"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Checks a `t=<unix>,v1=<hex>[,v1=<hex>...]` signature header against the
/// raw payload. Returns the signed timestamp.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> Result<i64, PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| PaymentError::MalformedSignature)?,
                )
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PaymentError::MalformedSignature)?;
    if signatures.is_empty() {
        return Err(PaymentError::MalformedSignature);
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(PaymentError::StaleTimestamp);
    }

    let mac = signing_mac(secret, timestamp, payload)?;
    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(timestamp)
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// What a verified webhook led to.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Enrolled { enrollment_id: Uuid, created: bool },
    Skipped(String),
    Logged(String),
    Ignored(String),
}

pub struct PaymentService {
    processor: Option<Arc<dyn PaymentProcessor>>,
    webhook_secret: Option<String>,
    currency: String,
    webhook_tolerance_secs: i64,
}

impl PaymentService {
    pub fn new(processor: Option<Arc<dyn PaymentProcessor>>, config: &StripeConfig) -> Self {
        Self {
            processor,
            webhook_secret: config.webhook_secret.clone(),
            currency: config.currency.clone(),
            webhook_tolerance_secs: config.webhook_tolerance_secs,
        }
    }

    /// Uses the Stripe client when a secret key is configured. Without one
    /// every processor call fails without touching the network.
    pub fn from_config(config: &StripeConfig) -> Self {
        let processor = config.secret_key.as_ref().map(|key| {
            Arc::new(StripeClient::new(key.clone(), config.api_base.clone()))
                as Arc<dyn PaymentProcessor>
        });
        Self::new(processor, config)
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    fn processor(&self) -> Result<&dyn PaymentProcessor, String> {
        self.processor.as_deref().ok_or_else(|| {
            tracing::warn!("Payment processor called without STRIPE_SECRET_KEY");
            "Stripe API key is not configured".to_string()
        })
    }

    /// `amount` is in major units and converted to minor units for the
    /// processor.
    pub async fn create_payment_intent(
        &self,
        amount: f64,
        currency: &str,
        metadata: &Metadata,
        customer: Option<&str>,
    ) -> PaymentOutcome<CreatedIntent> {
        let processor = match self.processor() {
            Ok(processor) => processor,
            Err(error) => return PaymentOutcome::failed(error),
        };

        let result = processor
            .create_payment_intent(to_minor_units(amount), currency, metadata, customer)
            .await;
        match result {
            Ok(intent) => match intent.client_secret {
                Some(client_secret) => PaymentOutcome::Succeeded(CreatedIntent {
                    client_secret,
                    payment_intent_id: intent.id,
                }),
                None => PaymentOutcome::failed("Payment intent has no client secret"),
            },
            Err(e) => {
                tracing::error!("Payment intent creation failed: {}", e);
                PaymentOutcome::failed(e.to_string())
            }
        }
    }

    /// Reads back an intent. The caller decides what a non-`succeeded`
    /// status means.
    pub async fn confirm_payment(&self, intent_id: &str) -> PaymentOutcome<ConfirmedPayment> {
        let processor = match self.processor() {
            Ok(processor) => processor,
            Err(error) => return PaymentOutcome::failed(error),
        };

        match processor.retrieve_payment_intent(intent_id).await {
            Ok(intent) => PaymentOutcome::Succeeded(ConfirmedPayment {
                payment_intent_id: intent.id,
                status: intent.status,
                amount: to_major_units(intent.amount),
                currency: intent.currency,
                metadata: intent.metadata,
            }),
            Err(e) => {
                tracing::error!("Payment confirmation failed for {}: {}", intent_id, e);
                PaymentOutcome::failed(e.to_string())
            }
        }
    }

    pub async fn create_customer(
        &self,
        email: &str,
        name: &str,
        metadata: &Metadata,
    ) -> PaymentOutcome<String> {
        let processor = match self.processor() {
            Ok(processor) => processor,
            Err(error) => return PaymentOutcome::failed(error),
        };

        PaymentOutcome::from(
            processor
                .create_customer(email, name, metadata)
                .await
                .map(|customer| customer.id),
        )
    }

    /// Full refund unless `amount` (major units) is given.
    pub async fn process_refund(
        &self,
        intent_id: &str,
        amount: Option<f64>,
        reason: Option<&str>,
    ) -> PaymentOutcome<RefundSummary> {
        let processor = match self.processor() {
            Ok(processor) => processor,
            Err(error) => return PaymentOutcome::failed(error),
        };

        let reason = reason.unwrap_or(DEFAULT_REFUND_REASON);
        let result = processor
            .create_refund(intent_id, amount.map(to_minor_units), reason)
            .await;
        match result {
            Ok(refund) => {
                tracing::info!("Refund {} issued for {}", refund.id, intent_id);
                PaymentOutcome::Succeeded(RefundSummary {
                    refund_id: refund.id,
                    amount: to_major_units(refund.amount),
                    status: refund.status,
                })
            }
            Err(e) => {
                tracing::error!("Refund for {} failed: {}", intent_id, e);
                PaymentOutcome::failed(e.to_string())
            }
        }
    }

    pub async fn payment_history(
        &self,
        customer_id: &str,
        limit: Option<u32>,
    ) -> PaymentOutcome<Vec<PaymentRecord>> {
        let processor = match self.processor() {
            Ok(processor) => processor,
            Err(error) => return PaymentOutcome::failed(error),
        };

        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_HISTORY_LIMIT);
        PaymentOutcome::from(
            processor
                .list_payment_intents(customer_id, limit)
                .await
                .map(|intents| intents.into_iter().map(PaymentRecord::from).collect()),
        )
    }

    /// Verifies and parses a webhook delivery. Nothing is parsed before the
    /// signature checks out.
    pub fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: i64,
    ) -> Result<WebhookEvent, PaymentError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or(PaymentError::NotConfigured(
                "Stripe webhook secret is not configured",
            ))?;
        let header = signature.ok_or(PaymentError::MissingSignature)?;

        verify_signature(secret, header, payload, now, self.webhook_tolerance_secs)?;

        serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
    }

    pub async fn handle_webhook(
        &self,
        db: &DatabaseConnection,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        let event = self.verify_webhook(payload, signature, Utc::now().timestamp())?;
        let event_id = event.id.clone().unwrap_or_default();

        match event.event_type.as_str() {
            "payment_intent.succeeded" => {
                let intent: PaymentIntent = serde_json::from_value(event.data.object)
                    .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
                tracing::info!("Payment succeeded: {}", intent.id);
                handle_payment_success(db, intent).await
            }
            "payment_intent.payment_failed" => {
                tracing::warn!("Payment failed: {}", object_id(&event.data.object));
                Ok(WebhookOutcome::Logged(event.event_type))
            }
            "customer.subscription.created" => {
                tracing::info!("Subscription created: {}", object_id(&event.data.object));
                Ok(WebhookOutcome::Logged(event.event_type))
            }
            "customer.subscription.deleted" => {
                tracing::info!("Subscription canceled: {}", object_id(&event.data.object));
                Ok(WebhookOutcome::Logged(event.event_type))
            }
            other => {
                tracing::info!("Unhandled webhook event type {} ({})", other, event_id);
                Ok(WebhookOutcome::Ignored(event.event_type))
            }
        }
    }
}

fn object_id(object: &serde_json::Value) -> &str {
    object.get("id").and_then(|v| v.as_str()).unwrap_or("unknown")
}

async fn handle_payment_success(
    db: &DatabaseConnection,
    intent: PaymentIntent,
) -> Result<WebhookOutcome, PaymentError> {
    if intent.status != INTENT_SUCCEEDED {
        return Ok(WebhookOutcome::Skipped(format!(
            "intent {} has status {}",
            intent.id, intent.status
        )));
    }

    let (Some(user_id), Some(course_id)) = (
        metadata_uuid(&intent.metadata, "userId"),
        metadata_uuid(&intent.metadata, "courseId"),
    ) else {
        tracing::warn!("Payment {} carries no enrollment metadata", intent.id);
        return Ok(WebhookOutcome::Skipped(format!(
            "intent {} has no enrollment metadata",
            intent.id
        )));
    };

    let payment = EnrollmentPayment {
        transaction_id: intent.id.clone(),
        amount: to_major_units(intent.amount),
        currency: intent.currency.clone(),
        payment_method: PAYMENT_METHOD.to_string(),
    };

    match enrollment_service::enroll_with_payment(db, user_id, course_id, payment).await {
        Ok(enrolled) => Ok(WebhookOutcome::Enrolled {
            enrollment_id: enrolled.enrollment.enrollment_id,
            created: enrolled.created,
        }),
        Err(EnrollmentError::Db(e)) => Err(PaymentError::Db(e)),
        Err(e) => {
            tracing::error!("Error creating enrollment for payment {}: {}", intent.id, e);
            Ok(WebhookOutcome::Skipped(e.to_string()))
        }
    }
}
