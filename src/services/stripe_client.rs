use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::services::payment_service::{
    Customer, Metadata, PaymentIntent, PaymentProcessor, ProcessorError, Refund, PROCESSOR_ID,
};

/// Stripe REST API client. Requests are form encoded and authenticated with
/// the secret key as a bearer token.
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            secret_key: secret_key.into(),
        }
    }

    fn checked_id(id: &str) -> Result<&str, ProcessorError> {
        if PROCESSOR_ID.is_match(id) {
            Ok(id)
        } else {
            Err(ProcessorError::InvalidId(id.to_string()))
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base.trim_end_matches('/'), path)
    }

    async fn send<T>(&self, request: RequestBuilder) -> Result<T, ProcessorError>
    where
        T: DeserializeOwned,
    {
        let response = request.bearer_auth(&self.secret_key).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            tracing::warn!("Stripe returned {}: {}", status, message);
            return Err(ProcessorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProcessorError::InvalidResponse(e.to_string()))
    }
}

fn metadata_params(metadata: &Metadata) -> Vec<(String, String)> {
    metadata
        .iter()
        .map(|(key, value)| (format!("metadata[{}]", key), value.clone()))
        .collect()
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: &Metadata,
        customer: Option<&str>,
    ) -> Result<PaymentIntent, ProcessorError> {
        let mut params = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        if let Some(customer) = customer {
            params.push(("customer".to_string(), customer.to_string()));
        }
        params.extend(metadata_params(metadata));

        self.send(self.client.post(self.url("payment_intents")).form(&params))
            .await
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProcessorError> {
        let path = format!("payment_intents/{}", Self::checked_id(intent_id)?);
        self.send(self.client.get(self.url(&path))).await
    }

    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        metadata: &Metadata,
    ) -> Result<Customer, ProcessorError> {
        let mut params = vec![
            ("email".to_string(), email.to_string()),
            ("name".to_string(), name.to_string()),
        ];
        params.extend(metadata_params(metadata));

        self.send(self.client.post(self.url("customers")).form(&params))
            .await
    }

    async fn create_refund(
        &self,
        intent_id: &str,
        amount: Option<i64>,
        reason: &str,
    ) -> Result<Refund, ProcessorError> {
        let mut params = BTreeMap::new();
        params.insert("payment_intent", Self::checked_id(intent_id)?.to_string());
        params.insert("reason", reason.to_string());
        if let Some(amount) = amount {
            params.insert("amount", amount.to_string());
        }

        self.send(self.client.post(self.url("refunds")).form(&params))
            .await
    }

    async fn list_payment_intents(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<PaymentIntent>, ProcessorError> {
        let request = self
            .client
            .get(self.url("payment_intents"))
            .query(&[("customer", customer_id.to_string()), ("limit", limit.to_string())]);

        let list: StripeList<PaymentIntent> = self.send(request).await?;
        Ok(list.data)
    }
}
