use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment provider is not configured")]
    NotConfigured,

    #[error("Payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Payment provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    pub description: String,
    /// Smallest currency unit (cents)
    pub amount: i64,
    pub currency: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub line_items: Vec<LineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
    pub client_reference_id: String,
}

/// Hosted checkout. The returned session is opaque and relayed to the caller as is.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<Value, PaymentError>;
}

const STRIPE_API: &str = "https://api.stripe.com/v1";

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: Option<String>,
    base_url: String,
}

impl StripeGateway {
    pub fn new(secret_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            base_url: STRIPE_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Stripe takes form-encoded bodies with bracketed keys for nested values.
    pub fn form_fields(request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("customer_email".to_string(), request.customer_email.clone()),
            ("client_reference_id".to_string(), request.client_reference_id.clone()),
        ];
        for (i, item) in request.line_items.iter().enumerate() {
            let key = |suffix: &str| format!("line_items[{}]{}", i, suffix);
            fields.push((key("[price_data][currency]"), item.currency.clone()));
            fields.push((key("[price_data][unit_amount]"), item.amount.to_string()));
            fields.push((key("[price_data][product_data][name]"), item.name.clone()));
            if !item.description.is_empty() {
                fields.push((key("[price_data][product_data][description]"), item.description.clone()));
            }
            fields.push((key("[quantity]"), item.quantity.to_string()));
        }
        fields
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<Value, PaymentError> {
        let secret = self.secret_key.as_deref().ok_or(PaymentError::NotConfigured)?;

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .bearer_auth(secret)
            .form(&Self::form_fields(request))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown error").to_string();
            return Err(PaymentError::Provider { status: status.as_u16(), message });
        }
        Ok(body)
    }
}
