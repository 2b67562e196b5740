use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;
use crate::error::ProviderError;

pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    CreditCard,
    Pix,
    Boleto,
}

impl PaymentMethod {
    fn path(self) -> &'static str {
        match self {
            Self::CreditCard => "payment/credit-card",
            Self::Pix => "payment/pix",
            Self::Boleto => "payment/boleto",
        }
    }
}

/// The slice of the Appmax v3 API this service talks to.
#[async_trait]
pub trait AppmaxApi: Send + Sync {
    async fn create_customer(&self, payload: Payload) -> Result<Value, ProviderError>;
    async fn create_order(&self, payload: Payload) -> Result<Value, ProviderError>;
    async fn create_payment(&self, method: PaymentMethod, payload: Payload) -> Result<Value, ProviderError>;
    async fn get_order(&self, order_id: u64) -> Result<Value, ProviderError>;
}

pub struct AppmaxClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl AppmaxClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, mut payload: Payload) -> Result<Value, ProviderError> {
        payload.insert("access-token".to_string(), Value::String(self.access_token.clone()));

        debug!("POST {}", path);
        let response = self.http.post(self.url(path)).json(&payload).send().await?;
        read_response(response).await
    }
}

#[async_trait]
impl AppmaxApi for AppmaxClient {
    async fn create_customer(&self, payload: Payload) -> Result<Value, ProviderError> {
        self.post("customer", payload).await
    }

    async fn create_order(&self, payload: Payload) -> Result<Value, ProviderError> {
        self.post("order", payload).await
    }

    async fn create_payment(&self, method: PaymentMethod, payload: Payload) -> Result<Value, ProviderError> {
        self.post(method.path(), payload).await
    }

    async fn get_order(&self, order_id: u64) -> Result<Value, ProviderError> {
        debug!("GET order/{}", order_id);
        let response = self
            .http
            .get(self.url(&format!("order/{}", order_id)))
            .query(&[("access-token", self.access_token.as_str())])
            .send()
            .await?;
        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let text = response.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

    if !status.is_success() || body.get("success") == Some(&Value::Bool(false)) {
        return Err(ProviderError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
