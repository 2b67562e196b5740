use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{Address, SearchedStore, UserSnapshot};
use std::sync::Mutex;
use crate::appmax::{AppmaxApi, Payload, PaymentMethod};
use crate::error::ProviderError;
use crate::models::OrderRequest;

pub fn user_snapshot(email: &str) -> UserSnapshot {
    UserSnapshot {
        firstname: "Ana".to_string(),
        lastname: "Souza".to_string(),
        email: email.to_string(),
        telephone: "11999999999".to_string(),
        address: Address::default(),
        loja_pesquisada: None,
    }
}

pub fn order_request(sku: &str) -> OrderRequest {
    OrderRequest {
        name: "Ana Paula Souza".to_string(),
        email: "ana@example.com".to_string(),
        document: "123.456.789-09".to_string(),
        telephone: "11999999999".to_string(),
        address: Address {
            street: "Rua A".to_string(),
            number: "10".to_string(),
            complement: "Sala 2".to_string(),
            district: "Centro".to_string(),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
            postcode: "01000-000".to_string(),
        },
        plan_sku: sku.to_string(),
        additional_cards: 0,
        loja_pesquisada: Some(SearchedStore {
            name: "Padaria Central".to_string(),
            address: Some("Rua B, 20".to_string()),
            geometry: None,
        }),
        ip: None,
    }
}

/// Canned provider. A `*_rejection` body makes the matching call fail with
/// a 422 carrying that body.
pub struct FakeAppmax {
    pub customer: Value,
    pub customer_rejection: Option<Value>,
    pub order: Value,
    pub order_rejection: Option<Value>,
    pub fetched_order: Value,
    pub payment: Value,
    pub order_payloads: Mutex<Vec<Payload>>,
    pub payment_calls: Mutex<Vec<(PaymentMethod, Payload)>>,
}

impl Default for FakeAppmax {
    fn default() -> Self {
        Self {
            customer: json!({ "success": true, "data": { "id": 321, "hash": "hash-321" } }),
            customer_rejection: None,
            order: json!({ "success": true, "data": { "id": 654, "customer_id": 321 } }),
            order_rejection: None,
            fetched_order: json!({ "success": true, "data": { "id": 654 } }),
            payment: json!({ "success": true, "data": { "pix_qrcode": "000201" } }),
            order_payloads: Mutex::new(Vec::new()),
            payment_calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeAppmax {
    pub fn order_calls(&self) -> usize {
        self.order_payloads.lock().unwrap().len()
    }

    pub fn last_order_payload(&self) -> Option<Payload> {
        self.order_payloads.lock().unwrap().last().cloned()
    }

    fn answer(body: &Value, rejection: &Option<Value>) -> Result<Value, ProviderError> {
        match rejection {
            Some(body) => Err(ProviderError::Rejected { status: 422, body: body.clone() }),
            None => Ok(body.clone()),
        }
    }
}

#[async_trait]
impl AppmaxApi for FakeAppmax {
    async fn create_customer(&self, _payload: Payload) -> Result<Value, ProviderError> {
        Self::answer(&self.customer, &self.customer_rejection)
    }

    async fn create_order(&self, payload: Payload) -> Result<Value, ProviderError> {
        self.order_payloads.lock().unwrap().push(payload);
        Self::answer(&self.order, &self.order_rejection)
    }

    async fn create_payment(&self, method: PaymentMethod, payload: Payload) -> Result<Value, ProviderError> {
        self.payment_calls.lock().unwrap().push((method, payload));
        Ok(self.payment.clone())
    }

    async fn get_order(&self, _order_id: u64) -> Result<Value, ProviderError> {
        Ok(self.fetched_order.clone())
    }
}
