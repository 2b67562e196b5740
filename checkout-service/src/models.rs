use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{provider_id, split_full_name, Address, SearchedStore, UserSnapshot};
use crate::appmax::Payload;

/// Order form as posted by the landing page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderRequest {
    #[serde(default, alias = "nome")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "cpf")]
    pub document: String,
    #[serde(default, alias = "telefone", alias = "whatsapp")]
    pub telephone: String,
    #[serde(default, alias = "endereco")]
    pub address: Address,
    #[serde(default, alias = "sku")]
    pub plan_sku: String,
    #[serde(default)]
    pub additional_cards: u32,
    #[serde(default)]
    pub loja_pesquisada: Option<SearchedStore>,
    #[serde(default)]
    pub ip: Option<String>,
}

impl OrderRequest {
    pub fn user_snapshot(&self) -> UserSnapshot {
        let (firstname, lastname) = split_full_name(&self.name);
        UserSnapshot {
            firstname,
            lastname,
            email: self.email.trim().to_string(),
            telephone: self.telephone.clone(),
            address: self.address.clone(),
            loja_pesquisada: self.loja_pesquisada.clone(),
        }
    }

    pub fn customer_payload(&self) -> Payload {
        let (firstname, lastname) = split_full_name(&self.name);
        let payload = json!({
            "firstname": firstname,
            "lastname": lastname,
            "email": self.email.trim(),
            "telephone": self.telephone,
            "document_number": self.document,
            "postcode": self.address.postcode,
            "address_street": self.address.street,
            "address_street_number": self.address.number,
            "address_street_complement": self.address.complement,
            "address_street_district": self.address.district,
            "address_city": self.address.city,
            "address_state": self.address.state,
            "ip": self.ip.as_deref().unwrap_or("127.0.0.1"),
        });
        into_payload(payload)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductLine {
    pub sku: String,
    pub name: String,
    pub qty: u32,
    pub price: f64,
}

pub fn order_payload(customer_id: u64, products: &[ProductLine], total: f64) -> Payload {
    into_payload(json!({
        "customer_id": customer_id,
        "products": products,
        "total": total,
        "shipping": 0,
        "discount": 0,
    }))
}

fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

pub fn customer_id_from(response: &Value) -> Option<u64> {
    first_id(response, &["/data/id", "/data/customer_id", "/id", "/customer_id"])
}

pub fn order_id_from(response: &Value) -> Option<u64> {
    first_id(response, &["/data/id", "/data/order_id", "/id", "/order_id"])
}

fn first_id(response: &Value, pointers: &[&str]) -> Option<u64> {
    pointers
        .iter()
        .filter_map(|pointer| response.pointer(pointer))
        .find_map(provider_id::coerce)
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub checkout_url: String,
    pub order_id: Option<u64>,
    pub customer_id: u64,
}

#[derive(Debug, Serialize)]
pub struct CheckoutLinkResponse {
    pub checkout_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PlacesQuery {
    pub query: Option<String>,
}
