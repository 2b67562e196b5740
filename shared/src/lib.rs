use serde::{Deserialize, Serialize};
use serde_json::Value;
use chrono::{DateTime, Utc};

pub mod catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[serde(alias = "iniciado")]
    Initiated,
    #[serde(alias = "pendente")]
    Pending,
    #[serde(alias = "pagamento_pendente")]
    PaymentPending,
    #[serde(alias = "payment_approved", alias = "pagamento_aprovado")]
    Completed,
    #[serde(alias = "nao_autorizado")]
    Unauthorized,
    #[serde(alias = "analise_antifraude")]
    FraudReview,
    #[serde(alias = "recusado_por_risco")]
    RiskDeclined,
    #[serde(alias = "estornado")]
    Refunded,
    Chargeback,
    #[serde(alias = "chargeback_recuperado")]
    ChargebackRecovered,
    Failed,
}

impl TransactionStatus {
    /// No further provider events are expected once a record reaches one of
    /// these states. Nothing rejects a later transition, though.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Refunded | Self::ChargebackRecovered | Self::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Pending => "pending",
            Self::PaymentPending => "payment_pending",
            Self::Completed => "completed",
            Self::Unauthorized => "unauthorized",
            Self::FraudReview => "fraud_review",
            Self::RiskDeclined => "risk_declined",
            Self::Refunded => "refunded",
            Self::Chargeback => "chargeback",
            Self::ChargebackRecovered => "chargeback_recovered",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Either structured fields or the single free-text line the order form
/// sends, which is kept whole in `street`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "AddressRepr")]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressRepr {
    Line(String),
    Detailed {
        #[serde(default, alias = "rua")]
        street: String,
        #[serde(default, alias = "numero")]
        number: String,
        #[serde(default, alias = "complemento")]
        complement: String,
        #[serde(default, alias = "bairro")]
        district: String,
        #[serde(default, alias = "cidade")]
        city: String,
        #[serde(default, alias = "estado")]
        state: String,
        #[serde(default, alias = "cep")]
        postcode: String,
    },
}

impl From<AddressRepr> for Address {
    fn from(repr: AddressRepr) -> Self {
        match repr {
            AddressRepr::Line(line) => Self {
                street: line.trim().to_string(),
                ..Self::default()
            },
            AddressRepr::Detailed { street, number, complement, district, city, state, postcode } => Self {
                street,
                number,
                complement,
                district,
                city,
                state,
                postcode,
            },
        }
    }
}

/// The business the customer picked through the places search.
///
/// Accepts either a bare name or the object the frontend sends
/// (`{ nome, endereco, geometry }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SearchedStoreRepr")]
pub struct SearchedStore {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "endereco", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
}

impl SearchedStore {
    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchedStoreRepr {
    Name(String),
    Detailed {
        #[serde(default, rename = "nome", alias = "name")]
        name: String,
        #[serde(default, rename = "endereco", alias = "address", alias = "formatted_address")]
        address: Option<String>,
        #[serde(default)]
        geometry: Option<Value>,
    },
}

impl From<SearchedStoreRepr> for SearchedStore {
    fn from(repr: SearchedStoreRepr) -> Self {
        match repr {
            SearchedStoreRepr::Name(name) => Self { name, address: None, geometry: None },
            SearchedStoreRepr::Detailed { name, address, geometry } => Self { name, address, geometry },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub telephone: String,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loja_pesquisada: Option<SearchedStore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    #[serde(deserialize_with = "provider_id::deserialize")]
    pub customer_id: u64,
    #[serde(default, deserialize_with = "provider_id::deserialize_option")]
    pub order_id: Option<u64>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub user: UserSnapshot,
}

impl TransactionRecord {
    /// Records without a confirmed provider order start out as `initiated`
    /// and stay eligible for email linkage until a webhook fills the order id.
    pub fn new(customer_id: u64, order_id: Option<u64>, user: UserSnapshot) -> Self {
        let now = Utc::now();
        let status = match order_id {
            Some(_) => TransactionStatus::Pending,
            None => TransactionStatus::Initiated,
        };

        Self {
            id: now.timestamp_millis(),
            customer_id,
            order_id,
            status,
            created_at: now,
            updated_at: None,
            user,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.order_id.is_none()
    }

    pub fn set_status(&mut self, status: TransactionStatus) {
        self.status = status;
        self.updated_at = Some(Utc::now());
    }
}

/// First token is the first name, the rest is the last name. A single-token
/// name is repeated as the last name since the provider requires both.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");

    if rest.is_empty() {
        (first.clone(), first)
    } else {
        (first, rest)
    }
}

/// Provider ids show up both as JSON numbers and as numeric strings.
pub mod provider_id {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn coerce(value: &Value) -> Option<u64> {
        match value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        coerce(&value).ok_or_else(|| D::Error::custom(format!("invalid provider id: {}", value)))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(value) => coerce(&value)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid provider id: {}", value))),
        }
    }
}
