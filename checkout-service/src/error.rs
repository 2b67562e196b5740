use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transaction store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("transaction store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-2xx answer, or a 2xx answer flagged `"success": false`.
    #[error("provider responded with status {status}")]
    Rejected { status: u16, body: Value },

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ProviderError {
    /// What the caller gets back under `error`: the provider's own payload
    /// when there is one, otherwise the transport message.
    pub fn payload(&self) -> Value {
        match self {
            Self::Rejected { body, .. } => body.clone(),
            Self::Transport(e) => Value::String(e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),

    #[error("provider refused to create the customer")]
    RemoteCustomerCreation(#[source] ProviderError),

    #[error("provider response did not include a customer id")]
    MissingCustomerId,

    #[error("a searched store must be selected before ordering")]
    MissingStoreSelection,

    #[error("unknown plan sku '{0}'")]
    InvalidSku(String),

    #[error("provider refused to create the order")]
    RemoteOrderCreation(#[source] ProviderError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidBody(_) => "InvalidRequestBodyError",
            Self::RemoteCustomerCreation(_) => "RemoteCustomerCreationError",
            Self::MissingCustomerId => "MissingCustomerIdError",
            Self::MissingStoreSelection => "MissingStoreSelectionError",
            Self::InvalidSku(_) => "InvalidSkuError",
            Self::RemoteOrderCreation(_) => "RemoteOrderCreationError",
            Self::Provider(_) => "ProviderError",
            Self::Store(_) => "StoreError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let error = match &self {
            Self::RemoteCustomerCreation(e) | Self::RemoteOrderCreation(e) | Self::Provider(e) => e.payload(),
            other => Value::String(other.to_string()),
        };

        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => tracing::error!(error = %self, "Request failed"),
            _ => tracing::warn!(error = %self, code = self.code(), "Request rejected"),
        }

        (self.status(), Json(json!({ "error": error, "code": self.code() }))).into_response()
    }
}
